//! The simulated machine as a whole.
//!
//! [`Machine`] owns every piece of simulated state: registers,
//! memory, the mapping unit, memory protect, the backplane, the DMA
//! channels and the attached devices.  The execution engine (in the
//! `control` module) and the console interface operate on it through
//! `&mut self`, so no component keeps a copy of another's state.
use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{event, Level};

use base::prelude::*;

use crate::clock::{BasicClock, Clock};
use crate::config::{ConfigurationError, CpuConfiguration};
use crate::diagnostics::CurrentInstructionDiagnostics;
use crate::dma::{DmaChannel, DmaChannelId};
use crate::io::{
    AttachError, Backplane, Device, DeviceManager, InboundSet, InboundSignal, OutboundSet,
    OutboundSignal, StandardInterface,
};
use crate::memory::PhysicalMemory;
use crate::mmu::Mmu;
use crate::protect::MemoryProtect;
use crate::registers::Registers;
use crate::stop::StopKind;
use crate::stopunit::{StopNotMaskable, StopStatus, StopUnit};

#[derive(Debug)]
pub struct Machine {
    pub(crate) config: CpuConfiguration,
    pub(crate) regs: Registers,
    pub(crate) mem: PhysicalMemory,
    pub(crate) mmu: Mmu,
    pub(crate) mp: MemoryProtect,
    pub(crate) backplane: Backplane,
    pub(crate) dma: [DmaChannel; 2],
    pub(crate) devices: DeviceManager,
    pub(crate) stops: StopUnit,
    pub(crate) clock: BasicClock,
    /// The power fail interface (select code 04).
    pub(crate) power_fail: StandardInterface,
    /// The interrupt system is on.
    pub(crate) ion: bool,
    /// Interrupts are held off for one instruction.
    pub(crate) defer: bool,
    /// The most recently executed instruction was one which holds
    /// off interrupts (JMP,I, JSB,I, I/O group and the like).
    pub(crate) last_was_deferring: bool,
    /// The central interrupt register: the select code of the last
    /// interrupt acknowledged.
    pub(crate) cir: SelectCode,
    /// The select code currently granted an interrupt, if any.
    pub(crate) intrq: Option<SelectCode>,
    /// The address of the instruction being executed; the program
    /// counter is restored to this when an instruction is backed out.
    pub(crate) err_p: LogicalAddress,
    pub(crate) current: CurrentInstructionDiagnostics,
    pub(crate) breakpoints: BTreeSet<LogicalAddress>,
    /// Set by the console to let one instruction run without stops.
    pub(crate) bypass_requested: bool,
    pub(crate) bypass_active: bool,
    pub(crate) instructions_executed: u64,
}

impl Machine {
    pub fn new(config: CpuConfiguration) -> Result<Machine, ConfigurationError> {
        config.validate()?;
        event!(
            Level::INFO,
            "configuring a {} with {}K words of memory",
            config.model,
            config.memory_words / PAGE_SIZE
        );
        let mut machine = Machine {
            mem: PhysicalMemory::new(config.memory_words),
            config,
            regs: Registers::default(),
            mmu: Mmu::new(),
            mp: MemoryProtect::new(),
            backplane: Backplane::new(),
            dma: [
                DmaChannel::new(DmaChannelId::One),
                DmaChannel::new(DmaChannelId::Two),
            ],
            devices: DeviceManager::new(),
            stops: StopUnit::new(),
            clock: BasicClock::new(),
            power_fail: StandardInterface::new(),
            ion: false,
            defer: false,
            last_was_deferring: false,
            cir: SelectCode::INTERRUPT_SYSTEM,
            intrq: None,
            err_p: LogicalAddress::ZERO,
            current: CurrentInstructionDiagnostics {
                location: LogicalAddress::ZERO,
                instruction: 0,
            },
            breakpoints: BTreeSet::new(),
            bypass_requested: false,
            bypass_active: false,
            instructions_executed: 0,
        };
        machine.reset();
        Ok(machine)
    }

    pub fn config(&self) -> &CpuConfiguration {
        &self.config
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    pub fn memory_protect(&self) -> &MemoryProtect {
        &self.mp
    }

    pub fn dma_channel(&self, id: DmaChannelId) -> &DmaChannel {
        &self.dma[id.index()]
    }

    pub fn backplane(&self) -> &Backplane {
        &self.backplane
    }

    pub fn interrupt_system_enabled(&self) -> bool {
        self.ion
    }

    pub fn central_interrupt_register(&self) -> SelectCode {
        self.cir
    }

    /// The select code which would be granted an interrupt at the
    /// next instruction boundary.
    pub fn pending_interrupt(&self) -> Option<SelectCode> {
        self.intrq
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    /// The current simulated time.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn attach_device(&mut self, sc: SelectCode, device: Box<dyn Device>) -> Result<(), AttachError> {
        self.devices.attach(sc, device)?;
        // Bring the new card to its power-on state.
        let signals: InboundSet = [InboundSignal::Pon, InboundSignal::Popio, InboundSignal::Crs]
            .into_iter()
            .collect();
        if let Some(result) = self.devices.signal(self.clock.now(), sc, signals.with(InboundSignal::Sir), 0) {
            self.backplane.update(sc, result.outbound);
        }
        self.poll_interrupts();
        Ok(())
    }

    pub fn detach_device(&mut self, sc: SelectCode) -> Option<Box<dyn Device>> {
        let device = self.devices.detach(sc)?;
        // An empty slot passes priority on.
        self.backplane
            .update(sc, OutboundSet::EMPTY.with(OutboundSignal::Prl));
        self.poll_interrupts();
        Some(device)
    }

    /// The attached devices, in select code order.
    pub fn attached_devices(&self) -> Vec<(SelectCode, String)> {
        self.devices
            .select_codes()
            .filter_map(|sc| self.devices.name(sc).map(|name| (sc, name)))
            .collect()
    }

    /// The simulated time at which the next device event falls due.
    pub fn next_event_due(&self) -> Option<Duration> {
        self.devices.next_event_due()
    }

    pub fn set_stop_enabled(&mut self, kind: StopKind, enabled: bool) -> Result<(), StopNotMaskable> {
        if enabled {
            self.stops.enable(kind);
            Ok(())
        } else {
            self.stops.disable(kind)
        }
    }

    pub fn stop_statuses(&self) -> Vec<StopStatus> {
        self.stops.get_stop_statuses()
    }

    pub fn set_breakpoint(&mut self, addr: LogicalAddress) {
        self.breakpoints.insert(addr);
    }

    pub fn clear_breakpoint(&mut self, addr: LogicalAddress) -> bool {
        self.breakpoints.remove(&addr)
    }

    /// Let the next instruction execute without checking breakpoints
    /// or maskable stops (the front panel's single-instruction
    /// override, used to continue past a stop).
    pub fn bypass_stops_once(&mut self) {
        self.bypass_requested = true;
    }

    /// The console PRESET: send power-on, preset and control reset
    /// to every interface, turn off the interrupt system, mapping
    /// and memory protect.
    pub fn reset(&mut self) {
        event!(Level::INFO, "machine reset");
        self.ion = false;
        self.defer = false;
        self.last_was_deferring = false;
        self.cir = SelectCode::INTERRUPT_SYSTEM;
        self.mmu.reset();
        self.disable_protect();
        self.stops.clear_occurrences();
        let signals: InboundSet = [InboundSignal::Pon, InboundSignal::Popio, InboundSignal::Crs]
            .into_iter()
            .collect();
        self.broadcast(signals);
        self.poll_interrupts();
    }

    /// Simulate a power failure, which requests the select code 04
    /// interrupt.
    pub fn signal_power_failure(&mut self) {
        event!(Level::WARN, "power failure");
        self.power_fail.set_flag();
        self.backplane
            .update(SelectCode::POWER_FAIL, self.power_fail_outbound());
        self.poll_interrupts();
    }

    /// Turn memory protect off, which also re-arms the mapping
    /// unit's violation record.
    pub(crate) fn disable_protect(&mut self) {
        self.mp.disable();
        self.mmu.unfreeze_violation();
    }

    /// Recompute which select code, if any, is granted an interrupt.
    pub(crate) fn poll_interrupts(&mut self) {
        self.intrq = self.backplane.resolve(self.ion);
    }
}
