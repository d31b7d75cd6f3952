//! The memory access gate.
//!
//! Every processor access to memory goes through [`Machine::read`]
//! or [`Machine::write`], which apply the accumulator aliasing of
//! logical addresses 0 and 1, map translation, the mapping unit's
//! protection bits and the memory protect fence, in that order.  DMA
//! accesses go through [`Machine::dma_read`] and
//! [`Machine::dma_write`], which are never protected.
use tracing::{event, Level};

use base::prelude::*;

use super::{Abort, AbortCause};
use crate::dma::DmaChannelId;
use crate::machine::Machine;
use crate::mmu::{Protection, ViolationCause};

/// The ways the processor accesses memory.  The class determines
/// which map translates the address and which protection applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessClass {
    /// Instruction fetch (and in-line operand fetch), current map.
    Fetch,
    /// Operand access through the current map.
    Data,
    /// Operand access through the alternate map (the cross-map
    /// instructions).
    AltData,
    /// Access through the system map regardless of the current map
    /// (the interrupt trap cell).
    SysData,
    /// Access through the user map regardless of the current map.
    UsrData,
}

impl AccessClass {
    fn protection(&self, write: bool) -> Protection {
        match (self, write) {
            (AccessClass::Fetch | AccessClass::Data | AccessClass::AltData, false) => {
                Protection::Read
            }
            (AccessClass::Data | AccessClass::AltData, true) => Protection::Write,
            _ => Protection::Unprotected,
        }
    }

    /// True when memory protect checks writes in this class.
    fn fence_protected(&self) -> bool {
        matches!(self, AccessClass::Data | AccessClass::AltData)
    }
}

impl Machine {
    fn map_for(&self, class: AccessClass) -> MapId {
        match class {
            AccessClass::Fetch | AccessClass::Data => self.mmu.current_map(),
            AccessClass::AltData => self.mmu.alternate_map(),
            AccessClass::SysData => MapId::System,
            AccessClass::UsrData => MapId::User,
        }
    }

    /// Translate a processor access.  A mapping unit violation is
    /// recorded; when memory protect is on it also aborts the
    /// instruction.
    fn translate_for_cpu(
        &mut self,
        class: AccessClass,
        addr: LogicalAddress,
        write: bool,
    ) -> Result<PhysicalAddress, Abort> {
        if !self.config.options.dms {
            return Ok(PhysicalAddress::unmapped(addr));
        }
        let map = self.map_for(class);
        let translation = self.mmu.translate(addr, map, class.protection(write));
        match translation.violation {
            Some(cause) => {
                self.mapping_violation(cause, map, addr)?;
                Ok(translation.physical)
            }
            None => Ok(translation.physical),
        }
    }

    /// Record a mapping unit violation.  With memory protect on, this
    /// freezes the violation record and aborts the instruction;
    /// otherwise the access goes ahead.
    pub(crate) fn mapping_violation(
        &mut self,
        cause: ViolationCause,
        map: MapId,
        addr: LogicalAddress,
    ) -> Result<(), Abort> {
        let protect_enabled = self.mp.is_enabled();
        self.mmu.record_violation(cause, map, addr, protect_enabled);
        if !protect_enabled {
            event!(
                Level::TRACE,
                "{cause:?} violation at {addr} in the {map} map ignored; memory protect is off"
            );
            return Ok(());
        }
        event!(
            Level::DEBUG,
            "{cause:?} violation at {addr} in the {map} map"
        );
        self.mmu.freeze_violation();
        self.mp.note_mapping_violation();
        self.mp.latch_violation(self.err_p);
        Err(Abort {
            address: addr,
            cause: match cause {
                ViolationCause::Privileged => AbortCause::Privileged,
                _ => AbortCause::Mapping,
            },
        })
    }

    pub(crate) fn read(&mut self, class: AccessClass, addr: LogicalAddress) -> Result<u16, Abort> {
        let word = if addr.is_accumulator() {
            match u16::from(addr) {
                0 => self.regs.a,
                _ => self.regs.b,
            }
        } else {
            let physical = self.translate_for_cpu(class, addr, false)?;
            self.mem.read(physical)
        };
        self.regs.m = addr;
        self.regs.t = word;
        Ok(word)
    }

    pub(crate) fn write(
        &mut self,
        class: AccessClass,
        addr: LogicalAddress,
        value: u16,
    ) -> Result<(), Abort> {
        if class == AccessClass::AltData && self.mp.is_enabled() {
            // Cross-map writes are refused outright under memory
            // protect, whatever the page protection says.
            return Err(Abort {
                address: addr,
                cause: AbortCause::Fence,
            });
        }
        if addr.is_accumulator() {
            match u16::from(addr) {
                0 => self.regs.a = value,
                _ => self.regs.b = value,
            }
        } else {
            let physical = self.translate_for_cpu(class, addr, true)?;
            if class.fence_protected() && self.mp.write_violates(addr) {
                return Err(Abort {
                    address: addr,
                    cause: AbortCause::Fence,
                });
            }
            self.mem.write(physical, value);
        }
        self.regs.m = addr;
        self.regs.t = value;
        Ok(())
    }

    /// Check a jump to `target` under memory protect.  Targets below
    /// `lower_bound` are exempt from the fence.  The target page must
    /// also be writable in `map`.
    pub(crate) fn check_jump(
        &mut self,
        target: LogicalAddress,
        lower_bound: u16,
        map: MapId,
    ) -> Result<(), Abort> {
        if !self.mp.is_enabled() {
            return Ok(());
        }
        if self.config.options.dms && u16::from(target) >= lower_bound {
            let translation = self.mmu.translate(target, map, Protection::Write);
            if let Some(cause) = translation.violation {
                self.mapping_violation(cause, map, target)?;
            }
        }
        if self.mp.jump_violates(target, lower_bound) {
            return Err(Abort {
                address: target,
                cause: AbortCause::Fence,
            });
        }
        Ok(())
    }

    fn dma_translate(&self, id: DmaChannelId, addr: LogicalAddress) -> PhysicalAddress {
        if self.config.options.dms {
            self.mmu
                .translate(addr, id.map(), Protection::Unprotected)
                .physical
        } else {
            PhysicalAddress::unmapped(addr)
        }
    }

    /// A DMA read.  DMA addresses 0 and 1 are memory, not the
    /// accumulators.
    pub(crate) fn dma_read(&mut self, id: DmaChannelId, addr: LogicalAddress) -> u16 {
        let physical = self.dma_translate(id, addr);
        self.mem.read(physical)
    }

    pub(crate) fn dma_write(&mut self, id: DmaChannelId, addr: LogicalAddress, value: u16) {
        let physical = self.dma_translate(id, addr);
        event!(Level::TRACE, "DMA {id:?} writes {value:06o} to {physical}");
        self.mem.write(physical, value);
    }
}
