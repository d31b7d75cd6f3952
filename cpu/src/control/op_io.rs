//! The I/O group, and delivery of backplane signals to the
//! processor's own interfaces (select codes 00 to 07) and to the
//! attached devices.
use tracing::{event, Level};

use base::prelude::*;

use super::{Abort, AbortCause, Completion, OpcodeResult};
use crate::clock::Clock;
use crate::dma::DmaChannelId;
use crate::io::{InboundSet, InboundSignal, OutboundSet, OutboundSignal};
use crate::machine::Machine;
use crate::stop::{Stop, StopDetails};

/// What came back from the interface addressed by a set of signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IoResponse {
    pub(crate) outbound: OutboundSet,
    pub(crate) data: u16,
    pub(crate) error: Option<String>,
}

fn passive() -> OutboundSet {
    OutboundSet::EMPTY.with(OutboundSignal::Prl)
}

fn with_skip(mut outbound: OutboundSet, skip: bool) -> OutboundSet {
    outbound.set_if(OutboundSignal::Skf, skip);
    outbound
}

impl Machine {
    pub(crate) fn op_input_output(&mut self, iog: InputOutput, word: u16) -> OpcodeResult {
        if self.mp.is_enabled() && (iog.op == IoOp::Hlt || iog.sc != SelectCode::OVERFLOW) {
            return Err(Abort {
                address: self.err_p,
                cause: AbortCause::Io,
            }
            .into());
        }
        let mut signals = match iog.op {
            IoOp::Hlt => InboundSet::EMPTY,
            IoOp::Stf => InboundSignal::Stf.into(),
            IoOp::Clf => InboundSignal::Clf.into(),
            IoOp::Sfc => InboundSignal::Sfc.into(),
            IoOp::Sfs => InboundSignal::Sfs.into(),
            IoOp::Mix(_) | IoOp::Lix(_) => InboundSignal::Ioi.into(),
            IoOp::Otx(_) => InboundSignal::Ioo.into(),
            IoOp::Stc => InboundSignal::Stc.into(),
            IoOp::Clc => InboundSignal::Clc.into(),
        };
        if iog.clear_flag {
            signals.insert(InboundSignal::Clf);
        }
        let data = match iog.op {
            IoOp::Otx(reg) => self.regs.accumulator(reg),
            _ => 0,
        };

        if !signals.is_empty() {
            let response = self.io_dispatch(iog.sc, signals, data)?;
            if let Some(message) = response.error {
                self.stop_check(Stop::new(StopDetails::IoError {
                    sc: iog.sc,
                    message,
                }))?;
            }
            match iog.op {
                IoOp::Sfs | IoOp::Sfc if response.outbound.contains(OutboundSignal::Skf) => {
                    self.skip();
                }
                IoOp::Lix(reg) => self.regs.set_accumulator(reg, response.data),
                IoOp::Mix(reg) => {
                    let merged = self.regs.accumulator(reg) | response.data;
                    self.regs.set_accumulator(reg, merged);
                }
                _ => (),
            }
        }

        if iog.op == IoOp::Hlt {
            return Err(Stop::new(StopDetails::Halt { instruction: word }).into());
        }
        Ok(Completion::IoGroup)
    }

    /// Send `signals` to the interface at `sc` and update its
    /// backplane lines.  SIR is added to every set.
    pub(crate) fn io_dispatch(
        &mut self,
        sc: SelectCode,
        signals: InboundSet,
        data: u16,
    ) -> Result<IoResponse, Stop> {
        let signals = signals.with(InboundSignal::Sir);
        let response = if let Some((outbound, input)) = self.internal_interface(sc, signals, data) {
            IoResponse {
                outbound,
                data: input,
                error: None,
            }
        } else if let Some(result) = self.devices.signal(self.clock.now(), sc, signals, data) {
            IoResponse {
                outbound: result.outbound,
                data: result.data,
                error: result.error,
            }
        } else {
            self.stop_check(Stop::new(StopDetails::UnassignedSelectCode { sc }))?;
            // An empty slot has its flag clear.
            IoResponse {
                outbound: with_skip(passive(), signals.contains(InboundSignal::Sfc)),
                data: 0,
                error: None,
            }
        };
        event!(
            Level::TRACE,
            "{sc:?} {signals} data={data:06o} -> {:?} data={:06o}",
            response.outbound,
            response.data
        );
        self.backplane.update(sc, response.outbound);
        Ok(response)
    }

    /// Send `signals` to every interface, for reset.
    pub(crate) fn broadcast(&mut self, signals: InboundSet) {
        let signals = signals.with(InboundSignal::Sir);
        let internal = (1..=7u8).filter_map(|n| SelectCode::try_from(n).ok());
        for sc in internal {
            if let Some((outbound, _)) = self.internal_interface(sc, signals, 0) {
                self.backplane.update(sc, outbound);
            }
        }
        let attached: Vec<SelectCode> = self.devices.select_codes().collect();
        let now = self.clock.now();
        for sc in attached {
            if let Some(result) = self.devices.signal(now, sc, signals, 0) {
                self.backplane.update(sc, result.outbound);
            }
        }
    }

    /// The power fail interface requests its interrupt whenever its
    /// flag is set; its control flip-flop does not gate it.
    pub(crate) fn power_fail_outbound(&self) -> OutboundSet {
        let card = &self.power_fail;
        let mut outbound = OutboundSet::EMPTY;
        outbound.set_if(OutboundSignal::Prl, !card.flag);
        outbound.set_if(OutboundSignal::Irq, card.flag && card.flag_buffer);
        outbound
    }

    /// The processor's own interfaces.  Returns `None` for a select
    /// code which has no interface (a device slot, or an option which
    /// is not installed).
    fn internal_interface(
        &mut self,
        sc: SelectCode,
        signals: InboundSet,
        data: u16,
    ) -> Option<(OutboundSet, u16)> {
        let options = self.config.options;
        match u8::from(sc) {
            0 => Some(self.interrupt_system_interface(signals)),
            1 => Some(self.overflow_interface(signals, data)),
            2 | 3 if options.dma => {
                let id = if sc == SelectCode::DMA1_WORDS {
                    DmaChannelId::One
                } else {
                    DmaChannelId::Two
                };
                Some(self.dma[id.index()].words_interface(signals, data))
            }
            4 => Some(self.power_fail_interface(signals)),
            5 if options.memory_protect => {
                let response = self.mp.interface(signals, data);
                if !self.mp.is_enabled() {
                    self.mmu.unfreeze_violation();
                }
                Some(response)
            }
            6 | 7 if options.dma => {
                let id = if sc == SelectCode::DMA1 {
                    DmaChannelId::One
                } else {
                    DmaChannelId::Two
                };
                Some(self.dma[id.index()].control_interface(signals, data))
            }
            _ => None,
        }
    }

    /// Select code 00: STF 0 and CLF 0 turn the interrupt system on
    /// and off; CLC 0 resets every interface.
    fn interrupt_system_interface(&mut self, signals: InboundSet) -> (OutboundSet, u16) {
        let mut skip = false;
        for signal in signals.iter() {
            match signal {
                InboundSignal::Stf => {
                    event!(Level::DEBUG, "interrupt system on");
                    self.ion = true;
                }
                InboundSignal::Clf => {
                    event!(Level::DEBUG, "interrupt system off");
                    self.ion = false;
                }
                InboundSignal::Sfs => skip |= self.ion,
                InboundSignal::Sfc => skip |= !self.ion,
                InboundSignal::Clc => {
                    event!(Level::DEBUG, "CLC 0: control reset to all interfaces");
                    self.broadcast(InboundSignal::Crs.into());
                }
                _ => (),
            }
        }
        (with_skip(passive(), skip), 0)
    }

    /// Select code 01: the overflow register and the switch
    /// register.
    fn overflow_interface(&mut self, signals: InboundSet, data: u16) -> (OutboundSet, u16) {
        let mut skip = false;
        let mut input = 0;
        for signal in signals.iter() {
            match signal {
                InboundSignal::Stf => self.regs.o = true,
                InboundSignal::Clf => self.regs.o = false,
                InboundSignal::Sfs => skip |= self.regs.o,
                InboundSignal::Sfc => skip |= !self.regs.o,
                InboundSignal::Ioi => input = self.regs.s,
                InboundSignal::Ioo => self.regs.s = data,
                _ => (),
            }
        }
        (with_skip(passive(), skip), input)
    }

    /// Select code 04: power fail.  LIA 4 reads the central
    /// interrupt register.
    fn power_fail_interface(&mut self, signals: InboundSet) -> (OutboundSet, u16) {
        let mut input = 0;
        let mut card_signals = InboundSet::EMPTY;
        for signal in signals.iter() {
            match signal {
                // The power fail card keeps its state through preset.
                InboundSignal::Pon | InboundSignal::Popio => (),
                InboundSignal::Ioi => input = u16::from(self.cir),
                other => card_signals.insert(other),
            }
        }
        let skip = self
            .power_fail
            .apply(card_signals)
            .contains(OutboundSignal::Skf);
        (with_skip(self.power_fail_outbound(), skip), input)
    }
}
