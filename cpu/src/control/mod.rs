//! The instruction execution engine.
//!
//! Each step of the engine:
//!
//! 1. performs any timed device events which are due,
//! 2. gives DMA the cycles it has requested,
//! 3. takes an interrupt if one is granted and not deferred, or else
//!    fetches the instruction at P,
//! 4. executes the instruction.
//!
//! An instruction handler can finish in one of four ways.  Normally
//! it completes.  It can be aborted by a memory protect or mapping
//! violation ([`Abort`]), in which case it is abandoned with whatever
//! side effects it has already had.  It can be backed out because an
//! interrupt arrived during a long indirect chain, in which case P is
//! restored and the instruction is retried after the interrupt.  Or
//! it can raise a simulation stop, which ends the run.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use tracing::{event, span, Level};

use base::prelude::*;

use crate::clock::Clock;
use crate::dma::DmaChannelId;
use crate::io::InboundSignal;
use crate::machine::Machine;
use crate::stop::{Stop, StopDetails, StopKind, StopMaskability};

mod access;
mod op_dms;
mod op_eau;
mod op_eig;
mod op_io;
mod op_memref;
mod op_srg;
mod resolve;
pub(crate) mod timing;

#[cfg(test)]
mod tests;

pub(crate) use access::AccessClass;

/// Why an instruction was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortCause {
    /// A write or jump below the memory protect fence, or a write
    /// through the alternate map.
    Fence,
    /// A mapping unit read, write or base page violation.
    Mapping,
    /// A privileged mapping instruction.
    Privileged,
    /// A halt or I/O instruction.
    Io,
}

/// An instruction was aborted by memory protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Abort {
    /// The logical address whose access was refused.
    pub address: LogicalAddress,
    pub cause: AbortCause,
}

impl Display for Abort {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let what = match self.cause {
            AbortCause::Fence => "fence violation",
            AbortCause::Mapping => "mapping violation",
            AbortCause::Privileged => "privileged instruction",
            AbortCause::Io => "protected I/O instruction",
        };
        write!(f, "{what} at {}", self.address)
    }
}

/// The ways an instruction can fail to complete.
#[derive(Debug)]
pub(crate) enum Exception {
    Abort(Abort),
    /// An interrupt arrived during an indirect chain; back out the
    /// instruction and take the interrupt.
    InterruptPending,
    Stop(Stop),
}

impl From<Abort> for Exception {
    fn from(abort: Abort) -> Exception {
        Exception::Abort(abort)
    }
}

impl From<Stop> for Exception {
    fn from(stop: Stop) -> Exception {
        Exception::Stop(stop)
    }
}

/// How an instruction completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Normal,
    /// The instruction holds off interrupts until the next one has
    /// executed (JMP,I, JSB,I and the mapping jumps).
    Deferring,
    /// An I/O group instruction; these also hold off interrupts, and
    /// the interrupt and DMA requests must be recomputed.
    IoGroup,
}

pub(crate) type OpcodeResult = Result<Completion, Exception>;

impl Machine {
    /// Run until a stop occurs.
    pub fn run(&mut self) -> Stop {
        loop {
            if let Err(stop) = self.step_one() {
                return stop;
            }
        }
    }

    /// Execute up to `count` instructions.
    pub fn step(&mut self, count: u64) -> Result<(), Stop> {
        for _ in 0..count {
            self.step_one()?;
        }
        Ok(())
    }

    /// Record a stop condition, returning it as an error unless it
    /// is masked or bypassed.
    pub(crate) fn stop_check(&mut self, stop: Stop) -> Result<(), Stop> {
        if self.bypass_active && stop.kind().maskable() == StopMaskability::Maskable {
            event!(Level::DEBUG, "bypassing stop: {stop}");
            return Ok(());
        }
        self.stops.fire_if_not_masked(stop)
    }

    fn step_one(&mut self) -> Result<(), Stop> {
        self.bypass_active = std::mem::take(&mut self.bypass_requested);
        let result = self.step_inner();
        self.bypass_active = false;
        result
    }

    fn step_inner(&mut self) -> Result<(), Stop> {
        self.service_events()?;
        self.service_dma()?;

        self.err_p = self.regs.p;
        if self.intrq.is_some() && self.defer {
            self.defer = self.last_was_deferring;
        }
        let (result, word) = match self.intrq {
            Some(sc) if !self.defer => self.take_interrupt(sc),
            _ => self.fetch_and_execute(),
        };
        self.instructions_executed += 1;
        let cycles = timing::memory_cycles(word);
        self.clock
            .consume(&(self.config.model.memory_cycle() * cycles));

        match result {
            Ok(Completion::Normal) => {
                self.last_was_deferring = false;
                Ok(())
            }
            Ok(Completion::Deferring) => {
                self.defer = true;
                self.last_was_deferring = true;
                Ok(())
            }
            Ok(Completion::IoGroup) => {
                self.defer = true;
                self.last_was_deferring = true;
                self.poll_interrupts();
                Ok(())
            }
            Err(Exception::InterruptPending) => {
                event!(
                    Level::DEBUG,
                    "backing out instruction at {} to take an interrupt",
                    self.err_p
                );
                self.regs.p = self.err_p;
                self.last_was_deferring = false;
                Ok(())
            }
            Err(Exception::Abort(abort)) => {
                self.handle_abort(abort);
                Ok(())
            }
            Err(Exception::Stop(stop)) => {
                if stop.kind() != StopKind::Halt {
                    self.regs.p = self.err_p;
                }
                let stop = stop.with_diagnostics(self.current);
                event!(Level::INFO, "stop: {stop}");
                Err(stop)
            }
        }
    }

    /// Perform the device events which are due.
    fn service_events(&mut self) -> Result<(), Stop> {
        let now = self.clock.now();
        let mut serviced = false;
        while let Some((sc, outcome)) = self.devices.service_next_due(now) {
            if let Err(failure) = outcome {
                return Err(self.stops.always_fire(Stop::new(StopDetails::EventService {
                    sc,
                    message: failure.message,
                })));
            }
            // Let the card report its new state.
            if let Some(result) = self.devices.signal(now, sc, InboundSignal::Sir.into(), 0) {
                self.backplane.update(sc, result.outbound);
            }
            serviced = true;
        }
        if serviced {
            self.poll_interrupts();
        }
        Ok(())
    }

    /// Give the DMA channels the cycles they are asking for.  Channel
    /// 1 has priority; both channels may take a cycle in each pass.
    fn service_dma(&mut self) -> Result<(), Stop> {
        if !self.config.options.dma {
            return Ok(());
        }
        loop {
            let mut any = false;
            for id in DmaChannelId::ALL {
                let channel = &self.dma[id.index()];
                if channel.wants_cycle(self.backplane.service_requested(channel.device())) {
                    self.dma_cycle(id)?;
                    any = true;
                }
            }
            if !any {
                return Ok(());
            }
            self.poll_interrupts();
        }
    }

    fn dma_cycle(&mut self, id: DmaChannelId) -> Result<(), Stop> {
        let cycle = self.dma[id.index()].plan_cycle();
        let span = span!(Level::TRACE, "dma", channel=?id, sc=%cycle.sc);
        let _enter = span.enter();
        let memory_word = if cycle.reads_memory {
            self.dma_read(id, cycle.address)
        } else {
            0
        };
        let data = self.dma[id.index()].output_data(&cycle, memory_word);
        let response = self.io_dispatch(cycle.sc, cycle.signals, data)?;
        if let Some(message) = response.error {
            self.stop_check(Stop::new(StopDetails::IoError {
                sc: cycle.sc,
                message,
            }))?;
            event!(
                Level::WARN,
                "ignoring I/O error on select code {} because the stop is disabled",
                cycle.sc
            );
        }
        let completion = self.dma[id.index()].complete_cycle(&cycle, memory_word, response.data);
        if let Some((addr, word)) = completion.write {
            self.dma_write(id, addr, word);
        }
        if completion.finished {
            self.backplane
                .update(id.select_code(), self.dma[id.index()].outbound());
        }
        self.clock.consume(&self.config.model.memory_cycle());
        Ok(())
    }

    /// Enter an interrupt: acknowledge it and execute the
    /// instruction in the trap cell, leaving P unchanged.
    fn take_interrupt(&mut self, sc: SelectCode) -> (OpcodeResult, u16) {
        event!(Level::DEBUG, "interrupt from select code {sc} at P={}", self.regs.p);
        self.cir = sc;
        if self.config.options.dms {
            self.mmu.enter_interrupt();
        }
        // IAK turns memory protect off.
        self.disable_protect();
        self.defer = true;
        let trap_cell = LogicalAddress::from_word(u16::from(sc));
        let word = match self.read(AccessClass::SysData, trap_cell) {
            Ok(word) => word,
            Err(abort) => return (Err(abort.into()), 0),
        };
        if let Err(stop) = self.io_dispatch(sc, InboundSignal::Iak.into(), 0) {
            return (Err(stop.into()), word);
        }
        self.poll_interrupts();
        self.current.location = self.regs.p;
        self.current.instruction = word;
        (self.execute(word, trap_cell), word)
    }

    fn fetch_and_execute(&mut self) -> (OpcodeResult, u16) {
        let location = self.regs.p;
        if !self.bypass_active && self.breakpoints.contains(&location) {
            let stop = Stop::new(StopDetails::Breakpoint { address: location });
            if let Err(stop) = self.stop_check(stop) {
                return (Err(stop.into()), 0);
            }
        }
        let word = match self.read(AccessClass::Fetch, location) {
            Ok(word) => word,
            Err(abort) => return (Err(abort.into()), 0),
        };
        self.regs.p = location.successor();
        self.defer = false;
        self.current.location = location;
        self.current.instruction = word;
        (self.execute(word, location), word)
    }

    /// Execute `word`, which was fetched from `location`.
    pub(crate) fn execute(&mut self, word: u16, location: LogicalAddress) -> OpcodeResult {
        let span = span!(Level::INFO, "xop", p=%location);
        let _enter = span.enter();
        let instruction = Instruction::decode(word);
        event!(Level::TRACE, "executing {word:06o}: {instruction}");
        let options = self.config.options;
        match instruction {
            Instruction::MemoryReference(mr) => self.op_memory_reference(mr, location),
            Instruction::ShiftRotate(srg) => self.op_shift_rotate(srg),
            Instruction::AlterSkip(asg) => self.op_alter_skip(asg),
            Instruction::InputOutput(iog) => self.op_input_output(iog, word),
            Instruction::Eau(op) if options.eau => self.op_eau(op),
            Instruction::Eig(op) if options.eig => self.op_eig(op, word),
            Instruction::Dms(op) if options.dms => self.op_dms(op, word),
            Instruction::Eau(_)
            | Instruction::Eig(_)
            | Instruction::Dms(_)
            | Instruction::Unimplemented(_) => self.unimplemented(word),
            Instruction::Undefined(_) => {
                self.stop_check(Stop::new(StopDetails::Undefined { instruction: word }))?;
                Ok(Completion::Normal)
            }
        }
    }

    /// When the stop is masked, an unimplemented instruction is a
    /// no-op.
    pub(crate) fn unimplemented(&mut self, word: u16) -> OpcodeResult {
        self.stop_check(Stop::new(StopDetails::Unimplemented { instruction: word }))?;
        Ok(Completion::Normal)
    }

    /// Recover from an aborted instruction.  The instruction is
    /// abandoned; P stays where it was when the abort happened.
    fn handle_abort(&mut self, abort: Abort) {
        event!(
            Level::DEBUG,
            "instruction at {} aborted: {abort}",
            self.err_p
        );
        match abort.cause {
            // The violation register was latched when the mapping
            // violation was detected.
            AbortCause::Mapping | AbortCause::Privileged => (),
            AbortCause::Fence | AbortCause::Io => self.mp.latch_violation(self.err_p),
        }
        if self.ion {
            self.mp.request_interrupt();
            self.backplane
                .update(SelectCode::MEMORY_PROTECT, self.mp.outbound());
        }
        self.last_was_deferring = false;
        self.poll_interrupts();
    }
}
