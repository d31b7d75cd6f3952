//! This crate simulates the HP 2100 and HP 1000 M/E/F-Series
//! processors: the instruction execution engine, the Dynamic Mapping
//! System, memory protect, the interrupt system, the I/O backplane and
//! dual-channel DMA.
//!
//! The whole machine is a [`Machine`], which is driven by
//! [`Machine::run`] or [`Machine::step`] until a [`Stop`] occurs.
#![crate_name = "cpu"]

mod clock;
mod config;
mod console;
mod context;
mod control;
mod diagnostics;
mod dma;
mod io;
mod machine;
mod memory;
mod mmu;
mod protect;
mod registers;
mod stop;
mod stopunit;

pub use clock::{BasicClock, Clock};
pub use config::{
    ConfigurationError, CpuConfiguration, CpuModel, CpuOptions, UnknownModelName,
    DEFAULT_INDIRECT_LIMIT, MAX_INDIRECT_LIMIT,
};
pub use console::{
    ConsoleError, ConsoleMap, LoaderError, LoaderImage, SwitchPresets, LOADER_WORDS,
};
pub use context::Context;
pub use diagnostics::CurrentInstructionDiagnostics;
pub use dma::{DmaChannel, DmaChannelId};
pub use io::{
    lowest_clear_bit, AttachError, Backplane, Device, InboundSet, InboundSignal, OutboundSet,
    OutboundSignal, ServiceFailure, SignalResult, StandardInterface,
};
pub use machine::Machine;
pub use memory::PhysicalMemory;
pub use mmu::{
    Mmu, ViolationCause, ViolationRecord, MAP_READ_PROTECT, MAP_WRITE_PROTECT,
};
pub use protect::MemoryProtect;
pub use registers::Registers;
pub use stop::{Stop, StopDetails, StopKind, StopMaskability, UnknownStopName};
pub use stopunit::{StopNotMaskable, StopStatus};
