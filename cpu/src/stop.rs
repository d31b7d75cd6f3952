//! Simulation stops.
//!
//! A stop halts the simulation and returns control to whoever is
//! driving it (normally the console).  Stops are distinct from the
//! architectural faults (memory protect and mapping violations)
//! which the simulated machine handles itself.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use super::diagnostics::CurrentInstructionDiagnostics;

/// Describes whether a particular kind of stop can be disabled.
#[derive(Debug, PartialEq, Eq)]
pub enum StopMaskability {
    Maskable,
    Unmaskable,
}

/// The kinds of simulation stop.  The meanings of the values are
/// described in [`StopDetails`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum StopKind {
    Halt,
    Breakpoint,
    Unimplemented,
    Undefined,
    UnassignedSelectCode,
    IoError,
    IndirectLimit,
    EventService,
}

impl StopKind {
    #[must_use]
    pub fn maskable(&self) -> StopMaskability {
        match self {
            StopKind::Halt | StopKind::EventService => StopMaskability::Unmaskable,
            _ => StopMaskability::Maskable,
        }
    }

    /// A stable numeric code for the stop, for use by consoles and
    /// scripts.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            StopKind::Halt => 1,
            StopKind::Breakpoint => 2,
            StopKind::Unimplemented => 3,
            StopKind::Undefined => 4,
            StopKind::UnassignedSelectCode => 5,
            StopKind::IoError => 6,
            StopKind::IndirectLimit => 7,
            StopKind::EventService => 8,
        }
    }

    #[must_use]
    pub const fn all_stop_kinds() -> [StopKind; 8] {
        [
            StopKind::Halt,
            StopKind::Breakpoint,
            StopKind::Unimplemented,
            StopKind::Undefined,
            StopKind::UnassignedSelectCode,
            StopKind::IoError,
            StopKind::IndirectLimit,
            StopKind::EventService,
        ]
    }
}

impl Display for StopKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            StopKind::Halt => "HALT",
            StopKind::Breakpoint => "BREAK",
            StopKind::Unimplemented => "UNIMPL",
            StopKind::Undefined => "UNDEF",
            StopKind::UnassignedSelectCode => "UNSC",
            StopKind::IoError => "IOERR",
            StopKind::IndirectLimit => "INDIR",
            StopKind::EventService => "EVENT",
        })
    }
}

#[derive(Debug)]
pub struct UnknownStopName(String);

impl Display for UnknownStopName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown stop name '{}'", self.0)
    }
}

impl Error for UnknownStopName {}

impl TryFrom<&str> for StopKind {
    type Error = UnknownStopName;
    fn try_from(s: &str) -> Result<StopKind, UnknownStopName> {
        match s.to_ascii_uppercase().as_str() {
            "HALT" => Ok(StopKind::Halt),
            "BREAK" => Ok(StopKind::Breakpoint),
            "UNIMPL" => Ok(StopKind::Unimplemented),
            "UNDEF" => Ok(StopKind::Undefined),
            "UNSC" => Ok(StopKind::UnassignedSelectCode),
            "IOERR" => Ok(StopKind::IoError),
            "INDIR" => Ok(StopKind::IndirectLimit),
            "EVENT" => Ok(StopKind::EventService),
            _ => Err(UnknownStopName(s.to_owned())),
        }
    }
}

#[test]
fn test_stop_kind_round_trip() {
    for orig_kind in StopKind::all_stop_kinds() {
        let name = orig_kind.to_string();
        match StopKind::try_from(name.as_str()) {
            Ok(k) => {
                assert_eq!(k, orig_kind);
            }
            Err(_) => {
                panic!("unable to round-trip stop kind {orig_kind:?}");
            }
        }
    }
    assert!(StopKind::try_from("this is not a stop name").is_err());
}

#[test]
fn test_stop_codes_are_distinct() {
    let mut codes: Vec<u32> = StopKind::all_stop_kinds()
        .iter()
        .map(StopKind::code)
        .collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), StopKind::all_stop_kinds().len());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopDetails {
    /// A programmed halt.  `instruction` is the HLT instruction word,
    /// whose select code field is conventionally used as a halt code.
    Halt { instruction: u16 },

    /// Execution reached a breakpoint.
    Breakpoint { address: LogicalAddress },

    /// The instruction belongs to an option which is not installed or
    /// which the simulator does not provide.
    Unimplemented { instruction: u16 },

    /// The instruction is a reserved bit pattern.
    Undefined { instruction: u16 },

    /// An I/O instruction or DMA cycle addressed a select code which
    /// has no interface.
    UnassignedSelectCode { sc: SelectCode },

    /// A device reported an error which the simulated interface
    /// cannot report to the program.
    IoError { sc: SelectCode, message: String },

    /// An indirect address chain was longer than the configured
    /// limit.  `address` is the last address reached.
    IndirectLimit { address: LogicalAddress, limit: u32 },

    /// A device failed while servicing a timed event.
    EventService { sc: SelectCode, message: String },
}

impl StopDetails {
    #[must_use]
    pub fn kind(&self) -> StopKind {
        match self {
            StopDetails::Halt { .. } => StopKind::Halt,
            StopDetails::Breakpoint { .. } => StopKind::Breakpoint,
            StopDetails::Unimplemented { .. } => StopKind::Unimplemented,
            StopDetails::Undefined { .. } => StopKind::Undefined,
            StopDetails::UnassignedSelectCode { .. } => StopKind::UnassignedSelectCode,
            StopDetails::IoError { .. } => StopKind::IoError,
            StopDetails::IndirectLimit { .. } => StopKind::IndirectLimit,
            StopDetails::EventService { .. } => StopKind::EventService,
        }
    }
}

impl Display for StopDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use StopDetails::*;
        match self {
            Halt { instruction } => {
                write!(f, "programmed halt, T register {instruction:06o}")
            }
            Breakpoint { address } => write!(f, "breakpoint at {address}"),
            Unimplemented { instruction } => {
                write!(f, "unimplemented instruction {instruction:06o}")
            }
            Undefined { instruction } => {
                write!(f, "undefined instruction {instruction:06o}")
            }
            UnassignedSelectCode { sc } => {
                write!(f, "I/O to unassigned select code {sc}")
            }
            IoError { sc, message } => {
                write!(f, "unreported I/O error on select code {sc}: {message}")
            }
            IndirectLimit { address, limit } => write!(
                f,
                "indirect address chain exceeded {limit} levels at {address}"
            ),
            EventService { sc, message } => {
                write!(f, "event service failed for select code {sc}: {message}")
            }
        }
    }
}

/// Describes a stop which has happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub details: StopDetails,
    /// What the processor was doing, where that is known.
    pub diagnostics: Option<CurrentInstructionDiagnostics>,
}

impl Stop {
    #[must_use]
    pub fn new(details: StopDetails) -> Stop {
        Stop {
            details,
            diagnostics: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StopKind {
        self.details.kind()
    }

    /// Equivalent to `self.kind().code()`.
    #[must_use]
    pub fn code(&self) -> u32 {
        self.kind().code()
    }

    pub(crate) fn with_diagnostics(self, diagnostics: CurrentInstructionDiagnostics) -> Stop {
        Stop {
            diagnostics: self.diagnostics.or(Some(diagnostics)),
            ..self
        }
    }
}

impl From<StopDetails> for Stop {
    fn from(details: StopDetails) -> Stop {
        Stop::new(details)
    }
}

impl Display for Stop {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.kind(), self.details)?;
        if let Some(diags) = self.diagnostics.as_ref() {
            write!(f, " (during {diags})")?;
        }
        Ok(())
    }
}

impl Error for Stop {}

#[test]
fn test_stop_display() {
    let stop = Stop::new(StopDetails::UnassignedSelectCode { sc: sc!(0o23) })
        .with_diagnostics(CurrentInstructionDiagnostics {
            location: la!(0o100),
            instruction: 0o102_523,
        });
    assert_eq!(
        stop.to_string(),
        "UNSC: I/O to unassigned select code 23 (during LIA 23 at 000100)"
    );
}
