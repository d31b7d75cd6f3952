/// Diagnostic information for log messages and stops.
use std::fmt::{Display, Formatter};

use base::prelude::{Instruction, LogicalAddress};

/// CurrentInstructionDiagnostics is only for generating debug
/// information.  It must not be used for control/execution purposes.
///
/// We sometimes clone this struct in cases where we are unlikely to
/// use the cloned value, so a clone needs to remain cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentInstructionDiagnostics {
    /// Where the instruction was fetched from (for an interrupt, the
    /// address of the interrupted instruction).
    pub location: LogicalAddress,
    pub instruction: u16,
}

impl Display for CurrentInstructionDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{} at {}",
            Instruction::decode(self.instruction),
            self.location
        )
    }
}
