//! Indirect address resolution.
use tracing::{event, Level};

use base::prelude::*;

use super::{AccessClass, Exception};
use crate::machine::Machine;
use crate::stop::{Stop, StopDetails};

/// The indirect level after which a pending interrupt is allowed to
/// break into the chain.
const INTERRUPTIBLE_LEVEL: u32 = 3;

impl Machine {
    /// Follow the chain of indirect address words starting with
    /// `address_word` (bit 15 set means indirect) and return the final
    /// direct address.
    ///
    /// When memory protect is installed, a chain which is still going
    /// at the fourth level while an interrupt is pending is abandoned
    /// with [`Exception::InterruptPending`], so that the instruction is
    /// retried after the interrupt has been serviced.
    pub(crate) fn resolve(&mut self, address_word: u16) -> Result<LogicalAddress, Exception> {
        let limit = self.config.indirect_limit;
        let interruptible = self.config.options.memory_protect;
        let mut word = address_word;
        let mut level: u32 = 0;
        loop {
            if word & SIGN_BIT == 0 {
                return Ok(LogicalAddress::from_word(word));
            }
            if interruptible && level >= INTERRUPTIBLE_LEVEL && self.intrq.is_some() && !self.defer
            {
                event!(
                    Level::DEBUG,
                    "abandoning indirect chain at level {level} for an interrupt"
                );
                return Err(Exception::InterruptPending);
            }
            let target = LogicalAddress::from_word(word);
            word = self.read(AccessClass::Data, target)?;
            level += 1;
            if interruptible && level == INTERRUPTIBLE_LEVEL && self.intrq.is_some() {
                self.defer = false;
            }
            if word & SIGN_BIT != 0 && level > limit {
                self.stop_check(Stop::new(StopDetails::IndirectLimit {
                    address: LogicalAddress::from_word(word),
                    limit,
                }))?;
                // With the stop disabled, the chain ends here.
                return Ok(LogicalAddress::from_word(word));
            }
        }
    }
}
