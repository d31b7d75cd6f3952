//! This module manages the context in which a device is asked to
//! perform a single operation.
use core::time::Duration;

use base::prelude::SelectCode;

/// Passed to every [`crate::Device`] call.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    /// The simulated time at which the operation happens.
    pub simulated_time: Duration,
    /// The select code the device is attached at.
    pub sc: SelectCode,
}

impl Context {
    #[must_use]
    pub fn new(simulated_time: Duration, sc: SelectCode) -> Context {
        Context { simulated_time, sc }
    }
}
