//! Most simulation stops can be disabled from the console; whether
//! or not this is happening is controlled by the StopUnit.
//!
//! When a stop is disabled, the condition which would have caused
//! it is handled as harmlessly as the hardware would have handled
//! it (an unimplemented instruction executes as a no-op, an
//! unassigned select code reads as zero, and so on).
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{event, Level};

use super::stop::{Stop, StopKind, StopMaskability};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StopStatus {
    pub name: String,
    pub code: u32,
    pub maskable: bool,
    pub enabled: bool,
    /// The number of times the condition has occurred since the
    /// last reset, whether or not it stopped the simulation.
    pub occurrences: u64,
    pub last_message: String,
}

/// Attempted to disable a stop which cannot be disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopNotMaskable(pub StopKind);

impl std::fmt::Display for StopNotMaskable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "the {} stop cannot be disabled", self.0)
    }
}

impl std::error::Error for StopNotMaskable {}

#[derive(Debug, Default)]
pub struct StopUnit {
    disabled: BTreeSet<StopKind>,
    occurrences: BTreeMap<StopKind, (u64, Stop)>,
}

impl StopUnit {
    pub fn new() -> StopUnit {
        StopUnit::default()
    }

    pub fn disable(&mut self, kind: StopKind) -> Result<(), StopNotMaskable> {
        match kind.maskable() {
            StopMaskability::Unmaskable => Err(StopNotMaskable(kind)),
            StopMaskability::Maskable => {
                event!(Level::DEBUG, "disabling stop {kind}");
                self.disabled.insert(kind);
                Ok(())
            }
        }
    }

    pub fn enable(&mut self, kind: StopKind) {
        if self.disabled.remove(&kind) {
            event!(Level::DEBUG, "enabling stop {kind}");
        }
    }

    pub fn is_enabled(&self, kind: StopKind) -> bool {
        match kind.maskable() {
            StopMaskability::Unmaskable => true,
            StopMaskability::Maskable => !self.disabled.contains(&kind),
        }
    }

    /// Record that the stop condition occurred, and return it as an
    /// error if it is enabled.  When it is not enabled the caller
    /// carries on with whatever the hardware would have done.
    pub fn fire_if_not_masked(&mut self, stop: Stop) -> Result<(), Stop> {
        let kind = stop.kind();
        let enabled = self.is_enabled(kind);
        let count = self
            .occurrences
            .get(&kind)
            .map(|(n, _)| *n)
            .unwrap_or(0);
        self.occurrences.insert(kind, (count + 1, stop.clone()));
        if enabled {
            Err(stop)
        } else {
            event!(Level::DEBUG, "ignoring disabled stop: {stop}");
            Ok(())
        }
    }

    /// Unconditionally stop.  Used for the conditions which cannot
    /// be disabled.
    pub fn always_fire(&mut self, stop: Stop) -> Stop {
        match self.fire_if_not_masked(stop) {
            Err(stop) => stop,
            Ok(()) => unreachable!("unmaskable stops are never disabled"),
        }
    }

    pub fn clear_occurrences(&mut self) {
        self.occurrences.clear();
    }

    fn status_for_stop_kind(&self, kind: StopKind) -> StopStatus {
        let (occurrences, last_message) = match self.occurrences.get(&kind) {
            Some((n, stop)) => (*n, stop.to_string()),
            None => (0, String::new()),
        };
        StopStatus {
            name: kind.to_string(),
            code: kind.code(),
            maskable: matches!(kind.maskable(), StopMaskability::Maskable),
            enabled: self.is_enabled(kind),
            occurrences,
            last_message,
        }
    }

    pub fn get_stop_statuses(&self) -> Vec<StopStatus> {
        StopKind::all_stop_kinds()
            .into_iter()
            .map(|kind| self.status_for_stop_kind(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::StopDetails;
    use base::prelude::*;

    #[test]
    fn unmaskable_stops_are_not_maskable() {
        let mut unit = StopUnit::new();
        assert_eq!(
            unit.disable(StopKind::Halt),
            Err(StopNotMaskable(StopKind::Halt))
        );
        assert!(unit.is_enabled(StopKind::Halt));
        let stop = Stop::new(StopDetails::Halt {
            instruction: 0o102_077,
        });
        assert_eq!(unit.fire_if_not_masked(stop.clone()), Err(stop));
    }

    #[test]
    fn maskable_stops_are_enabled_by_default() {
        let mut unit = StopUnit::new();
        let stop = Stop::new(StopDetails::UnassignedSelectCode { sc: sc!(0o20) });
        assert!(unit.fire_if_not_masked(stop).is_err());
    }

    #[test]
    fn disabled_stops_are_counted_but_do_not_fire() {
        let mut unit = StopUnit::new();
        unit.disable(StopKind::Undefined)
            .expect("UNDEF should be maskable");
        for _ in 0..3 {
            assert_eq!(
                unit.fire_if_not_masked(Stop::new(StopDetails::Undefined {
                    instruction: 0o100_000
                })),
                Ok(())
            );
        }
        let status = unit
            .get_stop_statuses()
            .into_iter()
            .find(|s| s.name == "UNDEF")
            .expect("every stop kind has a status");
        assert_eq!(status.occurrences, 3);
        assert!(!status.enabled);
        assert!(status.last_message.contains("100000"));

        unit.enable(StopKind::Undefined);
        assert!(unit.is_enabled(StopKind::Undefined));
    }
}
