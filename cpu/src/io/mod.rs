//! This module simulates the parts of the I/O system which sit
//! between the processor and the interface cards: the backplane
//! signal model, the table of attached devices and their timed
//! events.
//!
//! ## Select code assignments
//!
//! | Select code | Use                                             |
//! | ----------- | ----------------------------------------------- |
//! | 00          | Interrupt system (ION, IOF; CLC 0 resets I/O)   |
//! | 01          | Overflow flip-flop and switch register          |
//! | 02, 03      | DMA channel 1 and 2 control word registers      |
//! | 04          | Power fail interrupt; central interrupt register|
//! | 05          | Memory protect and mapping violations           |
//! | 06, 07      | DMA channel 1 and 2 control and completion      |
//! | 10-77       | I/O interface cards                             |
//!
//! Select codes 00 to 07 are simulated by the processor itself;
//! devices can only be attached at 10 and above.
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::time::Duration;

use tracing::{event, span, Level};

use base::prelude::*;

use crate::context::Context;

pub(crate) mod backplane;
mod eventq;
mod signals;

pub use backplane::{lowest_clear_bit, Backplane};
use eventq::EventQueue;
pub use signals::{InboundSet, InboundSignal, OutboundSet, OutboundSignal};

/// What an interface card returns when it has been sent a set of
/// signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalResult {
    /// The card's outbound signals after handling the inbound ones.
    pub outbound: OutboundSet,
    /// The value placed on the I/O data bus (meaningful for IOI).
    pub data: u16,
    /// Set when the device failed in a way the interface card has no
    /// means of reporting to the program.
    pub error: Option<String>,
    /// When set, the device wants its [`Device::service`] method
    /// called after this much simulated time has elapsed.
    pub activate_after: Option<Duration>,
}

impl SignalResult {
    pub fn new(outbound: OutboundSet, data: u16) -> SignalResult {
        SignalResult {
            outbound,
            data,
            error: None,
            activate_after: None,
        }
    }
}

/// A device could not perform a timed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub message: String,
}

impl Display for ServiceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(&self.message)
    }
}

impl Error for ServiceFailure {}

/// An I/O interface card and the device behind it.
pub trait Device {
    fn name(&self) -> String;

    /// Handle a set of inbound backplane signals.  `data` is the
    /// value on the I/O data bus, which is meaningful for IOO.
    fn interface(&mut self, ctx: &Context, signals: InboundSet, data: u16) -> SignalResult;

    /// Perform a timed event.  Returns the delay until the next
    /// event, if one is wanted.
    fn service(&mut self, ctx: &Context) -> Result<Option<Duration>, ServiceFailure>;
}

/// The control, flag and flag buffer flip-flops which nearly every
/// interface card has, and the standard equations for the outbound
/// signals they drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardInterface {
    pub control: bool,
    pub flag: bool,
    pub flag_buffer: bool,
}

impl StandardInterface {
    pub fn new() -> StandardInterface {
        StandardInterface::default()
    }

    /// The device end of the card sets the flag (through the flag
    /// buffer).
    pub fn set_flag(&mut self) {
        self.flag_buffer = true;
        self.flag = true;
    }

    /// Handle the signals which affect the flip-flops.  The caller
    /// handles data signals (IOI, IOO) and any card-specific
    /// behaviour.
    pub fn apply(&mut self, signals: InboundSet) -> OutboundSet {
        let mut skip = false;
        for signal in signals.iter() {
            match signal {
                InboundSignal::Pon | InboundSignal::Popio => {
                    self.flag_buffer = true;
                    self.flag = true;
                }
                InboundSignal::Crs | InboundSignal::Clc => {
                    self.control = false;
                }
                InboundSignal::Stc => {
                    self.control = true;
                }
                InboundSignal::Enf => {
                    if self.flag_buffer {
                        self.flag = true;
                    }
                }
                InboundSignal::Stf => {
                    self.flag_buffer = true;
                    self.flag = true;
                }
                InboundSignal::Clf => {
                    self.flag_buffer = false;
                    self.flag = false;
                }
                InboundSignal::Iak => {
                    self.flag_buffer = false;
                }
                InboundSignal::Sfs => {
                    skip |= self.flag;
                }
                InboundSignal::Sfc => {
                    skip |= !self.flag;
                }
                InboundSignal::Ioi
                | InboundSignal::Ioo
                | InboundSignal::Edt
                | InboundSignal::Sir => (),
            }
        }
        let mut outbound = self.outbound();
        outbound.set_if(OutboundSignal::Skf, skip);
        outbound
    }

    /// An interrupting card denies PRL; so does one whose interrupt
    /// is in service (flag still set).
    pub fn outbound(&self) -> OutboundSet {
        let mut outbound = OutboundSet::EMPTY;
        outbound.set_if(OutboundSignal::Prl, !(self.control && self.flag));
        outbound.set_if(
            OutboundSignal::Irq,
            self.control && self.flag && self.flag_buffer,
        );
        outbound
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    /// Select codes below 010 belong to the processor.
    Reserved(SelectCode),
    AlreadyAttached { sc: SelectCode, existing: String },
}

impl Display for AttachError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            AttachError::Reserved(sc) => write!(
                f,
                "select code {sc} is reserved for the processor; devices must use {} or above",
                SelectCode::FIRST_DEVICE
            ),
            AttachError::AlreadyAttached { sc, existing } => {
                write!(f, "select code {sc} is already occupied by {existing}")
            }
        }
    }
}

impl Error for AttachError {}

/// Manages a collection of devices.  Does not correspond to a
/// physical component; the backplane itself is [`Backplane`].
pub struct DeviceManager {
    devices: BTreeMap<SelectCode, Box<dyn Device>>,
    events: EventQueue,
}

impl Debug for DeviceManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let names: BTreeMap<SelectCode, String> = self
            .devices
            .iter()
            .map(|(sc, dev)| (*sc, dev.name()))
            .collect();
        f.debug_struct("DeviceManager")
            .field("devices", &names)
            .field("events", &self.events)
            .finish()
    }
}

impl Default for DeviceManager {
    fn default() -> DeviceManager {
        DeviceManager::new()
    }
}

impl DeviceManager {
    pub fn new() -> DeviceManager {
        DeviceManager {
            devices: BTreeMap::new(),
            events: EventQueue::new(),
        }
    }

    pub fn attach(&mut self, sc: SelectCode, device: Box<dyn Device>) -> Result<(), AttachError> {
        if sc.is_reserved() {
            return Err(AttachError::Reserved(sc));
        }
        if let Some(existing) = self.devices.get(&sc) {
            return Err(AttachError::AlreadyAttached {
                sc,
                existing: existing.name(),
            });
        }
        event!(Level::INFO, "attaching {} at select code {sc}", device.name());
        self.devices.insert(sc, device);
        Ok(())
    }

    pub fn detach(&mut self, sc: SelectCode) -> Option<Box<dyn Device>> {
        self.events.cancel(sc);
        self.devices.remove(&sc)
    }

    pub fn select_codes(&self) -> impl Iterator<Item = SelectCode> + '_ {
        self.devices.keys().copied()
    }

    pub fn name(&self, sc: SelectCode) -> Option<String> {
        self.devices.get(&sc).map(|dev| dev.name())
    }

    /// Send `signals` to the device at `sc`.  Returns `None` when no
    /// device is attached there.
    pub fn signal(
        &mut self,
        now: Duration,
        sc: SelectCode,
        signals: InboundSet,
        data: u16,
    ) -> Option<SignalResult> {
        let device = self.devices.get_mut(&sc)?;
        let ctx = Context::new(now, sc);
        let result = device.interface(&ctx, signals, data);
        event!(
            Level::TRACE,
            "{sc:?} {}: {signals} data={data:06o} -> {:?} data={:06o}",
            device.name(),
            result.outbound,
            result.data
        );
        if let Some(delay) = result.activate_after {
            self.events.push(sc, now.saturating_add(delay));
        }
        Some(result)
    }

    /// The time of the earliest pending event.
    pub fn next_event_due(&self) -> Option<Duration> {
        self.events.peek().map(|(_, due)| due)
    }

    /// Perform the earliest event which is due at or before `now`.
    /// Returns the select code of the device serviced and the outcome,
    /// or `None` when nothing is due.
    pub fn service_next_due(
        &mut self,
        now: Duration,
    ) -> Option<(SelectCode, Result<(), ServiceFailure>)> {
        loop {
            let (sc, due) = self.events.pop_due(now)?;
            let span = span!(Level::TRACE, "service", sc=%sc);
            let _enter = span.enter();
            let Some(device) = self.devices.get_mut(&sc) else {
                event!(
                    Level::ERROR,
                    "select code {sc} has a pending event but no device; ignoring it"
                );
                continue;
            };
            event!(Level::TRACE, "servicing event due at {due:?} (now {now:?})");
            let ctx = Context::new(now, sc);
            let outcome = match device.service(&ctx) {
                Ok(Some(delay)) => {
                    self.events.push(sc, now.saturating_add(delay));
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            return Some((sc, outcome));
        }
    }
}
