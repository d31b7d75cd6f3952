//! Backplane signals.
//!
//! The processor (and the DMA channels) talk to an interface card by
//! asserting a set of inbound signals at it.  The card answers with a
//! set of outbound signals describing its state.  Inbound signals are
//! always delivered in the canonical order given by
//! [`InboundSignal::ALL`], whatever order they were added to the set.
use std::fmt::{self, Debug, Display, Formatter};

/// Signals from the processor or DMA to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InboundSignal {
    /// Power on.
    Pon,
    /// Power-on preset to I/O (also sent by the console PRESET).
    Popio,
    /// Control reset (CLC 0).
    Crs,
    /// Enable flag (the T5 timing signal which lets a card set its
    /// flag from its flag buffer).
    Enf,
    /// I/O data input (LIA, MIA, DMA input).
    Ioi,
    /// I/O data output (OTA, DMA output).
    Ioo,
    /// Skip if flag set.
    Sfs,
    /// Skip if flag clear.
    Sfc,
    /// Interrupt acknowledge.
    Iak,
    Clf,
    Stf,
    Stc,
    Clc,
    /// End of DMA transfer.
    Edt,
    /// Set interrupt request; sent after every other signal so that
    /// the card can recompute its outbound signals.
    Sir,
}

impl InboundSignal {
    /// All inbound signals, in delivery order.
    pub const ALL: [InboundSignal; 15] = [
        InboundSignal::Pon,
        InboundSignal::Popio,
        InboundSignal::Crs,
        InboundSignal::Enf,
        InboundSignal::Ioi,
        InboundSignal::Ioo,
        InboundSignal::Sfs,
        InboundSignal::Sfc,
        InboundSignal::Iak,
        InboundSignal::Clf,
        InboundSignal::Stf,
        InboundSignal::Stc,
        InboundSignal::Clc,
        InboundSignal::Edt,
        InboundSignal::Sir,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(&self) -> &'static str {
        use InboundSignal::*;
        match self {
            Pon => "PON",
            Popio => "POPIO",
            Crs => "CRS",
            Enf => "ENF",
            Ioi => "IOI",
            Ioo => "IOO",
            Sfs => "SFS",
            Sfc => "SFC",
            Iak => "IAK",
            Clf => "CLF",
            Stf => "STF",
            Stc => "STC",
            Clc => "CLC",
            Edt => "EDT",
            Sir => "SIR",
        }
    }
}

impl Display for InboundSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.name())
    }
}

/// A set of inbound signals.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InboundSet(u16);

impl InboundSet {
    pub const EMPTY: InboundSet = InboundSet(0);

    pub const fn with(self, signal: InboundSignal) -> InboundSet {
        InboundSet(self.0 | signal.bit())
    }

    pub fn insert(&mut self, signal: InboundSignal) {
        self.0 |= signal.bit();
    }

    pub const fn contains(&self, signal: InboundSignal) -> bool {
        self.0 & signal.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The signals in the set, in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = InboundSignal> + '_ {
        InboundSignal::ALL
            .into_iter()
            .filter(move |sig| self.contains(*sig))
    }
}

impl From<InboundSignal> for InboundSet {
    fn from(signal: InboundSignal) -> InboundSet {
        InboundSet::EMPTY.with(signal)
    }
}

impl FromIterator<InboundSignal> for InboundSet {
    fn from_iter<I: IntoIterator<Item = InboundSignal>>(iter: I) -> InboundSet {
        iter.into_iter().fold(InboundSet::EMPTY, InboundSet::with)
    }
}

impl Debug for InboundSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Display for InboundSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let names: Vec<&str> = self.iter().map(|s| s.name()).collect();
        write!(f, "{{{}}}", names.join(" "))
    }
}

/// Signals from an interface back to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundSignal {
    /// Interrupt request.
    Irq,
    /// Priority low: passes interrupt priority on to the next higher
    /// select code.  A card requesting an interrupt must deny PRL.
    Prl,
    /// Service request (DMA).
    Srq,
    /// Skip on flag.
    Skf,
}

impl OutboundSignal {
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutboundSet(u8);

impl OutboundSet {
    pub const EMPTY: OutboundSet = OutboundSet(0);

    pub const fn with(self, signal: OutboundSignal) -> OutboundSet {
        OutboundSet(self.0 | signal.bit())
    }

    pub fn insert(&mut self, signal: OutboundSignal) {
        self.0 |= signal.bit();
    }

    pub fn remove(&mut self, signal: OutboundSignal) {
        self.0 &= !signal.bit();
    }

    pub const fn contains(&self, signal: OutboundSignal) -> bool {
        self.0 & signal.bit() != 0
    }

    /// Add `signal` when `condition` holds.
    pub fn set_if(&mut self, signal: OutboundSignal, condition: bool) {
        if condition {
            self.insert(signal);
        }
    }
}

impl FromIterator<OutboundSignal> for OutboundSet {
    fn from_iter<I: IntoIterator<Item = OutboundSignal>>(iter: I) -> OutboundSet {
        iter.into_iter().fold(OutboundSet::EMPTY, OutboundSet::with)
    }
}

impl Debug for OutboundSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let present = [
            OutboundSignal::Irq,
            OutboundSignal::Prl,
            OutboundSignal::Srq,
            OutboundSignal::Skf,
        ]
        .into_iter()
        .filter(|sig| self.contains(*sig));
        f.debug_set().entries(present).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_order_is_canonical() {
        let set: InboundSet = [InboundSignal::Sir, InboundSignal::Clf, InboundSignal::Ioi]
            .into_iter()
            .collect();
        let order: Vec<InboundSignal> = set.iter().collect();
        assert_eq!(
            order,
            vec![InboundSignal::Ioi, InboundSignal::Clf, InboundSignal::Sir]
        );
        assert_eq!(set.to_string(), "{IOI CLF SIR}");
    }

    #[test]
    fn outbound_set_membership() {
        let mut out = OutboundSet::EMPTY.with(OutboundSignal::Prl);
        out.set_if(OutboundSignal::Skf, false);
        out.set_if(OutboundSignal::Irq, true);
        assert!(out.contains(OutboundSignal::Irq));
        assert!(out.contains(OutboundSignal::Prl));
        assert!(!out.contains(OutboundSignal::Skf));
        out.remove(OutboundSignal::Prl);
        assert!(!out.contains(OutboundSignal::Prl));
    }
}
