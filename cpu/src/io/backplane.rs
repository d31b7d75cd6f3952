//! The interrupt priority chain and the service request lines.
//!
//! Each of the 64 select codes has three lines: priority low (PRL),
//! interrupt request (IRQ) and service request (SRQ).  PRL is a
//! daisy chain running from select code 0 upward; a card which
//! wants (or is servicing) an interrupt breaks the chain by denying
//! PRL, which holds off every higher select code.
//!
//! We keep each line as a pair of 32-bit vectors, one for select
//! codes 0 to 37 and one for 40 to 77.
use tracing::{event, Level};

use base::prelude::*;

use super::signals::{OutboundSet, OutboundSignal};

/// Returns a word with only the lowest clear bit of `x` set (or zero
/// if every bit of `x` is set).
///
/// Applied to the PRL vector, this yields the first card in the
/// priority chain which is denying priority to the cards above it.
#[inline]
pub const fn lowest_clear_bit(x: u32) -> u32 {
    !x & x.wrapping_add(1)
}

fn half_and_bit(sc: SelectCode) -> (usize, u32) {
    let n = u8::from(sc);
    (usize::from(n / 32), 1 << (n % 32))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backplane {
    prl: [u32; 2],
    irq: [u32; 2],
    srq: [u32; 2],
}

impl Default for Backplane {
    fn default() -> Backplane {
        Backplane::new()
    }
}

impl Backplane {
    /// With no cards asserting anything, priority passes all the way
    /// up the chain.
    pub fn new() -> Backplane {
        Backplane {
            prl: [u32::MAX; 2],
            irq: [0; 2],
            srq: [0; 2],
        }
    }

    /// Record the outbound signals most recently returned by the card
    /// at `sc`.
    pub fn update(&mut self, sc: SelectCode, outbound: OutboundSet) {
        let (half, bit) = half_and_bit(sc);
        for (vector, signal) in [
            (&mut self.prl, OutboundSignal::Prl),
            (&mut self.irq, OutboundSignal::Irq),
            (&mut self.srq, OutboundSignal::Srq),
        ] {
            if outbound.contains(signal) {
                vector[half] |= bit;
            } else {
                vector[half] &= !bit;
            }
        }
    }

    pub fn service_requested(&self, sc: SelectCode) -> bool {
        let (half, bit) = half_and_bit(sc);
        self.srq[half] & bit != 0
    }

    pub fn interrupt_requested(&self, sc: SelectCode) -> bool {
        let (half, bit) = half_and_bit(sc);
        self.irq[half] & bit != 0
    }

    pub fn priority_passed(&self, sc: SelectCode) -> bool {
        let (half, bit) = half_and_bit(sc);
        self.prl[half] & bit != 0
    }

    /// Work out which select code, if any, is granted an interrupt.
    ///
    /// When the interrupt system is off only power fail (04) and
    /// memory protect (05) may interrupt.  The upper half of the
    /// chain is only considered when priority passes through the
    /// whole of the lower half.
    pub fn resolve(&self, interrupts_enabled: bool) -> Option<SelectCode> {
        let mut irq = self.irq;
        if !interrupts_enabled {
            irq[0] &= half_and_bit(SelectCode::POWER_FAIL).1 | half_and_bit(SelectCode::MEMORY_PROTECT).1;
            irq[1] = 0;
        }
        for half in 0..2 {
            let mask = lowest_clear_bit(self.prl[half]);
            if mask == 0 {
                // Priority passes through this half.
                continue;
            }
            let granted = mask & irq[half];
            if granted == 0 {
                return None;
            }
            let n = (half as u32) * 32 + granted.trailing_zeros();
            let sc = SelectCode::try_from(n as u8).ok();
            event!(Level::TRACE, "interrupt granted to {sc:?}");
            return sc;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    fn requesting() -> OutboundSet {
        OutboundSet::EMPTY.with(OutboundSignal::Irq)
    }

    fn quiet() -> OutboundSet {
        OutboundSet::EMPTY.with(OutboundSignal::Prl)
    }

    #[test]
    fn lowest_clear_bit_examples() {
        assert_eq!(lowest_clear_bit(0), 1);
        assert_eq!(lowest_clear_bit(0b1011), 0b0100);
        assert_eq!(lowest_clear_bit(u32::MAX), 0);
    }

    #[test]
    fn lowest_requesting_card_wins() {
        let mut bp = Backplane::new();
        bp.update(sc!(0o23), requesting());
        bp.update(sc!(0o12), requesting());
        assert_eq!(bp.resolve(true), Some(sc!(0o12)));
        bp.update(sc!(0o12), quiet());
        assert_eq!(bp.resolve(true), Some(sc!(0o23)));
    }

    #[test]
    fn card_being_serviced_holds_off_higher_codes() {
        let mut bp = Backplane::new();
        // Interrupt in service at 12: PRL denied, no request.
        bp.update(sc!(0o12), OutboundSet::EMPTY);
        bp.update(sc!(0o23), requesting());
        assert_eq!(bp.resolve(true), None);
        // Select codes above 37 are also held off.
        bp.update(sc!(0o23), quiet());
        bp.update(sc!(0o45), requesting());
        assert_eq!(bp.resolve(true), None);
        bp.update(sc!(0o12), quiet());
        assert_eq!(bp.resolve(true), Some(sc!(0o45)));
    }

    #[test]
    fn interrupt_system_off_allows_power_fail_and_protect() {
        let mut bp = Backplane::new();
        bp.update(sc!(0o12), requesting());
        assert_eq!(bp.resolve(false), None);
        bp.update(SelectCode::MEMORY_PROTECT, requesting());
        assert_eq!(bp.resolve(false), Some(SelectCode::MEMORY_PROTECT));
    }

    #[test]
    fn service_requests() {
        let mut bp = Backplane::new();
        assert!(!bp.service_requested(sc!(0o20)));
        bp.update(sc!(0o20), quiet().with(OutboundSignal::Srq));
        assert!(bp.service_requested(sc!(0o20)));
        assert!(bp.priority_passed(sc!(0o20)));
        assert!(!bp.interrupt_requested(sc!(0o20)));
    }

    /// Resolve by walking the chain one select code at a time.
    fn reference_resolve(prl: u64, irq: u64) -> Option<u8> {
        let lower_prl = prl & 0xFFFF_FFFF;
        let halves: [(u64, u64, u8); 2] = [
            (lower_prl, irq & 0xFFFF_FFFF, 0),
            (prl >> 32, irq >> 32, 32),
        ];
        for (prl_half, irq_half, base) in halves {
            for bit in 0..32u8 {
                if prl_half & (1 << bit) == 0 {
                    return (irq_half & (1 << bit) != 0).then_some(base + bit);
                }
            }
        }
        None
    }

    #[proptest]
    fn priority_resolution_matches_chain_walk(prl: u64, irq: u64) {
        let mut bp = Backplane::new();
        for sc in SelectCode::all() {
            let n = u8::from(sc);
            let mut out = OutboundSet::EMPTY;
            out.set_if(OutboundSignal::Prl, prl & (1 << n) != 0);
            out.set_if(OutboundSignal::Irq, irq & (1 << n) != 0);
            bp.update(sc, out);
        }
        assert_eq!(
            bp.resolve(true).map(u8::from),
            reference_resolve(prl, irq)
        );
    }
}
