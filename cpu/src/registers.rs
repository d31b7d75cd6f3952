//! The processor register file.
use serde::Serialize;

use base::prelude::*;

/// The registers visible to the programmer (and the console).
///
/// The A and B accumulators also appear at logical addresses 0 and 1
/// for the processor's own memory accesses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registers {
    pub a: u16,
    pub b: u16,
    /// The program counter.
    pub p: LogicalAddress,
    /// The memory address latch; the last logical address accessed.
    pub m: LogicalAddress,
    /// The memory data latch; the last word read or written.
    pub t: u16,
    /// Index registers (extended instruction group only).
    pub x: u16,
    pub y: u16,
    /// Extend (carry out).
    pub e: bool,
    /// Overflow.
    pub o: bool,
    /// The front-panel switch register.
    pub s: u16,
}

impl Registers {
    pub fn accumulator(&self, reg: Accumulator) -> u16 {
        match reg {
            Accumulator::A => self.a,
            Accumulator::B => self.b,
        }
    }

    pub fn set_accumulator(&mut self, reg: Accumulator, value: u16) {
        match reg {
            Accumulator::A => self.a = value,
            Accumulator::B => self.b = value,
        }
    }

    pub fn index(&self, reg: IndexRegister) -> u16 {
        match reg {
            IndexRegister::X => self.x,
            IndexRegister::Y => self.y,
        }
    }

    pub fn set_index(&mut self, reg: IndexRegister, value: u16) {
        match reg {
            IndexRegister::X => self.x = value,
            IndexRegister::Y => self.y = value,
        }
    }

    /// The 32-bit value formed by B (upper half) and A (lower half),
    /// as used by the extended arithmetic unit.
    pub fn ba(&self) -> u32 {
        (u32::from(self.b) << 16) | u32::from(self.a)
    }

    pub fn set_ba(&mut self, value: u32) {
        self.b = (value >> 16) as u16;
        self.a = value as u16;
    }
}

/// Adds two words the way the adder does, returning the sum, the
/// carry out of bit 15 and whether signed overflow occurred.
pub fn add_with_flags(x: u16, y: u16) -> (u16, bool, bool) {
    let (sum, carry) = x.overflowing_add(y);
    let overflow = (x ^ sum) & (y ^ sum) & SIGN_BIT != 0;
    (sum, carry, overflow)
}

#[test]
fn test_add_with_flags() {
    assert_eq!(add_with_flags(1, 2), (3, false, false));
    assert_eq!(add_with_flags(0o077_777, 1), (0o100_000, false, true));
    assert_eq!(add_with_flags(0o177_777, 1), (0, true, false));
    assert_eq!(add_with_flags(0o100_000, 0o100_000), (0, true, true));
}

#[test]
fn test_double_register() {
    let mut regs = Registers::default();
    regs.set_ba(0x1234_5678);
    assert_eq!(regs.b, 0x1234);
    assert_eq!(regs.a, 0x5678);
    assert_eq!(regs.ba(), 0x1234_5678);
}
