//! The shift/rotate and alter/skip groups.
//!
//! Both groups are combinations of micro-operations performed in a
//! fixed order on one accumulator and the E register.
use base::prelude::*;

use super::{Completion, OpcodeResult};
use crate::machine::Machine;
use crate::registers::add_with_flags;

/// Perform one shift or rotate on `value`, returning the new value
/// and the new E.
pub(crate) fn shift_word(op: ShiftOp, value: u16, e: bool) -> (u16, bool) {
    match op {
        ShiftOp::Als => ((value & SIGN_BIT) | ((value << 1) & !SIGN_BIT), e),
        ShiftOp::Ars => ((value >> 1) | (value & SIGN_BIT), e),
        ShiftOp::Ral => (value.rotate_left(1), e),
        ShiftOp::Rar => (value.rotate_right(1), e),
        ShiftOp::Alr => ((value << 1) & !SIGN_BIT, e),
        ShiftOp::Era => {
            let carry_in = if e { SIGN_BIT } else { 0 };
            ((value >> 1) | carry_in, value & 1 != 0)
        }
        ShiftOp::Ela => ((value << 1) | u16::from(e), value & SIGN_BIT != 0),
        ShiftOp::Alf => (value.rotate_left(4), e),
    }
}

fn alter(alteration: Alteration, value: u16) -> u16 {
    match alteration {
        Alteration::Clear => 0,
        Alteration::Complement => !value,
        Alteration::Set => 0o177_777,
    }
}

impl Machine {
    pub(crate) fn op_shift_rotate(&mut self, srg: ShiftRotate) -> OpcodeResult {
        let mut value = self.regs.accumulator(srg.reg);
        let mut e = self.regs.e;
        if let Some(op) = srg.first {
            (value, e) = shift_word(op, value, e);
        }
        if srg.clear_e {
            e = false;
        }
        let skip = srg.skip_if_lsb_clear && value & 1 == 0;
        if let Some(op) = srg.second {
            (value, e) = shift_word(op, value, e);
        }
        self.regs.set_accumulator(srg.reg, value);
        self.regs.e = e;
        if skip {
            self.skip();
        }
        Ok(Completion::Normal)
    }

    pub(crate) fn op_alter_skip(&mut self, asg: AlterSkip) -> OpcodeResult {
        let mut value = self.regs.accumulator(asg.reg);
        if let Some(alteration) = asg.alter_register {
            value = alter(alteration, value);
        }
        if let Some(alteration) = asg.alter_extend {
            self.regs.e = alter(alteration, u16::from(self.regs.e)) & 1 != 0;
        }

        // Each test present yields its condition; the skip happens if
        // any condition holds, or with RSS, if none does.
        let mut tests: Vec<bool> = Vec::with_capacity(4);
        if asg.skip_if_e_clear {
            tests.push(!self.regs.e);
        }
        if asg.skip_if_positive {
            tests.push(value & SIGN_BIT == 0);
        }
        if asg.skip_if_lsb_clear {
            tests.push(value & 1 == 0);
        }
        if asg.increment {
            let (sum, carry, overflow) = add_with_flags(value, 1);
            value = sum;
            self.regs.e |= carry;
            self.regs.o |= overflow;
        }
        if asg.skip_if_zero {
            tests.push(value == 0);
        }
        self.regs.set_accumulator(asg.reg, value);

        let skip = if asg.reverse_skip {
            tests.iter().all(|condition| !condition)
        } else {
            tests.iter().any(|condition| *condition)
        };
        if skip {
            self.skip();
        }
        Ok(Completion::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts() {
        assert_eq!(shift_word(ShiftOp::Als, 0o140_001, false), (0o100_002, false));
        assert_eq!(shift_word(ShiftOp::Ars, 0o100_002, false), (0o140_001, false));
        assert_eq!(shift_word(ShiftOp::Ral, 0o100_001, false), (0o000_003, false));
        assert_eq!(shift_word(ShiftOp::Rar, 0o000_003, true), (0o100_001, true));
        assert_eq!(shift_word(ShiftOp::Alr, 0o140_001, false), (0o000_002, false));
        assert_eq!(shift_word(ShiftOp::Era, 0o000_001, false), (0, true));
        assert_eq!(shift_word(ShiftOp::Era, 0, true), (0o100_000, false));
        assert_eq!(shift_word(ShiftOp::Ela, 0o100_000, false), (0, true));
        assert_eq!(shift_word(ShiftOp::Ela, 0, true), (1, false));
        assert_eq!(shift_word(ShiftOp::Alf, 0o170_000, false), (0o000_017, false));
    }
}
