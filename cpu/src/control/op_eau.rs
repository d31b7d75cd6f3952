//! The extended arithmetic unit: MPY, DIV, DLD, DST and the
//! double-length shifts and rotates.
//!
//! The double-length operations treat B as the upper and A as the
//! lower half of a 32-bit value.
use base::prelude::*;

use super::{AccessClass, Completion, OpcodeResult};
use crate::machine::Machine;

/// Perform a double-length shift.  Returns the new value and, for
/// ASL, whether a bit differing from the sign was shifted out.
pub(crate) fn double_shift(op: EauShift, value: u32, count: u32) -> (u32, bool) {
    const SIGN: u32 = 0x8000_0000;
    match op {
        EauShift::Asl => {
            let sign = value & SIGN;
            let mut magnitude = value;
            let mut overflow = false;
            for _ in 0..count {
                magnitude <<= 1;
                if magnitude & SIGN != sign {
                    overflow = true;
                }
            }
            ((magnitude & !SIGN) | sign, overflow)
        }
        EauShift::Asr => (((value as i32) >> count.min(31)) as u32, false),
        EauShift::Lsl => (value.checked_shl(count).unwrap_or(0), false),
        EauShift::Lsr => (value.checked_shr(count).unwrap_or(0), false),
        EauShift::Rrl => (value.rotate_left(count), false),
        EauShift::Rrr => (value.rotate_right(count), false),
    }
}

impl Machine {
    /// Fetch the in-line operand word at P and step past it.
    pub(crate) fn fetch_operand(&mut self) -> Result<u16, super::Exception> {
        let word = self.read(AccessClass::Fetch, self.regs.p)?;
        self.regs.p = self.regs.p.successor();
        Ok(word)
    }

    /// Fetch an in-line operand address and resolve it.
    pub(crate) fn fetch_operand_address(&mut self) -> Result<LogicalAddress, super::Exception> {
        let word = self.fetch_operand()?;
        self.resolve(word)
    }

    pub(crate) fn op_eau(&mut self, op: EauOp) -> OpcodeResult {
        match op {
            EauOp::Mpy => {
                let addr = self.fetch_operand_address()?;
                let operand = self.read(AccessClass::Data, addr)? as i16;
                let product = i32::from(self.regs.a as i16) * i32::from(operand);
                self.regs.set_ba(product as u32);
                self.regs.o = false;
            }
            EauOp::Div => {
                let addr = self.fetch_operand_address()?;
                let divisor = i32::from(self.read(AccessClass::Data, addr)? as i16);
                let dividend = self.regs.ba() as i32;
                match dividend.checked_div(divisor) {
                    Some(quotient) if i16::try_from(quotient).is_ok() => {
                        let remainder = dividend - quotient * divisor;
                        self.regs.a = quotient as u16;
                        self.regs.b = remainder as u16;
                        self.regs.o = false;
                    }
                    _ => {
                        // Division by zero, or a quotient which does
                        // not fit in 16 bits.
                        self.regs.o = true;
                    }
                }
            }
            EauOp::Dld => {
                let addr = self.fetch_operand_address()?;
                let first = self.read(AccessClass::Data, addr)?;
                let second = self.read(AccessClass::Data, addr.successor())?;
                self.regs.a = first;
                self.regs.b = second;
            }
            EauOp::Dst => {
                let addr = self.fetch_operand_address()?;
                self.write(AccessClass::Data, addr, self.regs.a)?;
                self.write(AccessClass::Data, addr.successor(), self.regs.b)?;
            }
            EauOp::Shift(shift, count) => {
                let count = if count == 0 { 16 } else { u32::from(count) };
                let (value, overflow) = double_shift(shift, self.regs.ba(), count);
                self.regs.set_ba(value);
                if shift == EauShift::Asl {
                    self.regs.o = overflow;
                }
            }
        }
        Ok(Completion::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_shifts() {
        assert_eq!(double_shift(EauShift::Asl, 1, 4), (16, false));
        // Shifting a one into the sign position is an overflow; the
        // sign itself is kept.
        assert_eq!(double_shift(EauShift::Asl, 0x4000_0000, 1), (0, true));
        assert_eq!(
            double_shift(EauShift::Asl, 0xC000_0001, 1),
            (0x8000_0002, false)
        );
        assert_eq!(double_shift(EauShift::Asr, 0x8000_0000, 16), (0xFFFF_8000, false));
    }

    #[test]
    fn logical_shifts_and_rotates() {
        assert_eq!(double_shift(EauShift::Lsl, 0x0001_8000, 16), (0x8000_0000, false));
        assert_eq!(double_shift(EauShift::Lsr, 0x8000_0000, 16), (0x0000_8000, false));
        assert_eq!(double_shift(EauShift::Rrl, 0x8000_0001, 1), (0x0000_0003, false));
        assert_eq!(double_shift(EauShift::Rrr, 0x0000_0003, 1), (0x8000_0001, false));
    }
}
