//! The extended instruction group: index register, byte and bit
//! instructions.
//!
//! Byte addresses are twice the word address; the even byte of a word
//! is its upper half.
use base::prelude::*;

use super::{AccessClass, Completion, OpcodeResult};
use crate::machine::Machine;
use crate::registers::add_with_flags;

fn byte_location(byte_address: u16) -> (LogicalAddress, bool) {
    (
        LogicalAddress::from_word(byte_address >> 1),
        byte_address & 1 == 0,
    )
}

impl Machine {
    pub(crate) fn op_eig(&mut self, op: EigOp, word: u16) -> OpcodeResult {
        use EigOp::*;
        match op {
            Sax(reg, ix) => {
                let addr = self.indexed_operand_address(ix)?;
                self.write(AccessClass::Data, addr, self.regs.accumulator(reg))?;
            }
            Cax(reg, ix) => {
                self.regs.set_index(ix, self.regs.accumulator(reg));
            }
            Lax(reg, ix) => {
                let addr = self.indexed_operand_address(ix)?;
                let value = self.read(AccessClass::Data, addr)?;
                self.regs.set_accumulator(reg, value);
            }
            Stx(ix) => {
                let addr = self.fetch_operand_address()?;
                self.write(AccessClass::Data, addr, self.regs.index(ix))?;
            }
            Cxa(reg, ix) => {
                self.regs.set_accumulator(reg, self.regs.index(ix));
            }
            Ldx(ix) => {
                let addr = self.fetch_operand_address()?;
                let value = self.read(AccessClass::Data, addr)?;
                self.regs.set_index(ix, value);
            }
            Adx(ix) => {
                let addr = self.fetch_operand_address()?;
                let operand = self.read(AccessClass::Data, addr)?;
                let (sum, carry, overflow) = add_with_flags(self.regs.index(ix), operand);
                self.regs.set_index(ix, sum);
                self.regs.e |= carry;
                self.regs.o |= overflow;
            }
            Xax(reg, ix) => {
                let acc = self.regs.accumulator(reg);
                self.regs.set_accumulator(reg, self.regs.index(ix));
                self.regs.set_index(ix, acc);
            }
            Isx(ix) | Dsx(ix) => {
                let value = if matches!(op, Isx(_)) {
                    self.regs.index(ix).wrapping_add(1)
                } else {
                    self.regs.index(ix).wrapping_sub(1)
                };
                self.regs.set_index(ix, value);
                if value == 0 {
                    self.skip();
                }
            }
            Jly => {
                let target = self.fetch_operand_address()?;
                let map = self.mmu.current_map();
                self.check_jump(target, 0, map)?;
                self.regs.y = u16::from(self.regs.p);
                self.regs.p = target;
            }
            Jpy => {
                let offset = self.fetch_operand()?;
                let target = LogicalAddress::from_word(offset.wrapping_add(self.regs.y));
                let map = self.mmu.current_map();
                self.check_jump(target, 0, map)?;
                self.regs.p = target;
            }
            Lbt => {
                let (addr, upper) = byte_location(self.regs.b);
                let value = self.read(AccessClass::Data, addr)?;
                self.regs.a = if upper { value >> 8 } else { value & 0o377 };
                self.regs.b = self.regs.b.wrapping_add(1);
            }
            Sbt => {
                let (addr, upper) = byte_location(self.regs.b);
                let byte = self.regs.a & 0o377;
                let value = self.read(AccessClass::Data, addr)?;
                let merged = if upper {
                    (value & 0o377) | (byte << 8)
                } else {
                    (value & 0o177_400) | byte
                };
                self.write(AccessClass::Data, addr, merged)?;
                self.regs.b = self.regs.b.wrapping_add(1);
            }
            Sbs | Cbs | Tbs => {
                let mask_addr = self.fetch_operand_address()?;
                let target = self.fetch_operand_address()?;
                let mask = self.read(AccessClass::Data, mask_addr)?;
                let value = self.read(AccessClass::Data, target)?;
                match op {
                    Sbs => self.write(AccessClass::Data, target, value | mask)?,
                    Cbs => self.write(AccessClass::Data, target, value & !mask)?,
                    _ => {
                        if value & mask != mask {
                            self.skip();
                        }
                    }
                }
            }
            Mbt | Cbt | Sfb | Cmw | Mvw => {
                return self.unimplemented(word);
            }
        }
        Ok(Completion::Normal)
    }

    fn indexed_operand_address(&mut self, ix: IndexRegister) -> Result<LogicalAddress, super::Exception> {
        let base = self.fetch_operand_address()?;
        Ok(base.offset_by(self.regs.index(ix)))
    }
}

#[test]
fn test_byte_location() {
    assert_eq!(byte_location(0o2000), (LogicalAddress::from_word(0o1000), true));
    assert_eq!(byte_location(0o2001), (LogicalAddress::from_word(0o1000), false));
}
