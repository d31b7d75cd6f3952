//! The memory reference group.
//!
//! ## Logical: AND, XOR, IOR
//! ## Jumps: JSB, JMP
//! ## Arithmetic: ADA, ADB, ISZ
//! ## Compare: CPA, CPB
//! ## Load/store: LDA, LDB, STA, STB
use base::prelude::*;

use super::{AccessClass, Completion, OpcodeResult};
use crate::machine::Machine;
use crate::registers::add_with_flags;

/// Jumps from memory reference instructions may always go to 0 and 1.
const MRG_JUMP_LOWER_BOUND: u16 = 2;

impl Machine {
    pub(crate) fn op_memory_reference(
        &mut self,
        mr: MemoryReference,
        location: LogicalAddress,
    ) -> OpcodeResult {
        let addr = self.resolve(mr.address_word(location))?;
        match mr.op {
            MemoryOp::And => {
                self.regs.a &= self.read(AccessClass::Data, addr)?;
            }
            MemoryOp::Xor => {
                self.regs.a ^= self.read(AccessClass::Data, addr)?;
            }
            MemoryOp::Ior => {
                self.regs.a |= self.read(AccessClass::Data, addr)?;
            }
            MemoryOp::Jsb => {
                let map = self.mmu.current_map();
                self.check_jump(addr, MRG_JUMP_LOWER_BOUND, map)?;
                let return_address = u16::from(self.regs.p);
                self.write(AccessClass::Data, addr, return_address)?;
                self.regs.p = addr.successor();
                return Ok(jump_completion(mr));
            }
            MemoryOp::Jmp => {
                let map = self.mmu.current_map();
                self.check_jump(addr, MRG_JUMP_LOWER_BOUND, map)?;
                self.regs.p = addr;
                return Ok(jump_completion(mr));
            }
            MemoryOp::Isz => {
                let value = self.read(AccessClass::Data, addr)?.wrapping_add(1);
                self.write(AccessClass::Data, addr, value)?;
                if value == 0 {
                    self.skip();
                }
            }
            MemoryOp::Ada | MemoryOp::Adb => {
                let reg = if mr.op == MemoryOp::Ada {
                    Accumulator::A
                } else {
                    Accumulator::B
                };
                let operand = self.read(AccessClass::Data, addr)?;
                self.add_to_accumulator(reg, operand);
            }
            MemoryOp::Cpa | MemoryOp::Cpb => {
                let reg = if mr.op == MemoryOp::Cpa {
                    Accumulator::A
                } else {
                    Accumulator::B
                };
                if self.read(AccessClass::Data, addr)? != self.regs.accumulator(reg) {
                    self.skip();
                }
            }
            MemoryOp::Lda => {
                self.regs.a = self.read(AccessClass::Data, addr)?;
            }
            MemoryOp::Ldb => {
                self.regs.b = self.read(AccessClass::Data, addr)?;
            }
            MemoryOp::Sta => {
                self.write(AccessClass::Data, addr, self.regs.a)?;
            }
            MemoryOp::Stb => {
                self.write(AccessClass::Data, addr, self.regs.b)?;
            }
        }
        Ok(Completion::Normal)
    }

    /// Skip the next instruction.
    pub(crate) fn skip(&mut self) {
        self.regs.p = self.regs.p.successor();
    }

    /// Add to an accumulator.  E and O are set on carry and overflow
    /// but never cleared.
    pub(crate) fn add_to_accumulator(&mut self, reg: Accumulator, operand: u16) {
        let (sum, carry, overflow) = add_with_flags(self.regs.accumulator(reg), operand);
        self.regs.set_accumulator(reg, sum);
        self.regs.e |= carry;
        self.regs.o |= overflow;
    }
}

/// Indirect jumps hold off interrupts for an instruction.
fn jump_completion(mr: MemoryReference) -> Completion {
    if mr.indirect {
        Completion::Deferring
    } else {
        Completion::Normal
    }
}
