//! Instruction timing.
//!
//! This module deals with the relationship between actual time and the
//! time taken by instructions in the simulator.  The figures are
//! approximate, in units of the model's memory cycle; they drive the
//! simulated clock against which device events are scheduled, and
//! are not intended to be cycle-exact.
use base::prelude::*;

/// Estimate how many memory cycles `word` takes to execute, ignoring
/// indirection.
pub(crate) fn memory_cycles(word: u16) -> u32 {
    match Instruction::decode(word) {
        Instruction::MemoryReference(mr) => match mr.op {
            MemoryOp::Isz | MemoryOp::Jsb => 3,
            _ => 2,
        },
        Instruction::ShiftRotate(_) | Instruction::AlterSkip(_) => 1,
        Instruction::InputOutput(_) => 2,
        Instruction::Eau(op) => match op {
            EauOp::Mpy => 10,
            EauOp::Div => 16,
            EauOp::Dld | EauOp::Dst => 5,
            EauOp::Shift(_, count) => {
                let count = if count == 0 { 16 } else { u32::from(count) };
                2 + count / 2
            }
        },
        Instruction::Eig(op) => 2 + u32::from(op.operand_words()) * 2,
        Instruction::Dms(op) => match op {
            DmsOp::LoadStoreMap(_, _) => 34,
            _ => 3 + u32::from(op.operand_words()) * 2,
        },
        Instruction::Unimplemented(_) | Instruction::Undefined(_) => 1,
    }
}

#[test]
fn test_every_instruction_takes_time() {
    for word in [0u16, 0o002_400, 0o102_000, 0o100_200, 0o105_740, 0o105_710, 0o105_000] {
        assert!(memory_cycles(word) >= 1, "{word:06o}");
    }
    assert!(memory_cycles(0o100_400) > memory_cycles(0o100_200));
}
