//! Binary and symbolic representations of HP 2100 / HP 1000
//! instructions.
//!
//! Instructions occupy one 16-bit word, possibly followed by one or
//! two operand words.  Bits 14-12 distinguish the memory reference
//! group from everything else:
//!
//! |15  |14-11  |10   |9-0    |                      |
//! |----|-------|-----|-------|----------------------|
//! |D/I |op≠000x|Z/C  |offset |memory reference group|
//! |0   |0000   |0    |       |shift/rotate group    |
//! |0   |0000   |1    |       |alter/skip group      |
//! |1   |000A   |1    |       |input/output group    |
//! |1   |000A   |0    |       |macro (EAU, EIG, DMS) |
//!
//! [`Instruction::decode`] turns a word into a tagged value that
//! the processor matches on once.  Every 16-bit value decodes to
//! something; bit patterns which are reserved decode to
//! [`Instruction::Undefined`] and those belonging to firmware
//! options we do not provide decode to
//! [`Instruction::Unimplemented`].

#[cfg(test)]
use test_strategy::proptest;

use super::types::{Accumulator, LogicalAddress, MapId, SelectCode, PAGE_OFFSET_MASK, SIGN_BIT};

mod format;

/// Bit 10 of a memory reference instruction selects the current
/// page rather than the base page.
pub const CURRENT_PAGE_BIT: u16 = 0o2000;

/// Bit 9 of an I/O group instruction; clears the device flag after
/// the operation (the "H/C" bit).
pub const CLEAR_FLAG_BIT: u16 = 0o1000;

/// The operations of the memory reference group, numbered by bits
/// 14-11 of the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    And = 0o02,
    Jsb = 0o03,
    Xor = 0o04,
    Jmp = 0o05,
    Ior = 0o06,
    Isz = 0o07,
    Ada = 0o10,
    Adb = 0o11,
    Cpa = 0o12,
    Cpb = 0o13,
    Lda = 0o14,
    Ldb = 0o15,
    Sta = 0o16,
    Stb = 0o17,
}

impl MemoryOp {
    fn from_bits_14_to_11(n: u16) -> Option<MemoryOp> {
        use MemoryOp::*;
        Some(match n {
            0o02 => And,
            0o03 => Jsb,
            0o04 => Xor,
            0o05 => Jmp,
            0o06 => Ior,
            0o07 => Isz,
            0o10 => Ada,
            0o11 => Adb,
            0o12 => Cpa,
            0o13 => Cpb,
            0o14 => Lda,
            0o15 => Ldb,
            0o16 => Sta,
            0o17 => Stb,
            _ => {
                return None;
            }
        })
    }

    pub fn number(&self) -> u16 {
        *self as u16
    }
}

/// A memory reference instruction broken down into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReference {
    pub op: MemoryOp,
    pub indirect: bool,
    pub current_page: bool,
    pub offset: u16,
}

impl MemoryReference {
    /// Compute the (possibly indirect) operand address.  `location`
    /// is the address the instruction was fetched from; a current
    /// page reference uses that page.
    pub fn address_word(&self, location: LogicalAddress) -> u16 {
        let page_bits = if self.current_page {
            u16::from(location) & !PAGE_OFFSET_MASK
        } else {
            0
        };
        let indirect_bit = if self.indirect { SIGN_BIT } else { 0 };
        indirect_bit | page_bits | self.offset
    }
}

/// The eight shift and rotate operations available in each of the
/// two shift positions of a shift/rotate group instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftOp {
    /// Arithmetic left shift, sign bit preserved.
    Als,
    /// Arithmetic right shift, sign bit extended.
    Ars,
    /// Rotate left.
    Ral,
    /// Rotate right.
    Rar,
    /// Shift left, clearing the sign bit.
    Alr,
    /// Rotate right through E.
    Era,
    /// Rotate left through E.
    Ela,
    /// Rotate left four bits.
    Alf,
}

impl ShiftOp {
    fn from_three_bits(n: u16) -> ShiftOp {
        match n & 7 {
            0 => ShiftOp::Als,
            1 => ShiftOp::Ars,
            2 => ShiftOp::Ral,
            3 => ShiftOp::Rar,
            4 => ShiftOp::Alr,
            5 => ShiftOp::Era,
            6 => ShiftOp::Ela,
            _ => ShiftOp::Alf,
        }
    }
}

/// A shift/rotate group instruction.  The micro-operations are
/// performed in the order the fields appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRotate {
    pub reg: Accumulator,
    pub first: Option<ShiftOp>,
    pub clear_e: bool,
    pub skip_if_lsb_clear: bool,
    pub second: Option<ShiftOp>,
}

/// A two-bit alteration field of the alter/skip group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alteration {
    Clear,
    Complement,
    Set,
}

impl Alteration {
    fn from_two_bits(n: u16) -> Option<Alteration> {
        match n & 3 {
            0 => None,
            1 => Some(Alteration::Clear),
            2 => Some(Alteration::Complement),
            _ => Some(Alteration::Set),
        }
    }
}

/// An alter/skip group instruction.  Each skip test which is
/// present contributes to a single skip decision, which RSS
/// reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlterSkip {
    pub reg: Accumulator,
    pub alter_register: Option<Alteration>,
    pub alter_extend: Option<Alteration>,
    /// SEZ: skip if E is zero.
    pub skip_if_e_clear: bool,
    /// SSA/SSB: skip if the sign bit is zero.
    pub skip_if_positive: bool,
    /// SLA/SLB: skip if the least significant bit is zero.
    pub skip_if_lsb_clear: bool,
    /// INA/INB.
    pub increment: bool,
    /// SZA/SZB: skip if the register is zero.
    pub skip_if_zero: bool,
    /// RSS: reverse the sense of the skip.
    pub reverse_skip: bool,
}

/// The operations of the I/O group (bits 8-6, with bit 11 or bit 9
/// separating some pairs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoOp {
    Hlt,
    Stf,
    Clf,
    Sfc,
    Sfs,
    Mix(Accumulator),
    Lix(Accumulator),
    Otx(Accumulator),
    Stc,
    Clc,
}

/// An I/O group instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputOutput {
    pub op: IoOp,
    /// When set, the device flag is cleared after the operation.
    /// This is never set for STF and CLF, for which bit 9 selects
    /// the operation itself.
    pub clear_flag: bool,
    pub sc: SelectCode,
}

/// The double-length shifts provided by the extended
/// arithmetic unit.  Each operates on the 32-bit value with B as the
/// upper half and A as the lower half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EauShift {
    Asl,
    Asr,
    Lsl,
    Lsr,
    Rrl,
    Rrr,
}

/// Extended arithmetic unit instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EauOp {
    Mpy,
    Div,
    Dld,
    Dst,
    /// A double-length shift.  A shift count field of 0 means 16.
    Shift(EauShift, u8),
}

/// Selects the X or Y index register of the extended instruction
/// group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexRegister {
    X,
    Y,
}

/// The extended instruction group (10x740 to 10x777).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EigOp {
    /// SAX, SBX, SAY, SBY: store accumulator indexed.
    Sax(Accumulator, IndexRegister),
    /// CAX, CBX, CAY, CBY: copy accumulator to index.
    Cax(Accumulator, IndexRegister),
    /// LAX, LBX, LAY, LBY: load accumulator indexed.
    Lax(Accumulator, IndexRegister),
    /// STX, STY.
    Stx(IndexRegister),
    /// CXA, CXB, CYA, CYB: copy index to accumulator.
    Cxa(Accumulator, IndexRegister),
    /// LDX, LDY.
    Ldx(IndexRegister),
    /// ADX, ADY.
    Adx(IndexRegister),
    /// XAX, XBX, XAY, XBY: exchange accumulator and index.
    Xax(Accumulator, IndexRegister),
    /// ISX, ISY: increment index, skip if zero.
    Isx(IndexRegister),
    /// DSX, DSY: decrement index, skip if zero.
    Dsx(IndexRegister),
    Jly,
    Jpy,
    Lbt,
    Sbt,
    Mbt,
    Cbt,
    Sfb,
    Sbs,
    Cbs,
    Tbs,
    Cmw,
    Mvw,
}

impl EigOp {
    fn decode(word: u16) -> Option<EigOp> {
        use EigOp::*;
        let reg = Accumulator::from_bit_11(word);
        let code = word & 0o77;
        let index = if code & 0o10 == 0 {
            IndexRegister::X
        } else {
            IndexRegister::Y
        };
        Some(match code {
            0o40 | 0o50 => Sax(reg, index),
            0o41 | 0o51 => Cax(reg, index),
            0o42 | 0o52 => Lax(reg, index),
            0o43 | 0o53 => Stx(index),
            0o44 | 0o54 => Cxa(reg, index),
            0o45 | 0o55 => Ldx(index),
            0o46 | 0o56 => Adx(index),
            0o47 | 0o57 => Xax(reg, index),
            0o60 => Isx(IndexRegister::X),
            0o61 => Dsx(IndexRegister::X),
            0o62 => Jly,
            0o63 => Lbt,
            0o64 => Sbt,
            0o65 => Mbt,
            0o66 => Cbt,
            0o67 => Sfb,
            0o70 => Isx(IndexRegister::Y),
            0o71 => Dsx(IndexRegister::Y),
            0o72 => Jpy,
            0o73 => Sbs,
            0o74 => Cbs,
            0o75 => Tbs,
            0o76 => Cmw,
            0o77 => Mvw,
            _ => {
                return None;
            }
        })
    }

    /// The number of operand words which follow the instruction.
    pub fn operand_words(&self) -> u16 {
        use EigOp::*;
        match self {
            Sax(_, _) | Lax(_, _) | Stx(_) | Ldx(_) | Adx(_) | Jly | Jpy => 1,
            Sbs | Cbs | Tbs => 2,
            Cax(_, _) | Cxa(_, _) | Xax(_, _) | Isx(_) | Dsx(_) | Lbt | Sbt | Mbt | Cbt | Sfb
            | Cmw | Mvw => 0,
        }
    }

    /// MBT, CBT, SFB, CMW and MVW are not provided.
    pub fn is_implemented(&self) -> bool {
        !matches!(
            self,
            EigOp::Mbt | EigOp::Cbt | EigOp::Sfb | EigOp::Cmw | EigOp::Mvw
        )
    }
}

/// The Dynamic Mapping System instructions (10x700 to 10x737).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmsOp {
    /// Move bytes into the alternate map.
    Mbi,
    /// Move bytes from the alternate map.
    Mbf,
    /// Move bytes within the alternate map.
    Mbw,
    /// Move words into the alternate map.
    Mwi,
    /// Move words from the alternate map.
    Mwf,
    /// Move words within the alternate map.
    Mww,
    /// SYA/SYB, USA/USB, PAA/PAB, PBA/PBB: load or store a whole map.
    LoadStoreMap(Accumulator, MapId),
    /// Store the status register in memory.
    Ssm,
    /// Jump and restore status.
    Jrs,
    /// Transfer map registers to or from memory.
    Xmm,
    /// Transfer sequential page numbers to map registers.
    Xms,
    /// XMA/XMB: copy between the system and user maps.
    Xmx(Accumulator),
    /// XLA/XLB: load from the alternate map.
    Xlx(Accumulator),
    /// XSA/XSB: store through the alternate map.
    Xsx(Accumulator),
    /// XCA/XCB: compare with the alternate map.
    Xcx(Accumulator),
    /// LFA/LFB: load the base-page fence and its direction.
    Lfx(Accumulator),
    /// RSA/RSB: read the status register.
    Rsx(Accumulator),
    /// RVA/RVB: read the violation register.
    Rvx(Accumulator),
    Djp,
    Djs,
    Sjp,
    Sjs,
    Ujp,
    Ujs,
}

impl DmsOp {
    fn decode(word: u16) -> Option<DmsOp> {
        use DmsOp::*;
        let reg = Accumulator::from_bit_11(word);
        let b_form = reg == Accumulator::B;
        Some(match (word & 0o77, b_form) {
            (0o02, true) => Mbi,
            (0o03, true) => Mbf,
            (0o04, true) => Mbw,
            (0o05, true) => Mwi,
            (0o06, true) => Mwf,
            (0o07, true) => Mww,
            (0o10, _) => LoadStoreMap(reg, MapId::System),
            (0o11, _) => LoadStoreMap(reg, MapId::User),
            (0o12, _) => LoadStoreMap(reg, MapId::PortA),
            (0o13, _) => LoadStoreMap(reg, MapId::PortB),
            (0o14, true) => Ssm,
            (0o15, true) => Jrs,
            (0o20, true) => Xmm,
            (0o21, true) => Xms,
            (0o22, _) => Xmx(reg),
            (0o24, _) => Xlx(reg),
            (0o25, _) => Xsx(reg),
            (0o26, _) => Xcx(reg),
            (0o27, _) => Lfx(reg),
            (0o30, _) => Rsx(reg),
            (0o31, _) => Rvx(reg),
            (0o32, true) => Djp,
            (0o33, true) => Djs,
            (0o34, true) => Sjp,
            (0o35, true) => Sjs,
            (0o36, true) => Ujp,
            (0o37, true) => Ujs,
            _ => {
                return None;
            }
        })
    }

    pub fn operand_words(&self) -> u16 {
        use DmsOp::*;
        match self {
            Ssm | Xlx(_) | Xsx(_) | Xcx(_) | Djp | Djs | Sjp | Sjs | Ujp | Ujs => 1,
            Jrs => 2,
            _ => 0,
        }
    }

    /// True for the instructions which cause a memory protect
    /// violation when executed with memory protect enabled.  The map
    /// transfer instructions (SYA and friends, and XMM) are only
    /// privileged when they load the maps, which depends on register
    /// contents; those are not included here.
    pub fn is_privileged(&self) -> bool {
        use DmsOp::*;
        matches!(
            self,
            Mbi | Mbf | Mwi | Mwf | Xms | Xmx(_) | Lfx(_) | Jrs | Djp | Djs | Sjp | Sjs | Ujp | Ujs
        )
    }

    /// True for the jumps which hold off interrupts for one
    /// instruction, as JMP,I and JSB,I do.
    pub fn defers_interrupts(&self) -> bool {
        use DmsOp::*;
        matches!(self, Jrs | Djp | Djs | Sjp | Sjs | Ujp | Ujs)
    }
}

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    MemoryReference(MemoryReference),
    ShiftRotate(ShiftRotate),
    AlterSkip(AlterSkip),
    InputOutput(InputOutput),
    Eau(EauOp),
    Eig(EigOp),
    Dms(DmsOp),
    /// Belongs to a firmware option which is not provided.
    Unimplemented(u16),
    /// A reserved bit pattern.
    Undefined(u16),
}

impl Instruction {
    pub fn decode(word: u16) -> Instruction {
        let indirect = word & SIGN_BIT != 0;
        let bit_10 = word & 0o2000 != 0;
        if let Some(op) = MemoryOp::from_bits_14_to_11((word >> 11) & 0o17) {
            return Instruction::MemoryReference(MemoryReference {
                op,
                indirect,
                current_page: bit_10,
                offset: word & PAGE_OFFSET_MASK,
            });
        }
        let reg = Accumulator::from_bit_11(word);
        match (indirect, bit_10) {
            (false, false) => Instruction::ShiftRotate(decode_shift_rotate(word, reg)),
            (false, true) => Instruction::AlterSkip(decode_alter_skip(word, reg)),
            (true, true) => Instruction::InputOutput(decode_input_output(word, reg)),
            (true, false) => decode_macro(word),
        }
    }

    /// The number of words which follow this instruction in memory
    /// as operands.
    pub fn operand_words(&self) -> u16 {
        match self {
            Instruction::Eau(EauOp::Mpy | EauOp::Div | EauOp::Dld | EauOp::Dst) => 1,
            Instruction::Eig(op) => op.operand_words(),
            Instruction::Dms(op) => op.operand_words(),
            _ => 0,
        }
    }
}

fn decode_shift_rotate(word: u16, reg: Accumulator) -> ShiftRotate {
    ShiftRotate {
        reg,
        first: (word & 0o1000 != 0).then(|| ShiftOp::from_three_bits(word >> 6)),
        clear_e: word & 0o40 != 0,
        skip_if_lsb_clear: word & 0o10 != 0,
        second: (word & 0o20 != 0).then(|| ShiftOp::from_three_bits(word)),
    }
}

fn decode_alter_skip(word: u16, reg: Accumulator) -> AlterSkip {
    AlterSkip {
        reg,
        alter_register: Alteration::from_two_bits(word >> 8),
        alter_extend: Alteration::from_two_bits(word >> 6),
        skip_if_e_clear: word & 0o40 != 0,
        skip_if_positive: word & 0o20 != 0,
        skip_if_lsb_clear: word & 0o10 != 0,
        increment: word & 0o4 != 0,
        skip_if_zero: word & 0o2 != 0,
        reverse_skip: word & 0o1 != 0,
    }
}

fn decode_input_output(word: u16, reg: Accumulator) -> InputOutput {
    let hc = word & CLEAR_FLAG_BIT != 0;
    let (op, clear_flag) = match (word >> 6) & 7 {
        0 => (IoOp::Hlt, hc),
        1 => (if hc { IoOp::Clf } else { IoOp::Stf }, false),
        2 => (IoOp::Sfc, hc),
        3 => (IoOp::Sfs, hc),
        4 => (IoOp::Mix(reg), hc),
        5 => (IoOp::Lix(reg), hc),
        6 => (IoOp::Otx(reg), hc),
        _ => (
            match reg {
                Accumulator::A => IoOp::Stc,
                Accumulator::B => IoOp::Clc,
            },
            hc,
        ),
    };
    InputOutput {
        op,
        clear_flag,
        sc: SelectCode::from_low_bits(word),
    }
}

fn decode_eau(word: u16) -> Option<EauOp> {
    match word {
        0o100_200 => return Some(EauOp::Mpy),
        0o100_400 => return Some(EauOp::Div),
        0o104_200 => return Some(EauOp::Dld),
        0o104_400 => return Some(EauOp::Dst),
        _ => (),
    }
    let count = (word & 0o17) as u8;
    let shift = match word & 0o177_760 {
        0o100_020 => EauShift::Asl,
        0o101_020 => EauShift::Asr,
        0o100_040 => EauShift::Lsl,
        0o101_040 => EauShift::Lsr,
        0o100_100 => EauShift::Rrl,
        0o101_100 => EauShift::Rrr,
        _ => {
            return None;
        }
    };
    Some(EauOp::Shift(shift, count))
}

fn decode_macro(word: u16) -> Instruction {
    if let Some(op) = decode_eau(word) {
        return Instruction::Eau(op);
    }
    // 10x700 to 10x777 is the extended instruction group and the
    // mapping instructions.
    if word & 0o173_700 == 0o101_700 {
        if word & 0o40 != 0 {
            if let Some(op) = EigOp::decode(word) {
                return Instruction::Eig(op);
            }
        } else if let Some(op) = DmsOp::decode(word) {
            return Instruction::Dms(op);
        }
        return Instruction::Undefined(word);
    }
    // 105000 to 105677 is user microcode space (floating point, fast
    // FORTRAN and so on).
    if word & 0o177_000 == 0o105_000 {
        Instruction::Unimplemented(word)
    } else {
        Instruction::Undefined(word)
    }
}


#[cfg(test)]
#[proptest]
fn memory_reference_fields_survive_decode(#[strategy(0o10_000..=0o177_777u16)] word: u16) {
    // Every word with a non-zero bits 14-12 field is a memory
    // reference instruction.
    match Instruction::decode(word) {
        Instruction::MemoryReference(mr) => {
            let location = LogicalAddress::ZERO;
            let rebuilt = (mr.op.number() << 11)
                | if mr.current_page { CURRENT_PAGE_BIT } else { 0 }
                | (mr.address_word(location) & (SIGN_BIT | PAGE_OFFSET_MASK));
            assert_eq!(rebuilt, word);
        }
        other => {
            assert_eq!(word & 0o070_000, 0, "{word:06o} decoded as {other:?}");
        }
    }
}

#[cfg(test)]
#[proptest]
fn every_word_disassembles(word: u16) {
    let text = Instruction::decode(word).to_string();
    assert!(!text.is_empty());
}
