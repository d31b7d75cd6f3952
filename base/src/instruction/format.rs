/// Human-oriented formatting (disassembly) of instructions.
use std::fmt::{self, Display, Formatter};

use crate::instruction::{
    AlterSkip, Alteration, DmsOp, EauOp, EauShift, EigOp, IndexRegister, InputOutput, Instruction,
    IoOp, MemoryOp, MemoryReference, ShiftOp, ShiftRotate,
};
use crate::types::{Accumulator, MapId, SelectCode};

impl Display for MemoryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use MemoryOp::*;
        f.write_str(match self {
            And => "AND",
            Jsb => "JSB",
            Xor => "XOR",
            Jmp => "JMP",
            Ior => "IOR",
            Isz => "ISZ",
            Ada => "ADA",
            Adb => "ADB",
            Cpa => "CPA",
            Cpb => "CPB",
            Lda => "LDA",
            Ldb => "LDB",
            Sta => "STA",
            Stb => "STB",
        })
    }
}

/// Memory reference instructions are shown with the page-relative
/// offset; `C` marks a current-page reference and `I` indirection.
impl Display for MemoryReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} {:04o}", self.op, self.offset)?;
        if self.current_page {
            f.write_str(",C")?;
        }
        if self.indirect {
            f.write_str(",I")?;
        }
        Ok(())
    }
}

fn shift_mnemonic(op: ShiftOp, reg: Accumulator) -> &'static str {
    use Accumulator::*;
    use ShiftOp::*;
    match (op, reg) {
        (Als, A) => "ALS",
        (Als, B) => "BLS",
        (Ars, A) => "ARS",
        (Ars, B) => "BRS",
        (Ral, A) => "RAL",
        (Ral, B) => "RBL",
        (Rar, A) => "RAR",
        (Rar, B) => "RBR",
        (Alr, A) => "ALR",
        (Alr, B) => "BLR",
        (Era, A) => "ERA",
        (Era, B) => "ERB",
        (Ela, A) => "ELA",
        (Ela, B) => "ELB",
        (Alf, A) => "ALF",
        (Alf, B) => "BLF",
    }
}

/// Writes comma-separated micro-operation mnemonics, or NOP if there
/// are none.
fn write_micro_ops(f: &mut Formatter<'_>, parts: &[String]) -> Result<(), fmt::Error> {
    if parts.is_empty() {
        f.write_str("NOP")
    } else {
        f.write_str(&parts.join(","))
    }
}

impl Display for ShiftRotate {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let r = self.reg.letter();
        let mut parts: Vec<String> = Vec::new();
        if let Some(op) = self.first {
            parts.push(shift_mnemonic(op, self.reg).to_string());
        }
        if self.clear_e {
            parts.push("CLE".to_string());
        }
        if self.skip_if_lsb_clear {
            parts.push(format!("SL{r}"));
        }
        if let Some(op) = self.second {
            parts.push(shift_mnemonic(op, self.reg).to_string());
        }
        write_micro_ops(f, &parts)
    }
}

impl Display for AlterSkip {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let r = self.reg.letter();
        let mut parts: Vec<String> = Vec::new();
        match self.alter_register {
            Some(Alteration::Clear) => parts.push(format!("CL{r}")),
            Some(Alteration::Complement) => parts.push(format!("CM{r}")),
            Some(Alteration::Set) => parts.push(format!("CC{r}")),
            None => (),
        }
        match self.alter_extend {
            Some(Alteration::Clear) => parts.push("CLE".to_string()),
            Some(Alteration::Complement) => parts.push("CME".to_string()),
            Some(Alteration::Set) => parts.push("CCE".to_string()),
            None => (),
        }
        let flags = [
            (self.skip_if_e_clear, "SEZ".to_string()),
            (self.skip_if_positive, format!("SS{r}")),
            (self.skip_if_lsb_clear, format!("SL{r}")),
            (self.increment, format!("IN{r}")),
            (self.skip_if_zero, format!("SZ{r}")),
            (self.reverse_skip, "RSS".to_string()),
        ];
        parts.extend(
            flags
                .into_iter()
                .filter_map(|(present, name)| present.then_some(name)),
        );
        write_micro_ops(f, &parts)
    }
}

impl Display for InputOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        // The interrupt system and overflow register have their own
        // mnemonics, which take no select code.
        let special = match (self.op, self.sc) {
            (IoOp::Stf, SelectCode::INTERRUPT_SYSTEM) => Some("ION"),
            (IoOp::Clf, SelectCode::INTERRUPT_SYSTEM) => Some("IOF"),
            (IoOp::Stf, SelectCode::OVERFLOW) => Some("STO"),
            (IoOp::Clf, SelectCode::OVERFLOW) => Some("CLO"),
            (IoOp::Sfs, SelectCode::OVERFLOW) => Some("SOS"),
            (IoOp::Sfc, SelectCode::OVERFLOW) => Some("SOC"),
            _ => None,
        };
        match special {
            Some(name) => f.write_str(name)?,
            None => {
                let name = match self.op {
                    IoOp::Hlt => "HLT".to_string(),
                    IoOp::Stf => "STF".to_string(),
                    IoOp::Clf => "CLF".to_string(),
                    IoOp::Sfc => "SFC".to_string(),
                    IoOp::Sfs => "SFS".to_string(),
                    IoOp::Mix(r) => format!("MI{}", r.letter()),
                    IoOp::Lix(r) => format!("LI{}", r.letter()),
                    IoOp::Otx(r) => format!("OT{}", r.letter()),
                    IoOp::Stc => "STC".to_string(),
                    IoOp::Clc => "CLC".to_string(),
                };
                write!(f, "{name} {}", self.sc)?;
            }
        }
        if self.clear_flag {
            f.write_str(",C")?;
        }
        Ok(())
    }
}

impl Display for EauOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            EauOp::Mpy => f.write_str("MPY"),
            EauOp::Div => f.write_str("DIV"),
            EauOp::Dld => f.write_str("DLD"),
            EauOp::Dst => f.write_str("DST"),
            EauOp::Shift(EauShift::Rrr, 0) => f.write_str("SWP"),
            EauOp::Shift(kind, count) => {
                let name = match kind {
                    EauShift::Asl => "ASL",
                    EauShift::Asr => "ASR",
                    EauShift::Lsl => "LSL",
                    EauShift::Lsr => "LSR",
                    EauShift::Rrl => "RRL",
                    EauShift::Rrr => "RRR",
                };
                let count = if *count == 0 { 16 } else { *count };
                write!(f, "{name} {count}")
            }
        }
    }
}

impl Display for EigOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use EigOp::*;
        fn ix(i: &IndexRegister) -> char {
            match i {
                IndexRegister::X => 'X',
                IndexRegister::Y => 'Y',
            }
        }
        let name: String = match self {
            Sax(r, i) => format!("S{}{}", r.letter(), ix(i)),
            Cax(r, i) => format!("C{}{}", r.letter(), ix(i)),
            Lax(r, i) => format!("L{}{}", r.letter(), ix(i)),
            Stx(i) => format!("ST{}", ix(i)),
            Cxa(r, i) => format!("C{}{}", ix(i), r.letter()),
            Ldx(i) => format!("LD{}", ix(i)),
            Adx(i) => format!("AD{}", ix(i)),
            Xax(r, i) => format!("X{}{}", r.letter(), ix(i)),
            Isx(i) => format!("IS{}", ix(i)),
            Dsx(i) => format!("DS{}", ix(i)),
            Jly => "JLY".to_string(),
            Jpy => "JPY".to_string(),
            Lbt => "LBT".to_string(),
            Sbt => "SBT".to_string(),
            Mbt => "MBT".to_string(),
            Cbt => "CBT".to_string(),
            Sfb => "SFB".to_string(),
            Sbs => "SBS".to_string(),
            Cbs => "CBS".to_string(),
            Tbs => "TBS".to_string(),
            Cmw => "CMW".to_string(),
            Mvw => "MVW".to_string(),
        };
        f.write_str(&name)
    }
}

impl Display for DmsOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use DmsOp::*;
        let with_reg = |prefix: &str, r: &Accumulator| format!("{prefix}{}", r.letter());
        let name: String = match self {
            Mbi => "MBI".to_string(),
            Mbf => "MBF".to_string(),
            Mbw => "MBW".to_string(),
            Mwi => "MWI".to_string(),
            Mwf => "MWF".to_string(),
            Mww => "MWW".to_string(),
            LoadStoreMap(r, map) => with_reg(
                match map {
                    MapId::System => "SY",
                    MapId::User => "US",
                    MapId::PortA => "PA",
                    MapId::PortB => "PB",
                },
                r,
            ),
            Ssm => "SSM".to_string(),
            Jrs => "JRS".to_string(),
            Xmm => "XMM".to_string(),
            Xms => "XMS".to_string(),
            Xmx(r) => with_reg("XM", r),
            Xlx(r) => with_reg("XL", r),
            Xsx(r) => with_reg("XS", r),
            Xcx(r) => with_reg("XC", r),
            Lfx(r) => with_reg("LF", r),
            Rsx(r) => with_reg("RS", r),
            Rvx(r) => with_reg("RV", r),
            Djp => "DJP".to_string(),
            Djs => "DJS".to_string(),
            Sjp => "SJP".to_string(),
            Sjs => "SJS".to_string(),
            Ujp => "UJP".to_string(),
            Ujs => "UJS".to_string(),
        };
        f.write_str(&name)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Instruction::MemoryReference(mr) => mr.fmt(f),
            Instruction::ShiftRotate(srg) => srg.fmt(f),
            Instruction::AlterSkip(asg) => asg.fmt(f),
            Instruction::InputOutput(iog) => iog.fmt(f),
            Instruction::Eau(op) => op.fmt(f),
            Instruction::Eig(op) => op.fmt(f),
            Instruction::Dms(op) => op.fmt(f),
            Instruction::Unimplemented(w) => write!(f, "OCT {w:06o}"),
            Instruction::Undefined(w) => write!(f, "OCT {w:06o}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::instruction::Instruction;

    fn dis(word: u16) -> String {
        Instruction::decode(word).to_string()
    }

    #[test]
    fn test_disassemble_groups() {
        assert_eq!(dis(0o000_000), "NOP");
        assert_eq!(dis(0o002_000), "NOP");
        assert_eq!(dis(0o161_234), "LDA 1234,I");
        assert_eq!(dis(0o026_100), "JMP 0100,C");
        assert_eq!(dis(0o005_667), "ELB,CLE,BLF");
        assert_eq!(dis(0o007_447), "CCB,SEZ,INB,SZB,RSS");
        assert_eq!(dis(0o002_400), "CLA");
        assert_eq!(dis(0o102_100), "ION");
        assert_eq!(dis(0o103_101), "CLO");
        assert_eq!(dis(0o103_512), "LIA 12,C");
        assert_eq!(dis(0o107_706), "CLC 06,C");
        assert_eq!(dis(0o101_100), "SWP");
        assert_eq!(dis(0o100_022), "ASL 2");
        assert_eq!(dis(0o105_757), "XBY");
        assert_eq!(dis(0o101_744), "CXA");
        assert_eq!(dis(0o105_711), "USB");
        assert_eq!(dis(0o105_000), "OCT 105000");
    }
}
