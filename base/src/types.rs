//! Addresses, select codes and the other small quantities that the
//! HP 2100 and HP 1000 processors manipulate.
//!
//! The machine uses 16-bit words, which we represent directly as
//! `u16`.  Quantities narrower than a word (select codes, logical
//! addresses) and wider than a word (physical addresses on a machine
//! fitted with the Dynamic Mapping System) get their own types so
//! that the compiler helps us avoid mixing them up.
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::{Deserialize, Serialize};

#[cfg(test)]
use test_strategy::proptest;

/// Bit 15 of a word; the sign bit, and also the indirect bit of an
/// address word.
pub const SIGN_BIT: u16 = 0o100_000;

/// The number of words in a page.
pub const PAGE_SIZE: u32 = 1024;

/// The width (in bits) of the offset within a page.
pub const PAGE_OFFSET_BITS: u32 = 10;

/// Mask selecting the offset-within-page part of an address.
pub const PAGE_OFFSET_MASK: u16 = 0o1777;

/// The number of logical pages in the 32K-word logical address space.
pub const LOGICAL_PAGES: usize = 32;

/// The largest physical memory any model supports (1024 pages of 1K).
pub const MAX_PHYSICAL_WORDS: u32 = 1 << 20;

/// Represents a failure to convert a number into one of the narrower
/// types defined in the base crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailed {
    TooLarge,
}

impl Error for ConversionFailed {}

impl Display for ConversionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConversionFailed::TooLarge => f.write_str("value is too large"),
        }
    }
}

/// A select code identifies one of the 64 I/O slots on the
/// backplane.  Codes 0 to 7 are reserved for the processor's own
/// interfaces; external devices occupy 010 to 077.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectCode(u8);

impl SelectCode {
    pub const MAX: SelectCode = SelectCode(0o77);

    /// Interrupt system control.
    pub const INTERRUPT_SYSTEM: SelectCode = SelectCode(0o0);
    /// Overflow flip-flop and switch register.
    pub const OVERFLOW: SelectCode = SelectCode(0o1);
    /// DMA channel 1 control-word registers.
    pub const DMA1_WORDS: SelectCode = SelectCode(0o2);
    /// DMA channel 2 control-word registers.
    pub const DMA2_WORDS: SelectCode = SelectCode(0o3);
    /// Power-fail interrupt.
    pub const POWER_FAIL: SelectCode = SelectCode(0o4);
    /// Memory protect, mapping violation (and parity error).
    pub const MEMORY_PROTECT: SelectCode = SelectCode(0o5);
    /// DMA channel 1 control and completion interrupt.
    pub const DMA1: SelectCode = SelectCode(0o6);
    /// DMA channel 2 control and completion interrupt.
    pub const DMA2: SelectCode = SelectCode(0o7);
    /// The lowest select code available to I/O devices.
    pub const FIRST_DEVICE: SelectCode = SelectCode(0o10);

    /// Construct a select code from a compile-time constant; see the
    /// [`crate::sc`] macro.
    pub const fn new<const N: u8>() -> SelectCode {
        assert!(N <= 0o77, "select codes are 6 bits wide");
        SelectCode(N)
    }

    /// Extract the select code field (bits 5-0) of an instruction or
    /// control word.
    pub const fn from_low_bits(word: u16) -> SelectCode {
        SelectCode((word & 0o77) as u8)
    }

    /// Returns true for the select codes which are wired to the
    /// processor itself rather than to an I/O card.
    pub fn is_reserved(&self) -> bool {
        *self < SelectCode::FIRST_DEVICE
    }

    /// Iterate over all 64 select codes in priority order.
    pub fn all() -> impl Iterator<Item = SelectCode> {
        (0..=0o77_u8).map(SelectCode)
    }
}

impl TryFrom<u8> for SelectCode {
    type Error = ConversionFailed;
    fn try_from(n: u8) -> Result<SelectCode, ConversionFailed> {
        if n > 0o77 {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(SelectCode(n))
        }
    }
}

impl TryFrom<u16> for SelectCode {
    type Error = ConversionFailed;
    fn try_from(n: u16) -> Result<SelectCode, ConversionFailed> {
        u8::try_from(n)
            .map_err(|_| ConversionFailed::TooLarge)
            .and_then(SelectCode::try_from)
    }
}

impl From<SelectCode> for u8 {
    fn from(sc: SelectCode) -> u8 {
        sc.0
    }
}

impl From<SelectCode> for u16 {
    fn from(sc: SelectCode) -> u16 {
        u16::from(sc.0)
    }
}

impl From<SelectCode> for usize {
    fn from(sc: SelectCode) -> usize {
        usize::from(sc.0)
    }
}

impl Display for SelectCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        // Select codes are always written in octal.
        write!(f, "{:02o}", self.0)
    }
}

impl Debug for SelectCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "SC{:02o}", self.0)
    }
}

impl Octal for SelectCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.0, f)
    }
}

/// A 15-bit logical (program) address.  Logical addresses are what
/// the program counter, the memory-reference instructions and the
/// DMA address registers hold.  When the mapping system is enabled,
/// they are translated into [`PhysicalAddress`]es.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalAddress(u16);

impl LogicalAddress {
    pub const ZERO: LogicalAddress = LogicalAddress(0);
    pub const MAX: LogicalAddress = LogicalAddress(0o77_777);
    /// Mask selecting the bits of a word that form a logical address.
    pub const MASK: u16 = 0o77_777;

    pub const fn new<const N: u16>() -> LogicalAddress {
        assert!(N <= 0o77_777, "logical addresses are 15 bits wide");
        LogicalAddress(N)
    }

    /// Take the low 15 bits of a word as an address, discarding bit
    /// 15 (which in an address word is the indirect bit).
    pub const fn from_word(word: u16) -> LogicalAddress {
        LogicalAddress(word & Self::MASK)
    }

    /// The logical page number (bits 14-10).
    pub const fn page(&self) -> usize {
        (self.0 >> PAGE_OFFSET_BITS) as usize
    }

    /// The offset within the page (bits 9-0).
    pub const fn offset(&self) -> u16 {
        self.0 & PAGE_OFFSET_MASK
    }

    /// The next address; the program counter wraps from 077777 to 0.
    pub const fn successor(&self) -> LogicalAddress {
        self.offset_by(1)
    }

    /// The preceding address, wrapping from 0 to 077777.
    pub const fn predecessor(&self) -> LogicalAddress {
        LogicalAddress(self.0.wrapping_sub(1) & Self::MASK)
    }

    /// Add `delta` with 15-bit wraparound.
    pub const fn offset_by(&self, delta: u16) -> LogicalAddress {
        LogicalAddress(self.0.wrapping_add(delta) & Self::MASK)
    }

    /// True for addresses 0 and 1, which (for the processor's own
    /// accesses) are the A and B registers rather than memory.
    pub const fn is_accumulator(&self) -> bool {
        self.0 <= 1
    }
}

impl TryFrom<u16> for LogicalAddress {
    type Error = ConversionFailed;
    fn try_from(n: u16) -> Result<LogicalAddress, ConversionFailed> {
        if n > Self::MASK {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(LogicalAddress(n))
        }
    }
}

impl From<LogicalAddress> for u16 {
    fn from(a: LogicalAddress) -> u16 {
        a.0
    }
}

impl From<LogicalAddress> for u32 {
    fn from(a: LogicalAddress) -> u32 {
        u32::from(a.0)
    }
}

impl Display for LogicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        // Always display as octal.
        write!(f, "{:06o}", self.0)
    }
}

impl Debug for LogicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:06o}", self.0)
    }
}

impl Octal for LogicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.0, f)
    }
}

/// A 20-bit physical memory address: a 10-bit physical page number
/// and a 10-bit offset.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    pub const ZERO: PhysicalAddress = PhysicalAddress(0);
    pub const MASK: u32 = MAX_PHYSICAL_WORDS - 1;

    /// Combine a physical page number with an offset within the page.
    pub const fn from_page_and_offset(page: u16, offset: u16) -> PhysicalAddress {
        PhysicalAddress(
            (((page as u32) << PAGE_OFFSET_BITS) | (offset & PAGE_OFFSET_MASK) as u32) & Self::MASK,
        )
    }

    /// The physical address which is identical to a logical address,
    /// which is what we get when the mapping system is not in use.
    pub const fn unmapped(addr: LogicalAddress) -> PhysicalAddress {
        PhysicalAddress(addr.0 as u32)
    }

    pub const fn page(&self) -> u16 {
        (self.0 >> PAGE_OFFSET_BITS) as u16
    }

    pub const fn offset(&self) -> u16 {
        (self.0 as u16) & PAGE_OFFSET_MASK
    }

    pub const fn successor(&self) -> PhysicalAddress {
        PhysicalAddress((self.0 + 1) & Self::MASK)
    }
}

impl TryFrom<u32> for PhysicalAddress {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<PhysicalAddress, ConversionFailed> {
        if n > Self::MASK {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(PhysicalAddress(n))
        }
    }
}

impl From<LogicalAddress> for PhysicalAddress {
    fn from(a: LogicalAddress) -> PhysicalAddress {
        PhysicalAddress::unmapped(a)
    }
}

impl From<PhysicalAddress> for u32 {
    fn from(a: PhysicalAddress) -> u32 {
        a.0
    }
}

impl From<PhysicalAddress> for usize {
    fn from(a: PhysicalAddress) -> usize {
        a.0 as usize
    }
}

impl Display for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:07o}", self.0)
    }
}

impl Debug for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:07o}", self.0)
    }
}

impl Octal for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.0, f)
    }
}

/// Identifies one of the two accumulators.  Many instructions have
/// an A-register and a B-register form, distinguished by bit 11.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Accumulator {
    A,
    B,
}

impl Accumulator {
    /// Decode the A/B select bit (bit 11) of an instruction.
    pub const fn from_bit_11(word: u16) -> Accumulator {
        if word & 0o4000 == 0 {
            Accumulator::A
        } else {
            Accumulator::B
        }
    }

    pub const fn letter(&self) -> char {
        match self {
            Accumulator::A => 'A',
            Accumulator::B => 'B',
        }
    }
}

/// Identifies one of the four sets of 32 mapping registers in the
/// Dynamic Mapping System.  The system and user maps serve the
/// processor; port A and port B serve DMA channels 1 and 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MapId {
    System = 0,
    User = 1,
    PortA = 2,
    PortB = 3,
}

impl MapId {
    pub const ALL: [MapId; 4] = [MapId::System, MapId::User, MapId::PortA, MapId::PortB];

    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Select a map from a 2-bit field (as used by XMM, which numbers
    /// the 128 mapping registers consecutively).
    pub const fn from_index(n: usize) -> MapId {
        match n & 3 {
            0 => MapId::System,
            1 => MapId::User,
            2 => MapId::PortA,
            _ => MapId::PortB,
        }
    }
}

impl Display for MapId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            MapId::System => "system",
            MapId::User => "user",
            MapId::PortA => "port A",
            MapId::PortB => "port B",
        })
    }
}

#[test]
fn test_select_code_conversion() {
    assert_eq!(SelectCode::try_from(0o77_u8), Ok(SelectCode::MAX));
    assert_eq!(
        SelectCode::try_from(0o100_u8),
        Err(ConversionFailed::TooLarge)
    );
    assert!(SelectCode::POWER_FAIL.is_reserved());
    assert!(!SelectCode::FIRST_DEVICE.is_reserved());
    assert_eq!(SelectCode::from_low_bits(0o102_712).to_string(), "12");
    assert_eq!(SelectCode::all().count(), 64);
}

#[test]
fn test_logical_address_wraps() {
    assert_eq!(LogicalAddress::MAX.successor(), LogicalAddress::ZERO);
    assert_eq!(LogicalAddress::ZERO.predecessor(), LogicalAddress::MAX);
    assert_eq!(LogicalAddress::from_word(0o177_777), LogicalAddress::MAX);
    let a = LogicalAddress::new::<0o24_345>();
    assert_eq!(a.page(), 0o12);
    assert_eq!(a.offset(), 0o345);
    assert!(LogicalAddress::try_from(0o100_000_u16).is_err());
}

#[test]
fn test_physical_address_fields() {
    let p = PhysicalAddress::from_page_and_offset(0o1777, 0o1777);
    assert_eq!(u32::from(p), MAX_PHYSICAL_WORDS - 1);
    assert_eq!(p.page(), 0o1777);
    assert_eq!(p.offset(), 0o1777);
    assert_eq!(p.successor(), PhysicalAddress::ZERO);
}

#[cfg(test)]
#[proptest]
fn unmapped_physical_address_has_same_page_and_offset(#[strategy(0..=0o77_777u16)] n: u16) {
    let logical = LogicalAddress::from_word(n);
    let physical = PhysicalAddress::unmapped(logical);
    assert_eq!(usize::from(physical.page()), logical.page());
    assert_eq!(physical.offset(), logical.offset());
}
