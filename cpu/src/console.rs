//! The operator's view of the machine: examining and depositing
//! memory through a chosen map, and loading the bootstrap loader.
//!
//! Console accesses never cause mapping or memory protect
//! violations; they look at the maps without involving the
//! protection logic.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use base::prelude::*;

use crate::machine::Machine;
use crate::mmu::Protection;

/// Which address space a console address is interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleMap {
    /// A physical address; no translation.
    Physical,
    /// A logical address translated the way the processor would
    /// translate it right now.
    Current,
    System,
    User,
    PortA,
    PortB,
}

impl ConsoleMap {
    fn map_id(&self) -> Option<MapId> {
        match self {
            ConsoleMap::Physical | ConsoleMap::Current => None,
            ConsoleMap::System => Some(MapId::System),
            ConsoleMap::User => Some(MapId::User),
            ConsoleMap::PortA => Some(MapId::PortA),
            ConsoleMap::PortB => Some(MapId::PortB),
        }
    }

    /// Addresses 0 and 1 are the A and B registers for the
    /// processor's maps.
    fn aliases_accumulators(&self) -> bool {
        matches!(self, ConsoleMap::Current | ConsoleMap::System | ConsoleMap::User)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// The address is too large for the selected address space.
    AddressOutOfRange { address: u32, map: ConsoleMap },
    /// The physical address is beyond the installed memory.
    NonexistentMemory(PhysicalAddress),
}

impl Display for ConsoleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConsoleError::AddressOutOfRange { address, map } => {
                write!(f, "address {address:o} is out of range for the {map:?} map")
            }
            ConsoleError::NonexistentMemory(addr) => {
                write!(f, "there is no memory at physical address {addr}")
            }
        }
    }
}

impl Error for ConsoleError {}

/// Where a console address refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleLocation {
    Accumulator(Accumulator),
    Memory(PhysicalAddress),
}

/// The number of words in a bootstrap loader.
pub const LOADER_WORDS: usize = 64;

/// A bootstrap loader image and the locations within it which are
/// adjusted when it is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderImage {
    pub words: Vec<u16>,
    /// The offset of the first instruction to execute.
    pub start_index: usize,
    /// The offset of a DMA control word whose select code field is
    /// set to the device's select code.
    pub dma_index: Option<usize>,
    /// The offset of the word which holds the negative of the
    /// loader's own base address.
    pub fwa_index: Option<usize>,
}

/// Switch register bits to set and clear when a loader is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchPresets {
    pub set: u16,
    pub clear: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// Loaders address devices, not the processor's own select codes.
    ReservedSelectCode(SelectCode),
    WrongSize(usize),
    IndexOutOfRange { what: &'static str, index: usize },
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LoaderError::ReservedSelectCode(sc) => write!(
                f,
                "cannot configure a loader for select code {sc}; the lowest device select code is {}",
                SelectCode::FIRST_DEVICE
            ),
            LoaderError::WrongSize(n) => {
                write!(f, "loader image has {n} words, expected {LOADER_WORDS}")
            }
            LoaderError::IndexOutOfRange { what, index } => {
                write!(f, "loader {what} index {index} is outside the image")
            }
        }
    }
}

impl Error for LoaderError {}

impl LoaderImage {
    fn validate(&self) -> Result<(), LoaderError> {
        if self.words.len() != LOADER_WORDS {
            return Err(LoaderError::WrongSize(self.words.len()));
        }
        for (what, index) in [
            ("start", Some(self.start_index)),
            ("DMA control word", self.dma_index),
            ("first word address", self.fwa_index),
        ] {
            if let Some(index) = index {
                if index >= LOADER_WORDS {
                    return Err(LoaderError::IndexOutOfRange { what, index });
                }
            }
        }
        Ok(())
    }
}

/// Point an I/O instruction at a device at `sc` rather than 010.
/// Halts (whose select code field is a halt code) and instructions
/// for the processor's own select codes are left alone.
fn configure_io_instruction(word: u16, sc: SelectCode) -> u16 {
    match Instruction::decode(word) {
        Instruction::InputOutput(iog) if iog.op != IoOp::Hlt && !iog.sc.is_reserved() => {
            let delta = u16::from(sc) - u16::from(SelectCode::FIRST_DEVICE);
            (word & !0o77) | (u16::from(iog.sc).wrapping_add(delta) & 0o77)
        }
        _ => word,
    }
}

impl Machine {
    /// Translate `addr` as the console would.  Unlike processor
    /// accesses this never records a violation, and the explicit maps
    /// are used even when mapping is disabled.
    pub fn translate_address_for_console(&self, addr: LogicalAddress, map: ConsoleMap) -> PhysicalAddress {
        match (map, map.map_id()) {
            (ConsoleMap::Current, _) => {
                self.mmu
                    .translate(addr, self.mmu.current_map(), Protection::Unprotected)
                    .physical
            }
            (_, Some(id)) => self.mmu.lookup(addr, id, Protection::Unprotected).physical,
            (_, None) => PhysicalAddress::unmapped(addr),
        }
    }

    fn console_location(&self, address: u32, map: ConsoleMap) -> Result<ConsoleLocation, ConsoleError> {
        let out_of_range = ConsoleError::AddressOutOfRange { address, map };
        let physical = if map == ConsoleMap::Physical {
            PhysicalAddress::try_from(address).map_err(|_| out_of_range)?
        } else {
            let logical = u16::try_from(address)
                .ok()
                .and_then(|n| LogicalAddress::try_from(n).ok())
                .ok_or(out_of_range)?;
            if map.aliases_accumulators() && logical.is_accumulator() {
                return Ok(ConsoleLocation::Accumulator(if u16::from(logical) == 0 {
                    Accumulator::A
                } else {
                    Accumulator::B
                }));
            }
            self.translate_address_for_console(logical, map)
        };
        if self.mem.is_present(physical) {
            Ok(ConsoleLocation::Memory(physical))
        } else {
            Err(ConsoleError::NonexistentMemory(physical))
        }
    }

    pub fn examine(&self, address: u32, map: ConsoleMap) -> Result<u16, ConsoleError> {
        match self.console_location(address, map)? {
            ConsoleLocation::Accumulator(reg) => Ok(self.regs.accumulator(reg)),
            ConsoleLocation::Memory(physical) => Ok(self.mem.read(physical)),
        }
    }

    pub fn deposit(&mut self, address: u32, map: ConsoleMap, value: u16) -> Result<(), ConsoleError> {
        match self.console_location(address, map)? {
            ConsoleLocation::Accumulator(reg) => self.regs.set_accumulator(reg, value),
            ConsoleLocation::Memory(physical) => self.mem.write(physical, value),
        }
        Ok(())
    }

    /// Store `words` in consecutive physical locations starting at
    /// `origin`.
    pub fn load_physical(&mut self, origin: u32, words: &[u16]) -> Result<(), ConsoleError> {
        for (offset, word) in (0u32..).zip(words.iter()) {
            let address = origin
                .checked_add(offset)
                .ok_or(ConsoleError::AddressOutOfRange {
                    address: origin,
                    map: ConsoleMap::Physical,
                })?;
            self.deposit(address, ConsoleMap::Physical, *word)?;
        }
        event!(
            Level::DEBUG,
            "loaded {} words at physical address {origin:o}",
            words.len()
        );
        Ok(())
    }

    /// Install a bootstrap loader in the last 64 words of the first
    /// 32K of memory, configured for the device at `sc`.  Sets P to
    /// the loader's starting address and applies the switch register
    /// presets.  Returns the loader's base address.
    pub fn copy_loader_image(
        &mut self,
        image: &LoaderImage,
        sc: SelectCode,
        presets: SwitchPresets,
    ) -> Result<LogicalAddress, LoaderError> {
        if sc.is_reserved() {
            return Err(LoaderError::ReservedSelectCode(sc));
        }
        image.validate()?;
        let top = self.mem.size().min(LogicalAddress::MASK as u32 + 1);
        // Memory is a whole number of pages, so there is always room.
        let base = LogicalAddress::from_word((top - LOADER_WORDS as u32) as u16);
        for (index, word) in image.words.iter().enumerate() {
            let value = if Some(index) == image.dma_index {
                (word & !0o77) | u16::from(sc)
            } else if Some(index) == image.fwa_index {
                u16::from(base).wrapping_neg()
            } else {
                configure_io_instruction(*word, sc)
            };
            let addr = base.offset_by(index as u16);
            self.mem.write(PhysicalAddress::unmapped(addr), value);
        }
        self.regs.p = base.offset_by(image.start_index as u16);
        self.regs.s = (self.regs.s & !presets.clear) | presets.set;
        event!(
            Level::INFO,
            "loader installed at {base} for select code {sc}, starting at {}",
            self.regs.p
        );
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CpuConfiguration, CpuModel};

    fn machine(memory_words: u32) -> Machine {
        let config = CpuConfiguration {
            memory_words,
            ..CpuConfiguration::new(CpuModel::Hp1000E)
        };
        Machine::new(config).expect("valid test configuration")
    }

    #[test]
    fn accumulators_appear_at_0_and_1() {
        let mut m = machine(32_768);
        m.deposit(0, ConsoleMap::Current, 0o123).expect("deposit A");
        m.deposit(1, ConsoleMap::System, 0o456).expect("deposit B");
        assert_eq!(m.registers().a, 0o123);
        assert_eq!(m.registers().b, 0o456);
        m.deposit(0, ConsoleMap::Physical, 0o777).expect("deposit memory");
        assert_eq!(m.registers().a, 0o123);
        assert_eq!(m.examine(0, ConsoleMap::Physical), Ok(0o777));
        assert_eq!(m.examine(0, ConsoleMap::PortA), Ok(0o777));
    }

    #[test]
    fn explicit_maps_translate_even_when_mapping_is_off() {
        let mut m = machine(65_536);
        m.mmu_mut().set_map_register(MapId::User, 1, 0o41);
        assert!(!m.mmu().is_enabled());
        m.deposit(0o2005, ConsoleMap::User, 0o7070).expect("deposit");
        assert_eq!(m.examine(0o41 * 1024 + 5, ConsoleMap::Physical), Ok(0o7070));
        assert_eq!(m.examine(0o2005, ConsoleMap::Current), Ok(0));
    }

    #[test]
    fn console_ignores_protection() {
        let mut m = machine(32_768);
        m.mmu_mut().set_map_register(
            MapId::System,
            2,
            crate::mmu::MAP_READ_PROTECT | crate::mmu::MAP_WRITE_PROTECT | 2,
        );
        m.mmu_mut().enable(MapId::System);
        m.deposit(0o4000, ConsoleMap::Current, 1).expect("deposit");
        assert_eq!(m.examine(0o4000, ConsoleMap::Current), Ok(1));
        assert_eq!(m.mmu().violation(), None);
    }

    #[test]
    fn load_near_the_top_of_the_address_range_fails_cleanly() {
        let mut m = machine(32_768);
        assert!(m.load_physical(u32::MAX, &[1, 2, 3]).is_err());
        assert!(m.load_physical(u32::MAX - 1, &[1, 2]).is_err());
        assert_eq!(m.load_physical(0o77_776, &[1, 2]), Ok(()));
        assert!(m.load_physical(0o77_777, &[1, 2]).is_err());
    }

    #[test]
    fn addresses_are_checked() {
        let m = machine(32_768);
        assert_eq!(
            m.examine(0o100_000, ConsoleMap::System),
            Err(ConsoleError::AddressOutOfRange {
                address: 0o100_000,
                map: ConsoleMap::System
            })
        );
        assert!(matches!(
            m.examine(0o100_000, ConsoleMap::Physical),
            Err(ConsoleError::NonexistentMemory(_))
        ));
    }

    fn sample_loader() -> LoaderImage {
        let mut words = vec![0; LOADER_WORDS];
        words[0] = 0o107_700; // CLC 0,C
        words[1] = 0o102_710; // STC 10
        words[2] = 0o102_310; // SFS 10
        words[3] = 0o102_077; // HLT 77
        words[4] = 0o102_501; // LIA 1
        words[5] = 0o120_000; // DMA control word
        words[6] = 0; // first word address
        LoaderImage {
            words,
            start_index: 0,
            dma_index: Some(5),
            fwa_index: Some(6),
        }
    }

    #[test]
    fn loader_is_configured_for_its_device() {
        let mut m = machine(16_384);
        m.registers_mut().s = 0o177_777;
        let base = m
            .copy_loader_image(
                &sample_loader(),
                sc!(0o23),
                SwitchPresets {
                    set: 0o000_023,
                    clear: 0o000_077,
                },
            )
            .expect("loader should install");
        assert_eq!(u16::from(base), 0o37_700);
        let word = |offset: u32| {
            m.examine(u32::from(u16::from(base)) + offset, ConsoleMap::Physical)
                .expect("loader word")
        };
        assert_eq!(word(0), 0o107_700);
        assert_eq!(word(1), 0o102_723);
        assert_eq!(word(2), 0o102_323);
        assert_eq!(word(3), 0o102_077);
        assert_eq!(word(4), 0o102_501);
        assert_eq!(word(5), 0o120_023);
        assert_eq!(word(6), 0o37_700u16.wrapping_neg());
        assert_eq!(m.registers().p, base);
        assert_eq!(m.registers().s, 0o177_723);
    }

    #[test]
    fn loader_base_is_within_32k() {
        let mut m = machine(131_072);
        let base = m
            .copy_loader_image(&sample_loader(), sc!(0o10), SwitchPresets::default())
            .expect("loader should install");
        assert_eq!(u16::from(base), 0o77_700);
    }

    #[test]
    fn loader_rejects_reserved_select_codes() {
        let mut m = machine(32_768);
        assert_eq!(
            m.copy_loader_image(&sample_loader(), sc!(0o7), SwitchPresets::default()),
            Err(LoaderError::ReservedSelectCode(sc!(0o7)))
        );
    }
}
