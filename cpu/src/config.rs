//! Configuration of the simulated processor: which model it is, how
//! much memory it has and which options are installed.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use base::prelude::*;

/// The largest indirect chain length the user may configure.
pub const MAX_INDIRECT_LIMIT: u32 = 32_768;

/// The default indirect chain length.
pub const DEFAULT_INDIRECT_LIMIT: u32 = 16;

/// The processor models we can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuModel {
    Hp2100,
    Hp1000M,
    Hp1000E,
    Hp1000F,
}

impl CpuModel {
    pub const fn all() -> [CpuModel; 4] {
        [
            CpuModel::Hp2100,
            CpuModel::Hp1000M,
            CpuModel::Hp1000E,
            CpuModel::Hp1000F,
        ]
    }

    pub fn is_1000_series(&self) -> bool {
        !matches!(self, CpuModel::Hp2100)
    }

    /// The largest memory the model can address.
    pub fn max_memory_words(&self) -> u32 {
        match self {
            CpuModel::Hp2100 => 32_768,
            _ => MAX_PHYSICAL_WORDS,
        }
    }

    /// The memory cycle time, which we use as the (advisory) unit of
    /// instruction timing.
    pub fn memory_cycle(&self) -> Duration {
        match self {
            CpuModel::Hp2100 => Duration::from_nanos(980),
            CpuModel::Hp1000M => Duration::from_nanos(650),
            CpuModel::Hp1000E | CpuModel::Hp1000F => Duration::from_nanos(560),
        }
    }
}

impl Display for CpuModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            CpuModel::Hp2100 => "2100",
            CpuModel::Hp1000M => "1000-M",
            CpuModel::Hp1000E => "1000-E",
            CpuModel::Hp1000F => "1000-F",
        })
    }
}

#[derive(Debug)]
pub struct UnknownModelName(String);

impl Display for UnknownModelName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown CPU model '{}'", self.0)
    }
}

impl Error for UnknownModelName {}

impl TryFrom<&str> for CpuModel {
    type Error = UnknownModelName;
    fn try_from(s: &str) -> Result<CpuModel, UnknownModelName> {
        match s.to_ascii_uppercase().as_str() {
            "2100" | "HP2100" => Ok(CpuModel::Hp2100),
            "1000-M" | "1000M" | "M" => Ok(CpuModel::Hp1000M),
            "1000-E" | "1000E" | "E" => Ok(CpuModel::Hp1000E),
            "1000-F" | "1000F" | "F" => Ok(CpuModel::Hp1000F),
            _ => Err(UnknownModelName(s.to_owned())),
        }
    }
}

#[test]
fn test_model_name_round_trip() {
    for model in CpuModel::all() {
        let name = model.to_string();
        match CpuModel::try_from(name.as_str()) {
            Ok(m) => {
                assert_eq!(m, model);
            }
            Err(_) => {
                panic!("unable to round-trip model {model:?}");
            }
        }
    }
    assert!(CpuModel::try_from("9825").is_err());
}

/// Installed options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuOptions {
    /// Extended arithmetic unit (MPY, DIV, DLD, DST, double shifts).
    pub eau: bool,
    /// Memory protect.
    pub memory_protect: bool,
    /// Dual-channel DMA.
    pub dma: bool,
    /// The Dynamic Mapping System.
    pub dms: bool,
    /// The extended instruction group (index registers, byte and bit
    /// instructions).
    pub eig: bool,
}

impl CpuOptions {
    /// Every option the model can have.
    pub fn fully_equipped(model: CpuModel) -> CpuOptions {
        let is_1000 = model.is_1000_series();
        CpuOptions {
            eau: true,
            memory_protect: true,
            dma: true,
            dms: is_1000,
            eig: is_1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuConfiguration {
    pub model: CpuModel,
    pub memory_words: u32,
    pub options: CpuOptions,
    pub indirect_limit: u32,
}

impl Default for CpuConfiguration {
    fn default() -> CpuConfiguration {
        CpuConfiguration::new(CpuModel::Hp1000E)
    }
}

impl CpuConfiguration {
    /// A fully-equipped machine of the given model with 32K words
    /// of memory.
    pub fn new(model: CpuModel) -> CpuConfiguration {
        CpuConfiguration {
            model,
            memory_words: 32_768,
            options: CpuOptions::fully_equipped(model),
            indirect_limit: DEFAULT_INDIRECT_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.memory_words == 0 || self.memory_words % PAGE_SIZE != 0 {
            return Err(ConfigurationError::MemoryNotWholePages(self.memory_words));
        }
        if self.memory_words > self.model.max_memory_words() {
            return Err(ConfigurationError::MemoryTooLarge {
                model: self.model,
                words: self.memory_words,
            });
        }
        if !self.model.is_1000_series() {
            if self.options.dms {
                return Err(ConfigurationError::OptionNotAvailable {
                    model: self.model,
                    option: "DMS",
                });
            }
            if self.options.eig {
                return Err(ConfigurationError::OptionNotAvailable {
                    model: self.model,
                    option: "EIG",
                });
            }
        }
        if self.options.dms && !self.options.memory_protect {
            // The mapping system reports its violations through the
            // memory protect interrupt.
            return Err(ConfigurationError::OptionRequires {
                option: "DMS",
                requires: "memory protect",
            });
        }
        if self.indirect_limit == 0 || self.indirect_limit > MAX_INDIRECT_LIMIT {
            return Err(ConfigurationError::IndirectLimitOutOfRange(
                self.indirect_limit,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    MemoryNotWholePages(u32),
    MemoryTooLarge {
        model: CpuModel,
        words: u32,
    },
    OptionNotAvailable {
        model: CpuModel,
        option: &'static str,
    },
    OptionRequires {
        option: &'static str,
        requires: &'static str,
    },
    IndirectLimitOutOfRange(u32),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConfigurationError::MemoryNotWholePages(words) => write!(
                f,
                "memory size {words} is not a positive multiple of {PAGE_SIZE} words"
            ),
            ConfigurationError::MemoryTooLarge { model, words } => write!(
                f,
                "the {model} cannot address {words} words of memory (the maximum is {})",
                model.max_memory_words()
            ),
            ConfigurationError::OptionNotAvailable { model, option } => {
                write!(f, "the {option} option is not available on the {model}")
            }
            ConfigurationError::OptionRequires { option, requires } => {
                write!(f, "the {option} option requires {requires}")
            }
            ConfigurationError::IndirectLimitOutOfRange(n) => write!(
                f,
                "indirect chain limit {n} is outside the range 1 to {MAX_INDIRECT_LIMIT}"
            ),
        }
    }
}

impl Error for ConfigurationError {}
