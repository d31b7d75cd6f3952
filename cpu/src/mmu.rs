//! The Dynamic Mapping System (DMS).
//!
//! The mapping unit translates 15-bit logical addresses into 20-bit
//! physical addresses.  There are four maps of 32 registers each
//! (one register per 1K-word logical page): the system and user
//! maps serve the processor, and the port A and port B maps serve
//! DMA channels 1 and 2.
//!
//! ## Map register
//!
//! | 15 | 14 | 13-10  | 9-0           |
//! | -- | -- | ------ | ------------- |
//! | RP | WP | unused | physical page |
//!
//! ## Status register (RSA/RSB, SSM)
//!
//! | 15        | 14        | 13  | 12  | 11 | 10  | 9-0   |
//! | --------- | --------- | --- | --- | -- | --- | ----- |
//! | enb @ int | ump @ int | enb | ump | MP | FLT | fence |
//!
//! ## Violation register (RVA/RVB)
//!
//! | 15  | 14  | 13  | 12  | 11-8 | 7   | 6  | 5   | 4-0  |
//! | --- | --- | --- | --- | ---- | --- | -- | --- | ---- |
//! | RPR | WPR | BPG | PRV |      | enb | MP | ump | page |
//!
//! Logical addresses 0 and 1 are never translated, since for the
//! processor they are the A and B registers.  On the base page,
//! addresses on one side of the base-page fence are not translated
//! either; which side is chosen by the FLT bit.
use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

pub const MAP_REGISTERS: usize = LOGICAL_PAGES;

/// Read-protect bit of a map register.
pub const MAP_READ_PROTECT: u16 = 0o100_000;
/// Write-protect bit of a map register.
pub const MAP_WRITE_PROTECT: u16 = 0o040_000;
/// The bits of a map register which we store.
pub const MAP_REGISTER_MASK: u16 = MAP_READ_PROTECT | MAP_WRITE_PROTECT | PHYSICAL_PAGE_MASK;
const PHYSICAL_PAGE_MASK: u16 = 0o1777;

const STATUS_ENABLED_AT_INTERRUPT: u16 = 0o100_000;
const STATUS_USER_AT_INTERRUPT: u16 = 0o040_000;
const STATUS_ENABLED: u16 = 0o020_000;
const STATUS_USER: u16 = 0o010_000;
const STATUS_PROTECT: u16 = 0o004_000;
/// The fence direction bit, as used in the status register and by
/// LFA/LFB.
pub const FENCE_LOWER_UNMAPPED: u16 = 0o002_000;
const FENCE_MASK: u16 = 0o001_777;

/// Why a mapped access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationCause {
    ReadProtect,
    WriteProtect,
    /// A write to the untranslated part of the base page.
    BasePage,
    /// A privileged instruction was executed with memory protect on.
    Privileged,
}

impl ViolationCause {
    fn register_bit(&self) -> u16 {
        match self {
            ViolationCause::ReadProtect => 0o100_000,
            ViolationCause::WriteProtect => 0o040_000,
            ViolationCause::BasePage => 0o020_000,
            ViolationCause::Privileged => 0o010_000,
        }
    }
}

/// The most recent mapping violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViolationRecord {
    pub cause: ViolationCause,
    pub map: MapId,
    pub page: usize,
    pub mapping_enabled: bool,
    pub protect_enabled: bool,
}

impl ViolationRecord {
    /// The record in the format read by RVA/RVB.
    pub fn register(&self) -> u16 {
        let mut word = self.cause.register_bit() | (self.page as u16 & 0o37);
        if self.mapping_enabled {
            word |= 0o200;
        }
        if self.protect_enabled {
            word |= 0o100;
        }
        if self.map == MapId::User {
            word |= 0o040;
        }
        word
    }
}

/// Which protection bit, if any, an access is subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Unprotected,
    Read,
    Write,
}

/// The result of a translation.  When there is a violation, the
/// physical address is still valid; whether the access goes ahead
/// is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub physical: PhysicalAddress,
    pub violation: Option<ViolationCause>,
}

#[derive(Debug)]
pub struct Mmu {
    maps: [[u16; MAP_REGISTERS]; 4],
    enabled: bool,
    user_map: bool,
    fence: u16,
    fence_lower_unmapped: bool,
    enabled_at_interrupt: bool,
    user_at_interrupt: bool,
    violation: Option<ViolationRecord>,
    frozen: bool,
}

impl Default for Mmu {
    fn default() -> Mmu {
        Mmu::new()
    }
}

impl Mmu {
    pub fn new() -> Mmu {
        Mmu {
            maps: [[0; MAP_REGISTERS]; 4],
            enabled: false,
            user_map: false,
            fence: 0,
            fence_lower_unmapped: false,
            enabled_at_interrupt: false,
            user_at_interrupt: false,
            violation: None,
            frozen: false,
        }
    }

    /// Power-on reset: mapping is disabled and the system map is
    /// selected.  The map registers themselves keep their contents.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.user_map = false;
        self.enabled_at_interrupt = false;
        self.user_at_interrupt = false;
        self.violation = None;
        self.frozen = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The map used for the processor's own accesses.
    pub fn current_map(&self) -> MapId {
        if self.user_map {
            MapId::User
        } else {
            MapId::System
        }
    }

    /// The processor map which is not currently selected.
    pub fn alternate_map(&self) -> MapId {
        if self.user_map {
            MapId::System
        } else {
            MapId::User
        }
    }

    /// Enable mapping through the system or user map.
    pub fn enable(&mut self, map: MapId) {
        event!(Level::DEBUG, "mapping enabled with the {map} map");
        self.enabled = true;
        self.user_map = map == MapId::User;
    }

    pub fn disable(&mut self) {
        event!(Level::DEBUG, "mapping disabled");
        self.enabled = false;
    }

    pub fn map_register(&self, map: MapId, page: usize) -> u16 {
        self.maps[map.index()][page % MAP_REGISTERS]
    }

    pub fn set_map_register(&mut self, map: MapId, page: usize, value: u16) {
        self.maps[map.index()][page % MAP_REGISTERS] = value & MAP_REGISTER_MASK;
    }

    /// Load the base-page fence and its direction from a word laid out
    /// as bits 10-0 of the status register.
    pub fn load_fence(&mut self, word: u16) {
        self.fence = word & FENCE_MASK;
        self.fence_lower_unmapped = word & FENCE_LOWER_UNMAPPED != 0;
    }

    pub fn status_register(&self, protect_enabled: bool) -> u16 {
        let mut word = self.fence;
        for (set, bit) in [
            (self.enabled_at_interrupt, STATUS_ENABLED_AT_INTERRUPT),
            (self.user_at_interrupt, STATUS_USER_AT_INTERRUPT),
            (self.enabled, STATUS_ENABLED),
            (self.user_map, STATUS_USER),
            (protect_enabled, STATUS_PROTECT),
            (self.fence_lower_unmapped, FENCE_LOWER_UNMAPPED),
        ] {
            if set {
                word |= bit;
            }
        }
        word
    }

    /// Restore the mapping state from bits 15 (enable) and 14 (user
    /// map) of a saved status word, as JRS does.
    pub fn restore_status(&mut self, word: u16) {
        self.enabled = word & STATUS_ENABLED_AT_INTERRUPT != 0;
        self.user_map = word & STATUS_USER_AT_INTERRUPT != 0;
        event!(
            Level::DEBUG,
            "mapping status restored: enabled={} map={}",
            self.enabled,
            self.current_map()
        );
    }

    /// Interrupt entry latches the mapping state and switches to the
    /// system map.
    pub fn enter_interrupt(&mut self) {
        self.enabled_at_interrupt = self.enabled;
        self.user_at_interrupt = self.user_map;
        self.user_map = false;
    }

    fn base_page_unmapped(&self, addr: LogicalAddress) -> bool {
        let offset = addr.offset();
        if self.fence_lower_unmapped {
            offset < self.fence
        } else {
            offset >= self.fence
        }
    }

    /// Translate `addr` through `map`.
    ///
    /// When mapping is disabled, logical and physical addresses are
    /// identical.  Logical addresses 0 and 1 are never translated.
    pub fn translate(&self, addr: LogicalAddress, map: MapId, protection: Protection) -> Translation {
        if !self.enabled {
            return Translation {
                physical: PhysicalAddress::unmapped(addr),
                violation: None,
            };
        }
        self.lookup(addr, map, protection)
    }

    /// Translate `addr` through `map` whether or not mapping is
    /// enabled.
    pub fn lookup(&self, addr: LogicalAddress, map: MapId, protection: Protection) -> Translation {
        let processor_map = matches!(map, MapId::System | MapId::User);
        if processor_map && addr.is_accumulator() {
            return Translation {
                physical: PhysicalAddress::unmapped(addr),
                violation: None,
            };
        }
        if processor_map && addr.page() == 0 && self.base_page_unmapped(addr) {
            return Translation {
                physical: PhysicalAddress::unmapped(addr),
                violation: (protection == Protection::Write).then_some(ViolationCause::BasePage),
            };
        }
        let reg = self.map_register(map, addr.page());
        let violation = match protection {
            Protection::Read if reg & MAP_READ_PROTECT != 0 => Some(ViolationCause::ReadProtect),
            Protection::Write if reg & MAP_WRITE_PROTECT != 0 => Some(ViolationCause::WriteProtect),
            _ => None,
        };
        Translation {
            physical: PhysicalAddress::from_page_and_offset(reg & PHYSICAL_PAGE_MASK, addr.offset()),
            violation,
        }
    }

    /// Update the violation record, unless it is frozen.
    pub fn record_violation(
        &mut self,
        cause: ViolationCause,
        map: MapId,
        addr: LogicalAddress,
        protect_enabled: bool,
    ) {
        if self.frozen {
            event!(
                Level::TRACE,
                "violation record is frozen; not recording {cause:?} at {addr}"
            );
            return;
        }
        self.violation = Some(ViolationRecord {
            cause,
            map,
            page: addr.page(),
            mapping_enabled: self.enabled,
            protect_enabled,
        });
    }

    /// Freeze the violation record (because the violation caused an
    /// abort).
    pub fn freeze_violation(&mut self) {
        self.frozen = true;
    }

    /// Re-arm the violation record.  This happens whenever memory
    /// protect is turned off.
    pub fn unfreeze_violation(&mut self) {
        self.frozen = false;
    }

    /// True when a violation has aborted an instruction since the
    /// record was last re-armed.
    pub fn violation_frozen(&self) -> bool {
        self.frozen
    }

    pub fn violation(&self) -> Option<ViolationRecord> {
        self.violation
    }

    pub fn violation_register(&self) -> u16 {
        self.violation.map(|v| v.register()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    fn addr(n: u16) -> LogicalAddress {
        LogicalAddress::try_from(n).expect("valid test address")
    }

    #[test]
    fn disabled_mapping_is_identity() {
        let mut mmu = Mmu::new();
        mmu.set_map_register(MapId::System, 1, 0o17);
        let t = mmu.translate(addr(0o2345), MapId::System, Protection::Write);
        assert_eq!(u32::from(t.physical), 0o2345);
        assert_eq!(t.violation, None);
    }

    #[test]
    fn mapped_page_translation() {
        let mut mmu = Mmu::new();
        mmu.set_map_register(MapId::User, 3, 0o1234);
        mmu.enable(MapId::User);
        let t = mmu.translate(addr(0o6010), MapId::User, Protection::Read);
        assert_eq!(t.physical, PhysicalAddress::from_page_and_offset(0o1234, 0o10));
        assert_eq!(t.violation, None);
    }

    #[test]
    fn write_protected_page() {
        let mut mmu = Mmu::new();
        mmu.set_map_register(MapId::System, 2, MAP_WRITE_PROTECT | 7);
        mmu.enable(MapId::System);
        let t = mmu.translate(addr(0o4000), MapId::System, Protection::Write);
        assert_eq!(t.violation, Some(ViolationCause::WriteProtect));
        let t = mmu.translate(addr(0o4000), MapId::System, Protection::Read);
        assert_eq!(t.violation, None);
    }

    #[test]
    fn base_page_fence() {
        let mut mmu = Mmu::new();
        mmu.set_map_register(MapId::System, 0, 0o40);
        mmu.enable(MapId::System);
        // Addresses at and above 0100 are not translated.
        mmu.load_fence(0o100);
        let t = mmu.translate(addr(0o50), MapId::System, Protection::Write);
        assert_eq!(t.physical, PhysicalAddress::from_page_and_offset(0o40, 0o50));
        assert_eq!(t.violation, None);
        let t = mmu.translate(addr(0o150), MapId::System, Protection::Write);
        assert_eq!(u32::from(t.physical), 0o150);
        assert_eq!(t.violation, Some(ViolationCause::BasePage));
        // Reads of the untranslated region are fine.
        let t = mmu.translate(addr(0o150), MapId::System, Protection::Read);
        assert_eq!(t.violation, None);

        // Now the region below the fence is the untranslated one.
        mmu.load_fence(FENCE_LOWER_UNMAPPED | 0o100);
        let t = mmu.translate(addr(0o50), MapId::System, Protection::Write);
        assert_eq!(t.violation, Some(ViolationCause::BasePage));
        let t = mmu.translate(addr(0o150), MapId::System, Protection::Write);
        assert_eq!(t.violation, None);

        // The accumulators are never translated.
        let t = mmu.translate(addr(1), MapId::System, Protection::Write);
        assert_eq!(t.violation, None);
        assert_eq!(u32::from(t.physical), 1);
    }

    #[test]
    fn dma_maps_have_no_base_page_fence() {
        let mut mmu = Mmu::new();
        mmu.set_map_register(MapId::PortA, 0, 0o22);
        mmu.enable(MapId::System);
        let t = mmu.translate(addr(0), MapId::PortA, Protection::Unprotected);
        assert_eq!(t.physical, PhysicalAddress::from_page_and_offset(0o22, 0));
    }

    #[test]
    fn violation_record_freezes() {
        let mut mmu = Mmu::new();
        mmu.enable(MapId::User);
        mmu.record_violation(ViolationCause::WriteProtect, MapId::User, addr(0o24_345), true);
        mmu.freeze_violation();
        mmu.record_violation(ViolationCause::ReadProtect, MapId::System, addr(0o2000), true);
        let v = mmu.violation().expect("a violation was recorded");
        assert_eq!(v.cause, ViolationCause::WriteProtect);
        assert_eq!(v.map, MapId::User);
        assert_eq!(v.page, 0o12);
        assert_eq!(mmu.violation_register(), 0o040_000 | 0o200 | 0o100 | 0o040 | 0o12);
        mmu.unfreeze_violation();
        mmu.record_violation(ViolationCause::ReadProtect, MapId::System, addr(0o2000), false);
        assert_eq!(mmu.violation_register(), 0o100_000 | 0o200 | 1);
    }

    #[test]
    fn interrupt_entry_latches_status() {
        let mut mmu = Mmu::new();
        mmu.load_fence(0o1777);
        mmu.enable(MapId::User);
        mmu.enter_interrupt();
        assert_eq!(mmu.current_map(), MapId::System);
        let status = mmu.status_register(false);
        assert_eq!(status, 0o100_000 | 0o040_000 | 0o020_000 | 0o1777);
        mmu.restore_status(status);
        assert_eq!(mmu.current_map(), MapId::User);
        assert!(mmu.is_enabled());
    }

    #[proptest]
    fn unprotected_translation_matches_physical_layout(
        #[strategy(0usize..4)] map_index: usize,
        #[strategy(1usize..32)] page: usize,
        #[strategy(0u16..0o2000)] offset: u16,
        #[strategy(0u16..0o2000)] physical_page: u16,
    ) {
        let map = MapId::from_index(map_index);
        let mut mmu = Mmu::new();
        mmu.set_map_register(map, page, physical_page);
        mmu.enable(MapId::System);
        let logical = LogicalAddress::from_word(((page as u16) << 10) | offset);
        for protection in [Protection::Unprotected, Protection::Read, Protection::Write] {
            let t = mmu.translate(logical, map, protection);
            assert_eq!(t.violation, None);
            assert_eq!(
                u32::from(t.physical),
                (u32::from(physical_page) << 10) | u32::from(offset)
            );
        }
    }
}
