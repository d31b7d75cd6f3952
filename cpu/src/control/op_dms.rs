//! The Dynamic Mapping System instructions.
//!
//! Instructions which load the maps, move data into the alternate
//! map, or change the mapping state are privileged: executed with
//! memory protect on, they cause a privileged-instruction violation.
//! The map transfer instructions which store map registers to memory
//! are not privileged.
use tracing::{event, Level};

use base::prelude::*;

use super::{AccessClass, Completion, Exception, OpcodeResult};
use crate::machine::Machine;
use crate::mmu::{ViolationCause, MAP_REGISTERS};

/// Bit 15 of the A or B register selects storing (rather than
/// loading) for SYA, USA, PAA and PBA.
const STORE_MAP: u16 = SIGN_BIT;

/// The total number of map registers addressed by XMM and XMS.
const ALL_MAP_REGISTERS: u16 = (4 * MAP_REGISTERS) as u16;

fn map_register_location(n: u16) -> (MapId, usize) {
    let n = usize::from(n % ALL_MAP_REGISTERS);
    (MapId::from_index(n / MAP_REGISTERS), n % MAP_REGISTERS)
}

impl Machine {
    pub(crate) fn op_dms(&mut self, op: DmsOp, word: u16) -> OpcodeResult {
        use DmsOp::*;
        if op.is_privileged() {
            self.privileged()?;
        }
        match op {
            Mbi => self.move_bytes(AccessClass::Data, AccessClass::AltData)?,
            Mbf => self.move_bytes(AccessClass::AltData, AccessClass::Data)?,
            Mbw => self.move_bytes(AccessClass::AltData, AccessClass::AltData)?,
            Mwi => self.move_words(AccessClass::Data, AccessClass::AltData)?,
            Mwf => self.move_words(AccessClass::AltData, AccessClass::Data)?,
            Mww => self.move_words(AccessClass::AltData, AccessClass::AltData)?,
            LoadStoreMap(reg, map) => self.transfer_map(reg, map)?,
            Ssm => {
                let addr = self.fetch_operand_address()?;
                let status = self.mmu.status_register(self.mp.is_enabled());
                self.write(AccessClass::Data, addr, status)?;
            }
            Jrs => {
                let status_addr = self.fetch_operand_address()?;
                let target = self.fetch_operand_address()?;
                let status = self.read(AccessClass::Data, status_addr)?;
                self.mmu.restore_status(status);
                let map = self.mmu.current_map();
                self.check_jump(target, 0, map)?;
                self.regs.p = target;
            }
            Xmm => self.transfer_map_registers()?,
            Xms => {
                while self.regs.x != 0 {
                    let (map, page) = map_register_location(self.regs.a);
                    self.mmu.set_map_register(map, page, self.regs.b);
                    self.regs.a = self.regs.a.wrapping_add(1);
                    self.regs.b = self.regs.b.wrapping_add(1);
                    self.regs.x = self.regs.x.wrapping_sub(1);
                }
            }
            Xmx(_) => return self.unimplemented(word),
            Xlx(reg) => {
                let addr = self.fetch_operand_address()?;
                let value = self.read(AccessClass::AltData, addr)?;
                self.regs.set_accumulator(reg, value);
            }
            Xsx(reg) => {
                let addr = self.fetch_operand_address()?;
                self.write(AccessClass::AltData, addr, self.regs.accumulator(reg))?;
            }
            Xcx(reg) => {
                let addr = self.fetch_operand_address()?;
                if self.read(AccessClass::AltData, addr)? != self.regs.accumulator(reg) {
                    self.skip();
                }
            }
            Lfx(reg) => {
                self.mmu.load_fence(self.regs.accumulator(reg));
            }
            Rsx(reg) => {
                let status = self.mmu.status_register(self.mp.is_enabled());
                self.regs.set_accumulator(reg, status);
            }
            Rvx(reg) => {
                let violation = self.mmu.violation_register();
                self.regs.set_accumulator(reg, violation);
            }
            Djp | Djs | Sjp | Sjs | Ujp | Ujs => {
                let target = self.fetch_operand_address()?;
                match op {
                    Djp | Djs => self.mmu.disable(),
                    Sjp | Sjs => self.mmu.enable(MapId::System),
                    _ => self.mmu.enable(MapId::User),
                }
                let map = self.mmu.current_map();
                self.check_jump(target, 0, map)?;
                if matches!(op, Djs | Sjs | Ujs) {
                    self.write(AccessClass::Data, target, u16::from(self.regs.p))?;
                    self.regs.p = target.successor();
                } else {
                    self.regs.p = target;
                }
            }
        }
        if op.defers_interrupts() {
            Ok(Completion::Deferring)
        } else {
            Ok(Completion::Normal)
        }
    }

    /// Refuse a privileged operation when memory protect is on.
    fn privileged(&mut self) -> Result<(), Exception> {
        if self.mp.is_enabled() {
            let map = self.mmu.current_map();
            self.mapping_violation(ViolationCause::Privileged, map, self.err_p)?;
        }
        Ok(())
    }

    /// SYA, USA, PAA, PBA and the B forms: the register holds the
    /// memory address of a 32-word block and, in bit 15, the
    /// direction.  The register is advanced past the block.
    fn transfer_map(&mut self, reg: Accumulator, map: MapId) -> Result<(), Exception> {
        let control = self.regs.accumulator(reg);
        let store = control & STORE_MAP != 0;
        if !store {
            self.privileged()?;
        }
        let mut addr = LogicalAddress::from_word(control);
        for page in 0..MAP_REGISTERS {
            if store {
                let value = self.mmu.map_register(map, page);
                self.write(AccessClass::Data, addr, value)?;
            } else {
                let value = self.read(AccessClass::Data, addr)?;
                self.mmu.set_map_register(map, page, value);
            }
            addr = addr.successor();
        }
        event!(
            Level::DEBUG,
            "{} the {map} map at {:06o}",
            if store { "stored" } else { "loaded" },
            control & LogicalAddress::MASK
        );
        self.regs
            .set_accumulator(reg, (control & STORE_MAP) | u16::from(addr));
        Ok(())
    }

    /// XMM: A holds the first map register number (0 to 127), B the
    /// memory address and X the count; a positive count loads the map
    /// registers from memory and a negative one stores them.
    fn transfer_map_registers(&mut self) -> Result<(), Exception> {
        if self.regs.x == 0 {
            return Ok(());
        }
        let store = self.regs.x & SIGN_BIT != 0;
        if !store {
            self.privileged()?;
        }
        while self.regs.x != 0 {
            let (map, page) = map_register_location(self.regs.a);
            let addr = LogicalAddress::from_word(self.regs.b);
            if store {
                let value = self.mmu.map_register(map, page);
                self.write(AccessClass::Data, addr, value)?;
                self.regs.x = self.regs.x.wrapping_add(1);
            } else {
                let value = self.read(AccessClass::Data, addr)?;
                self.mmu.set_map_register(map, page, value);
                self.regs.x = self.regs.x.wrapping_sub(1);
            }
            self.regs.a = self.regs.a.wrapping_add(1);
            self.regs.b = self.regs.b.wrapping_add(1);
        }
        Ok(())
    }

    /// MWI, MWF, MWW: move X words from the address in A to the
    /// address in B.
    fn move_words(&mut self, from: AccessClass, to: AccessClass) -> Result<(), Exception> {
        while self.regs.x != 0 {
            let value = self.read(from, LogicalAddress::from_word(self.regs.a))?;
            self.write(to, LogicalAddress::from_word(self.regs.b), value)?;
            self.regs.a = self.regs.a.wrapping_add(1);
            self.regs.b = self.regs.b.wrapping_add(1);
            self.regs.x = self.regs.x.wrapping_sub(1);
        }
        Ok(())
    }

    /// MBI, MBF, MBW: move X bytes from the byte address in A to the
    /// byte address in B.
    fn move_bytes(&mut self, from: AccessClass, to: AccessClass) -> Result<(), Exception> {
        while self.regs.x != 0 {
            let source = self.read(from, LogicalAddress::from_word(self.regs.a >> 1))?;
            let byte = if self.regs.a & 1 == 0 {
                source >> 8
            } else {
                source & 0o377
            };
            let dest_addr = LogicalAddress::from_word(self.regs.b >> 1);
            let dest = self.read(to, dest_addr)?;
            let merged = if self.regs.b & 1 == 0 {
                (dest & 0o377) | (byte << 8)
            } else {
                (dest & 0o177_400) | byte
            };
            self.write(to, dest_addr, merged)?;
            self.regs.a = self.regs.a.wrapping_add(1);
            self.regs.b = self.regs.b.wrapping_add(1);
            self.regs.x = self.regs.x.wrapping_sub(1);
        }
        Ok(())
    }
}

#[test]
fn test_map_register_numbering() {
    assert_eq!(map_register_location(0), (MapId::System, 0));
    assert_eq!(map_register_location(31), (MapId::System, 31));
    assert_eq!(map_register_location(32), (MapId::User, 0));
    assert_eq!(map_register_location(0o177), (MapId::PortB, 31));
}
