//! The memory protect accessory (select code 05).
//!
//! With protection on, writes to logical addresses below the fence
//! and jumps to targets below the fence are refused, as are halts
//! and I/O instructions addressed to anything except select code 01.
//! A refused operation aborts the instruction, and the address of
//! the offending instruction is latched in the violation register.
//!
//! | Instruction | Effect                                                 |
//! | ----------- | ------------------------------------------------------ |
//! | STC 5       | Enable protection, re-arm the violation register,      |
//! |             | clear the mapping-violation flip-flop                  |
//! | CLC 5       | Disable protection (so does any interrupt acknowledge) |
//! | OTA 5       | Load the fence                                         |
//! | LIA 5       | Read the violation register                            |
//! | SFS/SFC 5   | Test the mapping-violation flip-flop                   |
use tracing::{event, Level};

use base::prelude::*;

use crate::io::{InboundSet, InboundSignal, OutboundSet, OutboundSignal};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProtect {
    /// Protection is on.
    control: bool,
    fence: LogicalAddress,
    /// The address of the last instruction which caused a violation.
    violation: LogicalAddress,
    /// When set, the next violation is latched in `violation`.
    violation_register_enabled: bool,
    /// Set when a mapping unit violation aborts an instruction; this
    /// is what SFS 5 and SFC 5 test.
    mapping_violation: bool,
    flag: bool,
    flag_buffer: bool,
}

impl MemoryProtect {
    pub fn new() -> MemoryProtect {
        MemoryProtect::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.control
    }

    pub fn enable(&mut self) {
        event!(Level::DEBUG, "memory protect enabled, fence {}", self.fence);
        self.control = true;
        self.violation_register_enabled = true;
    }

    pub fn disable(&mut self) {
        if self.control {
            event!(Level::DEBUG, "memory protect disabled");
        }
        self.control = false;
    }

    pub fn fence(&self) -> LogicalAddress {
        self.fence
    }

    pub fn set_fence(&mut self, word: u16) {
        self.fence = LogicalAddress::from_word(word);
    }

    pub fn violation_register(&self) -> LogicalAddress {
        self.violation
    }

    pub fn violation_register_enabled(&self) -> bool {
        self.violation_register_enabled
    }

    /// Latch the address of a violating instruction, unless a
    /// violation has already been latched since protection was last
    /// enabled.
    pub fn latch_violation(&mut self, instruction_address: LogicalAddress) {
        if self.violation_register_enabled {
            self.violation = instruction_address;
            self.violation_register_enabled = false;
        }
    }

    /// Note that a mapping unit violation aborted an instruction.
    pub fn note_mapping_violation(&mut self) {
        self.mapping_violation = true;
    }

    pub fn mapping_violation(&self) -> bool {
        self.mapping_violation
    }

    /// True when a write to `addr` must be refused.  Addresses 0 and
    /// 1 (the accumulators) are always writable.
    pub fn write_violates(&self, addr: LogicalAddress) -> bool {
        self.control && !addr.is_accumulator() && addr < self.fence
    }

    /// True when a jump to `target` must be refused.  Targets below
    /// `lower_bound` are exempt.
    pub fn jump_violates(&self, target: LogicalAddress, lower_bound: u16) -> bool {
        self.control && u16::from(target) >= lower_bound && target < self.fence
    }

    /// Request the violation interrupt.
    pub fn request_interrupt(&mut self) {
        self.flag_buffer = true;
        self.flag = true;
    }

    pub fn outbound(&self) -> OutboundSet {
        let mut outbound = OutboundSet::EMPTY;
        outbound.set_if(OutboundSignal::Prl, !self.flag);
        outbound.set_if(OutboundSignal::Irq, self.flag && self.flag_buffer);
        outbound
    }

    /// Handle the backplane signals sent to select code 05.
    /// Returns the outbound signals and the input data.
    pub fn interface(&mut self, signals: InboundSet, data: u16) -> (OutboundSet, u16) {
        let mut skip = false;
        let mut input = 0;
        for signal in signals.iter() {
            match signal {
                InboundSignal::Pon | InboundSignal::Popio => {
                    self.flag = false;
                    self.flag_buffer = false;
                }
                InboundSignal::Crs | InboundSignal::Clc => {
                    self.disable();
                }
                InboundSignal::Stc => {
                    self.flag = false;
                    self.flag_buffer = false;
                    self.mapping_violation = false;
                    self.enable();
                }
                InboundSignal::Ioo => {
                    self.set_fence(data);
                    event!(Level::DEBUG, "memory protect fence set to {}", self.fence);
                }
                InboundSignal::Ioi => {
                    input = u16::from(self.violation);
                }
                InboundSignal::Sfs => {
                    skip |= self.mapping_violation;
                }
                InboundSignal::Sfc => {
                    skip |= !self.mapping_violation;
                }
                InboundSignal::Clf => {
                    self.flag = false;
                    self.flag_buffer = false;
                }
                InboundSignal::Iak => {
                    self.flag_buffer = false;
                }
                InboundSignal::Enf
                | InboundSignal::Stf
                | InboundSignal::Edt
                | InboundSignal::Sir => (),
            }
        }
        let mut outbound = self.outbound();
        outbound.set_if(OutboundSignal::Skf, skip);
        (outbound, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u16) -> LogicalAddress {
        LogicalAddress::try_from(n).expect("valid test address")
    }

    #[test]
    fn fence_check() {
        let mut mp = MemoryProtect::new();
        mp.set_fence(0o2000);
        assert!(!mp.write_violates(addr(0o100)));
        mp.enable();
        assert!(mp.write_violates(addr(0o100)));
        assert!(mp.write_violates(addr(0o1777)));
        assert!(!mp.write_violates(addr(0o2000)));
        assert!(!mp.write_violates(addr(1)));
        assert!(!mp.jump_violates(addr(1), 2));
        assert!(mp.jump_violates(addr(1), 0));
        assert!(mp.jump_violates(addr(0o1000), 2));
        assert!(!mp.jump_violates(addr(0o3000), 2));
    }

    #[test]
    fn violation_register_latches_once() {
        let mut mp = MemoryProtect::new();
        mp.enable();
        mp.latch_violation(addr(0o4000));
        mp.latch_violation(addr(0o5000));
        assert_eq!(mp.violation_register(), addr(0o4000));
        mp.enable();
        mp.latch_violation(addr(0o5000));
        assert_eq!(mp.violation_register(), addr(0o5000));
    }

    #[test]
    fn interface_signals() {
        let mut mp = MemoryProtect::new();
        let (_, _) = mp.interface(InboundSignal::Ioo.into(), 0o102_000);
        assert_eq!(mp.fence(), addr(0o2000));
        mp.interface(InboundSignal::Stc.into(), 0);
        assert!(mp.is_enabled());
        mp.latch_violation(addr(0o3456));
        let (_, data) = mp.interface(InboundSignal::Ioi.into(), 0);
        assert_eq!(data, 0o3456);
        let (out, _) = mp.interface(InboundSignal::Sfc.into(), 0);
        assert!(out.contains(OutboundSignal::Skf));
        mp.note_mapping_violation();
        let (out, _) = mp.interface(InboundSignal::Sfs.into(), 0);
        assert!(out.contains(OutboundSignal::Skf));
        let (out, _) = mp.interface(InboundSignal::Sfc.into(), 0);
        assert!(!out.contains(OutboundSignal::Skf));

        mp.request_interrupt();
        let out = mp.outbound();
        assert!(out.contains(OutboundSignal::Irq));
        assert!(!out.contains(OutboundSignal::Prl));
        let (out, _) = mp.interface(InboundSignal::Iak.into(), 0);
        assert!(!out.contains(OutboundSignal::Irq));
        assert!(!out.contains(OutboundSignal::Prl));
        mp.interface(InboundSignal::Clc.into(), 0);
        assert!(!mp.is_enabled());
        // Only STC 5 clears the mapping-violation flip-flop.
        assert!(mp.mapping_violation());
        mp.interface(InboundSignal::Stc.into(), 0);
        assert!(!mp.mapping_violation());
    }
}
