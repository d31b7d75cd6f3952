use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use base::prelude::*;

use crate::config::{CpuConfiguration, CpuModel};
use crate::console::ConsoleMap;
use crate::context::Context;
use crate::dma::DmaChannelId;
use crate::io::{
    Device, InboundSet, InboundSignal, OutboundSignal, ServiceFailure, SignalResult,
    StandardInterface,
};
use crate::machine::Machine;
use crate::mmu::{
    ViolationCause, ViolationRecord, FENCE_LOWER_UNMAPPED, MAP_READ_PROTECT, MAP_WRITE_PROTECT,
};
use crate::stop::{Stop, StopDetails, StopKind};

const HLT_0: u16 = 0o102_000;

fn make_machine(config: CpuConfiguration) -> Machine {
    Machine::new(config).expect("test configuration should be valid")
}

fn standard_machine() -> Machine {
    make_machine(CpuConfiguration::new(CpuModel::Hp1000E))
}

fn load(m: &mut Machine, origin: u16, words: &[u16]) {
    m.load_physical(u32::from(origin), words)
        .expect("test program should fit in memory");
}

fn mem(m: &Machine, addr: u32) -> u16 {
    m.examine(addr, ConsoleMap::Physical)
        .expect("test address should exist")
}

fn run_until_stop(m: &mut Machine) -> Stop {
    match m.step(100_000) {
        Ok(()) => panic!("the machine should have stopped"),
        Err(stop) => stop,
    }
}

/// Set up the mapping system with identity system and user maps,
/// with the base page mapped, and mapping enabled on the system map.
fn identity_maps(m: &mut Machine) {
    for page in 0..32u16 {
        m.mmu_mut()
            .set_map_register(MapId::System, usize::from(page), page);
        m.mmu_mut()
            .set_map_register(MapId::User, usize::from(page), page);
    }
    m.mmu_mut().load_fence(FENCE_LOWER_UNMAPPED);
    m.mmu_mut().enable(MapId::System);
}

/// An interface card which raises its flag some time after STC and,
/// while its control flip-flop is set, requests DMA service.
struct TestCard {
    card: StandardInterface,
    next_input: u16,
    flag_delay: Option<Duration>,
    dma_ready: bool,
    /// Report an I/O error on every input transfer.
    fail_input: bool,
    end_of_transfer: Rc<Cell<bool>>,
}

impl TestCard {
    fn new() -> TestCard {
        TestCard {
            card: StandardInterface::new(),
            next_input: 0o1000,
            flag_delay: None,
            dma_ready: false,
            fail_input: false,
            end_of_transfer: Rc::new(Cell::new(false)),
        }
    }
}

impl Device for TestCard {
    fn name(&self) -> String {
        "test card".to_string()
    }

    fn interface(&mut self, _ctx: &Context, signals: InboundSet, _data: u16) -> SignalResult {
        let mut outbound = self.card.apply(signals);
        let mut data = 0;
        let mut activate_after = None;
        let mut error = None;
        if signals.contains(InboundSignal::Ioi) {
            data = self.next_input;
            self.next_input += 1;
            if self.fail_input {
                error = Some("reader jammed".to_string());
            }
        }
        if signals.contains(InboundSignal::Edt) {
            self.end_of_transfer.set(true);
        }
        if signals.contains(InboundSignal::Stc) {
            activate_after = self.flag_delay;
        }
        outbound.set_if(OutboundSignal::Srq, self.dma_ready && self.card.control);
        SignalResult {
            outbound,
            data,
            error,
            activate_after,
        }
    }

    fn service(&mut self, _ctx: &Context) -> Result<Option<Duration>, ServiceFailure> {
        self.card.set_flag();
        Ok(None)
    }
}

#[test]
fn test_load_and_halt() {
    let mut m = standard_machine();
    load(&mut m, 0o100, &[0o060_200, 0o102_077]); // LDA 200; HLT 77
    load(&mut m, 0o200, &[0o1234]);
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Halt {
            instruction: 0o102_077
        }
    );
    assert_eq!(m.registers().a, 0o1234);
    assert_eq!(m.registers().p, la!(0o102));
    assert_eq!(m.instructions_executed(), 2);
}

#[test]
fn test_accumulators_are_addressable() {
    let mut m = standard_machine();
    // LDB 0 (B := A); ADA 1; HLT
    load(&mut m, 0o100, &[0o064_000, 0o040_001, HLT_0]);
    m.registers_mut().a = 0o77_777;
    m.registers_mut().p = la!(0o100);
    run_until_stop(&mut m);
    assert_eq!(m.registers().b, 0o77_777);
    assert_eq!(m.registers().a, 0o177_776);
    assert!(m.registers().o);
    assert!(!m.registers().e);
}

#[test]
fn test_jump_to_self_through_user_map() {
    let mut m = make_machine(CpuConfiguration::new(CpuModel::Hp1000E));
    m.mmu_mut().set_map_register(MapId::User, 0, 5);
    m.mmu_mut().load_fence(FENCE_LOWER_UNMAPPED);
    m.mmu_mut().enable(MapId::User);
    // JMP 100 at logical 100 in the user map.
    m.deposit(0o100, ConsoleMap::User, 0o024_100)
        .expect("deposit through the user map");
    assert_eq!(mem(&m, 5 * 1024 + 0o100), 0o024_100);
    assert_eq!(mem(&m, 0o100), 0);
    m.registers_mut().p = la!(0o100);
    let before = m.registers().clone();
    m.step(1000).expect("a jump to self never stops");
    let after = m.registers();
    assert_eq!(after.p, la!(0o100));
    assert_eq!(
        (after.a, after.b, after.x, after.y, after.e, after.o, after.s),
        (before.a, before.b, before.x, before.y, before.e, before.o, before.s)
    );
    assert_eq!(m.instructions_executed(), 1000);
    assert_eq!(m.mmu().violation(), None);
}

/// Build an indirect chain at 0200 with `indirect_words` indirect
/// links, finishing at the direct address 0300.
fn indirect_chain(m: &mut Machine, indirect_words: u16) {
    for i in 0..indirect_words {
        load(m, 0o200 + i, &[SIGN_BIT | (0o201 + i)]);
    }
    load(m, 0o200 + indirect_words, &[0o300]);
    load(m, 0o300, &[0o4321]);
    // LDA 200,I; HLT
    load(m, 0o100, &[0o160_200, HLT_0]);
    m.registers_mut().p = la!(0o100);
}

#[test]
fn test_indirect_chain_within_limit() {
    let mut m = make_machine(CpuConfiguration {
        indirect_limit: 4,
        ..CpuConfiguration::new(CpuModel::Hp1000E)
    });
    indirect_chain(&mut m, 4);
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().a, 0o4321);
}

#[test]
fn test_indirect_chain_too_long() {
    let mut m = make_machine(CpuConfiguration {
        indirect_limit: 4,
        ..CpuConfiguration::new(CpuModel::Hp1000E)
    });
    indirect_chain(&mut m, 5);
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::IndirectLimit);
    // The fifth dereference (limit + 1) read location 0204.
    assert_eq!(m.registers().m, la!(0o204));
    assert_eq!(m.registers().p, la!(0o100));
    assert_eq!(m.registers().a, 0);
}

#[test]
fn test_indirect_loop_stops() {
    let mut m = standard_machine();
    load(&mut m, 0o200, &[SIGN_BIT | 0o200]);
    load(&mut m, 0o100, &[0o160_200]);
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert!(matches!(
        stop.details,
        StopDetails::IndirectLimit { limit: 16, .. }
    ));
    assert_eq!(m.instructions_executed(), 1);
}

#[test]
fn test_unassigned_select_code() {
    let mut m = standard_machine();
    // LIA 30; HLT
    load(&mut m, 0o100, &[0o102_530, HLT_0]);
    m.registers_mut().a = 0o7777;
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::UnassignedSelectCode { sc: sc!(0o30) }
    );
    assert_eq!(m.registers().p, la!(0o100));

    m.set_stop_enabled(StopKind::UnassignedSelectCode, false)
        .expect("UNSC is maskable");
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().a, 0);
}

#[test]
fn test_unimplemented_instruction() {
    let mut m = standard_machine();
    // A floating point instruction, then HLT.
    load(&mut m, 0o100, &[0o105_000, HLT_0]);
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Unimplemented);
    assert_eq!(m.registers().p, la!(0o100));
    // Continuing with a bypass treats it as a no-op.
    m.bypass_stops_once();
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().p, la!(0o102));
}

#[test]
fn test_breakpoint_and_bypass() {
    let mut m = standard_machine();
    // CLA; INA; HLT
    load(&mut m, 0o100, &[0o002_400, 0o002_004, HLT_0]);
    m.registers_mut().p = la!(0o100);
    m.set_breakpoint(la!(0o101));
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Breakpoint {
            address: la!(0o101)
        }
    );
    assert_eq!(m.registers().p, la!(0o101));
    m.bypass_stops_once();
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().a, 1);
}

#[test]
fn test_disabled_breakpoint_is_ignored() {
    let mut m = standard_machine();
    // CLA; INA; HLT
    load(&mut m, 0o100, &[0o002_400, 0o002_004, HLT_0]);
    m.registers_mut().p = la!(0o100);
    m.set_breakpoint(la!(0o101));
    m.set_stop_enabled(StopKind::Breakpoint, false)
        .expect("breakpoints can be disabled");
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().a, 1);
}

#[test]
fn test_alter_skip_group() {
    let mut m = standard_machine();
    // CCA,INA,SZA: A becomes 0, E set by the carry, skip the HLT.
    // At 0102: RSS on its own always skips.
    load(&mut m, 0o100, &[0o003_406, HLT_0, 0o002_001, HLT_0, 0o102_001]);
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Halt {
            instruction: 0o102_001
        }
    );
    assert_eq!(m.registers().p, la!(0o105));
    assert_eq!(m.registers().a, 0);
    assert!(m.registers().e);
}

#[test]
fn test_multiply_and_divide() {
    let mut m = standard_machine();
    load(
        &mut m,
        0o100,
        &[
            0o100_200, 0o300, // MPY 300
            HLT_0,
        ],
    );
    load(&mut m, 0o300, &[7, 0o144, 0]);
    m.registers_mut().a = 3u16.wrapping_neg();
    m.registers_mut().p = la!(0o100);
    run_until_stop(&mut m);
    assert_eq!(m.registers().ba(), 21u32.wrapping_neg());

    // DIV 300: 100 / 7
    load(&mut m, 0o103, &[0o100_400, 0o300, HLT_0]);
    m.registers_mut().set_ba(100);
    m.registers_mut().p = la!(0o103);
    run_until_stop(&mut m);
    assert_eq!(m.registers().a, 14);
    assert_eq!(m.registers().b, 2);
    assert!(!m.registers().o);

    // Division by zero sets overflow and leaves A and B alone.
    load(&mut m, 0o106, &[0o100_400, 0o302, HLT_0]);
    m.registers_mut().p = la!(0o106);
    run_until_stop(&mut m);
    assert_eq!((m.registers().a, m.registers().b), (14, 2));
    assert!(m.registers().o);
}

#[test]
fn test_device_interrupt() {
    let mut m = standard_machine();
    let mut card = TestCard::new();
    card.flag_delay = Some(Duration::from_micros(20));
    m.attach_device(sc!(0o12), Box::new(card))
        .expect("select code 12 is free");
    // Trap cell: JSB 500.
    load(&mut m, 0o12, &[0o014_500]);
    // STC 12,C; STF 0; JMP *
    load(&mut m, 0o100, &[0o103_712, 0o102_100, 0o024_102]);
    // The interrupt service routine halts.
    load(&mut m, 0o501, &[0o102_012]);
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Halt {
            instruction: 0o102_012
        }
    );
    assert_eq!(mem(&m, 0o500), 0o102);
    assert_eq!(m.central_interrupt_register(), sc!(0o12));
    assert!(m.interrupt_system_enabled());
    assert!(m.now() >= Duration::from_micros(20));
    // IAK cleared the flag buffer, so the card no longer interrupts.
    assert_eq!(m.pending_interrupt(), None);
}

#[test]
fn test_dma_input_block() {
    let mut m = standard_machine();
    let mut card = TestCard::new();
    card.dma_ready = true;
    let end_of_transfer = Rc::clone(&card.end_of_transfer);
    m.attach_device(sc!(0o20), Box::new(card))
        .expect("select code 20 is free");
    load_dma_input_program(&mut m);
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(mem(&m, 0o1000), 0o1000);
    assert_eq!(mem(&m, 0o1001), 0o1001);
    assert_eq!(mem(&m, 0o1002), 0o1002);
    assert_eq!(mem(&m, 0o1003), 0);
    let channel = m.dma_channel(DmaChannelId::One);
    assert!(channel.flag());
    assert!(!channel.transfer_enabled());
    assert_eq!(channel.control_words().1, 0o101_003);
    assert!(end_of_transfer.get());
    // The last cycle sent CLC, so the card stopped asking for service.
    assert!(!m.backplane().service_requested(sc!(0o20)));
}

#[test]
fn test_dma_cycle_with_io_error_does_not_advance() {
    let mut m = standard_machine();
    let mut card = TestCard::new();
    card.dma_ready = true;
    card.fail_input = true;
    let end_of_transfer = Rc::clone(&card.end_of_transfer);
    m.attach_device(sc!(0o20), Box::new(card))
        .expect("select code 20 is free");
    load_dma_input_program(&mut m);
    let stop = run_until_stop(&mut m);
    assert!(matches!(
        stop.details,
        StopDetails::IoError { sc, .. } if sc == sc!(0o20)
    ));
    let channel = m.dma_channel(DmaChannelId::One);
    assert_eq!(
        channel.control_words(),
        (0o120_020, 0o101_000, 3u16.wrapping_neg())
    );
    assert!(!channel.flag());
    assert!(channel.transfer_enabled());
    assert_eq!(mem(&m, 0o1000), 0);
    assert!(!end_of_transfer.get());
}

#[test]
fn test_dma_continues_when_io_error_stop_is_disabled() {
    let mut m = standard_machine();
    let mut card = TestCard::new();
    card.dma_ready = true;
    card.fail_input = true;
    m.attach_device(sc!(0o20), Box::new(card))
        .expect("select code 20 is free");
    m.set_stop_enabled(StopKind::IoError, false)
        .expect("IOERR is maskable");
    load_dma_input_program(&mut m);
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(mem(&m, 0o1002), 0o1002);
    let channel = m.dma_channel(DmaChannelId::One);
    assert!(channel.flag());
    assert_eq!(channel.control_words().1, 0o101_003);
    assert_eq!(channel.control_words().2, 0);
}

#[test]
fn test_io_error_stop_on_input() {
    let mut m = standard_machine();
    let mut card = TestCard::new();
    card.fail_input = true;
    m.attach_device(sc!(0o21), Box::new(card))
        .expect("select code 21 is free");
    // LIA 21; HLT
    load(&mut m, 0o100, &[0o102_521, HLT_0]);
    m.registers_mut().a = 0o7777;
    m.registers_mut().p = la!(0o100);
    let stop = run_until_stop(&mut m);
    assert!(matches!(
        stop.details,
        StopDetails::IoError { sc, .. } if sc == sc!(0o21)
    ));
    assert_eq!(m.registers().p, la!(0o100));
    assert_eq!(m.registers().a, 0o7777);

    m.set_stop_enabled(StopKind::IoError, false)
        .expect("IOERR is maskable");
    let stop = run_until_stop(&mut m);
    assert_eq!(stop.kind(), StopKind::Halt);
    assert_eq!(m.registers().a, 0o1001);
}

/// Program DMA channel 1 to read three words from select code 20
/// into 1000, start it, and wait for the channel flag.
fn load_dma_input_program(m: &mut Machine) {
    load(
        m,
        0o100,
        &[
            0o060_300, // LDA 300 (control word 1)
            0o102_606, // OTA 6
            0o106_702, // CLC 2
            0o060_301, // LDA 301 (control word 2)
            0o102_602, // OTA 2
            0o102_702, // STC 2
            0o060_302, // LDA 302 (control word 3)
            0o102_602, // OTA 2
            0o102_720, // STC 20
            0o103_706, // STC 6,C
            0o102_306, // SFS 6
            0o024_112, // JMP *-1
            HLT_0,
        ],
    );
    // STC and CLC to the card, select code 20; input to 1000; three
    // words.
    load(m, 0o300, &[0o120_020, 0o101_000, 3u16.wrapping_neg()]);
    m.registers_mut().p = la!(0o100);
}

#[test]
fn test_alternate_map_write_faults_under_protection() {
    let mut m = standard_machine();
    identity_maps(&mut m);
    m.mmu_mut().set_map_register(MapId::User, 3, 0o10);
    m.mp.set_fence(0o2000);
    m.mp.enable();
    // XSA 6000 at 2000.
    load(&mut m, 0o2000, &[0o101_725, 0o6000]);
    m.registers_mut().a = 0o5252;
    m.registers_mut().p = la!(0o2000);
    m.step(1).expect("an abort is not a stop");
    assert_eq!(mem(&m, 0o10 * 1024), 0);
    assert_eq!(m.memory_protect().violation_register(), la!(0o2000));
    assert_eq!(m.registers().p, la!(0o2002));
    // The page itself was not protected, so the mapping unit has
    // nothing to report.
    assert_eq!(m.mmu().violation(), None);
    // With the interrupt system off, no interrupt is requested.
    assert_eq!(m.pending_interrupt(), None);
}

#[test]
fn test_alternate_map_write_without_protection() {
    let mut m = standard_machine();
    identity_maps(&mut m);
    m.mmu_mut().set_map_register(MapId::User, 3, 0o10);
    load(&mut m, 0o2000, &[0o101_725, 0o6000, HLT_0]);
    m.registers_mut().a = 0o5252;
    m.registers_mut().p = la!(0o2000);
    run_until_stop(&mut m);
    assert_eq!(mem(&m, 0o10 * 1024), 0o5252);
}

#[test]
fn test_write_protected_page_violation() {
    let mut m = standard_machine();
    identity_maps(&mut m);
    m.mmu_mut()
        .set_map_register(MapId::System, 4, MAP_WRITE_PROTECT | 4);
    m.mp.enable();
    m.ion = true;
    // STA 300,I with 300 pointing into page 4.
    load(&mut m, 0o2000, &[0o170_300]);
    load(&mut m, 0o300, &[0o10_005]);
    m.registers_mut().a = 0o5555;
    m.registers_mut().p = la!(0o2000);
    m.step(1).expect("an abort is not a stop");
    assert_eq!(mem(&m, 0o10_005), 0);
    assert_eq!(
        m.mmu().violation(),
        Some(ViolationRecord {
            cause: ViolationCause::WriteProtect,
            map: MapId::System,
            page: 4,
            mapping_enabled: true,
            protect_enabled: true,
        })
    );
    assert!(m.mmu().violation_frozen());
    assert!(m.memory_protect().mapping_violation());
    assert_eq!(m.memory_protect().violation_register(), la!(0o2000));
    assert_eq!(m.pending_interrupt(), Some(SelectCode::MEMORY_PROTECT));
}

#[test]
fn test_violation_record_rearmed_when_protection_cleared() {
    let mut m = standard_machine();
    identity_maps(&mut m);
    m.mmu_mut()
        .set_map_register(MapId::System, 4, MAP_WRITE_PROTECT | 4);
    m.mmu_mut()
        .set_map_register(MapId::System, 6, MAP_READ_PROTECT | 6);
    m.mp.enable();
    m.ion = true;
    // STA 300,I into write-protected page 4.
    load(&mut m, 0o2000, &[0o170_300]);
    load(&mut m, 0o300, &[0o10_005, 0o14_000]);
    // The protect trap cell: LDA 301,I from read-protected page 6.
    load(&mut m, 0o5, &[0o160_301]);
    m.registers_mut().p = la!(0o2000);
    m.step(1).expect("an abort is not a stop");
    assert!(m.mmu().violation_frozen());

    // Acknowledging the interrupt turns protection off, which re-arms
    // the record, so the trap cell's read violation is recorded.
    m.step(1).expect("the trap cell instruction completes");
    assert!(!m.memory_protect().is_enabled());
    assert!(!m.mmu().violation_frozen());
    assert_eq!(
        m.mmu().violation(),
        Some(ViolationRecord {
            cause: ViolationCause::ReadProtect,
            map: MapId::System,
            page: 6,
            mapping_enabled: true,
            protect_enabled: false,
        })
    );
    // SFS 5 still sees the violation until the next STC 5.
    assert!(m.memory_protect().mapping_violation());
}

#[test]
fn test_fence_violation_interrupt() {
    let mut m = standard_machine();
    m.mp.set_fence(0o2000);
    m.mp.enable();
    m.ion = true;
    // Trap cell 5: HLT 5.
    load(&mut m, 0o5, &[0o102_005]);
    // JMP 1000 from 2000 goes below the fence.
    load(&mut m, 0o2000, &[0o025_000]);
    m.registers_mut().p = la!(0o2000);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Halt {
            instruction: 0o102_005
        }
    );
    assert_eq!(m.memory_protect().violation_register(), la!(0o2000));
    // Interrupt entry turned protection off.
    assert!(!m.memory_protect().is_enabled());
    assert_eq!(m.central_interrupt_register(), SelectCode::MEMORY_PROTECT);
    assert_eq!(m.registers().p, la!(0o2001));
}

#[test]
fn test_io_is_protected() {
    let mut m = standard_machine();
    m.mp.enable();
    // STF 1 (set overflow) is allowed, HLT is not.
    load(&mut m, 0o2000, &[0o102_101, HLT_0]);
    m.registers_mut().p = la!(0o2000);
    m.step(2).expect("protected I/O aborts rather than stopping");
    assert!(m.registers().o);
    assert_eq!(m.memory_protect().violation_register(), la!(0o2001));
}

#[test]
fn test_privileged_instruction() {
    let mut m = standard_machine();
    identity_maps(&mut m);
    m.mp.enable();
    // LFA
    load(&mut m, 0o2000, &[0o101_727]);
    m.registers_mut().p = la!(0o2000);
    m.step(1).expect("an abort is not a stop");
    let violation = m.mmu().violation().expect("a violation should be recorded");
    assert_eq!(violation.cause, ViolationCause::Privileged);
    assert_eq!(m.memory_protect().violation_register(), la!(0o2000));
}

#[test]
fn test_interrupt_breaks_into_indirect_chain() {
    let mut m = standard_machine();
    // Trap cell 4: HLT 4.
    load(&mut m, 0o4, &[0o102_004]);
    indirect_chain(&mut m, 6);
    m.ion = true;
    m.signal_power_failure();
    assert_eq!(m.pending_interrupt(), Some(SelectCode::POWER_FAIL));
    // The previous instruction held off interrupts.
    m.defer = true;
    m.last_was_deferring = true;
    m.step(1).expect("backing out is not a stop");
    assert_eq!(m.registers().p, la!(0o100));
    assert_eq!(m.registers().a, 0);
    let stop = run_until_stop(&mut m);
    assert_eq!(
        stop.details,
        StopDetails::Halt {
            instruction: 0o102_004
        }
    );
    assert_eq!(m.central_interrupt_register(), SelectCode::POWER_FAIL);
    assert_eq!(m.registers().p, la!(0o100));
}

#[test]
fn test_reset_clears_interrupt_system() {
    let mut m = standard_machine();
    // STF 0; HLT
    load(&mut m, 0o100, &[0o102_100, HLT_0]);
    m.registers_mut().p = la!(0o100);
    run_until_stop(&mut m);
    assert!(m.interrupt_system_enabled());
    m.reset();
    assert!(!m.interrupt_system_enabled());
}
