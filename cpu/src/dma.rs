//! The dual-channel DMA controller.
//!
//! Each channel moves a block of words between memory and one
//! interface card, stealing a memory cycle whenever the card asserts
//! its service request (SRQ) line.  Channel 1 takes priority over
//! channel 2.
//!
//! A channel is programmed through two select codes: 02 or 03 reach
//! its control word 2 and 3 registers, and 06 or 07 control the
//! channel itself.
//!
//! ## Control word 1 (OTA 6 / OTA 7)
//!
//! | 15  | 14        | 13  | 12-6 | 5-0         |
//! | --- | --------- | --- | ---- | ----------- |
//! | STC | byte pack | CLC |      | select code |
//!
//! STC: send STC to the card with each cycle except the last.
//! CLC: send CLC to the card with the last cycle.
//!
//! ## Control word 2 (CLC 2, OTA 2)
//!
//! Bit 15 set for input (card to memory); bits 14-0 the memory
//! address.
//!
//! ## Control word 3 (STC 2, OTA 2)
//!
//! The two's complement of the number of words to transfer.
use tracing::{event, Level};

use base::prelude::*;

use crate::io::{InboundSet, InboundSignal, OutboundSet, OutboundSignal, StandardInterface};

const CW1_STC: u16 = 0o100_000;
const CW1_BYTE_PACKING: u16 = 0o040_000;
const CW1_CLC: u16 = 0o020_000;
const CW2_INPUT: u16 = 0o100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DmaChannelId {
    One,
    Two,
}

impl DmaChannelId {
    pub const ALL: [DmaChannelId; 2] = [DmaChannelId::One, DmaChannelId::Two];

    pub fn index(&self) -> usize {
        match self {
            DmaChannelId::One => 0,
            DmaChannelId::Two => 1,
        }
    }

    /// The map used to translate this channel's memory addresses.
    pub fn map(&self) -> MapId {
        match self {
            DmaChannelId::One => MapId::PortA,
            DmaChannelId::Two => MapId::PortB,
        }
    }

    /// The select code of the channel's control interface.
    pub fn select_code(&self) -> SelectCode {
        match self {
            DmaChannelId::One => SelectCode::DMA1,
            DmaChannelId::Two => SelectCode::DMA2,
        }
    }

    /// The select code of the channel's control word registers.
    pub fn words_select_code(&self) -> SelectCode {
        match self {
            DmaChannelId::One => SelectCode::DMA1_WORDS,
            DmaChannelId::Two => SelectCode::DMA2_WORDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Card to memory.
    Input,
    /// Memory to card.
    Output,
}

/// Where a cycle falls in byte-packed transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytePhase {
    /// The upper byte of the word.
    First,
    /// The lower byte; the memory word is complete after this cycle.
    Second,
}

/// What a single DMA cycle will do.  Computed before the cycle is
/// performed; the channel state does not change until
/// [`DmaChannel::complete_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCycle {
    pub sc: SelectCode,
    pub direction: Direction,
    pub address: LogicalAddress,
    /// The signals to send to the card.
    pub signals: InboundSet,
    /// True when this cycle touches memory.  A byte-packed output
    /// cycle reads memory only for the first byte, and an input
    /// cycle writes it only for the second.
    pub reads_memory: bool,
    pub byte: Option<BytePhase>,
    pub last: bool,
}

/// The result of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCompletion {
    /// A word to be stored in memory.
    pub write: Option<(LogicalAddress, u16)>,
    /// The block transfer has finished.
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaChannel {
    id: DmaChannelId,
    card: StandardInterface,
    /// Transfer enable.
    xferen: bool,
    /// Selects control word 3 (rather than 2) for OTA 2/3.
    select_cw3: bool,
    cw1: u16,
    cw2: u16,
    cw3: u16,
    /// Byte packing holding register.
    packer: u8,
    /// The first byte of a word is in the holding register.
    byte_held: bool,
}

impl DmaChannel {
    pub fn new(id: DmaChannelId) -> DmaChannel {
        DmaChannel {
            id,
            card: StandardInterface::new(),
            xferen: false,
            select_cw3: false,
            cw1: 0,
            cw2: 0,
            cw3: 0,
            packer: 0,
            byte_held: false,
        }
    }

    pub fn id(&self) -> DmaChannelId {
        self.id
    }

    pub fn control_words(&self) -> (u16, u16, u16) {
        (self.cw1, self.cw2, self.cw3)
    }

    pub fn transfer_enabled(&self) -> bool {
        self.xferen
    }

    pub fn flag(&self) -> bool {
        self.card.flag
    }

    /// The select code of the card this channel serves.
    pub fn device(&self) -> SelectCode {
        SelectCode::from_low_bits(self.cw1)
    }

    fn byte_packing(&self) -> bool {
        self.cw1 & CW1_BYTE_PACKING != 0
    }

    pub fn direction(&self) -> Direction {
        if self.cw2 & CW2_INPUT != 0 {
            Direction::Input
        } else {
            Direction::Output
        }
    }

    pub fn address(&self) -> LogicalAddress {
        LogicalAddress::from_word(self.cw2)
    }

    /// The channel wants a cycle when it is enabled and its card is
    /// asserting SRQ.
    pub fn wants_cycle(&self, srq: bool) -> bool {
        self.xferen && srq
    }

    pub fn plan_cycle(&self) -> DmaCycle {
        let byte = if self.byte_packing() {
            Some(if self.byte_held {
                BytePhase::Second
            } else {
                BytePhase::First
            })
        } else {
            None
        };
        let direction = self.direction();
        let last = self.cw3 == 0o177_777 && byte != Some(BytePhase::First);
        let mut signals = InboundSet::EMPTY.with(match direction {
            Direction::Input => InboundSignal::Ioi,
            Direction::Output => InboundSignal::Ioo,
        });
        signals.insert(InboundSignal::Clf);
        if last {
            signals.insert(InboundSignal::Edt);
            if self.cw1 & CW1_CLC != 0 {
                signals.insert(InboundSignal::Clc);
            }
        } else if self.cw1 & CW1_STC != 0 {
            signals.insert(InboundSignal::Stc);
        }
        DmaCycle {
            sc: self.device(),
            direction,
            address: self.address(),
            signals,
            reads_memory: direction == Direction::Output && byte != Some(BytePhase::Second),
            byte,
            last,
        }
    }

    /// The value to place on the I/O bus for an output cycle.
    /// `memory_word` is the word read from memory, if the cycle reads
    /// memory.
    pub fn output_data(&self, cycle: &DmaCycle, memory_word: u16) -> u16 {
        match cycle.byte {
            None => memory_word,
            Some(BytePhase::First) => memory_word >> 8,
            Some(BytePhase::Second) => u16::from(self.packer),
        }
    }

    /// Update the channel after the card accepted a cycle.
    /// `memory_word` is the word read from memory (output) and
    /// `input` the value the card returned (input).
    pub fn complete_cycle(&mut self, cycle: &DmaCycle, memory_word: u16, input: u16) -> DmaCompletion {
        let mut write = None;
        match (cycle.direction, cycle.byte) {
            (Direction::Input, None) => {
                write = Some((cycle.address, input));
            }
            (Direction::Input, Some(BytePhase::First)) => {
                self.packer = (input & 0o377) as u8;
            }
            (Direction::Input, Some(BytePhase::Second)) => {
                write = Some((cycle.address, (u16::from(self.packer) << 8) | (input & 0o377)));
            }
            (Direction::Output, None) | (Direction::Output, Some(BytePhase::Second)) => (),
            (Direction::Output, Some(BytePhase::First)) => {
                self.packer = (memory_word & 0o377) as u8;
            }
        }
        let finished = match cycle.byte {
            Some(BytePhase::First) => {
                self.byte_held = true;
                false
            }
            Some(BytePhase::Second) => {
                self.byte_held = false;
                self.advance()
            }
            None => self.advance(),
        };
        DmaCompletion { write, finished }
    }

    /// Step to the next word; returns true when the block is done.
    fn advance(&mut self) -> bool {
        self.cw2 = (self.cw2 & CW2_INPUT) | (self.cw2.wrapping_add(1) & LogicalAddress::MASK);
        self.cw3 = self.cw3.wrapping_add(1);
        if self.cw3 == 0 {
            event!(Level::DEBUG, "DMA channel {:?} transfer complete", self.id);
            self.xferen = false;
            self.card.flag_buffer = true;
            self.card.flag = true;
            true
        } else {
            false
        }
    }

    /// Signals to select code 02 or 03.
    pub fn words_interface(&mut self, signals: InboundSet, data: u16) -> (OutboundSet, u16) {
        let mut input = 0;
        for signal in signals.iter() {
            match signal {
                InboundSignal::Stc => self.select_cw3 = true,
                InboundSignal::Clc => self.select_cw3 = false,
                InboundSignal::Ioo => {
                    if self.select_cw3 {
                        self.cw3 = data;
                    } else {
                        self.cw2 = data;
                    }
                }
                InboundSignal::Ioi => input = self.cw3,
                _ => (),
            }
        }
        (OutboundSet::EMPTY.with(OutboundSignal::Prl), input)
    }

    /// Signals to select code 06 or 07.
    pub fn control_interface(&mut self, signals: InboundSet, data: u16) -> (OutboundSet, u16) {
        for signal in signals.iter() {
            match signal {
                InboundSignal::Ioo => {
                    self.cw1 = data;
                }
                InboundSignal::Stc => {
                    event!(
                        Level::DEBUG,
                        "DMA channel {:?} started: cw1={:06o} cw2={:06o} cw3={:06o}",
                        self.id,
                        self.cw1,
                        self.cw2,
                        self.cw3
                    );
                    self.xferen = true;
                    self.byte_held = false;
                    self.packer = 0;
                }
                InboundSignal::Crs => {
                    self.xferen = false;
                }
                _ => (),
            }
        }
        // The flip-flops (including control for STC, CLC and CRS) follow
        // the standard card.
        (self.card.apply(signals), 0)
    }

    pub fn outbound(&self) -> OutboundSet {
        self.card.outbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(ch: &mut DmaChannel, cw1: u16, cw2: u16, count: u16) {
        ch.control_interface(InboundSignal::Ioo.into(), cw1);
        ch.words_interface(InboundSignal::Clc.into(), 0);
        ch.words_interface(InboundSignal::Ioo.into(), cw2);
        ch.words_interface(InboundSignal::Stc.into(), 0);
        ch.words_interface(InboundSignal::Ioo.into(), count.wrapping_neg());
        ch.control_interface(InboundSet::from(InboundSignal::Stc).with(InboundSignal::Clf), 0);
    }

    #[test]
    fn word_transfer_terminates_after_count() {
        let mut ch = DmaChannel::new(DmaChannelId::One);
        program(&mut ch, CW1_STC | CW1_CLC | 0o20, CW2_INPUT | 0o1000, 3);
        assert!(ch.wants_cycle(true));
        assert!(!ch.flag());
        let mut finished = 0;
        for n in 0..3u16 {
            let cycle = ch.plan_cycle();
            assert_eq!(cycle.sc, sc!(0o20));
            assert_eq!(cycle.address, LogicalAddress::from_word(0o1000 + n));
            assert_eq!(cycle.last, n == 2);
            assert_eq!(cycle.signals.contains(InboundSignal::Edt), n == 2);
            assert_eq!(cycle.signals.contains(InboundSignal::Clc), n == 2);
            assert_eq!(cycle.signals.contains(InboundSignal::Stc), n != 2);
            let done = ch.complete_cycle(&cycle, 0, 0o100 + n);
            assert_eq!(done.write, Some((cycle.address, 0o100 + n)));
            if done.finished {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert!(ch.flag());
        assert!(!ch.transfer_enabled());
        assert_eq!(ch.control_words().2, 0);
        assert!(!ch.wants_cycle(true));
        // The completion interrupt needs control set.
        assert!(ch.outbound().contains(OutboundSignal::Irq));
    }

    #[test]
    fn byte_packed_output() {
        let mut ch = DmaChannel::new(DmaChannelId::Two);
        program(&mut ch, CW1_BYTE_PACKING | 0o21, 0o2000, 1);
        let first = ch.plan_cycle();
        assert_eq!(first.byte, Some(BytePhase::First));
        assert!(first.reads_memory);
        assert!(!first.last);
        assert_eq!(ch.output_data(&first, 0o040_502), 0o101);
        let done = ch.complete_cycle(&first, 0o040_502, 0);
        assert!(!done.finished);
        let second = ch.plan_cycle();
        assert_eq!(second.byte, Some(BytePhase::Second));
        assert_eq!(second.address, first.address);
        assert!(!second.reads_memory);
        assert!(second.last);
        assert_eq!(ch.output_data(&second, 0), 0o102);
        let done = ch.complete_cycle(&second, 0, 0);
        assert!(done.finished);
        assert_eq!(done.write, None);
    }

    #[test]
    fn byte_packed_input() {
        let mut ch = DmaChannel::new(DmaChannelId::One);
        program(&mut ch, CW1_BYTE_PACKING | 0o21, CW2_INPUT | 0o2000, 2);
        let mut writes = Vec::new();
        for byte in [0o101, 0o102, 0o103, 0o104] {
            let cycle = ch.plan_cycle();
            let done = ch.complete_cycle(&cycle, 0, byte);
            writes.extend(done.write);
        }
        assert_eq!(
            writes,
            vec![
                (LogicalAddress::from_word(0o2000), 0o040_502),
                (LogicalAddress::from_word(0o2001), 0o041_504),
            ]
        );
        assert!(ch.flag());
    }

    #[test]
    fn reset_stops_transfer() {
        let mut ch = DmaChannel::new(DmaChannelId::One);
        program(&mut ch, 0o20, 0o1000, 5);
        ch.control_interface(InboundSignal::Crs.into(), 0);
        assert!(!ch.transfer_enabled());
        assert!(!ch.wants_cycle(true));
    }

    #[test]
    fn control_word_3_reads_back() {
        let mut ch = DmaChannel::new(DmaChannelId::One);
        program(&mut ch, 0o20, 0o1000, 5);
        let (out, data) = ch.words_interface(InboundSignal::Ioi.into(), 0);
        assert_eq!(data, 5u16.wrapping_neg());
        assert!(out.contains(OutboundSignal::Prl));
    }
}
