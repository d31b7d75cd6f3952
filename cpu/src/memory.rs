//! Physical memory.
//!
//! Memory is a flat array of 16-bit words indexed by physical
//! address.  The array is sized to the configured memory; addresses
//! beyond that read as zero and writes to them are discarded, as on
//! a machine with a partly-populated backplane.
use tracing::{event, Level};

use base::prelude::*;

#[derive(Debug)]
pub struct PhysicalMemory {
    words: Vec<u16>,
}

impl PhysicalMemory {
    pub fn new(size_words: u32) -> PhysicalMemory {
        PhysicalMemory {
            words: vec![0; size_words as usize],
        }
    }

    /// The number of words of memory actually present.
    pub fn size(&self) -> u32 {
        // The size is at most 2^20, so this cannot truncate.
        self.words.len() as u32
    }

    pub fn is_present(&self, addr: PhysicalAddress) -> bool {
        usize::from(addr) < self.words.len()
    }

    pub fn read(&self, addr: PhysicalAddress) -> u16 {
        match self.words.get(usize::from(addr)) {
            Some(w) => *w,
            None => {
                event!(
                    Level::TRACE,
                    "read from non-existent memory at {addr} returns 0"
                );
                0
            }
        }
    }

    pub fn write(&mut self, addr: PhysicalAddress, value: u16) {
        match self.words.get_mut(usize::from(addr)) {
            Some(w) => {
                *w = value;
            }
            None => {
                event!(
                    Level::TRACE,
                    "write of {value:06o} to non-existent memory at {addr} ignored"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pa(n: u32) -> PhysicalAddress {
        PhysicalAddress::try_from(n).expect("valid test address")
    }

    #[test]
    fn read_back_what_was_written() {
        let mut mem = PhysicalMemory::new(4096);
        mem.write(pa(0o7777), 0o123_456);
        assert_eq!(mem.read(pa(0o7777)), 0o123_456);
        assert_eq!(mem.read(pa(0o7776)), 0);
    }

    #[test]
    fn beyond_configured_size() {
        let mut mem = PhysicalMemory::new(1024);
        assert!(!mem.is_present(pa(1024)));
        mem.write(pa(1024), 0o177_777);
        assert_eq!(mem.read(pa(1024)), 0);
        assert_eq!(mem.size(), 1024);
    }
}
