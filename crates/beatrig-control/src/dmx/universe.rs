//! 512-channel DMX frame

use std::fmt;
use std::ops::Range;

use beatrig_core::{FIXTURE_WINDOW, UNIVERSE_SIZE};

/// One controller's full output frame
#[derive(Clone, PartialEq, Eq)]
pub struct Universe([u8; UNIVERSE_SIZE]);

impl Universe {
    /// An all-zero frame
    pub fn new() -> Self {
        Self([0; UNIVERSE_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; UNIVERSE_SIZE] {
        &self.0
    }

    /// Value of a 1-based channel
    pub fn get(&self, channel: u16) -> Option<u8> {
        (channel as usize)
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .copied()
    }

    /// Write `bytes` starting at the 1-based `first_channel`, dropping
    /// whatever would fall past channel 512
    pub fn write_window(&mut self, first_channel: u16, bytes: &[u8]) {
        let range = window(first_channel, bytes.len());
        let len = range.len();
        self.0[range].copy_from_slice(&bytes[..len]);
    }

    /// Copy the fixture window at `first_channel` from another frame
    pub fn copy_window(&mut self, first_channel: u16, from: &Universe) {
        let range = window(first_channel, FIXTURE_WINDOW);
        self.0[range.clone()].copy_from_slice(&from.0[range]);
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; UNIVERSE_SIZE]> for Universe {
    fn from(bytes: [u8; UNIVERSE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.0.iter().filter(|v| **v != 0).count();
        f.debug_struct("Universe")
            .field("active_channels", &active)
            .finish()
    }
}

fn window(first_channel: u16, len: usize) -> Range<usize> {
    let start = (first_channel as usize).saturating_sub(1).min(UNIVERSE_SIZE);
    start..(start + len).min(UNIVERSE_SIZE)
}
