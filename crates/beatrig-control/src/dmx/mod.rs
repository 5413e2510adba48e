//! DMX output system
//!
//! This module provides DMX512 output via Art-Net and sACN protocols.
//!
//! ## Art-Net
//!
//! Art-Net is a UDP protocol for DMX transmission over Ethernet.
//! - Broadcast (255.255.255.255:6454) or unicast to a node
//! - Supports 32768 universes
//! - Includes sequence numbering
//!
//! ## sACN (E1.31)
//!
//! sACN (Streaming ACN) is a multicast protocol for DMX transmission.
//! - Uses IP multicast (239.255.x.x:5568)
//! - Supports 63999 universes
//! - Includes priority
//!
//! Both senders put a write timeout on their socket, so a stuck network
//! stack never stalls the frame loop.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use beatrig_control::dmx::{ArtNetSender, Universe};
//!
//! # fn main() -> beatrig_control::Result<()> {
//! let mut sender = ArtNetSender::new(0, "255.255.255.255:6454")?;
//!
//! let mut universe = Universe::new();
//! universe.write_window(1, &[255, 0, 255, 0, 127]);
//! sender.send_dmx(&universe)?;
//! # Ok(())
//! # }
//! ```

pub mod artnet;
pub mod sacn;
pub mod universe;

pub use artnet::ArtNetSender;
pub use sacn::SacnSender;
pub use universe::Universe;

use std::time::Duration;

/// Upper bound for a single datagram send
pub const SEND_TIMEOUT: Duration = Duration::from_millis(50);

pub(crate) fn min_interval(hz: u32) -> Duration {
    if hz == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(1_000_000 / hz as u64)
    }
}
