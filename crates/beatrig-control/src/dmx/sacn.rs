//! sACN (E1.31) protocol implementation
//!
//! sACN (Streaming ACN) is a protocol for transmitting DMX512 over IP multicast.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{min_interval, Universe, SEND_TIMEOUT};
use crate::{error::ControlError, Result};

const SACN_PORT: u16 = 5568;
const PACKET_LEN: usize = 638;

/// sACN sender for outputting DMX data
pub struct SacnSender {
    socket: UdpSocket,
    universe: u16,
    sequence: u8,
    priority: u8,
    source_name: String,
    cid: [u8; 16], // Component ID (UUID)
    last_send: Option<Instant>,
    min_interval: Duration,
}

impl SacnSender {
    /// Create a new sACN sender
    ///
    /// # Arguments
    /// * `universe` - sACN universe (1-63999)
    /// * `source_name` - Source name (up to 63 bytes are sent)
    pub fn new(universe: u16, source_name: &str) -> Result<Self> {
        check_universe(universe)?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_multicast_loop_v4(false)?;
        socket.set_write_timeout(Some(SEND_TIMEOUT))?;

        // Generate a UUID for this component
        let cid = *Uuid::new_v4().as_bytes();

        tracing::info!("sACN sender created for universe {}", universe);

        Ok(Self {
            socket,
            universe,
            sequence: 0,
            priority: 100,
            source_name: source_name.to_string(),
            cid,
            last_send: None,
            min_interval: min_interval(44),
        })
    }

    /// Multicast group for this universe: 239.255.<hi>.<lo>:5568
    pub fn multicast_addr(&self) -> SocketAddr {
        let [hi, lo] = self.universe.to_be_bytes();
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, hi, lo), SACN_PORT))
    }

    /// Send one frame. Frames arriving faster than the refresh rate are dropped.
    pub fn send_dmx(&mut self, universe: &Universe) -> Result<()> {
        if self
            .last_send
            .is_some_and(|last| last.elapsed() < self.min_interval)
        {
            tracing::trace!("Dropped sACN frame for universe {} (rate limit)", self.universe);
            return Ok(());
        }
        self.send_now(universe)
    }

    /// Send one frame regardless of the refresh rate
    pub fn send_now(&mut self, universe: &Universe) -> Result<()> {
        let packet = self.build_sacn_packet(universe.as_bytes());
        self.socket.send_to(&packet, self.multicast_addr())?;
        self.sequence = self.sequence.wrapping_add(1);
        self.last_send = Some(Instant::now());

        tracing::trace!("Sent sACN DMX packet for universe {}", self.universe);

        Ok(())
    }

    /// Build an E1.31 data packet
    fn build_sacn_packet(&self, channels: &[u8; 512]) -> Vec<u8> {
        let mut packet = vec![0u8; PACKET_LEN];

        // Root Layer
        let mut offset = 0;

        // Preamble Size (16-bit)
        packet[offset..offset + 2].copy_from_slice(&0x0010u16.to_be_bytes());
        offset += 2;

        // Post-amble Size (16-bit)
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        // ACN Packet Identifier (12 bytes)
        packet[offset..offset + 12].copy_from_slice(&[
            0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
        ]);
        offset += 12;

        // Flags and Length: 0x7000 | (638 - 16)
        packet[offset..offset + 2]
            .copy_from_slice(&(0x7000u16 | (PACKET_LEN - 16) as u16).to_be_bytes());
        offset += 2;

        // Vector: VECTOR_ROOT_E131_DATA
        packet[offset..offset + 4].copy_from_slice(&0x00000004u32.to_be_bytes());
        offset += 4;

        packet[offset..offset + 16].copy_from_slice(&self.cid);
        offset += 16;

        // Framing Layer
        packet[offset..offset + 2]
            .copy_from_slice(&(0x7000u16 | (PACKET_LEN - 38) as u16).to_be_bytes());
        offset += 2;

        // Vector: VECTOR_E131_DATA_PACKET
        packet[offset..offset + 4].copy_from_slice(&0x00000002u32.to_be_bytes());
        offset += 4;

        // Source Name (64 bytes, null-terminated)
        let source_bytes = self.source_name.as_bytes();
        let copy_len = source_bytes.len().min(63);
        packet[offset..offset + copy_len].copy_from_slice(&source_bytes[..copy_len]);
        offset += 64;

        packet[offset] = self.priority;
        offset += 1;

        // Synchronization Address - 0 for no sync
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        packet[offset] = self.sequence;
        offset += 1;

        // Options
        packet[offset] = 0;
        offset += 1;

        packet[offset..offset + 2].copy_from_slice(&self.universe.to_be_bytes());
        offset += 2;

        // DMP Layer
        packet[offset..offset + 2]
            .copy_from_slice(&(0x7000u16 | (PACKET_LEN - 115) as u16).to_be_bytes());
        offset += 2;

        // Vector: VECTOR_DMP_SET_PROPERTY
        packet[offset] = 0x02;
        offset += 1;

        // Address Type & Data Type
        packet[offset] = 0xa1;
        offset += 1;

        // First Property Address
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        // Address Increment
        packet[offset..offset + 2].copy_from_slice(&0x0001u16.to_be_bytes());
        offset += 2;

        // Property value count: start code + 512 channels
        packet[offset..offset + 2].copy_from_slice(&513u16.to_be_bytes());
        offset += 2;

        // DMX Start Code
        packet[offset] = 0x00;
        offset += 1;

        packet[offset..offset + 512].copy_from_slice(channels);

        packet
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    /// Set the priority (0-200, default 100)
    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority.min(200);
    }

    /// Limit how often frames go out; 0 disables the limit
    pub fn set_refresh_rate(&mut self, hz: u32) {
        self.min_interval = min_interval(hz);
    }
}

fn check_universe(universe: u16) -> Result<()> {
    if universe == 0 || universe > 63999 {
        return Err(ControlError::DmxError(format!(
            "Invalid sACN universe: {} (must be 1-63999)",
            universe
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_universe() {
        assert!(SacnSender::new(0, "beatrig").is_err());
        assert!(SacnSender::new(64000, "beatrig").is_err());
    }

    #[test]
    fn test_sacn_packet_structure() {
        let sender = SacnSender::new(1, "beatrig").unwrap();
        let mut channels = [0u8; 512];
        channels[0] = 42;
        let packet = sender.build_sacn_packet(&channels);

        assert_eq!(packet.len(), 638);
        assert_eq!(
            &packet[4..16],
            &[0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00]
        );
        assert_eq!(&packet[44..51], b"beatrig");
        assert_eq!(packet[108], 100); // priority
        assert_eq!(&packet[113..115], &[0, 1]); // universe
        assert_eq!(packet[125], 0x00); // start code
        assert_eq!(packet[126], 42);
    }

    #[test]
    fn test_priority_clamped() {
        let mut sender = SacnSender::new(1, "beatrig").unwrap();
        sender.set_priority(250);
        let packet = sender.build_sacn_packet(&[0u8; 512]);
        assert_eq!(packet[108], 200);
    }

    #[test]
    fn test_multicast_addr() {
        let sender = SacnSender::new(0x0203, "beatrig").unwrap();
        assert_eq!(sender.multicast_addr().to_string(), "239.255.2.3:5568");
    }
}
