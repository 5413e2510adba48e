//! Art-Net protocol implementation (Art-Net 4)
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::{min_interval, Universe, SEND_TIMEOUT};
use crate::{error::ControlError, Result};

/// Art-Net sender for one universe and one destination
pub struct ArtNetSender {
    socket: UdpSocket,
    target: SocketAddr,
    universe: u16,
    sequence: u8,
    last_send: Option<Instant>,
    min_interval: Duration,
}

impl ArtNetSender {
    /// Create a new Art-Net sender
    ///
    /// # Arguments
    /// * `universe` - Art-Net port-address (0-32767)
    /// * `target` - Destination, e.g. "255.255.255.255:6454" or a node's unicast address
    pub fn new(universe: u16, target: &str) -> Result<Self> {
        if universe > 0x7FFF {
            return Err(ControlError::DmxError(format!(
                "Invalid Art-Net universe: {} (must be 0-32767)",
                universe
            )));
        }
        let target: SocketAddr = target
            .parse()
            .map_err(|e| ControlError::DmxError(format!("Invalid Art-Net target address: {}", e)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        socket.set_write_timeout(Some(SEND_TIMEOUT))?;

        tracing::info!("Art-Net sender created for universe {} -> {}", universe, target);

        Ok(Self {
            socket,
            target,
            universe,
            sequence: 0,
            last_send: None,
            min_interval: min_interval(44),
        })
    }

    /// Send one frame. Frames arriving faster than the refresh rate are dropped.
    pub fn send_dmx(&mut self, universe: &Universe) -> Result<()> {
        if self
            .last_send
            .is_some_and(|last| last.elapsed() < self.min_interval)
        {
            tracing::trace!("Dropped Art-Net frame for universe {} (rate limit)", self.universe);
            return Ok(());
        }
        self.send_now(universe)
    }

    /// Send one frame regardless of the refresh rate
    pub fn send_now(&mut self, universe: &Universe) -> Result<()> {
        let packet = self.build_artnet_packet(universe.as_bytes());
        self.socket.send_to(&packet, self.target)?;
        self.sequence = self.sequence.wrapping_add(1);
        self.last_send = Some(Instant::now());

        tracing::trace!("Sent Art-Net DMX packet for universe {}", self.universe);

        Ok(())
    }

    /// Build an Art-Net DMX packet (OpDmx)
    fn build_artnet_packet(&self, channels: &[u8; 512]) -> Vec<u8> {
        let mut packet = vec![0u8; 18 + 512];

        // Header: "Art-Net\0"
        packet[0..8].copy_from_slice(b"Art-Net\0");

        // OpCode: OpDmx (0x5000), little-endian
        packet[8..10].copy_from_slice(&0x5000u16.to_le_bytes());

        // Protocol version (14)
        packet[10..12].copy_from_slice(&14u16.to_be_bytes());

        // Sequence; 0 would disable reordering on the node
        packet[12] = self.sequence.max(1);

        // Physical (0)
        packet[13] = 0;

        // Port-Address: SubUni then Net
        packet[14..16].copy_from_slice(&self.universe.to_le_bytes());

        // Length (512 channels, big-endian)
        packet[16..18].copy_from_slice(&512u16.to_be_bytes());

        packet[18..].copy_from_slice(channels);

        packet
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Limit how often frames go out; 0 disables the limit
    pub fn set_refresh_rate(&mut self, hz: u32) {
        self.min_interval = min_interval(hz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artnet_packet_structure() {
        let sender = ArtNetSender::new(0x0102, "127.0.0.1:6454").unwrap();

        let mut channels = [0u8; 512];
        channels[0] = 255;
        channels[511] = 7;
        let packet = sender.build_artnet_packet(&channels);

        assert_eq!(&packet[0..8], b"Art-Net\0");

        // OpCode (little-endian)
        assert_eq!(packet[8], 0x00);
        assert_eq!(packet[9], 0x50);

        // Protocol version (big-endian)
        assert_eq!(packet[10], 0);
        assert_eq!(packet[11], 14);

        // Port-address (little-endian)
        assert_eq!(packet[14], 0x02);
        assert_eq!(packet[15], 0x01);

        // Length (big-endian)
        assert_eq!(packet[16], 0x02);
        assert_eq!(packet[17], 0x00);

        assert_eq!(packet[18], 255);
        assert_eq!(packet[18 + 511], 7);
        assert_eq!(packet.len(), 18 + 512);
    }

    #[test]
    fn test_invalid_target() {
        assert!(ArtNetSender::new(0, "invalid:address").is_err());
    }

    #[test]
    fn test_invalid_universe() {
        assert!(ArtNetSender::new(0x8000, "127.0.0.1:6454").is_err());
    }

    #[test]
    fn test_sequence_never_zero() {
        let mut sender = ArtNetSender::new(0, "127.0.0.1:6454").unwrap();
        let channels = [0u8; 512];
        assert_eq!(sender.build_artnet_packet(&channels)[12], 1);

        sender.sequence = 41;
        assert_eq!(sender.build_artnet_packet(&channels)[12], 41);
    }

    #[test]
    fn test_refresh_rate_drops_fast_frames() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let mut sender = ArtNetSender::new(0, &target).unwrap();
        sender.set_refresh_rate(1);
        sender.send_dmx(&Universe::new()).unwrap();
        sender.send_dmx(&Universe::new()).unwrap();

        let mut buf = [0u8; 600];
        assert_eq!(receiver.recv(&mut buf).unwrap(), 530);
        assert!(receiver.recv(&mut buf).is_err());
    }

    #[test]
    fn test_send_now_ignores_refresh_rate() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let mut sender = ArtNetSender::new(0, &target).unwrap();
        sender.set_refresh_rate(1);
        sender.send_dmx(&Universe::new()).unwrap();
        sender.send_now(&Universe::new()).unwrap();

        let mut buf = [0u8; 600];
        assert_eq!(receiver.recv(&mut buf).unwrap(), 530);
        assert_eq!(buf[12], 1);
        assert_eq!(receiver.recv(&mut buf).unwrap(), 530);
        assert_eq!(buf[12], 1);
    }
}
