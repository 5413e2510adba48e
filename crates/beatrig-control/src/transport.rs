//! Delivery of finished frames to hardware
//!
//! The compositor only knows endpoint ids. A [`DmxTransport`] maps those ids
//! to something that can put a 512-byte frame on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dmx::{ArtNetSender, SacnSender, Universe};
use crate::error::{ControlError, Result};

/// Fire-and-forget frame delivery
pub trait DmxTransport: Send {
    /// Whether `endpoint` is currently reachable through this transport
    fn has_endpoint(&self, endpoint: &str) -> bool;

    /// Send one frame. Delivery is not acknowledged.
    fn send(&mut self, endpoint: &str, universe: &Universe) -> Result<()>;

    /// Send a frame that must not be rate limited away, such as the
    /// blackout on shutdown
    fn send_final(&mut self, endpoint: &str, universe: &Universe) -> Result<()> {
        self.send(endpoint, universe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmxProtocol {
    Artnet,
    Sacn,
}

fn default_refresh_rate() -> u32 {
    44
}

fn default_source_name() -> String {
    "beatrig".to_string()
}

/// One transport endpoint as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    pub protocol: DmxProtocol,
    /// Art-Net destination `ip:port`; ignored for sACN
    #[serde(default)]
    pub target: Option<String>,
    pub universe: u16,
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_hz: u32,
    /// sACN source name
    #[serde(default = "default_source_name")]
    pub source_name: String,
}

enum DmxSender {
    ArtNet(ArtNetSender),
    Sacn(SacnSender),
}

impl DmxSender {
    fn send(&mut self, universe: &Universe) -> Result<()> {
        match self {
            DmxSender::ArtNet(sender) => sender.send_dmx(universe),
            DmxSender::Sacn(sender) => sender.send_dmx(universe),
        }
    }

    fn send_now(&mut self, universe: &Universe) -> Result<()> {
        match self {
            DmxSender::ArtNet(sender) => sender.send_now(universe),
            DmxSender::Sacn(sender) => sender.send_now(universe),
        }
    }
}

/// Art-Net/sACN senders keyed by endpoint id
#[derive(Default)]
pub struct UdpDmxTransport {
    senders: HashMap<String, DmxSender>,
}

impl UdpDmxTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured endpoint
    pub fn from_config(endpoints: &[EndpointConfig]) -> Result<Self> {
        let mut transport = Self::new();
        for endpoint in endpoints {
            transport.add_endpoint(endpoint)?;
        }
        Ok(transport)
    }

    pub fn add_endpoint(&mut self, config: &EndpointConfig) -> Result<()> {
        let sender = match config.protocol {
            DmxProtocol::Artnet => {
                let target = config.target.as_deref().ok_or_else(|| {
                    ControlError::DmxError(format!("Art-Net endpoint '{}' has no target", config.id))
                })?;
                let mut sender = ArtNetSender::new(config.universe, target)?;
                sender.set_refresh_rate(config.refresh_rate_hz);
                DmxSender::ArtNet(sender)
            }
            DmxProtocol::Sacn => {
                let mut sender = SacnSender::new(config.universe, &config.source_name)?;
                sender.set_refresh_rate(config.refresh_rate_hz);
                DmxSender::Sacn(sender)
            }
        };
        self.senders.insert(config.id.clone(), sender);
        Ok(())
    }

    pub fn remove_endpoint(&mut self, id: &str) -> bool {
        self.senders.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    fn sender(&mut self, endpoint: &str) -> Result<&mut DmxSender> {
        self.senders
            .get_mut(endpoint)
            .ok_or_else(|| ControlError::EndpointNotFound(endpoint.to_string()))
    }
}

impl DmxTransport for UdpDmxTransport {
    fn has_endpoint(&self, endpoint: &str) -> bool {
        self.senders.contains_key(endpoint)
    }

    fn send(&mut self, endpoint: &str, universe: &Universe) -> Result<()> {
        self.sender(endpoint)?.send(universe)
    }

    fn send_final(&mut self, endpoint: &str, universe: &Universe) -> Result<()> {
        self.sender(endpoint)?.send_now(universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::time::Duration;

    #[test]
    fn test_endpoint_config_defaults() {
        let config: EndpointConfig =
            serde_json::from_str(r#"{"id": "stage", "protocol": "sacn", "universe": 1}"#).unwrap();
        assert_eq!(config.protocol, DmxProtocol::Sacn);
        assert_eq!(config.refresh_rate_hz, 44);
        assert_eq!(config.source_name, "beatrig");
        assert!(config.target.is_none());
    }

    #[test]
    fn test_artnet_requires_target() {
        let config = EndpointConfig {
            id: "stage".to_string(),
            protocol: DmxProtocol::Artnet,
            target: None,
            universe: 0,
            refresh_rate_hz: 44,
            source_name: default_source_name(),
        };
        assert!(UdpDmxTransport::from_config(&[config]).is_err());
    }

    #[test]
    fn test_send_to_artnet_endpoint() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let mut transport = UdpDmxTransport::from_config(&[EndpointConfig {
            id: "stage".to_string(),
            protocol: DmxProtocol::Artnet,
            target: Some(receiver.local_addr().unwrap().to_string()),
            universe: 3,
            refresh_rate_hz: 0,
            source_name: default_source_name(),
        }])
        .unwrap();
        assert!(transport.has_endpoint("stage"));
        assert!(!transport.has_endpoint("booth"));

        let mut universe = Universe::new();
        universe.write_window(1, &[200]);
        transport.send("stage", &universe).unwrap();

        let mut buf = [0u8; 600];
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(len, 530);
        assert_eq!(buf[14], 3);
        assert_eq!(buf[18], 200);

        assert!(matches!(
            transport.send("booth", &universe),
            Err(ControlError::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_final_frame_bypasses_refresh_rate() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();

        let mut transport = UdpDmxTransport::from_config(&[EndpointConfig {
            id: "stage".to_string(),
            protocol: DmxProtocol::Artnet,
            target: Some(receiver.local_addr().unwrap().to_string()),
            universe: 0,
            refresh_rate_hz: 44,
            source_name: default_source_name(),
        }])
        .unwrap();

        let mut lit = Universe::new();
        lit.write_window(1, &[255]);
        transport.send("stage", &lit).unwrap();
        // Inside the 44 Hz window: a regular frame is dropped, the final one is not
        transport.send("stage", &lit).unwrap();
        transport.send_final("stage", &Universe::new()).unwrap();

        let mut buf = [0u8; 600];
        assert_eq!(receiver.recv(&mut buf).unwrap(), 530);
        assert_eq!(buf[18], 255);
        assert_eq!(receiver.recv(&mut buf).unwrap(), 530);
        assert_eq!(buf[18], 0);
        assert!(receiver.recv(&mut buf).is_err());
    }
}
