//! Beatrig Control - Timing, Playback and DMX Output
//!
//! This crate connects the lighting model of `beatrig-core` to the outside world:
//! - **Scheduler**: polls the music player and fires beat events on time
//! - **Playback**: the playback source seam and its Spotify Web API client
//! - **Compositor**: turns group state into one DMX universe per controller
//! - **Transport**: delivers universes to endpoints
//! - **DMX**: Art-Net and sACN wire encoders
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beatrig_control::{FrameCompositor, UdpDmxTransport};
//! use beatrig_core::{HandlerManager, LightsController};
//!
//! let mut compositor = FrameCompositor::new("lights");
//! compositor.add_controller(LightsController::new(1, "Stage").with_endpoint("lights", "stage"));
//!
//! let mut handlers = HandlerManager::new();
//! let mut transport = UdpDmxTransport::new();
//! compositor.tick(&mut handlers, &mut transport);
//! ```

/// Error types
pub mod error;

/// Frame composition
pub mod compositor;
/// DMX output (Art-Net, sACN)
pub mod dmx;
/// Playback source and Spotify client
pub mod playback;
/// Beat scheduling engine
pub mod scheduler;
/// Endpoint delivery
pub mod transport;

// Re-exports
pub use compositor::{FrameCompositor, DEFAULT_TICK_INTERVAL};
pub use dmx::{ArtNetSender, SacnSender, Universe};
pub use error::{ControlError, Result};
pub use playback::{PlaybackSource, SpotifyClient, SpotifyConfig};
pub use scheduler::{build_schedule, BeatScheduler, ScheduledBeat, SchedulerConfig};
pub use transport::{DmxProtocol, DmxTransport, EndpointConfig, UdpDmxTransport};
