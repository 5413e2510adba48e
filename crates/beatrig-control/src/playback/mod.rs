//! External playback source
//!
//! The beat scheduler only needs five things from a music player: what is
//! playing, the feature summary and structural analysis of a track, and a way
//! to pause or resume a device.

pub mod spotify;

pub use spotify::{SpotifyClient, SpotifyConfig};

use std::future::Future;

use beatrig_core::{AudioAnalysis, PlaybackState, TrackFeatures};

use crate::Result;

pub trait PlaybackSource: Send + Sync + 'static {
    /// Current player state; `None` when nothing is active
    fn current_playback(&self) -> impl Future<Output = Result<Option<PlaybackState>>> + Send;

    fn audio_features(&self, track_id: &str) -> impl Future<Output = Result<TrackFeatures>> + Send;

    fn audio_analysis(&self, track_id: &str) -> impl Future<Output = Result<AudioAnalysis>> + Send;

    fn pause(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;

    fn resume(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;
}
