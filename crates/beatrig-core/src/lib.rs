//! Beatrig Core - Lighting Model, Music Events and Effects
//!
//! This crate contains the I/O-free part of beatrig, including:
//! - Fixtures, lighting groups and controllers
//! - The musical event hierarchy (beats, segments, sections, tatums)
//! - The music event bus
//! - Effect state machines and the effect registry
//! - Handler engines that map groups to effects

pub mod color;
pub mod effects;
pub mod error;
pub mod events;
pub mod fixture;
pub mod group;
pub mod handlers;
pub mod music;

// --- Re-exports grouped by category ---

// Model
pub use color::{complementary_pair, ColorSpec, RgbColor, WheelColor};
pub use fixture::{
    ColorChannels, Fixture, FixtureLayout, FixtureState, MovementChannels, NamedValue,
    ResetChannel, ShutterOption, WheelChannels, FIXTURE_WINDOW,
};
pub use group::{
    validate_universe_layout, ControllerId, GroupFixture, GroupId, LightsController, LightsGroup,
    SharedGroup, UNIVERSE_SIZE,
};

// Music
pub use events::{Channel, ListenerId, MusicEmitter};
pub use music::{
    AudioAnalysis, Beat, BeatEvent, Device, PlaybackState, Section, Segment, StopEvent, Tatum,
    TimeInterval, TrackChangeEvent, TrackFeatures, TrackInfo,
};

// Effects & handlers
pub use effects::{EffectKind, EffectRegistry, LightsEffect};
pub use handlers::{
    EffectsHandler, HandlerManager, LightsHandler, RandomEffectsHandler, Scene, SceneEffect,
    SimpleLightsHandler,
};

pub use error::{CoreError, Result};
