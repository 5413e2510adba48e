//! Handler engines
//!
//! A handler owns a set of lighting groups and decides what they render. The
//! compositor calls [`LightsHandler::tick_at`] at a fixed rate, and beat events
//! from the music bus arrive through [`LightsHandler::beat_at`]. The
//! [`HandlerManager`] routes every group to exactly one handler.

mod effects_handler;
mod manager;
mod random;
mod simple;

pub use effects_handler::{EffectsHandler, Scene, SceneEffect};
pub use manager::HandlerManager;
pub use random::RandomEffectsHandler;
pub use simple::SimpleLightsHandler;

use std::time::Instant;

use crate::group::{GroupId, SharedGroup};
use crate::music::{BeatEvent, TrackFeatures};

/// A driver of lighting groups
pub trait LightsHandler: Send {
    /// Name used to route groups to this handler
    fn name(&self) -> &str;

    /// Start driving `group`. Registering a group id twice replaces the
    /// previous registration.
    fn register_entity(&mut self, group: SharedGroup);

    /// Stop driving the group with `group_id`. Returns the group if it was
    /// registered; unknown ids are ignored.
    fn remove_entity(&mut self, group_id: GroupId) -> Option<SharedGroup>;

    /// Groups currently registered, in registration order
    fn entities(&self) -> Vec<SharedGroup>;

    /// Features of the track that is now playing, `None` once it stopped
    fn set_features(&mut self, _features: Option<TrackFeatures>) {}

    /// Render one frame into every registered group and return the groups
    /// that may have changed
    fn tick_at(&mut self, now: Instant) -> Vec<SharedGroup>;

    fn tick(&mut self) -> Vec<SharedGroup> {
        self.tick_at(Instant::now())
    }

    fn beat_at(&mut self, event: &BeatEvent, now: Instant);

    fn beat(&mut self, event: &BeatEvent) {
        self.beat_at(event, Instant::now());
    }

    /// Explicit effect assignment, for handlers that support it
    fn as_effects_mut(&mut self) -> Option<&mut EffectsHandler> {
        None
    }
}

/// Id of a shared group, read under its lock
pub(crate) fn group_id(group: &SharedGroup) -> GroupId {
    group.lock().id
}
