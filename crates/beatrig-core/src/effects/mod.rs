//! Lighting effects
//!
//! An effect is bound to exactly one [`LightsGroup`](crate::group::LightsGroup)
//! and renders it frame by frame. Every kind of effect is a variant of
//! [`LightsEffect`] with its own state struct:
//!
//! - [`BeatFadeOut`] - flash on every beat and fade until the next one
//! - [`Sparkle`] - random fixtures light up and slowly dim
//! - [`Wave`] - a brightness wave travelling along the fixtures
//! - [`FixedPattern`] - fixed colors, optionally shifted on every beat
//! - [`SearchLight`] - moving heads sweep in a circle
//!
//! Effects read time from the `now` passed into [`LightsEffect::tick_at`] and
//! [`LightsEffect::beat_at`], which is always a monotonic [`Instant`].
//!
//! ## Example
//!
//! ```rust
//! use beatrig_core::color::RgbColor;
//! use beatrig_core::effects::{LightsEffect, Wave, WaveProps};
//! use beatrig_core::group::LightsGroup;
//!
//! let group = LightsGroup::new(1, "Front", 1).into_shared();
//! let mut effect = LightsEffect::from(Wave::new(
//!     group,
//!     WaveProps {
//!         color: RgbColor::Blue,
//!         cycle_time: Some(2000),
//!     },
//! ));
//! let _group = effect.tick();
//! ```

mod beat_fade_out;
mod fixed_pattern;
mod registry;
mod search_light;
mod sparkle;
mod wave;

pub use beat_fade_out::{BeatFadeOut, BeatFadeOutProps};
pub use fixed_pattern::{FixedPattern, FixedPatternProps};
pub use registry::{EffectBuilder, EffectRegistry};
pub use search_light::{SearchLight, SearchLightProps};
pub use sparkle::{Sparkle, SparkleProps};
pub use wave::{Wave, WaveProps};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::group::SharedGroup;
use crate::music::BeatEvent;

/// Which part of a fixture an effect drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Color and brightness
    Color,
    /// Pan/tilt only
    Movement,
}

/// An effect instance bound to one group
#[derive(Debug)]
pub enum LightsEffect {
    BeatFadeOut(BeatFadeOut),
    Sparkle(Sparkle),
    Wave(Wave),
    FixedPattern(FixedPattern),
    SearchLight(SearchLight),
}

impl LightsEffect {
    pub fn name(&self) -> &'static str {
        match self {
            LightsEffect::BeatFadeOut(_) => BeatFadeOut::NAME,
            LightsEffect::Sparkle(_) => Sparkle::NAME,
            LightsEffect::Wave(_) => Wave::NAME,
            LightsEffect::FixedPattern(_) => FixedPattern::NAME,
            LightsEffect::SearchLight(_) => SearchLight::NAME,
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            LightsEffect::SearchLight(_) => EffectKind::Movement,
            _ => EffectKind::Color,
        }
    }

    /// The group this effect renders
    pub fn group(&self) -> &SharedGroup {
        match self {
            LightsEffect::BeatFadeOut(e) => &e.group,
            LightsEffect::Sparkle(e) => &e.group,
            LightsEffect::Wave(e) => &e.group,
            LightsEffect::FixedPattern(e) => &e.group,
            LightsEffect::SearchLight(e) => &e.group,
        }
    }

    /// Render the next frame into the group and return it
    pub fn tick_at(&mut self, now: Instant) -> SharedGroup {
        match self {
            LightsEffect::BeatFadeOut(e) => e.tick_at(now),
            LightsEffect::Sparkle(e) => e.tick_at(now),
            LightsEffect::Wave(e) => e.tick_at(now),
            LightsEffect::FixedPattern(e) => e.tick_at(now),
            LightsEffect::SearchLight(e) => e.tick_at(now),
        }
        Arc::clone(self.group())
    }

    pub fn tick(&mut self) -> SharedGroup {
        self.tick_at(Instant::now())
    }

    /// Apply a beat to the effect's internal state
    pub fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        match self {
            LightsEffect::BeatFadeOut(e) => e.beat_at(event, now),
            LightsEffect::FixedPattern(e) => e.beat_at(event),
            LightsEffect::Sparkle(_) | LightsEffect::Wave(_) | LightsEffect::SearchLight(_) => {}
        }
    }

    pub fn beat(&mut self, event: &BeatEvent) {
        self.beat_at(event, Instant::now());
    }

    /// Release per-fixture state. The effect must not be ticked afterwards.
    pub fn destroy(&mut self) {
        tracing::trace!("Destroying {} effect", self.name());
        match self {
            LightsEffect::BeatFadeOut(e) => e.destroy(),
            LightsEffect::Sparkle(e) => e.destroy(),
            LightsEffect::Wave(e) => e.destroy(),
            LightsEffect::FixedPattern(_) => {}
            LightsEffect::SearchLight(e) => e.destroy(),
        }
    }
}

macro_rules! impl_from_effect {
    ($($variant:ident),*) => {
        $(impl From<$variant> for LightsEffect {
            fn from(effect: $variant) -> Self {
                LightsEffect::$variant(effect)
            }
        })*
    };
}

impl_from_effect!(BeatFadeOut, Sparkle, Wave, FixedPattern, SearchLight);

/// Convert a 0..=1 progression into a DMX brightness
pub(crate) fn brightness(progression: f64) -> u8 {
    if progression.is_nan() {
        return 0;
    }
    (progression * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Linear decay from 1 at `since` to 0 after `window`
pub(crate) fn decay(since: Instant, now: Instant, window: Duration) -> f64 {
    let window = window.max(Duration::from_millis(1));
    let elapsed = now.saturating_duration_since(since);
    (1.0 - elapsed.as_secs_f64() / window.as_secs_f64()).max(0.0)
}
