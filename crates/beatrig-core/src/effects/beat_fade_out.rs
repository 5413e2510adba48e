use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{brightness, decay};
use crate::color::RgbColor;
use crate::error::{CoreError, Result};
use crate::group::SharedGroup;
use crate::music::{BeatEvent, TrackFeatures};

/// Beat length assumed before the first beat when no tempo is known
const DEFAULT_BEAT_LENGTH: Duration = Duration::from_millis(500);

fn default_enable_fade() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatFadeOutProps {
    /// Colors to step through, one per beat
    pub colors: Vec<RgbColor>,
    /// Fade out between beats. When off, fixtures stay at full brightness.
    #[serde(default = "default_enable_fade")]
    pub enable_fade: bool,
    /// Fade length in milliseconds; defaults to the length of the beat
    #[serde(default)]
    pub fade_duration: Option<u64>,
}

/// Flash on every beat, then fade out over the beat
#[derive(Debug)]
pub struct BeatFadeOut {
    pub(super) group: SharedGroup,
    props: BeatFadeOutProps,
    color_index: usize,
    last_beat: Option<Instant>,
    beat_length: Duration,
}

impl BeatFadeOut {
    pub const NAME: &'static str = "BeatFadeOut";

    pub fn new(
        group: SharedGroup,
        props: BeatFadeOutProps,
        features: Option<&TrackFeatures>,
    ) -> Result<Self> {
        if props.colors.is_empty() {
            return Err(CoreError::EmptyPalette { effect: Self::NAME });
        }

        let beat_length = features
            .filter(|f| f.tempo > 0.0)
            .and_then(|f| Duration::try_from_secs_f64(60.0 / f.tempo).ok())
            .unwrap_or(DEFAULT_BEAT_LENGTH);

        Ok(Self {
            group,
            props,
            color_index: 0,
            last_beat: None,
            beat_length,
        })
    }

    pub fn current_color(&self) -> RgbColor {
        self.props.colors[self.color_index % self.props.colors.len()]
    }

    pub(super) fn tick_at(&mut self, now: Instant) {
        let progression = match (self.props.enable_fade, self.last_beat) {
            (false, _) => 1.0,
            (true, None) => 0.0,
            (true, Some(beat)) => decay(beat, now, self.beat_length),
        };
        let color = self.current_color();

        let mut group = self.group.lock();
        for p in group.fixtures_mut() {
            p.fixture.set_color(color);
            p.fixture.set_master_dimmer(brightness(progression));
        }
    }

    pub(super) fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        self.last_beat = Some(now);
        self.beat_length = match self.props.fade_duration {
            Some(ms) => Duration::from_millis(ms),
            None if event.beat.duration > 0.0 => {
                Duration::try_from_secs_f64(event.beat.duration).unwrap_or(self.beat_length)
            }
            None => self.beat_length,
        };
        self.color_index = (self.color_index + 1) % self.props.colors.len();
    }

    pub(super) fn destroy(&mut self) {
        self.last_beat = None;
    }
}
