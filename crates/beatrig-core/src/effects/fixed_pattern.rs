use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::color::RgbColor;
use crate::error::{CoreError, Result};
use crate::group::SharedGroup;
use crate::music::BeatEvent;

fn default_brightness() -> u8 {
    255
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedPatternProps {
    /// Colors assigned to consecutive fixtures, repeating
    pub colors: Vec<RgbColor>,
    /// Shift the pattern by one fixture on every beat
    #[serde(default)]
    pub alternate_on_beat: bool,
    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

/// Static colors spread over the fixtures
#[derive(Debug)]
pub struct FixedPattern {
    pub(super) group: SharedGroup,
    props: FixedPatternProps,
    offset: usize,
}

impl FixedPattern {
    pub const NAME: &'static str = "FixedPattern";

    pub fn new(group: SharedGroup, props: FixedPatternProps) -> Result<Self> {
        if props.colors.is_empty() {
            return Err(CoreError::EmptyPalette { effect: Self::NAME });
        }
        Ok(Self {
            group,
            props,
            offset: 0,
        })
    }

    pub(super) fn tick_at(&mut self, _now: Instant) {
        let colors = &self.props.colors;
        let mut group = self.group.lock();
        for (i, p) in group.fixtures_mut().enumerate() {
            p.fixture.set_color(colors[(i + self.offset) % colors.len()]);
            p.fixture.set_master_dimmer(self.props.brightness);
        }
    }

    pub(super) fn beat_at(&mut self, _event: &BeatEvent) {
        if self.props.alternate_on_beat {
            self.offset = (self.offset + 1) % self.props.colors.len();
        }
    }
}
