use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{group_id, LightsHandler};
use crate::color::RgbColor;
use crate::effects::{brightness, decay};
use crate::group::{GroupId, SharedGroup};
use crate::music::BeatEvent;

/// Pars alternate in pink on every beat: even pars on one beat, odd pars on
/// the next, each flash fading over the length of the beat.
#[derive(Debug, Default)]
pub struct SimpleLightsHandler {
    groups: Vec<SharedGroup>,
    ping: bool,
    last_beat: Option<Instant>,
    beat_length: Duration,
}

impl SimpleLightsHandler {
    pub const NAME: &'static str = "simple";

    pub fn new() -> Self {
        Self::default()
    }
}

impl LightsHandler for SimpleLightsHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn register_entity(&mut self, group: SharedGroup) {
        let id = group_id(&group);
        self.groups.retain(|g| group_id(g) != id);
        self.groups.push(group);
    }

    fn remove_entity(&mut self, group_id: GroupId) -> Option<SharedGroup> {
        let index = self
            .groups
            .iter()
            .position(|g| super::group_id(g) == group_id)?;
        Some(self.groups.remove(index))
    }

    fn entities(&self) -> Vec<SharedGroup> {
        self.groups.clone()
    }

    fn tick_at(&mut self, now: Instant) -> Vec<SharedGroup> {
        let progression = self
            .last_beat
            .map_or(0.0, |beat| decay(beat, now, self.beat_length));
        let lit = usize::from(self.ping);

        for group in &self.groups {
            let mut group = group.lock();
            for (i, p) in group.pars.iter_mut().enumerate() {
                if i % 2 == lit {
                    p.fixture.set_color(RgbColor::Pink);
                    p.fixture.set_master_dimmer(brightness(progression));
                } else {
                    p.fixture.set_master_dimmer(0);
                }
            }
        }
        self.groups.iter().map(Arc::clone).collect()
    }

    fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        self.last_beat = Some(now);
        if event.beat.duration > 0.0 {
            if let Ok(length) = Duration::try_from_secs_f64(event.beat.duration) {
                self.beat_length = length;
            }
        }
        self.ping = !self.ping;
    }
}
