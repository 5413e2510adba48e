use std::collections::HashMap;
use std::time::Instant;

use super::{group_id, EffectsHandler, LightsHandler};
use crate::color::complementary_pair;
use crate::effects::{
    BeatFadeOut, BeatFadeOutProps, LightsEffect, SearchLight, SearchLightProps,
};
use crate::error::Result;
use crate::group::{GroupId, SharedGroup};
use crate::music::{BeatEvent, TrackFeatures};

/// Assigns every group a fresh random effect whenever the music enters a new
/// section.
///
/// The color effect alternates two complementary colors on every beat; moving
/// heads additionally sweep with a [`SearchLight`].
#[derive(Debug)]
pub struct RandomEffectsHandler {
    inner: EffectsHandler,
    last_section_start: f64,
    assignments: HashMap<GroupId, usize>,
}

impl RandomEffectsHandler {
    pub const NAME: &'static str = "random";

    pub fn new() -> Self {
        Self {
            inner: EffectsHandler::named(Self::NAME),
            last_section_start: 0.0,
            assignments: HashMap::new(),
        }
    }

    /// How many times an effect was assigned to the group
    pub fn assignments(&self, group_id: GroupId) -> usize {
        self.assignments.get(&group_id).copied().unwrap_or(0)
    }

    pub fn effects(&self) -> &EffectsHandler {
        &self.inner
    }

    fn assign(&mut self, group_id: GroupId) -> Result<()> {
        // Old effects go first so nothing of theirs outlives the assignment
        self.inner.clear_effects(group_id)?;
        let Some(group) = self.inner.group(group_id).cloned() else {
            return Ok(());
        };

        let colors = complementary_pair();
        let color = BeatFadeOut::new(
            group.clone(),
            BeatFadeOutProps {
                colors: colors.to_vec(),
                enable_fade: false,
                fade_duration: None,
            },
            self.inner.features(),
        )?;
        self.inner.set_effect(group_id, LightsEffect::from(color))?;
        self.inner.set_effect(
            group_id,
            SearchLight::new(group, SearchLightProps::default()).into(),
        )?;

        *self.assignments.entry(group_id).or_default() += 1;
        tracing::debug!(
            "Group {}: random colors {:?}/{:?}",
            group_id,
            colors[0],
            colors[1]
        );
        Ok(())
    }

    fn reassign_all(&mut self) {
        let ids: Vec<GroupId> = self.inner.entities().iter().map(group_id).collect();
        for id in ids {
            if let Err(e) = self.assign(id) {
                tracing::warn!("Could not assign random effect to group {}: {}", id, e);
            }
        }
    }
}

impl Default for RandomEffectsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LightsHandler for RandomEffectsHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn register_entity(&mut self, group: SharedGroup) {
        let id = group_id(&group);
        self.inner.register_entity(group);
        if let Err(e) = self.assign(id) {
            tracing::warn!("Could not assign random effect to group {}: {}", id, e);
        }
    }

    fn remove_entity(&mut self, group_id: GroupId) -> Option<SharedGroup> {
        self.assignments.remove(&group_id);
        self.inner.remove_entity(group_id)
    }

    fn entities(&self) -> Vec<SharedGroup> {
        self.inner.entities()
    }

    fn set_features(&mut self, features: Option<TrackFeatures>) {
        self.inner.set_features(features);
    }

    fn tick_at(&mut self, now: Instant) -> Vec<SharedGroup> {
        self.inner.tick_at(now)
    }

    fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        if let Some(section) = event.section {
            if section.start != self.last_section_start {
                tracing::debug!(
                    "New section at {:.2}s, reassigning effects",
                    section.start
                );
                self.last_section_start = section.start;
                self.reassign_all();
            }
        }
        self.inner.beat_at(event, now);
    }
}
