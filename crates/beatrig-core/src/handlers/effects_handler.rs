use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::{group_id, LightsHandler};
use crate::effects::{EffectKind, EffectRegistry, LightsEffect};
use crate::error::{CoreError, Result};
use crate::group::{GroupId, SharedGroup};
use crate::music::{BeatEvent, TrackFeatures};

/// One effect assignment inside a [`Scene`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEffect {
    pub group_id: GroupId,
    pub effect_name: String,
    #[serde(default)]
    pub effect_props: Value,
}

/// A named set of effect assignments applied together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(default)]
    pub effects: Vec<SceneEffect>,
}

impl Scene {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug)]
struct GroupSlots {
    id: GroupId,
    group: SharedGroup,
    color: Option<LightsEffect>,
    movement: Option<LightsEffect>,
}

impl GroupSlots {
    fn new(id: GroupId, group: SharedGroup) -> Self {
        Self {
            id,
            group,
            color: None,
            movement: None,
        }
    }

    fn slot_mut(&mut self, kind: EffectKind) -> &mut Option<LightsEffect> {
        match kind {
            EffectKind::Color => &mut self.color,
            EffectKind::Movement => &mut self.movement,
        }
    }

    fn destroy_all(&mut self) {
        for mut effect in [self.color.take(), self.movement.take()].into_iter().flatten() {
            effect.destroy();
        }
    }
}

/// Handler with explicitly assigned effects.
///
/// Every group has one color effect slot and one movement effect slot. A
/// group without a color effect is blacked out on every tick.
#[derive(Debug)]
pub struct EffectsHandler {
    name: String,
    slots: Vec<GroupSlots>,
    features: Option<TrackFeatures>,
}

impl EffectsHandler {
    pub const NAME: &'static str = "effects";

    pub fn new() -> Self {
        Self::named(Self::NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            features: None,
        }
    }

    /// Features of the current track, passed to newly built effects
    pub fn features(&self) -> Option<&TrackFeatures> {
        self.features.as_ref()
    }

    pub fn contains(&self, group_id: GroupId) -> bool {
        self.slots.iter().any(|s| s.id == group_id)
    }

    pub fn group(&self, group_id: GroupId) -> Option<&SharedGroup> {
        self.slots
            .iter()
            .find(|s| s.id == group_id)
            .map(|s| &s.group)
    }

    fn slots_mut(&mut self, group_id: GroupId) -> Result<&mut GroupSlots> {
        self.slots
            .iter_mut()
            .find(|s| s.id == group_id)
            .ok_or(CoreError::GroupNotFound(group_id))
    }

    /// The effect currently in the given slot of a group
    pub fn effect(&self, group_id: GroupId, kind: EffectKind) -> Option<&LightsEffect> {
        let slots = self.slots.iter().find(|s| s.id == group_id)?;
        match kind {
            EffectKind::Color => slots.color.as_ref(),
            EffectKind::Movement => slots.movement.as_ref(),
        }
    }

    /// Install an effect built for a registered group, destroying the effect
    /// it replaces
    pub fn set_effect(&mut self, group_id: GroupId, effect: LightsEffect) -> Result<()> {
        let slots = self.slots_mut(group_id)?;
        if !Arc::ptr_eq(effect.group(), &slots.group) {
            return Err(CoreError::InvalidEffectProps {
                effect: effect.name().to_string(),
                reason: format!("effect is bound to a group other than {}", group_id),
            });
        }

        tracing::debug!("Group {}: {} effect assigned", group_id, effect.name());
        if let Some(mut previous) = slots.slot_mut(effect.kind()).replace(effect) {
            previous.destroy();
        }
        Ok(())
    }

    /// Build the effect `name` from JSON props and install it
    pub fn apply_effect(
        &mut self,
        group_id: GroupId,
        name: &str,
        props: Value,
        registry: &EffectRegistry,
    ) -> Result<()> {
        let group = Arc::clone(&self.slots_mut(group_id)?.group);
        let effect = registry.create(name, group, props, self.features.as_ref())?;
        self.set_effect(group_id, effect)
    }

    /// Remove both effects of a group; it renders blackout from now on
    pub fn clear_effects(&mut self, group_id: GroupId) -> Result<()> {
        self.slots_mut(group_id)?.destroy_all();
        Ok(())
    }

    /// Apply every entry of `scene` that targets a group of this handler.
    ///
    /// All effects are built before any is installed, so an invalid entry
    /// leaves the current assignments untouched. Returns how many effects
    /// were installed.
    pub fn apply_scene(&mut self, scene: &Scene, registry: &EffectRegistry) -> Result<usize> {
        let mut built = Vec::new();
        for entry in &scene.effects {
            let Some(group) = self.group(entry.group_id) else {
                tracing::trace!(
                    "Scene '{}': group {} not handled by '{}'",
                    scene.name,
                    entry.group_id,
                    self.name
                );
                continue;
            };
            let effect = registry.create(
                &entry.effect_name,
                Arc::clone(group),
                entry.effect_props.clone(),
                self.features.as_ref(),
            )?;
            built.push((entry.group_id, effect));
        }

        let count = built.len();
        for (group_id, effect) in built {
            self.set_effect(group_id, effect)?;
        }
        tracing::info!("Applied scene '{}' ({} effects)", scene.name, count);
        Ok(count)
    }
}

impl Default for EffectsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LightsHandler for EffectsHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_entity(&mut self, group: SharedGroup) {
        let id = group_id(&group);
        match self.slots.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.destroy_all();
                existing.group = group;
            }
            None => self.slots.push(GroupSlots::new(id, group)),
        }
    }

    fn remove_entity(&mut self, group_id: GroupId) -> Option<SharedGroup> {
        let index = self.slots.iter().position(|s| s.id == group_id)?;
        let mut slots = self.slots.remove(index);
        slots.destroy_all();
        Some(slots.group)
    }

    fn entities(&self) -> Vec<SharedGroup> {
        self.slots.iter().map(|s| Arc::clone(&s.group)).collect()
    }

    fn set_features(&mut self, features: Option<TrackFeatures>) {
        self.features = features;
    }

    fn tick_at(&mut self, now: Instant) -> Vec<SharedGroup> {
        self.slots
            .iter_mut()
            .map(|slots| {
                match slots.color.as_mut() {
                    Some(effect) => {
                        effect.tick_at(now);
                    }
                    None => slots.group.lock().blackout(),
                }
                if let Some(effect) = slots.movement.as_mut() {
                    effect.tick_at(now);
                }
                Arc::clone(&slots.group)
            })
            .collect()
    }

    fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        for slots in &mut self.slots {
            for effect in [slots.color.as_mut(), slots.movement.as_mut()]
                .into_iter()
                .flatten()
            {
                effect.beat_at(event, now);
            }
        }
    }

    fn as_effects_mut(&mut self) -> Option<&mut EffectsHandler> {
        Some(self)
    }
}
