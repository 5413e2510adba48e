use std::collections::HashMap;
use std::time::Instant;

use super::{group_id, LightsHandler, Scene};
use crate::effects::EffectRegistry;
use crate::error::{CoreError, Result};
use crate::group::{GroupId, SharedGroup};
use crate::music::{BeatEvent, TrackFeatures};

/// Owns the handlers and routes every group to exactly one of them
#[derive(Default)]
pub struct HandlerManager {
    handlers: Vec<Box<dyn LightsHandler>>,
    routes: HashMap<GroupId, usize>,
}

impl HandlerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. A handler with the same name is replaced and its
    /// groups are handed over to the new one.
    pub fn add_handler(&mut self, mut handler: Box<dyn LightsHandler>) {
        match self
            .handlers
            .iter()
            .position(|h| h.name() == handler.name())
        {
            Some(index) => {
                for group in self.handlers[index].entities() {
                    handler.register_entity(group);
                }
                self.handlers[index] = handler;
            }
            None => self.handlers.push(handler),
        }
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    pub fn handler_mut(&mut self, name: &str) -> Option<&mut (dyn LightsHandler + 'static)> {
        self.handlers
            .iter_mut()
            .find(|h| h.name() == name)
            .map(|h| h.as_mut())
    }

    /// Name of the handler driving `group_id`
    pub fn handler_for(&self, group_id: GroupId) -> Option<&str> {
        self.routes
            .get(&group_id)
            .and_then(|i| self.handlers.get(*i))
            .map(|h| h.name())
    }

    /// Route `group` to the handler `name`, moving it away from any handler
    /// that drove it before
    pub fn assign_group(&mut self, group: SharedGroup, name: &str) -> Result<()> {
        let index = self
            .handlers
            .iter()
            .position(|h| h.name() == name)
            .ok_or_else(|| CoreError::HandlerNotFound(name.to_string()))?;

        let id = group_id(&group);
        if let Some(previous) = self.routes.insert(id, index) {
            if previous != index {
                self.handlers[previous].remove_entity(id);
            }
        }
        self.handlers[index].register_entity(group);
        tracing::debug!("Group {} -> handler '{}'", id, name);
        Ok(())
    }

    /// Stop driving a group. Unknown ids are ignored.
    pub fn remove_group(&mut self, group_id: GroupId) -> Option<SharedGroup> {
        let index = self.routes.remove(&group_id)?;
        self.handlers.get_mut(index)?.remove_entity(group_id)
    }

    pub fn set_features(&mut self, features: Option<TrackFeatures>) {
        for handler in &mut self.handlers {
            handler.set_features(features);
        }
    }

    /// Tick every handler and collect all groups they returned
    pub fn tick_at(&mut self, now: Instant) -> Vec<SharedGroup> {
        self.handlers
            .iter_mut()
            .flat_map(|h| h.tick_at(now))
            .collect()
    }

    pub fn tick(&mut self) -> Vec<SharedGroup> {
        self.tick_at(Instant::now())
    }

    pub fn beat_at(&mut self, event: &BeatEvent, now: Instant) {
        for handler in &mut self.handlers {
            handler.beat_at(event, now);
        }
    }

    pub fn beat(&mut self, event: &BeatEvent) {
        self.beat_at(event, Instant::now());
    }

    /// Apply a scene across every handler that accepts explicit effects
    pub fn apply_scene(&mut self, scene: &Scene, registry: &EffectRegistry) -> Result<usize> {
        let mut applied = 0;
        for handler in &mut self.handlers {
            if let Some(effects) = handler.as_effects_mut() {
                applied += effects.apply_scene(scene, registry)?;
            }
        }
        if applied < scene.effects.len() {
            tracing::warn!(
                "Scene '{}': {} of {} effects target groups without an effects handler",
                scene.name,
                scene.effects.len() - applied,
                scene.effects.len()
            );
        }
        Ok(applied)
    }
}
