//! Turns a validated configuration into running engines

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use beatrig_control::FrameCompositor;
use beatrig_core::{
    EffectRegistry, EffectsHandler, HandlerManager, MusicEmitter, RandomEffectsHandler,
    SimpleLightsHandler,
};
use parking_lot::Mutex;

use crate::config::AppConfig;

pub struct Rig {
    pub handlers: HandlerManager,
    pub compositor: FrameCompositor,
    pub group_count: usize,
}

impl Rig {
    pub fn build(config: &AppConfig, registry: &EffectRegistry) -> Result<Self> {
        let mut handlers = HandlerManager::new();
        handlers.add_handler(Box::new(EffectsHandler::new()));
        handlers.add_handler(Box::new(RandomEffectsHandler::new()));
        handlers.add_handler(Box::new(SimpleLightsHandler::new()));

        for entry in &config.groups {
            let id = entry.group.id;
            handlers
                .assign_group(entry.group.clone().into_shared(), &entry.handler)
                .with_context(|| format!("group {}", id))?;

            let Some(effect) = entry.effect.as_deref() else {
                continue;
            };
            let effects = handlers
                .handler_mut(&entry.handler)
                .and_then(|h| h.as_effects_mut())
                .ok_or_else(|| {
                    anyhow!(
                        "group {}: handler '{}' does not take explicit effects",
                        id,
                        entry.handler
                    )
                })?;
            effects
                .apply_effect(
                    id,
                    effect,
                    entry.effect_props.clone().unwrap_or_default(),
                    registry,
                )
                .with_context(|| format!("group {}", id))?;
        }

        let mut compositor = FrameCompositor::new(config.namespace.clone());
        for controller in &config.controllers {
            compositor.add_controller(controller.clone());
        }

        Ok(Self {
            handlers,
            compositor,
            group_count: config.groups.len(),
        })
    }
}

/// Route bus events into the handlers
pub fn connect(emitter: &MusicEmitter, handlers: &Arc<Mutex<HandlerManager>>) {
    let beat_handlers = Arc::clone(handlers);
    emitter.beat.subscribe(move |event| beat_handlers.lock().beat(event));

    let feature_handlers = Arc::clone(handlers);
    emitter
        .features
        .subscribe(move |features| feature_handlers.lock().set_features(Some(*features)));

    emitter.change_track.subscribe(|event| {
        tracing::debug!("Track started at {}: {}", event.start_time, event.title);
    });

    let stop_handlers = Arc::clone(handlers);
    emitter
        .stop
        .subscribe(move |_| stop_handlers.lock().set_features(None));
}
