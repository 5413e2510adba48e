//! Frame compositor
//!
//! Turns the groups returned by the handlers into one [`Universe`] per
//! controller and hands the frames to a [`DmxTransport`].
//!
//! Each tick builds fresh frames. A fixture whose state changed at or after
//! the start of the previous compose is re-encoded; any other fixture has its
//! 16-channel window copied from the previous frame. Channels that belong to
//! no fixture are zero.
//!
//! Change detection compares timestamps against the previous compose, so a
//! fixture updated in the short gap between the end of one compose and the
//! reference instant can be reused for one extra tick. For light output that
//! is an accepted tolerance.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use beatrig_core::{ControllerId, HandlerManager, LightsController, SharedGroup};

use crate::dmx::Universe;
use crate::transport::DmxTransport;

/// Default tick interval (40 Hz)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(25);

pub struct FrameCompositor {
    namespace: String,
    controllers: HashMap<ControllerId, LightsController>,
    frames: HashMap<ControllerId, Universe>,
    previous_tick: Option<Instant>,
}

impl FrameCompositor {
    /// `namespace` selects which of a controller's endpoints frames go to
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            controllers: HashMap::new(),
            frames: HashMap::new(),
            previous_tick: None,
        }
    }

    pub fn add_controller(&mut self, controller: LightsController) {
        self.controllers.insert(controller.id, controller);
    }

    pub fn remove_controller(&mut self, id: ControllerId) -> Option<LightsController> {
        self.frames.remove(&id);
        self.controllers.remove(&id)
    }

    /// The last composed frame of a controller
    pub fn frame(&self, controller: ControllerId) -> Option<&Universe> {
        self.frames.get(&controller)
    }

    /// Build new frames from the given groups
    pub fn compose(&mut self, groups: &[SharedGroup]) {
        let empty = Universe::new();
        let mut next: HashMap<ControllerId, Universe> = HashMap::new();
        let mut encoded = 0usize;
        let mut reused = 0usize;

        for group in groups {
            let group = group.lock();
            let previous = self.frames.get(&group.controller_id).unwrap_or(&empty);
            let frame = next.entry(group.controller_id).or_default();

            for p in group.fixtures() {
                let changed = self
                    .previous_tick
                    .map_or(true, |tick| p.fixture.has_updated_since(tick));
                if changed {
                    frame.write_window(p.first_channel, &p.fixture.to_dmx());
                    encoded += 1;
                } else {
                    frame.copy_window(p.first_channel, previous);
                    reused += 1;
                }
            }
        }

        self.frames = next;
        self.previous_tick = Some(Instant::now());
        tracing::trace!("Composed frames: {} fixtures encoded, {} reused", encoded, reused);
    }

    /// Send every known frame to its controller's endpoint. Controllers
    /// without a reachable endpoint are skipped. Returns how many frames
    /// went out.
    pub fn send_frames(&self, transport: &mut dyn DmxTransport) -> usize {
        self.deliver(transport, false)
    }

    /// Zero every known frame and push it out past any rate limit
    pub fn blackout(&mut self, transport: &mut dyn DmxTransport) -> usize {
        for frame in self.frames.values_mut() {
            *frame = Universe::new();
        }
        self.previous_tick = None;
        self.deliver(transport, true)
    }

    fn deliver(&self, transport: &mut dyn DmxTransport, last: bool) -> usize {
        let mut sent = 0;
        for (id, frame) in &self.frames {
            let Some(endpoint) = self
                .controllers
                .get(id)
                .and_then(|c| c.endpoint(&self.namespace))
            else {
                tracing::debug!("Controller {} has no '{}' endpoint", id, self.namespace);
                continue;
            };
            if !transport.has_endpoint(endpoint) {
                tracing::debug!("Endpoint '{}' of controller {} is offline", endpoint, id);
                continue;
            }
            let result = if last {
                transport.send_final(endpoint, frame)
            } else {
                transport.send(endpoint, frame)
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!("Failed to send frame to '{}': {}", endpoint, e),
            }
        }
        sent
    }

    /// One full cycle: tick the handlers, compose, send
    pub fn tick(&mut self, handlers: &mut HandlerManager, transport: &mut dyn DmxTransport) {
        let groups = handlers.tick();
        self.compose(&groups);
        self.send_frames(transport);
    }

    /// Tick at a fixed rate until `shutdown` turns true. Ticks that fall
    /// behind are skipped rather than bunched up.
    pub async fn run(
        mut self,
        handlers: Arc<Mutex<HandlerManager>>,
        mut transport: Box<dyn DmxTransport>,
        tick_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(tick_interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            "Frame compositor running every {} ms for {} controllers",
            tick_interval.as_millis(),
            self.controllers.len()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let groups = handlers.lock().tick();
                    self.compose(&groups);
                    self.send_frames(transport.as_mut());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let dark = self.blackout(transport.as_mut());
        tracing::info!("Frame compositor stopped, {} universes blacked out", dark);
    }
}
