//! In-process publish/subscribe for music events
//!
//! Each [`Channel`] keeps a list of listeners. Publishing calls every listener
//! exactly once, synchronously, on the publishing thread. Nothing is buffered:
//! events published while a channel has no listeners are dropped.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::music::{BeatEvent, StopEvent, TrackChangeEvent, TrackFeatures};

/// Handle returned by [`Channel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A named, typed event channel
pub struct Channel<T> {
    name: &'static str,
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Channel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a listener, returning a handle to remove it again
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver `event` to every listener, returning how many received it
    pub fn publish(&self, event: &T) -> usize {
        // Snapshot so listeners may (un)subscribe while being called
        let listeners: Vec<Listener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        if listeners.is_empty() {
            tracing::trace!("No listeners on '{}', event dropped", self.name);
        }
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// The four music channels shared by the beat scheduler and its consumers
pub struct MusicEmitter {
    pub features: Channel<TrackFeatures>,
    pub change_track: Channel<TrackChangeEvent>,
    pub beat: Channel<BeatEvent>,
    pub stop: Channel<StopEvent>,
}

impl MusicEmitter {
    pub fn new() -> Self {
        Self {
            features: Channel::new("features"),
            change_track: Channel::new("change_track"),
            beat: Channel::new("beat"),
            stop: Channel::new("stop"),
        }
    }
}

impl Default for MusicEmitter {
    fn default() -> Self {
        Self::new()
    }
}
