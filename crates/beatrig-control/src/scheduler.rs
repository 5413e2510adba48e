//! Beat scheduling engine
//!
//! Polls a [`PlaybackSource`] on a slow fixed interval and turns the reported
//! playback position plus the track's [`AudioAnalysis`] into a timetable of
//! beat events. Each poll while playing re-derives the timetable from the
//! latest progress, which corrects drift between the local clock and the
//! player.
//!
//! A timetable is drained by one dispatcher task. Every rebuild bumps an epoch
//! counter; a dispatcher whose epoch is no longer current stops without
//! firing, so no beat from a replaced timetable reaches the bus.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use beatrig_core::{AudioAnalysis, BeatEvent, MusicEmitter, PlaybackState, StopEvent, TrackFeatures};

use crate::error::{ControlError, Result};
use crate::playback::PlaybackSource;

/// Slack after the computed track end before polling again
const TRACK_END_SLACK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Upper bound for each call to the playback source
    pub request_timeout: Duration,
    /// Log every fired beat
    pub log_beats: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(2),
            log_beats: false,
        }
    }
}

/// One entry of a beat timetable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBeat {
    /// Delay from the moment the timetable is installed
    pub offset: Duration,
    pub event: BeatEvent,
}

/// Beats at or after `progress_ms`, each bundled with its enclosing
/// segment, section and tatum, in track order
pub fn build_schedule(analysis: &AudioAnalysis, progress_ms: u64) -> Vec<ScheduledBeat> {
    let progress = progress_ms as f64;
    analysis
        .beats
        .iter()
        .filter(|beat| beat.start * 1000.0 >= progress)
        .map(|beat| {
            let offset_ms = beat.start * 1000.0 - progress;
            ScheduledBeat {
                offset: Duration::from_micros((offset_ms * 1000.0).round() as u64),
                event: BeatEvent::locate(*beat, analysis),
            }
        })
        .collect()
}

#[derive(Default)]
struct TrackState {
    previous: Option<PlaybackState>,
    features: Option<TrackFeatures>,
    analysis: Option<Arc<AudioAnalysis>>,
    dispatcher: Option<JoinHandle<()>>,
    track_end: Option<JoinHandle<()>>,
}

/// Shared with dispatcher tasks
struct Dispatch {
    epoch: AtomicU64,
    /// Held shared from the epoch check through publish, exclusive while
    /// the epoch moves
    gate: RwLock<()>,
    playing: AtomicBool,
    ping: AtomicBool,
    log_beats: bool,
}

impl Dispatch {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch && self.playing.load(Ordering::SeqCst)
    }

    fn log_beat(&self, event: &BeatEvent) {
        let ping = self.ping.fetch_xor(true, Ordering::Relaxed);
        let marker = if ping { "beat:   . " } else { "beat:  .  " };
        tracing::info!(
            "{}: {} ({}) - {:?} - {:?}",
            marker,
            event.beat.start,
            event.beat.confidence,
            event.section.map(|s| s.start),
            event.section.map(|s| s.loudness)
        );
    }
}

pub struct BeatScheduler<S: PlaybackSource> {
    source: S,
    config: SchedulerConfig,
    emitter: OnceLock<Arc<MusicEmitter>>,
    state: Mutex<TrackState>,
    dispatch: Arc<Dispatch>,
    track_end: Arc<Notify>,
}

impl<S: PlaybackSource> BeatScheduler<S> {
    pub fn new(source: S, config: SchedulerConfig) -> Self {
        let dispatch = Arc::new(Dispatch {
            epoch: AtomicU64::new(0),
            gate: RwLock::new(()),
            playing: AtomicBool::new(false),
            ping: AtomicBool::new(false),
            log_beats: config.log_beats,
        });
        Self {
            source,
            config,
            emitter: OnceLock::new(),
            state: Mutex::new(TrackState::default()),
            dispatch,
            track_end: Arc::new(Notify::new()),
        }
    }

    /// Bind the scheduler to the bus it publishes on. Only allowed once.
    pub fn init(&self, emitter: Arc<MusicEmitter>) -> Result<()> {
        self.emitter
            .set(emitter)
            .map_err(|_| ControlError::AlreadyInitialized)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Last observed player state
    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.state.lock().previous.clone()
    }

    pub fn features(&self) -> Option<TrackFeatures> {
        self.state.lock().features
    }

    pub fn is_playing(&self) -> bool {
        self.dispatch.playing.load(Ordering::SeqCst)
    }

    /// Generation of the installed timetable
    pub fn epoch(&self) -> u64 {
        self.dispatch.epoch.load(Ordering::SeqCst)
    }

    async fn with_timeout<T>(
        &self,
        what: &'static str,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| ControlError::Timeout(what))?
    }

    /// One polling cycle. On error nothing is changed and the next poll
    /// starts from the same previous state.
    pub async fn poll_once(&self) -> Result<()> {
        let emitter = Arc::clone(self.emitter.get().ok_or(ControlError::NotInitialized)?);

        let state = self
            .with_timeout("current playback", self.source.current_playback())
            .await?;
        let observed_at = Utc::now();
        let previous = self.state.lock().previous.clone();

        if let Some(current) = state.as_ref() {
            if current.starts_track_after(previous.as_ref()) {
                self.start_track(current, observed_at, &emitter).await?;
            }
        }

        let is_playing = state.as_ref().is_some_and(|s| s.is_playing);
        let was_playing = previous.as_ref().is_some_and(|s| s.is_playing);
        if !is_playing && was_playing {
            {
                let mut track = self.state.lock();
                self.cancel_schedule(&mut track);
                if let Some(timer) = track.track_end.take() {
                    timer.abort();
                }
                track.features = None;
                track.analysis = None;
            }
            emitter.stop.publish(&StopEvent);
            tracing::info!("Playback paused/stopped");
        }

        self.dispatch.playing.store(is_playing, Ordering::SeqCst);

        let mut track = self.state.lock();
        track.previous = state;
        let progress = track.previous.as_ref().map_or(0, |s| s.progress_ms);
        match track.analysis.clone() {
            Some(analysis) if is_playing => {
                let schedule = build_schedule(&analysis, progress);
                self.install_schedule(&mut track, schedule, emitter);
            }
            _ => self.cancel_schedule(&mut track),
        }
        Ok(())
    }

    async fn start_track(
        &self,
        current: &PlaybackState,
        observed_at: chrono::DateTime<Utc>,
        emitter: &MusicEmitter,
    ) -> Result<()> {
        let Some(track) = current.track.as_ref() else {
            return Ok(());
        };

        let features = self
            .with_timeout("audio features", self.source.audio_features(&track.id))
            .await?;
        let analysis = self
            .with_timeout("audio analysis", self.source.audio_analysis(&track.id))
            .await?;

        {
            let mut state = self.state.lock();
            state.features = Some(features);
            state.analysis = Some(Arc::new(analysis));
            if current.is_playing {
                self.arm_track_end(&mut state, track.duration_ms, current.progress_ms);
            }
        }

        emitter.features.publish(&features);
        let start_time = observed_at - chrono::Duration::milliseconds(current.progress_ms as i64);
        if let Some(event) = current.to_track_change(start_time) {
            emitter.change_track.publish(&event);
        }

        tracing::info!(
            "Now playing: {} - {} ({})",
            track.artists.join(", "),
            track.name,
            track.uri
        );
        Ok(())
    }

    fn arm_track_end(&self, state: &mut TrackState, duration_ms: u64, progress_ms: u64) {
        if let Some(timer) = state.track_end.take() {
            timer.abort();
        }
        let delay = Duration::from_millis(duration_ms.saturating_sub(progress_ms)) + TRACK_END_SLACK;
        let notify = Arc::clone(&self.track_end);
        state.track_end = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            notify.notify_one();
        }));
    }

    fn cancel_schedule(&self, state: &mut TrackState) {
        {
            let _gate = self.dispatch.gate.write();
            self.dispatch.epoch.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(dispatcher) = state.dispatcher.take() {
            dispatcher.abort();
        }
    }

    fn install_schedule(
        &self,
        state: &mut TrackState,
        schedule: Vec<ScheduledBeat>,
        emitter: Arc<MusicEmitter>,
    ) {
        self.cancel_schedule(state);
        let epoch = self.dispatch.epoch.load(Ordering::SeqCst);
        let dispatch = Arc::clone(&self.dispatch);
        let installed_at = Instant::now();

        tracing::debug!("Beat schedule {} installed with {} beats", epoch, schedule.len());

        state.dispatcher = Some(tokio::spawn(async move {
            for beat in schedule {
                tokio::time::sleep_until(installed_at + beat.offset).await;
                let _gate = dispatch.gate.read();
                if !dispatch.is_current(epoch) {
                    return;
                }
                if dispatch.log_beats {
                    dispatch.log_beat(&beat.event);
                }
                emitter.beat.publish(&beat.event);
            }
        }));
    }

    /// Ask the player to pause. Without a known device this does nothing.
    pub async fn pause_playback(&self) -> Result<()> {
        let Some(device) = self.device_id() else {
            return Ok(());
        };
        self.with_timeout("pause", self.source.pause(&device)).await
    }

    /// Ask the player to resume on the device it was last seen on
    pub async fn resume_playback(&self) -> Result<()> {
        let Some(device) = self.device_id() else {
            return Ok(());
        };
        self.with_timeout("resume", self.source.resume(&device)).await
    }

    fn device_id(&self) -> Option<String> {
        self.state
            .lock()
            .previous
            .as_ref()
            .and_then(|s| s.device_id().map(str::to_string))
    }

    /// Poll until `shutdown` turns true. Errors are logged and polling goes on.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Beat scheduler polling every {} s",
            self.config.poll_interval.as_secs_f64()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.track_end.notified() => {
                    tracing::debug!("Track should have ended, polling early");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if let Err(e) = self.poll_once().await {
                tracing::warn!("Playback poll failed: {}", e);
            }
        }

        let mut state = self.state.lock();
        self.cancel_schedule(&mut state);
        if let Some(timer) = state.track_end.take() {
            timer.abort();
        }
        tracing::info!("Beat scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatrig_core::{Beat, Section};

    fn beat(start: f64) -> Beat {
        Beat {
            start,
            duration: 0.5,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_build_schedule_drops_past_beats() {
        let analysis = AudioAnalysis {
            beats: vec![beat(0.5), beat(1.2), beat(2.0)],
            ..Default::default()
        };
        let schedule = build_schedule(&analysis, 900);
        let offsets: Vec<_> = schedule.iter().map(|b| b.offset).collect();
        assert_eq!(
            offsets,
            vec![Duration::from_millis(300), Duration::from_millis(1100)]
        );
        assert_eq!(schedule[0].event.beat.start, 1.2);
    }

    #[test]
    fn test_build_schedule_keeps_beat_at_progress() {
        let analysis = AudioAnalysis {
            beats: vec![beat(1.0)],
            ..Default::default()
        };
        let schedule = build_schedule(&analysis, 1000);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].offset, Duration::ZERO);
    }

    #[test]
    fn test_build_schedule_locates_section() {
        let analysis = AudioAnalysis {
            beats: vec![beat(12.0)],
            sections: vec![
                Section {
                    start: 0.0,
                    duration: 10.0,
                    confidence: 1.0,
                    loudness: -8.0,
                    tempo: 120.0,
                },
                Section {
                    start: 10.0,
                    duration: 10.0,
                    confidence: 1.0,
                    loudness: -4.0,
                    tempo: 120.0,
                },
            ],
            ..Default::default()
        };
        let schedule = build_schedule(&analysis, 0);
        assert_eq!(schedule[0].event.section.map(|s| s.start), Some(10.0));
        assert!(schedule[0].event.segment.is_none());
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!config.log_beats);
    }
}
