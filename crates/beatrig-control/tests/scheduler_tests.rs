use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use beatrig_control::{BeatScheduler, ControlError, PlaybackSource, Result, SchedulerConfig};
use beatrig_core::music::{AudioAnalysis, Beat, Device, PlaybackState, TrackFeatures, TrackInfo};
use beatrig_core::MusicEmitter;

#[derive(Default)]
struct MockPlayer {
    playback: Option<PlaybackState>,
    analysis: AudioAnalysis,
    failing: bool,
    polls: usize,
    paused: Vec<String>,
    resumed: Vec<String>,
}

#[derive(Clone, Default)]
struct MockSource(Arc<Mutex<MockPlayer>>);

impl MockSource {
    fn play(&self, track_id: &str, progress_ms: u64, beats: &[f64]) {
        let mut player = self.0.lock();
        player.playback = Some(playing(track_id, progress_ms));
        player.analysis = AudioAnalysis {
            beats: beats
                .iter()
                .map(|&start| Beat {
                    start,
                    duration: 0.5,
                    confidence: 0.8,
                })
                .collect(),
            ..Default::default()
        };
    }

    fn set_playing(&self, is_playing: bool) {
        if let Some(state) = self.0.lock().playback.as_mut() {
            state.is_playing = is_playing;
        }
    }
}

impl PlaybackSource for MockSource {
    async fn current_playback(&self) -> Result<Option<PlaybackState>> {
        let mut player = self.0.lock();
        player.polls += 1;
        if player.failing {
            return Err(ControlError::PlaybackError("unauthorized".to_string()));
        }
        Ok(player.playback.clone())
    }

    async fn audio_features(&self, _track_id: &str) -> Result<TrackFeatures> {
        Ok(TrackFeatures {
            tempo: 128.0,
            danceability: 0.8,
            energy: 0.9,
            loudness: -5.0,
            valence: 0.6,
        })
    }

    async fn audio_analysis(&self, _track_id: &str) -> Result<AudioAnalysis> {
        Ok(self.0.lock().analysis.clone())
    }

    async fn pause(&self, device_id: &str) -> Result<()> {
        self.0.lock().paused.push(device_id.to_string());
        Ok(())
    }

    async fn resume(&self, device_id: &str) -> Result<()> {
        self.0.lock().resumed.push(device_id.to_string());
        Ok(())
    }
}

fn playing(track_id: &str, progress_ms: u64) -> PlaybackState {
    PlaybackState {
        track: Some(TrackInfo {
            id: track_id.to_string(),
            uri: format!("spotify:track:{}", track_id),
            name: format!("Track {}", track_id),
            artists: vec!["Artist".to_string()],
            cover_url: None,
            duration_ms: 180_000,
        }),
        progress_ms,
        is_playing: true,
        device: Some(Device {
            id: Some("booth".to_string()),
            name: "Booth".to_string(),
        }),
    }
}

struct Harness {
    source: MockSource,
    scheduler: Arc<BeatScheduler<MockSource>>,
    emitter: Arc<MusicEmitter>,
    beats: Arc<Mutex<Vec<(f64, Duration)>>>,
    started: Instant,
}

fn harness(config: SchedulerConfig) -> Harness {
    let source = MockSource::default();
    let scheduler = Arc::new(BeatScheduler::new(source.clone(), config));
    let emitter = Arc::new(MusicEmitter::new());
    scheduler.init(Arc::clone(&emitter)).unwrap();

    let beats = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();
    let sink = Arc::clone(&beats);
    emitter.beat.subscribe(move |event| {
        sink.lock().push((event.beat.start, started.elapsed()));
    });

    Harness {
        source,
        scheduler,
        emitter,
        beats,
        started,
    }
}

fn within(actual: Duration, expected_ms: u64) -> bool {
    let expected = Duration::from_millis(expected_ms);
    actual >= expected && actual < expected + Duration::from_millis(2)
}

#[tokio::test(start_paused = true)]
async fn test_beats_fire_at_offsets_from_progress() {
    let h = harness(SchedulerConfig::default());
    h.source.play("a", 900, &[0.5, 1.2, 2.0]);

    h.scheduler.poll_once().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let beats = h.beats.lock().clone();
    assert_eq!(beats.len(), 2, "{:?}", beats);
    assert_eq!(beats[0].0, 1.2);
    assert!(within(beats[0].1, 300), "{:?}", beats[0].1);
    assert_eq!(beats[1].0, 2.0);
    assert!(within(beats[1].1, 1100), "{:?}", beats[1].1);
    assert!(h.started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_replaced_schedule_fires_no_stale_beat() {
    let h = harness(SchedulerConfig::default());
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    h.emitter.change_track.subscribe(move |event| {
        sink.lock().push(event.track_id.clone());
    });

    h.source.play("a", 0, &[1.0]);
    h.scheduler.poll_once().await.unwrap();
    let first_epoch = h.scheduler.epoch();

    tokio::time::sleep(Duration::from_millis(500)).await;
    h.source.play("b", 0, &[5.0]);
    h.scheduler.poll_once().await.unwrap();
    assert!(h.scheduler.epoch() > first_epoch);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(*changes.lock(), vec!["a".to_string(), "b".to_string()]);
    let beats = h.beats.lock().clone();
    assert_eq!(beats.len(), 1, "{:?}", beats);
    assert_eq!(beats[0].0, 5.0);
    assert!(within(beats[0].1, 5500), "{:?}", beats[0].1);
}

#[tokio::test(start_paused = true)]
async fn test_same_track_does_not_republish_change() {
    let h = harness(SchedulerConfig::default());
    let changes = Arc::new(Mutex::new(0usize));
    let features = Arc::new(Mutex::new(Vec::new()));
    {
        let changes = Arc::clone(&changes);
        h.emitter.change_track.subscribe(move |_| *changes.lock() += 1);
        let features = Arc::clone(&features);
        h.emitter
            .features
            .subscribe(move |f: &TrackFeatures| features.lock().push(f.tempo));
    }

    h.source.play("a", 0, &[]);
    h.scheduler.poll_once().await.unwrap();
    h.scheduler.poll_once().await.unwrap();

    assert_eq!(*changes.lock(), 1);
    assert_eq!(*features.lock(), vec![128.0]);
    assert_eq!(h.scheduler.features().map(|f| f.tempo), Some(128.0));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_beats_and_publishes_once() {
    let h = harness(SchedulerConfig::default());
    let stops = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&stops);
    h.emitter.stop.subscribe(move |_| *sink.lock() += 1);

    h.source.play("a", 0, &[1.0, 2.0]);
    h.scheduler.poll_once().await.unwrap();
    assert!(h.scheduler.is_playing());

    h.source.set_playing(false);
    h.scheduler.poll_once().await.unwrap();
    h.scheduler.poll_once().await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(*stops.lock(), 1);
    assert!(!h.scheduler.is_playing());
    assert!(h.scheduler.features().is_none());
    assert!(h.beats.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_pause_reschedules() {
    let h = harness(SchedulerConfig::default());
    h.source.play("a", 0, &[1.0, 3.0]);
    h.scheduler.poll_once().await.unwrap();

    h.source.set_playing(false);
    h.scheduler.poll_once().await.unwrap();

    h.source.play("a", 2000, &[1.0, 3.0]);
    h.scheduler.poll_once().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let beats = h.beats.lock().clone();
    assert_eq!(beats.len(), 1, "{:?}", beats);
    assert_eq!(beats[0].0, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_keeps_schedule() {
    let h = harness(SchedulerConfig::default());
    h.source.play("a", 0, &[1.0, 2.0]);
    h.scheduler.poll_once().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.source.0.lock().failing = true;
    assert!(h.scheduler.poll_once().await.is_err());

    tokio::time::sleep(Duration::from_secs(3)).await;
    let starts: Vec<f64> = h.beats.lock().iter().map(|(s, _)| *s).collect();
    assert_eq!(starts, vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_second_init_fails() {
    let scheduler = BeatScheduler::new(MockSource::default(), SchedulerConfig::default());
    let emitter = Arc::new(MusicEmitter::new());
    scheduler.init(Arc::clone(&emitter)).unwrap();
    assert!(matches!(
        scheduler.init(emitter),
        Err(ControlError::AlreadyInitialized)
    ));
}

#[tokio::test]
async fn test_poll_before_init_fails() {
    let scheduler = BeatScheduler::new(MockSource::default(), SchedulerConfig::default());
    assert!(matches!(
        scheduler.poll_once().await,
        Err(ControlError::NotInitialized)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_use_last_device() {
    let h = harness(SchedulerConfig::default());

    // Nothing observed yet: silently ignored
    h.scheduler.pause_playback().await.unwrap();
    assert!(h.source.0.lock().paused.is_empty());

    h.source.play("a", 0, &[]);
    h.scheduler.poll_once().await.unwrap();
    h.scheduler.pause_playback().await.unwrap();
    h.scheduler.resume_playback().await.unwrap();

    let player = h.source.0.lock();
    assert_eq!(player.paused, vec!["booth".to_string()]);
    assert_eq!(player.resumed, vec!["booth".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_track_end_triggers_early_poll() {
    let h = harness(SchedulerConfig {
        poll_interval: Duration::from_secs(5),
        ..Default::default()
    });
    h.source.play("a", 0, &[]);
    if let Some(state) = h.source.0.lock().playback.as_mut() {
        if let Some(track) = state.track.as_mut() {
            track.duration_ms = 1000;
        }
    }

    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(Arc::clone(&h.scheduler).run(rx));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.source.0.lock().polls, 2);

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuild_waits_for_beat_in_flight() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    let h = harness(SchedulerConfig::default());
    h.source.play("a", 950, &[1.0]);

    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let first = Arc::new(AtomicBool::new(true));
    {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        h.emitter.beat.subscribe(move |_| {
            if first.swap(false, Ordering::SeqCst) {
                entered.wait();
                release.wait();
            }
        });
    }

    h.scheduler.poll_once().await.unwrap();
    let waiter = Arc::clone(&entered);
    tokio::task::spawn_blocking(move || {
        waiter.wait();
    })
    .await
    .unwrap();

    // A beat is being published; replacing the schedule must wait for it
    let rebuilt = Arc::new(AtomicBool::new(false));
    let rebuild = {
        let scheduler = Arc::clone(&h.scheduler);
        let rebuilt = Arc::clone(&rebuilt);
        tokio::spawn(async move {
            scheduler.poll_once().await.unwrap();
            rebuilt.store(true, Ordering::SeqCst);
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!rebuilt.load(Ordering::SeqCst));

    tokio::task::spawn_blocking(move || {
        release.wait();
    })
    .await
    .unwrap();
    tokio::time::timeout(Duration::from_secs(1), rebuild)
        .await
        .unwrap()
        .unwrap();
    assert!(rebuilt.load(Ordering::SeqCst));
}
