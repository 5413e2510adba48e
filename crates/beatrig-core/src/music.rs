//! Musical structure of the playing track
//!
//! An [`AudioAnalysis`] describes a track as nested intervals (sections,
//! segments, beats and tatums), all measured in seconds from the start of the
//! track. It is computed once per track and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything occupying `[start, start + duration)` on the track timeline
pub trait TimeInterval {
    fn start(&self) -> f64;
    fn duration(&self) -> f64;

    fn contains(&self, t: f64) -> bool {
        self.start() <= t && t < self.start() + self.duration()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tatum {
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
    /// Peak loudness of the segment in dB
    #[serde(default)]
    pub loudness_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
    /// Average loudness of the section in dB
    pub loudness: f64,
    #[serde(default)]
    pub tempo: f64,
}

macro_rules! impl_interval {
    ($($t:ty),*) => {
        $(impl TimeInterval for $t {
            fn start(&self) -> f64 {
                self.start
            }

            fn duration(&self) -> f64 {
                self.duration
            }
        })*
    };
}

impl_interval!(Beat, Tatum, Segment, Section);

/// Full structural analysis of one track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub beats: Vec<Beat>,
    pub segments: Vec<Segment>,
    pub sections: Vec<Section>,
    pub tatums: Vec<Tatum>,
}

/// First interval containing `t`, in input order
pub fn find_enclosing<T: TimeInterval + Copy>(intervals: &[T], t: f64) -> Option<T> {
    intervals.iter().find(|i| i.contains(t)).copied()
}

/// Overall character of a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    /// Tempo in beats per minute
    pub tempo: f64,
    pub danceability: f64,
    pub energy: f64,
    /// Overall loudness in dB
    pub loudness: f64,
    pub valence: f64,
}

/// One beat together with the structure it falls in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub beat: Beat,
    pub segment: Option<Segment>,
    pub section: Option<Section>,
    pub tatum: Option<Tatum>,
}

impl BeatEvent {
    /// Bundle a beat with its enclosing segment, section and tatum
    pub fn locate(beat: Beat, analysis: &AudioAnalysis) -> Self {
        Self {
            beat,
            segment: find_enclosing(&analysis.segments, beat.start),
            section: find_enclosing(&analysis.sections, beat.start),
            tatum: find_enclosing(&analysis.tatums, beat.start),
        }
    }
}

/// Published when a new track starts (or playback resumes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackChangeEvent {
    pub title: String,
    pub artists: Vec<String>,
    pub cover: Option<String>,
    /// Wall-clock time at which the track (virtually) started
    pub start_time: DateTime<Utc>,
    pub track_id: String,
    pub track_uri: String,
}

/// Published when playback stops or pauses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub cover_url: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
}

/// Snapshot of the external player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Currently playing track; `None` for ads, episodes or nothing at all
    pub track: Option<TrackInfo>,
    pub progress_ms: u64,
    pub is_playing: bool,
    pub device: Option<Device>,
}

impl PlaybackState {
    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.id.as_str())
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().and_then(|d| d.id.as_deref())
    }

    /// Whether `self` means a track started or resumed compared to `previous`
    pub fn starts_track_after(&self, previous: Option<&PlaybackState>) -> bool {
        if self.track.is_none() {
            return false;
        }
        match previous {
            None => true,
            Some(prev) => {
                prev.track_id() != self.track_id() || (!prev.is_playing && self.is_playing)
            }
        }
    }

    pub fn to_track_change(&self, start_time: DateTime<Utc>) -> Option<TrackChangeEvent> {
        self.track.as_ref().map(|track| TrackChangeEvent {
            title: track.name.clone(),
            artists: track.artists.clone(),
            cover: track.cover_url.clone(),
            start_time,
            track_id: track.id.clone(),
            track_uri: track.uri.clone(),
        })
    }
}
