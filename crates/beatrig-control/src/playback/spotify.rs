//! Spotify Web API playback source

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use beatrig_core::{AudioAnalysis, Device, PlaybackState, TrackFeatures, TrackInfo};

use super::PlaybackSource;
use crate::error::{ControlError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub api_base: String,
    pub access_token: String,
    pub request_timeout: Duration,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: String::new(),
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Deserialize)]
struct WireArtist {
    name: String,
}

#[derive(Deserialize)]
struct WireImage {
    url: String,
}

#[derive(Deserialize, Default)]
struct WireAlbum {
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireTrack {
    id: String,
    uri: String,
    name: String,
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<WireArtist>,
    #[serde(default)]
    album: WireAlbum,
}

#[derive(Deserialize)]
struct WireDevice {
    id: Option<String>,
    name: String,
}

#[derive(Deserialize)]
struct WirePlayback {
    #[serde(default)]
    progress_ms: Option<u64>,
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    device: Option<WireDevice>,
    #[serde(default)]
    currently_playing_type: Option<String>,
    // Episodes share the field but not the shape
    #[serde(default)]
    item: Option<serde_json::Value>,
}

/// Convert a `/me/player` body into a playback state. Anything other than a
/// track (ads, episodes) leaves `track` empty.
pub fn playback_from_json(body: &str) -> Result<PlaybackState> {
    let wire: WirePlayback = serde_json::from_str(body)?;

    let track = match (wire.currently_playing_type.as_deref(), wire.item) {
        (Some("track"), Some(item)) => {
            let t: WireTrack = serde_json::from_value(item)?;
            Some(TrackInfo {
                id: t.id,
                uri: t.uri,
                name: t.name,
                artists: t.artists.into_iter().map(|a| a.name).collect(),
                cover_url: t.album.images.into_iter().next().map(|i| i.url),
                duration_ms: t.duration_ms,
            })
        }
        _ => None,
    };

    Ok(PlaybackState {
        track,
        progress_ms: wire.progress_ms.unwrap_or(0),
        is_playing: wire.is_playing,
        device: wire.device.map(|d| Device {
            id: d.id,
            name: d.name,
        }),
    })
}

pub struct SpotifyClient {
    client: Client,
    config: SpotifyConfig,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.access_token)
    }

    async fn checked(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ControlError::PlaybackError(format!(
            "{} failed: HTTP {} {}",
            what,
            status,
            body.trim()
        )))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self
            .authorized(self.client.get(self.url(path)))
            .send()
            .await?;
        let body = Self::checked(response, what).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn put_player(&self, action: &str, device_id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.put(self.url(&format!("/me/player/{}", action))))
            .query(&[("device_id", device_id)])
            .body("")
            .send()
            .await?;
        Self::checked(response, action).await?;
        Ok(())
    }
}

impl PlaybackSource for SpotifyClient {
    async fn current_playback(&self) -> Result<Option<PlaybackState>> {
        let response = self
            .authorized(self.client.get(self.url("/me/player")))
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = Self::checked(response, "current playback").await?.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        playback_from_json(&body).map(Some)
    }

    async fn audio_features(&self, track_id: &str) -> Result<TrackFeatures> {
        self.get_json(&format!("/audio-features/{}", track_id), "audio features")
            .await
    }

    async fn audio_analysis(&self, track_id: &str) -> Result<AudioAnalysis> {
        self.get_json(&format!("/audio-analysis/{}", track_id), "audio analysis")
            .await
    }

    async fn pause(&self, device_id: &str) -> Result<()> {
        self.put_player("pause", device_id).await
    }

    async fn resume(&self, device_id: &str) -> Result<()> {
        self.put_player("play", device_id).await
    }
}
