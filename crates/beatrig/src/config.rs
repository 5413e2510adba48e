//! Application configuration
//!
//! Loaded from a TOML file. Environment variables override a few timing and
//! logging knobs so a running rig can be tuned without editing the file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

use beatrig_control::playback::spotify::DEFAULT_API_BASE;
use beatrig_control::{EndpointConfig, SchedulerConfig, SpotifyConfig};
use beatrig_core::{validate_universe_layout, LightsController, LightsGroup};

/// Overrides `tick_interval_ms`
pub const TICK_INTERVAL_ENV: &str = "LIGHTS_TICK_INTERVAL";
/// `true` turns on beat logging
pub const LOG_BEATS_ENV: &str = "LOG_AUDIO_BEATS";

const LOG_FILE_NAME: &str = "beatrig.log";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub enabled: bool,
    pub api_base: String,
    pub access_token: String,
    pub poll_interval_secs: u64,
    pub request_timeout_ms: u64,
    pub log_beats: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: String::new(),
            poll_interval_secs: 5,
            request_timeout_ms: 2000,
            log_beats: false,
        }
    }
}

impl PlaybackConfig {
    pub fn spotify(&self) -> SpotifyConfig {
        SpotifyConfig {
            api_base: self.api_base.clone(),
            access_token: self.access_token.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            log_beats: self.log_beats,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    /// Rotated log files kept next to the current one
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_files: 10,
        }
    }
}

impl LogConfig {
    /// Configured level, INFO when it does not parse
    pub fn parse_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::INFO)
    }

    pub fn current_log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        if self.file_output {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Move the previous log aside and drop the oldest rotated files
    pub fn cleanup_old_logs(&self) -> std::io::Result<()> {
        if !self.file_output {
            return Ok(());
        }

        let current = self.current_log_path();
        if current.exists() {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            std::fs::rename(&current, self.log_dir.join(format!("beatrig-{}.log", stamp)))?;
        }

        let mut rotated: Vec<PathBuf> = std::fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("beatrig-") && n.ends_with(".log"))
            })
            .collect();
        rotated.sort();

        let excess = rotated.len().saturating_sub(self.max_files);
        for path in rotated.into_iter().take(excess) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn default_handler() -> String {
    beatrig_core::EffectsHandler::NAME.to_string()
}

/// A lighting group plus how it is driven at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(flatten)]
    pub group: LightsGroup,
    /// Name of the handler that owns the group
    #[serde(default = "default_handler")]
    pub handler: String,
    /// Initial effect, for groups owned by an effects handler
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub effect_props: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tick_interval_ms: u64,
    /// Which of a controller's endpoints frames are sent to
    pub namespace: String,
    pub playback: PlaybackConfig,
    pub logging: LogConfig,
    pub endpoints: Vec<EndpointConfig>,
    pub controllers: Vec<LightsController>,
    pub groups: Vec<GroupConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            namespace: "lights".to_string(),
            playback: PlaybackConfig::default(),
            logging: LogConfig::default(),
            endpoints: Vec::new(),
            controllers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Read, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config: AppConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(ms) = var(TICK_INTERVAL_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            if ms > 0 {
                self.tick_interval_ms = ms;
            }
        }
        if var(LOG_BEATS_ENV).is_some_and(|v| v == "true") {
            self.playback.log_beats = true;
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        if self.playback.enabled && self.playback.access_token.is_empty() {
            bail!("playback is enabled but no access_token is set");
        }

        let mut endpoint_ids = HashSet::new();
        for endpoint in &self.endpoints {
            if !endpoint_ids.insert(endpoint.id.as_str()) {
                bail!("duplicate endpoint id '{}'", endpoint.id);
            }
        }

        let mut controller_ids = HashSet::new();
        for controller in &self.controllers {
            if !controller_ids.insert(controller.id) {
                bail!("duplicate controller id {}", controller.id);
            }
            if let Some(endpoint) = controller.endpoint(&self.namespace) {
                if !endpoint_ids.contains(endpoint) {
                    bail!(
                        "controller {} uses unknown endpoint '{}'",
                        controller.id,
                        endpoint
                    );
                }
            }
        }

        let mut group_ids = HashSet::new();
        for entry in &self.groups {
            let group = &entry.group;
            if !group_ids.insert(group.id) {
                bail!("duplicate group id {}", group.id);
            }
            if !controller_ids.contains(&group.controller_id) {
                bail!(
                    "group {} uses unknown controller {}",
                    group.id,
                    group.controller_id
                );
            }
            group
                .validate()
                .with_context(|| format!("invalid group {} '{}'", group.id, group.name))?;
        }

        validate_universe_layout(self.groups.iter().map(|g| &g.group))?;
        Ok(())
    }
}
