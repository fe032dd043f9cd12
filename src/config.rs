use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::backend::listing::TimeWindow;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub concurrency: Option<usize>,
    pub autoplay_period_ms: Option<u64>,
    pub frame_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub failure_cooldown_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub listing: ListingConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ListingConfigFile {
    pub window_start: Option<String>,
    pub window_end: Option<String>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub concurrency: usize,
    pub autoplay_period: Duration,
    pub frame_interval: Duration,
    pub request_timeout: Duration,
    pub failure_cooldown: Duration,
    pub user_agent: String,
    pub window: TimeWindow,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, concurrency: Option<usize>, period_ms: Option<u64>) {
        if let Some(v) = concurrency {
            debug!("config: CLI override concurrency={v}");
            self.concurrency = concurrency;
        }
        if let Some(v) = period_ms {
            debug!("config: CLI override autoplay_period_ms={v}");
            self.autoplay_period_ms = period_ms;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> anyhow::Result<Config> {
        let window_start = self.listing.window_start.as_deref().unwrap_or("08:00");
        let window_end = self.listing.window_end.as_deref().unwrap_or("12:00");
        let window = TimeWindow::parse(window_start, window_end).map_err(|e| {
            anyhow::anyhow!("invalid listing window {window_start}-{window_end}: {e}")
        })?;

        let config = Config {
            concurrency: self.concurrency.unwrap_or(6).max(1),
            autoplay_period: Duration::from_millis(self.autoplay_period_ms.unwrap_or(500).max(1)),
            frame_interval: Duration::from_millis(self.frame_interval_ms.unwrap_or(33).max(1)),
            request_timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(30)),
            failure_cooldown: Duration::from_millis(self.failure_cooldown_ms.unwrap_or(250)),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| concat!("dashview/", env!("CARGO_PKG_VERSION")).into()),
            window,
        };
        info!(
            "config: resolved concurrency={}, autoplay_period={}ms, frame_interval={}ms, \
             request_timeout={}s, failure_cooldown={}ms, window={}-{}",
            config.concurrency,
            config.autoplay_period.as_millis(),
            config.frame_interval.as_millis(),
            config.request_timeout.as_secs(),
            config.failure_cooldown.as_millis(),
            config.window.start.format("%H:%M"),
            config.window.end.format("%H:%M"),
        );
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("dashview").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            info!("config: no config directory, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
