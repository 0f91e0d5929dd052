use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::classifier::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::session::EngineSettings;
use crate::words::Language;

pub const ENV_MAX_ATTEMPTS: &str = "SCREEBAI_MAX_ATTEMPTS";
pub const ENV_TIME_PER_ATTEMPT: &str = "SCREEBAI_TIME_PER_ATTEMPT";
pub const ENV_API_BASE: &str = "SCREEBAI_API_BASE";
pub const ENV_MODEL: &str = "SCREEBAI_MODEL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub language: Language,
    /// Nickname on the leaderboard, picked on first launch
    pub player: Option<String>,
    pub max_attempts: u32,
    pub round_duration_secs: u32,
    pub result_dwell_ms: u64,
    pub points_per_correct_attempt: u32,
    pub classify_timeout_ms: u64,
    pub api_base: String,
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            language: Language::default(),
            player: None,
            max_attempts: engine.max_attempts,
            round_duration_secs: engine.round_duration_secs,
            result_dwell_ms: engine.result_dwell_ms,
            points_per_correct_attempt: engine.points_per_correct_attempt,
            classify_timeout_ms: engine.classify_timeout_ms,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn to_settings(&self) -> EngineSettings {
        EngineSettings {
            max_attempts: self.max_attempts,
            round_duration_secs: self.round_duration_secs,
            result_dwell_ms: self.result_dwell_ms,
            points_per_correct_attempt: self.points_per_correct_attempt,
            classify_timeout_ms: self.classify_timeout_ms,
        }
    }

    /// Overlay `SCREEBAI_*` variables from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; unparsable numbers are skipped
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = parse_positive(&lookup, ENV_MAX_ATTEMPTS) {
            self.max_attempts = n;
        }
        if let Some(n) = parse_positive(&lookup, ENV_TIME_PER_ATTEMPT) {
            self.round_duration_secs = n;
        }
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.api_base = base;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
        self
    }
}

fn parse_positive<F>(lookup: &F, key: &str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match u32::from_str(raw.trim()) {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("ignoring {key}={raw:?}, expected a positive number");
            None
        }
    }
}

/// The API key only ever comes from the environment
pub fn api_key() -> Option<String> {
    std::env::var(ENV_API_KEY)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "screebai") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("screebai_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("{} is not a valid config, using defaults: {e}", self.path.display());
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
