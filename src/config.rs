//! Server configuration from the environment, client preferences on disk.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_HASH_COST;
use crate::focus::{Progression, SoundPrefs};

const APP_NAME: &str = "stillpoint";
const PREFS_FILE: &str = "prefs.json";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Server settings loaded from `STILLPOINT_*` environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Database file (STILLPOINT_DB_PATH). `None` uses the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Duration rule (STILLPOINT_BASE_DURATION, STILLPOINT_INCREMENT)
    pub progression: Progression,
    /// Mark the session cookie `Secure` (STILLPOINT_COOKIE_SECURE)
    pub cookie_secure: bool,
    /// Accept client-supplied durations as-is (STILLPOINT_TRUST_CLIENT_DURATION)
    pub trust_client_duration: bool,
    /// Allowed CORS origins (STILLPOINT_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
    /// bcrypt cost for new password hashes (STILLPOINT_HASH_COST)
    pub hash_cost: u32,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Progression::default();
        let base_seconds = env_parse("STILLPOINT_BASE_DURATION").unwrap_or(defaults.base_seconds);
        let increment_seconds =
            env_parse("STILLPOINT_INCREMENT").unwrap_or(defaults.increment_seconds);

        let cors_origins = std::env::var("STILLPOINT_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        });

        Self {
            db_path: std::env::var("STILLPOINT_DB_PATH").ok().map(PathBuf::from),
            progression: Progression::new(base_seconds, increment_seconds),
            cookie_secure: env_flag("STILLPOINT_COOKIE_SECURE"),
            trust_client_duration: env_flag("STILLPOINT_TRUST_CLIENT_DURATION"),
            cors_origins,
            hash_cost: env_parse("STILLPOINT_HASH_COST").unwrap_or(DEFAULT_HASH_COST),
        }
    }

    /// Defaults without reading the environment.
    pub fn local() -> Self {
        Self {
            db_path: None,
            progression: Progression::default(),
            cookie_secure: false,
            trust_client_duration: false,
            cors_origins: None,
            hash_cost: DEFAULT_HASH_COST,
        }
    }

    pub fn with_progression(mut self, progression: Progression) -> Self {
        self.progression = progression;
        self
    }

    pub fn with_trusted_durations(mut self) -> Self {
        self.trust_client_duration = true;
        self
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).ok().as_deref().map(str::trim),
        Some("1") | Some("true") | Some("yes")
    )
}

/// What the practice runner remembers between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientPrefs {
    pub server_url: String,
    /// Token from the last signup or login.
    pub token: Option<String>,
    pub sound: SoundPrefs,
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            token: None,
            sound: SoundPrefs::default(),
        }
    }
}

impl ClientPrefs {
    /// Loads saved preferences, falling back to defaults if the file is
    /// missing or unreadable. `STILLPOINT_URL` overrides the saved URL.
    pub fn load() -> Self {
        let mut prefs = match Self::try_load() {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Failed to load preferences, using defaults: {:#}", e);
                Self::default()
            }
        };
        if let Ok(url) = std::env::var("STILLPOINT_URL") {
            prefs.server_url = url;
        }
        prefs
    }

    fn try_load() -> Result<Self> {
        let path = prefs_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read preferences file")?;
        let prefs = serde_json::from_str(&content).context("Failed to parse preferences file")?;
        Ok(prefs)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&prefs_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create preferences directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;
        fs::write(path, content).context("Failed to write preferences file")?;
        Ok(())
    }
}

fn prefs_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dirs.config_dir().join(PREFS_FILE))
}

/// Default database location in the platform data directory.
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("stillpoint.db"))
}
