use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
pub const RATE_LIMIT_SLEEP_MS: u64 = 2000;

pub const TARGET_SIZE: usize = 100;
pub const RESERVED_SLACK: usize = 50;
pub const AMOUNT_ARTISTS: usize = 20;
pub const AMOUNT_TRACKS_PER_ARTIST: usize = 3;
pub const AMOUNT_RECOMMENDATIONS: usize = 50;
pub const GENRE_ARTIST_LIMIT: usize = 50;
pub const MAX_SEED_GENRES: usize = 5;
/// Hard limit of the remote "add tracks" call during generation.
pub const ADD_BATCH_SIZE: usize = 25;
pub const SAVE_BATCH_SIZE: usize = 100;
pub const DEFAULT_MARKET: &str = "DE";

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("groupmix")
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join("config.json")
}

pub fn get_default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("groupmix")
        .join("groupmix.db")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Knobs of a generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub target_size: usize,
    pub reserved_slack: usize,
    pub amount_artists: usize,
    pub tracks_per_artist: usize,
    pub amount_recommendations: usize,
    pub genre_artist_limit: usize,
    pub max_seed_genres: usize,
    pub add_batch_size: usize,
    pub save_batch_size: usize,
    pub market: String,
    pub playlist_description: String,
    pub playlist_public: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            target_size: TARGET_SIZE,
            reserved_slack: RESERVED_SLACK,
            amount_artists: AMOUNT_ARTISTS,
            tracks_per_artist: AMOUNT_TRACKS_PER_ARTIST,
            amount_recommendations: AMOUNT_RECOMMENDATIONS,
            genre_artist_limit: GENRE_ARTIST_LIMIT,
            max_seed_genres: MAX_SEED_GENRES,
            add_batch_size: ADD_BATCH_SIZE,
            save_batch_size: SAVE_BATCH_SIZE,
            market: DEFAULT_MARKET.to_string(),
            playlist_description: "Automatically generated by groupmix.".to_string(),
            playlist_public: true,
        }
    }
}

impl GeneratorSettings {
    /// Cap on the tracks a single stage may contribute:
    /// `floor((target - slack) / members) * members`.
    pub fn stage_budget(&self, member_count: usize) -> usize {
        if member_count == 0 {
            return 0;
        }
        let per_member = self.target_size.saturating_sub(self.reserved_slack) / member_count;
        per_member * member_count
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorSettings,
    pub retry: RetryPolicy,
    pub api_base_url: String,
    pub accounts_url: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub database_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorSettings::default(),
            retry: RetryPolicy::default(),
            api_base_url: API_BASE_URL.to_string(),
            accounts_url: ACCOUNTS_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            database_path: get_default_database_path(),
        }
    }
}

impl AppConfig {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&get_config_file_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("SPOTIFY_CLIENT_ID") {
            self.client_id = id;
        }
        if let Some(secret) = lookup("SPOTIFY_CLIENT_SECRET") {
            self.client_secret = secret;
        }
        if let Some(db) = lookup("GROUPMIX_DATABASE") {
            self.database_path = PathBuf::from(db);
        }
    }
}
