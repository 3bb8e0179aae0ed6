//! Game configuration
//!
//! Defaults match the Turkish pop edition of the game. Each value can be
//! overridden through a `GUESS_*` environment variable, read once at startup.

use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PLAYLIST_ID: &str = "6R7XCmJiPndl4PbJIaxZLf";
const DEFAULT_MARKET: &str = "TR";
const DEFAULT_GENRE_YEAR_QUERY: &str = "genre:turkish-pop year:2024";
const DEFAULT_NEW_GENRE_QUERY: &str = "tag:new genre:pop market:TR";
const DEFAULT_CANDIDATE_LIMIT: u32 = 50;
const DEFAULT_SNIPPET_MS: u64 = 9000;
const DEFAULT_DEVICE_NAME: &str = "Guess The Track";
const DEFAULT_VOLUME: f32 = 0.5;
const DEFAULT_CLIENT_ID: &str = "492e1e45ea814fa3ac555fe1576aaf5b";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8898/login";

/// Where the three resolution tiers look for candidates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    pub playlist_id: String,
    pub market: String,
    pub genre_year_query: String,
    pub new_genre_query: String,
    pub candidate_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            playlist_id: DEFAULT_PLAYLIST_ID.to_string(),
            market: DEFAULT_MARKET.to_string(),
            genre_year_query: DEFAULT_GENRE_YEAR_QUERY.to_string(),
            new_genre_query: DEFAULT_NEW_GENRE_QUERY.to_string(),
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }
}

/// Name and starting volume of the playback device the game registers
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    pub name: String,
    /// 0.0 ..= 1.0
    pub volume: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            volume: DEFAULT_VOLUME,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub catalog: CatalogConfig,
    pub device: DeviceConfig,
    pub snippet: Duration,
    pub client_id: String,
    pub redirect_uri: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            device: DeviceConfig::default(),
            snippet: Duration::from_millis(DEFAULT_SNIPPET_MS),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, falling back to the
    /// default for missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = non_empty(lookup("GUESS_PLAYLIST_ID")) {
            config.catalog.playlist_id = v;
        }
        if let Some(v) = non_empty(lookup("GUESS_MARKET")) {
            config.catalog.market = v.to_uppercase();
        }
        if let Some(v) = non_empty(lookup("GUESS_PRIMARY_QUERY")) {
            config.catalog.genre_year_query = v;
        }
        if let Some(v) = non_empty(lookup("GUESS_FALLBACK_QUERY")) {
            config.catalog.new_genre_query = v;
        }
        if let Some(ms) = parsed::<u64>("GUESS_SNIPPET_MS", lookup("GUESS_SNIPPET_MS")) {
            if ms > 0 {
                config.snippet = Duration::from_millis(ms);
            } else {
                tracing::warn!("GUESS_SNIPPET_MS must be positive, keeping default");
            }
        }
        if let Some(v) = non_empty(lookup("GUESS_DEVICE_NAME")) {
            config.device.name = v;
        }
        if let Some(volume) = parsed::<f32>("GUESS_VOLUME", lookup("GUESS_VOLUME")) {
            config.device.volume = volume.clamp(0.0, 1.0);
        }
        if let Some(v) = non_empty(lookup("GUESS_CLIENT_ID")) {
            config.client_id = v;
        }

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let raw = non_empty(value)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
