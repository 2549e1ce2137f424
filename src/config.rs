use crate::governor::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub spotify_client_id: String,
    #[serde(default)]
    pub spotify_client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub spotify_redirect_uri: String,

    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    // Platform bulk-write limits
    #[serde(default = "default_library_chunk")]
    pub track_chunk_size: usize,
    #[serde(default = "default_library_chunk")]
    pub album_chunk_size: usize,
    #[serde(default = "default_playlist_track_chunk")]
    pub playlist_track_chunk_size: usize,

    // Retry/backoff behavior
    #[serde(default = "default_max_retries")]
    pub max_retries_on_error: u32,
    #[serde(default = "default_rate_limit_floor")]
    pub rate_limit_floor_secs: u64,
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_ms: u64,

    /// Suffix appended to exported playlist names so they are not
    /// mistaken for playlists created natively on the destination.
    #[serde(default = "default_imported_suffix")]
    pub imported_playlist_suffix: String,
}

fn default_redirect_uri() -> String { "http://127.0.0.1:8888/callback".into() }
fn default_db_path() -> PathBuf { "/var/lib/music-library-sync/library.db".into() }
fn default_log_dir() -> PathBuf { "/var/log/music-library-sync".into() }
fn default_page_size() -> u32 { 50 }
fn default_library_chunk() -> usize { 50 }
fn default_playlist_track_chunk() -> usize { 100 }
fn default_max_retries() -> u32 { 3 }
fn default_rate_limit_floor() -> u64 { 1 }
fn default_inter_call_delay() -> u64 { 100 }
fn default_imported_suffix() -> String { " [imported]".into() }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Client secret, preferring the config file and falling back to the
    /// SPOTIFY_CLIENT_SECRET env var so secrets can stay out of the file.
    pub fn spotify_client_secret(&self) -> String {
        if !self.spotify_client_secret.is_empty() {
            return self.spotify_client_secret.clone();
        }
        std::env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries_on_error.max(1),
            backoff_floor: Duration::from_secs(self.rate_limit_floor_secs),
            inter_call_delay: Duration::from_millis(self.inter_call_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            spotify_redirect_uri: default_redirect_uri(),
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            page_size: default_page_size(),
            track_chunk_size: default_library_chunk(),
            album_chunk_size: default_library_chunk(),
            playlist_track_chunk_size: default_playlist_track_chunk(),
            max_retries_on_error: default_max_retries(),
            rate_limit_floor_secs: default_rate_limit_floor(),
            inter_call_delay_ms: default_inter_call_delay(),
            imported_playlist_suffix: default_imported_suffix(),
        }
    }
}
