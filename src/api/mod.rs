pub mod mock;
pub mod spotify;
pub mod spotify_auth;

use crate::config::Config;
use crate::error::PlatformResult;
use crate::models::{Album, Artist, Playlist, PlatformId, Token, Track};
use std::sync::Arc;

/// Result of a liked-tracks fetch: the complete converted tracks plus
/// their identity list (ISRCs), already de-duplicated.
pub struct LikedTracksFetch {
    pub track_ids: Vec<String>,
    pub tracks: Vec<Track>,
}

/// Result of a playlists fetch. `tracks` is every member track across
/// all playlists, de-duplicated by ISRC.
pub struct PlaylistsFetch {
    pub playlists: Vec<Playlist>,
    pub tracks: Vec<Track>,
}

/// Result of an albums fetch. Albums lacking a UPC are excluded, not
/// errored. `tracks` is de-duplicated by ISRC across all albums.
pub struct AlbumsFetch {
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
}

/// What an export run accomplished. Misses during identifier resolution
/// and chunks abandoned by the governor show up as smaller counts, never
/// as errors.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Destination-native ids resolved via search.
    pub resolved: usize,
    /// Ids actually written to the destination library.
    pub written: usize,
    /// Ids lost to abandoned chunks.
    pub skipped: usize,
}

/// Capability contract every streaming-platform adapter implements.
/// All calls take the bearer token explicitly; adapters hold no
/// per-user state and are safe to share across requests.
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    fn id(&self) -> PlatformId;

    /// Lowercase name for logging.
    fn name(&self) -> &str;

    /// Authorization URL the user opens in a browser. No side effects.
    fn build_auth_url(&self) -> String;

    /// Exchange an authorization code for a token pair.
    async fn exchange_code_for_token(
        &self,
        user_id: &str,
        auth_code: &str,
    ) -> PlatformResult<Token>;

    /// Obtain a fresh access token. Returns `Ok(None)` when the platform
    /// reports the refresh token itself is permanently revoked; any
    /// other failure propagates.
    async fn refresh_access_token(&self, refresh_token: &str) -> PlatformResult<Option<String>>;

    async fn fetch_liked_tracks(&self, access_token: &str) -> PlatformResult<LikedTracksFetch>;

    async fn fetch_playlists(&self, access_token: &str) -> PlatformResult<PlaylistsFetch>;

    async fn fetch_albums(&self, access_token: &str) -> PlatformResult<AlbumsFetch>;

    async fn fetch_followed_artists(&self, access_token: &str) -> PlatformResult<Vec<Artist>>;

    /// Resolve ISRCs to destination-native track ids. Misses are
    /// silently excluded.
    async fn search_track_ids_by_isrc(
        &self,
        isrcs: &[String],
        access_token: &str,
    ) -> PlatformResult<Vec<String>>;

    /// Resolve UPCs to destination-native album ids. Misses are
    /// silently excluded.
    async fn search_album_ids_by_upc(
        &self,
        upcs: &[String],
        access_token: &str,
    ) -> PlatformResult<Vec<String>>;

    async fn export_tracks(
        &self,
        tracks: &[Track],
        access_token: &str,
    ) -> PlatformResult<ExportReport>;

    async fn export_playlists(
        &self,
        playlists: &[Playlist],
        access_token: &str,
    ) -> PlatformResult<ExportReport>;

    async fn export_albums(
        &self,
        albums: &[Album],
        access_token: &str,
    ) -> PlatformResult<ExportReport>;
}

/// Adapter factory keyed on the platform tag.
pub fn platform_for(id: PlatformId, cfg: &Config) -> Arc<dyn Platform> {
    match id {
        PlatformId::Spotify => Arc::new(spotify::SpotifyPlatform::new(cfg)),
    }
}
