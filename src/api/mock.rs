use super::{AlbumsFetch, ExportReport, LikedTracksFetch, Platform, PlaylistsFetch};
use crate::error::{PlatformError, PlatformResult};
use crate::models::{Album, Artist, Playlist, PlatformId, Token, Track};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

/// A deterministic in-memory adapter used in tests. It serves whatever
/// fixture content it was given, records export calls, and can be
/// switched into a token-expired failure mode.
#[derive(Default)]
pub struct MockPlatform {
    pub tracks: Vec<Track>,
    pub playlists: Vec<Playlist>,
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
    pub token_expired: bool,
    pub exported_tracks: Mutex<Vec<String>>,
    pub exported_playlists: Mutex<Vec<String>>,
    pub exported_albums: Mutex<Vec<String>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(mut self, tracks: Vec<Track>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn with_playlists(mut self, playlists: Vec<Playlist>) -> Self {
        self.playlists = playlists;
        self
    }

    pub fn with_albums(mut self, albums: Vec<Album>) -> Self {
        self.albums = albums;
        self
    }

    pub fn with_artists(mut self, artists: Vec<Artist>) -> Self {
        self.artists = artists;
        self
    }

    pub fn expired(mut self) -> Self {
        self.token_expired = true;
        self
    }

    fn guard(&self) -> PlatformResult<()> {
        if self.token_expired {
            Err(PlatformError::TokenExpired)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Spotify
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn build_auth_url(&self) -> String {
        "https://mock.invalid/authorize".into()
    }

    async fn exchange_code_for_token(
        &self,
        user_id: &str,
        _auth_code: &str,
    ) -> PlatformResult<Token> {
        Ok(Token {
            user_id: user_id.to_string(),
            platform: PlatformId::Spotify,
            access_token: "mock-access".into(),
            refresh_token: Some("mock-refresh".into()),
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> PlatformResult<Option<String>> {
        Ok(Some("mock-access".into()))
    }

    async fn fetch_liked_tracks(&self, _access_token: &str) -> PlatformResult<LikedTracksFetch> {
        self.guard()?;
        info!("MockPlatform: fetch_liked_tracks -> {}", self.tracks.len());
        Ok(LikedTracksFetch {
            track_ids: self.tracks.iter().map(|t| t.isrc.clone()).collect(),
            tracks: self.tracks.clone(),
        })
    }

    async fn fetch_playlists(&self, _access_token: &str) -> PlatformResult<PlaylistsFetch> {
        self.guard()?;
        Ok(PlaylistsFetch {
            playlists: self.playlists.clone(),
            tracks: self.tracks.clone(),
        })
    }

    async fn fetch_albums(&self, _access_token: &str) -> PlatformResult<AlbumsFetch> {
        self.guard()?;
        Ok(AlbumsFetch {
            albums: self.albums.clone(),
            tracks: self.tracks.clone(),
        })
    }

    async fn fetch_followed_artists(&self, _access_token: &str) -> PlatformResult<Vec<Artist>> {
        self.guard()?;
        Ok(self.artists.clone())
    }

    async fn search_track_ids_by_isrc(
        &self,
        isrcs: &[String],
        _access_token: &str,
    ) -> PlatformResult<Vec<String>> {
        self.guard()?;
        Ok(isrcs.iter().map(|i| format!("mock-track-{}", i)).collect())
    }

    async fn search_album_ids_by_upc(
        &self,
        upcs: &[String],
        _access_token: &str,
    ) -> PlatformResult<Vec<String>> {
        self.guard()?;
        Ok(upcs.iter().map(|u| format!("mock-album-{}", u)).collect())
    }

    async fn export_tracks(
        &self,
        tracks: &[Track],
        _access_token: &str,
    ) -> PlatformResult<ExportReport> {
        self.guard()?;
        let mut log = self.exported_tracks.lock().unwrap();
        log.extend(tracks.iter().map(|t| t.isrc.clone()));
        Ok(ExportReport {
            resolved: tracks.len(),
            written: tracks.len(),
            skipped: 0,
        })
    }

    async fn export_playlists(
        &self,
        playlists: &[Playlist],
        _access_token: &str,
    ) -> PlatformResult<ExportReport> {
        self.guard()?;
        let mut log = self.exported_playlists.lock().unwrap();
        log.extend(playlists.iter().map(|p| p.id.clone()));
        Ok(ExportReport {
            resolved: playlists.len(),
            written: playlists.len(),
            skipped: 0,
        })
    }

    async fn export_albums(
        &self,
        albums: &[Album],
        _access_token: &str,
    ) -> PlatformResult<ExportReport> {
        self.guard()?;
        let mut log = self.exported_albums.lock().unwrap();
        log.extend(albums.iter().map(|a| a.upc.clone()));
        Ok(ExportReport {
            resolved: albums.len(),
            written: albums.len(),
            skipped: 0,
        })
    }
}
