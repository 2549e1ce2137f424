use super::{AlbumsFetch, ExportReport, LikedTracksFetch, Platform, PlaylistsFetch};
use crate::config::Config;
use crate::error::{PlatformError, PlatformResult};
use crate::governor::{with_retry, write_chunked, RetryPolicy};
use crate::models::{Album, Artist, Playlist, PlatformId, Token, Track};
use crate::pager::{collect_pages, dedup_by_key, Page};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::future::join_all;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::env;
use tracing::{debug, info, warn};

const SCOPES: &str = "user-library-read user-library-modify playlist-read-private \
playlist-read-collaborative playlist-modify-private playlist-modify-public \
user-follow-read";

/// Spotify adapter backed by the Spotify Web API.
/// Endpoints may be overridden by SPOTIFY_AUTH_BASE and SPOTIFY_API_BASE
/// env vars (useful for tests).
pub struct SpotifyPlatform {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_base: String,
    api_base: String,
    page_size: u32,
    track_chunk: usize,
    album_chunk: usize,
    playlist_track_chunk: usize,
    imported_suffix: String,
    policy: RetryPolicy,
}

impl SpotifyPlatform {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            client_id: cfg.spotify_client_id.clone(),
            client_secret: cfg.spotify_client_secret(),
            redirect_uri: cfg.spotify_redirect_uri.clone(),
            auth_base: env::var("SPOTIFY_AUTH_BASE")
                .unwrap_or_else(|_| "https://accounts.spotify.com".into()),
            api_base: env::var("SPOTIFY_API_BASE")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".into()),
            page_size: cfg.page_size,
            track_chunk: cfg.track_chunk_size,
            album_chunk: cfg.album_chunk_size,
            playlist_track_chunk: cfg.playlist_track_chunk_size,
            imported_suffix: cfg.imported_playlist_suffix.clone(),
            policy: cfg.retry_policy(),
        }
    }

    /// Point the adapter at explicit base URLs. Tests use this instead
    /// of the env overrides to stay race-free under parallel execution.
    pub fn with_bases(mut self, auth_base: &str, api_base: &str) -> Self {
        self.auth_base = auth_base.trim_end_matches('/').to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn bearer(access_token: &str) -> String {
        format!("Bearer {}", access_token)
    }

    async fn get_json(&self, url: &str, access_token: &str) -> PlatformResult<Value> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::bearer(access_token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Self::json_or_error(resp).await
    }

    async fn put_ids(&self, url: &str, ids: &[String], access_token: &str) -> PlatformResult<()> {
        let resp = self
            .client
            .put(url)
            .header(AUTHORIZATION, Self::bearer(access_token))
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "ids": ids }))
            .send()
            .await?;
        Self::ok_or_error(resp).await
    }

    async fn post_json(&self, url: &str, body: &Value, access_token: &str) -> PlatformResult<Value> {
        let resp = self
            .client
            .post(url)
            .header(AUTHORIZATION, Self::bearer(access_token))
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        Self::json_or_error(resp).await
    }

    async fn json_or_error(resp: reqwest::Response) -> PlatformResult<Value> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let retry_after = Self::retry_after_secs(&resp);
        let body = resp.text().await.unwrap_or_default();
        Err(PlatformError::from_status(status, retry_after, &body))
    }

    async fn ok_or_error(resp: reqwest::Response) -> PlatformResult<()> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let retry_after = Self::retry_after_secs(&resp);
        let body = resp.text().await.unwrap_or_default();
        Err(PlatformError::from_status(status, retry_after, &body))
    }

    fn retry_after_secs(resp: &reqwest::Response) -> Option<u64> {
        resp.headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    fn items_of(j: &Value) -> Vec<Value> {
        j["items"].as_array().cloned().unwrap_or_default()
    }

    fn next_url(j: &Value) -> Option<String> {
        j["next"].as_str().map(|s| s.to_string())
    }

    // Conversion routines. Items that cannot produce a valid identity
    // (missing ISRC/UPC) yield None and are dropped by the callers.

    fn convert_track(data: &Value) -> Option<Track> {
        // liked-track payloads nest the track under "track"
        let track = if data["track"].is_object() {
            &data["track"]
        } else {
            data
        };
        let isrc = track["external_ids"]["isrc"].as_str()?;
        Some(Track {
            isrc: isrc.to_string(),
            platform_id: track["id"].as_str().unwrap_or("").to_string(),
            platform: PlatformId::Spotify,
            name: track["name"].as_str().unwrap_or("").to_string(),
            album_art_url: track["album"]["images"][0]["url"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            artists: Self::name_list(&track["artists"]),
            album_name: track["album"]["name"].as_str().unwrap_or("").to_string(),
            duration_ms: track["duration_ms"].as_u64().unwrap_or(0),
        })
    }

    fn convert_tracks(items: &[Value]) -> Vec<Track> {
        items.iter().filter_map(Self::convert_track).collect()
    }

    fn convert_playlist(data: &Value, track_isrcs: Vec<String>) -> Playlist {
        Playlist {
            id: data["id"].as_str().unwrap_or("").to_string(),
            platform: PlatformId::Spotify,
            name: data["name"].as_str().unwrap_or("").to_string(),
            description: data["description"].as_str().unwrap_or("").to_string(),
            cover_url: data["images"][0]["url"].as_str().unwrap_or("").to_string(),
            track_isrcs,
            owner: data["owner"]["id"].as_str().unwrap_or("").to_string(),
            track_count: data["tracks"]["total"].as_u64().unwrap_or(0) as u32,
        }
    }

    fn convert_album(data: &Value, track_isrcs: Vec<String>) -> Option<Album> {
        let upc = data["external_ids"]["upc"].as_str()?;
        Some(Album {
            upc: upc.to_string(),
            platform_id: data["id"].as_str().unwrap_or("").to_string(),
            platform: PlatformId::Spotify,
            name: data["name"].as_str().unwrap_or("").to_string(),
            cover_url: data["images"][0]["url"].as_str().unwrap_or("").to_string(),
            artists: Self::name_list(&data["artists"]),
            track_isrcs,
            released: crate::models::convert_date_to_int(
                data["release_date"].as_str().unwrap_or(""),
            ),
            track_count: data["tracks"]["total"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn convert_artist(data: &Value) -> Option<Artist> {
        let id = data["id"].as_str()?;
        Some(Artist {
            id: id.to_string(),
            platform: PlatformId::Spotify,
            name: data["name"].as_str().unwrap_or("").to_string(),
            thumbnail_url: data["images"][0]["url"].as_str().unwrap_or("").to_string(),
            genres: data["genres"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|g| g.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            follower_count: data["followers"]["total"].as_u64().unwrap_or(0),
            external_url: data["external_urls"]["spotify"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            popularity: data["popularity"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn name_list(artists: &Value) -> Vec<String> {
        artists
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|x| x["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Collect every raw item of an offset-paginated listing, following
    /// the response's own "next" URL until it is absent.
    async fn collect_listing(&self, first_url: String, access_token: &str) -> PlatformResult<Vec<Value>> {
        let this = self;
        collect_pages(first_url, |url: String| {
            let token = access_token;
            async move {
                let j = with_retry(&this.policy, || this.get_json(&url, token)).await?;
                Ok(Page {
                    items: Self::items_of(&j),
                    next: Self::next_url(&j),
                })
            }
        })
        .await
    }

    /// Full member-track list for one playlist, paginated.
    async fn playlist_tracks(&self, playlist_id: &str, access_token: &str) -> PlatformResult<Vec<Track>> {
        let first = format!(
            "{}/playlists/{}/tracks?limit={}&offset=0",
            self.api_base, playlist_id, self.page_size
        );
        let items = self.collect_listing(first, access_token).await?;
        Ok(Self::convert_tracks(&items))
    }

    /// Full member-track list for one album. The album-tracks listing
    /// returns simplified payloads without external ids, so each track
    /// is expanded via its detail endpoint; a single failed expansion is
    /// skipped rather than aborting the page.
    async fn album_tracks(&self, album_id: &str, access_token: &str) -> PlatformResult<Vec<Track>> {
        let first = format!(
            "{}/albums/{}/tracks?limit={}&offset=0",
            self.api_base, album_id, self.page_size
        );
        let stubs = self.collect_listing(first, access_token).await?;

        let this = self;
        let lookups = stubs
            .iter()
            .filter_map(|s| s["id"].as_str().map(str::to_string))
            .map(|id| {
                let token = access_token;
                async move {
                    let url = format!("{}/tracks/{}", this.api_base, id);
                    match with_retry(&this.policy, || this.get_json(&url, token)).await {
                        Ok(full) => Ok(Some(full)),
                        Err(PlatformError::TokenExpired) => Err(PlatformError::TokenExpired),
                        Err(e) => {
                            warn!("skipping track {} during album expansion: {}", id, e);
                            Ok(None)
                        }
                    }
                }
            });

        let mut tracks = Vec::new();
        for res in join_all(lookups).await {
            if let Some(full) = res? {
                if let Some(track) = Self::convert_track(&full) {
                    tracks.push(track);
                }
            }
        }
        Ok(tracks)
    }

    /// Resolve cross-platform codes to native ids one search at a time.
    /// A miss or a non-auth failure excludes the item; it is never an
    /// error of the batch.
    async fn search_ids(
        &self,
        codes: &[String],
        query_field: &str,
        result_field: &str,
        access_token: &str,
    ) -> PlatformResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for code in codes {
            let q = format!("{}:{}", query_field, code);
            let url = format!(
                "{}/search?q={}&type={}&limit=1",
                self.api_base,
                urlencoding::encode(&q),
                query_field_type(query_field)
            );
            match with_retry(&self.policy, || self.get_json(&url, access_token)).await {
                Ok(j) => {
                    if let Some(id) = j[result_field]["items"][0]["id"].as_str() {
                        if seen.insert(id.to_string()) {
                            ids.push(id.to_string());
                        }
                    } else {
                        debug!("no {} match for {}", query_field, code);
                    }
                }
                Err(PlatformError::TokenExpired) => return Err(PlatformError::TokenExpired),
                Err(e) => warn!("search by {} {} failed: {}", query_field, code, e),
            }
        }
        Ok(ids)
    }
}

fn query_field_type(query_field: &str) -> &'static str {
    match query_field {
        "upc" => "album",
        _ => "track",
    }
}

#[async_trait]
impl Platform for SpotifyPlatform {
    fn id(&self) -> PlatformId {
        PlatformId::Spotify
    }

    fn name(&self) -> &str {
        "spotify"
    }

    fn build_auth_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", SCOPES)
            .append_pair("redirect_uri", &self.redirect_uri)
            .finish();
        format!("{}/authorize?{}", self.auth_base, query)
    }

    async fn exchange_code_for_token(
        &self,
        user_id: &str,
        auth_code: &str,
    ) -> PlatformResult<Token> {
        // never log the full code
        debug!(
            "exchanging authorization code {}... for user {}",
            auth_code.chars().take(8).collect::<String>(),
            user_id
        );
        let params = [
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("redirect_uri", &self.redirect_uri),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let resp = self
            .client
            .post(format!("{}/api/token", self.auth_base))
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::AuthExchange(format!("{} => {}", status, body)));
        }
        let j: Value = resp.json().await?;
        let access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| PlatformError::AuthExchange("no access_token in response".into()))?
            .to_string();
        Ok(Token {
            user_id: user_id.to_string(),
            platform: PlatformId::Spotify,
            access_token,
            refresh_token: j["refresh_token"].as_str().map(str::to_string),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> PlatformResult<Option<String>> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let resp = self
            .client
            .post(format!("{}/api/token", self.auth_base))
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status.is_success() {
            let j: Value = serde_json::from_str(&body)
                .map_err(|e| PlatformError::Api(format!("parse token response: {}", e)))?;
            return Ok(j["access_token"].as_str().map(str::to_string));
        }
        // invalid_grant means the refresh token itself is revoked; that
        // is a terminal state for the stored credential, not a failure.
        if status == reqwest::StatusCode::BAD_REQUEST {
            let j: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            if j["error"].as_str() == Some("invalid_grant") {
                info!("refresh token is invalid or has been revoked");
                return Ok(None);
            }
        }
        Err(PlatformError::Api(format!("{} => {}", status, body)))
    }

    async fn fetch_liked_tracks(&self, access_token: &str) -> PlatformResult<LikedTracksFetch> {
        let first = format!(
            "{}/me/tracks?limit={}&offset=0",
            self.api_base, self.page_size
        );
        let items = self.collect_listing(first, access_token).await?;
        let mut tracks = Self::convert_tracks(&items);
        dedup_by_key(&mut tracks, |t| t.isrc.clone());
        let track_ids = tracks.iter().map(|t| t.isrc.clone()).collect();
        info!("fetched {} liked tracks", tracks.len());
        Ok(LikedTracksFetch { track_ids, tracks })
    }

    async fn fetch_playlists(&self, access_token: &str) -> PlatformResult<PlaylistsFetch> {
        let first = format!(
            "{}/me/playlists?limit={}&offset=0",
            self.api_base, self.page_size
        );
        let stubs = self.collect_listing(first, access_token).await?;

        let mut playlists = Vec::new();
        let mut all_tracks = Vec::new();
        for stub in &stubs {
            let id = stub["id"].as_str().unwrap_or("");
            if id.is_empty() {
                continue;
            }
            // member tracks are fully collected before the playlist
            // object is constructed
            let tracks = self.playlist_tracks(id, access_token).await?;
            let isrcs = tracks.iter().map(|t| t.isrc.clone()).collect();
            playlists.push(Self::convert_playlist(stub, isrcs));
            all_tracks.extend(tracks);
        }
        dedup_by_key(&mut all_tracks, |t| t.isrc.clone());
        info!(
            "fetched {} playlists ({} distinct tracks)",
            playlists.len(),
            all_tracks.len()
        );
        Ok(PlaylistsFetch {
            playlists,
            tracks: all_tracks,
        })
    }

    async fn fetch_albums(&self, access_token: &str) -> PlatformResult<AlbumsFetch> {
        let first = format!(
            "{}/me/albums?limit={}&offset=0",
            self.api_base, self.page_size
        );
        let stubs = self.collect_listing(first, access_token).await?;

        let mut albums = Vec::new();
        let mut all_tracks = Vec::new();
        for stub in &stubs {
            let data = &stub["album"];
            let id = data["id"].as_str().unwrap_or("");
            if id.is_empty() {
                continue;
            }
            let tracks = self.album_tracks(id, access_token).await?;
            let isrcs = tracks.iter().map(|t| t.isrc.clone()).collect();
            // albums without a UPC are unsynchronizable and excluded
            if let Some(album) = Self::convert_album(data, isrcs) {
                albums.push(album);
                all_tracks.extend(tracks);
            }
        }
        dedup_by_key(&mut all_tracks, |t| t.isrc.clone());
        info!(
            "fetched {} albums ({} distinct tracks)",
            albums.len(),
            all_tracks.len()
        );
        Ok(AlbumsFetch {
            albums,
            tracks: all_tracks,
        })
    }

    async fn fetch_followed_artists(&self, access_token: &str) -> PlatformResult<Vec<Artist>> {
        let this = self;
        // cursor pagination: the empty cursor means "first page"
        let items = collect_pages(String::new(), |after: String| {
            let token = access_token;
            async move {
                let mut url = format!(
                    "{}/me/following?type=artist&limit={}",
                    this.api_base, this.page_size
                );
                if !after.is_empty() {
                    url.push_str(&format!("&after={}", after));
                }
                let j = with_retry(&this.policy, || this.get_json(&url, token)).await?;
                let items = j["artists"]["items"].as_array().cloned().unwrap_or_default();
                let next = j["artists"]["cursors"]["after"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Ok(Page { items, next })
            }
        })
        .await?;

        let artists: Vec<Artist> = items.iter().filter_map(Self::convert_artist).collect();
        info!("fetched {} followed artists", artists.len());
        Ok(artists)
    }

    async fn search_track_ids_by_isrc(
        &self,
        isrcs: &[String],
        access_token: &str,
    ) -> PlatformResult<Vec<String>> {
        self.search_ids(isrcs, "isrc", "tracks", access_token).await
    }

    async fn search_album_ids_by_upc(
        &self,
        upcs: &[String],
        access_token: &str,
    ) -> PlatformResult<Vec<String>> {
        self.search_ids(upcs, "upc", "albums", access_token).await
    }

    async fn export_tracks(
        &self,
        tracks: &[Track],
        access_token: &str,
    ) -> PlatformResult<ExportReport> {
        let isrcs: Vec<String> = tracks.iter().map(|t| t.isrc.clone()).collect();
        let ids = self.search_track_ids_by_isrc(&isrcs, access_token).await?;
        let resolved = ids.len();

        let url = format!("{}/me/tracks", self.api_base);
        let this = self;
        let report = write_chunked(&ids, self.track_chunk, &self.policy, |chunk| {
            let url = url.clone();
            let token = access_token;
            async move { this.put_ids(&url, &chunk, token).await }
        })
        .await?;

        info!(
            "exported {}/{} tracks ({} unresolved)",
            report.written,
            isrcs.len(),
            isrcs.len() - resolved
        );
        Ok(ExportReport {
            resolved,
            written: report.written,
            skipped: report.skipped,
        })
    }

    async fn export_albums(
        &self,
        albums: &[Album],
        access_token: &str,
    ) -> PlatformResult<ExportReport> {
        let upcs: Vec<String> = albums.iter().map(|a| a.upc.clone()).collect();
        let ids = self.search_album_ids_by_upc(&upcs, access_token).await?;
        let resolved = ids.len();

        let url = format!("{}/me/albums", self.api_base);
        let this = self;
        let report = write_chunked(&ids, self.album_chunk, &self.policy, |chunk| {
            let url = url.clone();
            let token = access_token;
            async move { this.put_ids(&url, &chunk, token).await }
        })
        .await?;

        info!(
            "exported {}/{} albums ({} unresolved)",
            report.written,
            upcs.len(),
            upcs.len() - resolved
        );
        Ok(ExportReport {
            resolved,
            written: report.written,
            skipped: report.skipped,
        })
    }

    async fn export_playlists(
        &self,
        playlists: &[Playlist],
        access_token: &str,
    ) -> PlatformResult<ExportReport> {
        let mut total = ExportReport::default();
        for playlist in playlists {
            let name = format!("{}{}", playlist.name, self.imported_suffix);
            let body = json!({
                "name": name,
                "description": playlist.description,
                "public": false,
            });
            let created = match self
                .post_json(&format!("{}/me/playlists", self.api_base), &body, access_token)
                .await
            {
                Ok(j) => j,
                Err(PlatformError::TokenExpired) => return Err(PlatformError::TokenExpired),
                Err(e) => {
                    warn!("failed to create playlist {}: {}", playlist.name, e);
                    continue;
                }
            };
            let new_id = match created["id"].as_str() {
                Some(id) => id.to_string(),
                None => {
                    warn!("create playlist {} returned no id", playlist.name);
                    continue;
                }
            };

            let track_ids = self
                .search_track_ids_by_isrc(&playlist.track_isrcs, access_token)
                .await?;
            total.resolved += track_ids.len();

            let uris: Vec<String> = track_ids
                .iter()
                .map(|id| format!("spotify:track:{}", id))
                .collect();
            let url = format!("{}/playlists/{}/tracks", self.api_base, new_id);
            let this = self;
            let report = write_chunked(&uris, self.playlist_track_chunk, &self.policy, |chunk| {
                let url = url.clone();
                let token = access_token;
                async move {
                    let resp = this
                        .client
                        .post(&url)
                        .header(AUTHORIZATION, Self::bearer(token))
                        .header(CONTENT_TYPE, "application/json")
                        .json(&json!({ "uris": chunk }))
                        .send()
                        .await?;
                    Self::ok_or_error(resp).await
                }
            })
            .await?;
            total.written += report.written;
            total.skipped += report.skipped;

            info!(
                "exported playlist {} as {} ({} tracks attached)",
                playlist.name, new_id, report.written
            );
            tokio::time::sleep(self.policy.inter_call_delay).await;
        }
        Ok(total)
    }
}
