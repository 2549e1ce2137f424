use crate::models::{Album, Artist, ContentData, ContentKind, Playlist, PlatformId, Token, Track};
use crate::store::{ContentStore, SnapshotStore, TokenStore};
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tokens (
    user_id    TEXT NOT NULL,
    platform   TEXT NOT NULL,
    token_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, platform)
);
CREATE TABLE IF NOT EXISTS content (
    user_id    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    content_id TEXT NOT NULL,
    body       TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, kind, content_id)
);
CREATE TABLE IF NOT EXISTS content_data (
    user_id    TEXT PRIMARY KEY,
    body       TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

pub fn open_or_create(path: &Path) -> Result<Connection> {
    log::debug!("opening database at {}", path.display());
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn save_token(conn: &Connection, token: &Token) -> Result<()> {
    let json = serde_json::to_string(token)?;
    conn.execute(
        "INSERT INTO tokens (user_id, platform, token_json, updated_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(user_id, platform) DO UPDATE SET \
         token_json = excluded.token_json, updated_at = excluded.updated_at",
        params![token.user_id, token.platform.as_str(), json, now_ts()],
    )?;
    Ok(())
}

pub fn load_token(conn: &Connection, user_id: &str, platform: PlatformId) -> Result<Option<Token>> {
    let mut stmt =
        conn.prepare("SELECT token_json FROM tokens WHERE user_id = ?1 AND platform = ?2 LIMIT 1")?;
    let json: Option<String> = stmt
        .query_row(params![user_id, platform.as_str()], |r| r.get(0))
        .optional()?;
    match json {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

fn upsert_entities<T: Serialize>(
    conn: &Connection,
    user_id: &str,
    kind: ContentKind,
    entities: &[(String, &T)],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO content (user_id, kind, content_id, body, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(user_id, kind, content_id) DO UPDATE SET \
         body = excluded.body, updated_at = excluded.updated_at",
    )?;
    for (id, entity) in entities {
        let body = serde_json::to_string(entity)?;
        stmt.execute(params![user_id, kind.as_str(), id, body, now_ts()])?;
    }
    Ok(())
}

fn load_entities<T: DeserializeOwned>(
    conn: &Connection,
    user_id: &str,
    kind: ContentKind,
    ids: &[String],
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(
        "SELECT body FROM content WHERE user_id = ?1 AND kind = ?2 AND content_id = ?3 LIMIT 1",
    )?;
    let mut out = Vec::new();
    for id in ids {
        let body: Option<String> = stmt
            .query_row(params![user_id, kind.as_str(), id], |r| r.get(0))
            .optional()?;
        if let Some(s) = body {
            out.push(serde_json::from_str(&s)?);
        }
    }
    Ok(out)
}

pub fn save_content_data(conn: &Connection, content: &ContentData) -> Result<()> {
    let body = serde_json::to_string(content)?;
    conn.execute(
        "INSERT INTO content_data (user_id, body, updated_at) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(user_id) DO UPDATE SET \
         body = excluded.body, updated_at = excluded.updated_at",
        params![content.user_id, body, now_ts()],
    )?;
    Ok(())
}

pub fn load_content_data(conn: &Connection, user_id: &str) -> Result<Option<ContentData>> {
    let mut stmt = conn.prepare("SELECT body FROM content_data WHERE user_id = ?1 LIMIT 1")?;
    let body: Option<String> = stmt
        .query_row(params![user_id], |r| r.get(0))
        .optional()?;
    match body {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

/// SQLite-backed implementation of all three collaborator stores.
/// Each call opens a fresh connection on a blocking task, keyed by the
/// configured database path.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let conn = open_or_create(&db_path)?;
            f(&conn)
        })
        .await?
    }

    /// Persist a token pair. Only the auth bootstrap calls this; the
    /// sync/export core reads tokens through [`TokenStore`].
    pub async fn put_token(&self, token: Token) -> Result<()> {
        self.with_conn(move |conn| save_token(conn, &token)).await
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn get_token(&self, user_id: &str, platform: PlatformId) -> Result<Option<Token>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| load_token(conn, &user_id, platform))
            .await
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn save_tracks(&self, user_id: &str, tracks: &[Track]) -> Result<()> {
        let user_id = user_id.to_string();
        let tracks = tracks.to_vec();
        self.with_conn(move |conn| {
            let keyed: Vec<(String, &Track)> =
                tracks.iter().map(|t| (t.isrc.clone(), t)).collect();
            upsert_entities(conn, &user_id, ContentKind::Track, &keyed)
        })
        .await
    }

    async fn get_tracks(&self, user_id: &str, isrcs: &[String]) -> Result<Vec<Track>> {
        let user_id = user_id.to_string();
        let isrcs = isrcs.to_vec();
        self.with_conn(move |conn| load_entities(conn, &user_id, ContentKind::Track, &isrcs))
            .await
    }

    async fn save_playlists(&self, user_id: &str, playlists: &[Playlist]) -> Result<()> {
        let user_id = user_id.to_string();
        let playlists = playlists.to_vec();
        self.with_conn(move |conn| {
            let keyed: Vec<(String, &Playlist)> =
                playlists.iter().map(|p| (p.id.clone(), p)).collect();
            upsert_entities(conn, &user_id, ContentKind::Playlist, &keyed)
        })
        .await
    }

    async fn get_playlists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Playlist>> {
        let user_id = user_id.to_string();
        let ids = ids.to_vec();
        self.with_conn(move |conn| load_entities(conn, &user_id, ContentKind::Playlist, &ids))
            .await
    }

    async fn save_albums(&self, user_id: &str, albums: &[Album]) -> Result<()> {
        let user_id = user_id.to_string();
        let albums = albums.to_vec();
        self.with_conn(move |conn| {
            let keyed: Vec<(String, &Album)> =
                albums.iter().map(|a| (a.upc.clone(), a)).collect();
            upsert_entities(conn, &user_id, ContentKind::Album, &keyed)
        })
        .await
    }

    async fn get_albums(&self, user_id: &str, upcs: &[String]) -> Result<Vec<Album>> {
        let user_id = user_id.to_string();
        let upcs = upcs.to_vec();
        self.with_conn(move |conn| load_entities(conn, &user_id, ContentKind::Album, &upcs))
            .await
    }

    async fn save_artists(&self, user_id: &str, artists: &[Artist]) -> Result<()> {
        let user_id = user_id.to_string();
        let artists = artists.to_vec();
        self.with_conn(move |conn| {
            let keyed: Vec<(String, &Artist)> =
                artists.iter().map(|a| (a.id.clone(), a)).collect();
            upsert_entities(conn, &user_id, ContentKind::Artist, &keyed)
        })
        .await
    }

    async fn get_artists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Artist>> {
        let user_id = user_id.to_string();
        let ids = ids.to_vec();
        self.with_conn(move |conn| load_entities(conn, &user_id, ContentKind::Artist, &ids))
            .await
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn get_content_data(&self, user_id: &str) -> Result<ContentData> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            Ok(load_content_data(conn, &user_id)?
                .unwrap_or_else(|| ContentData::new(user_id.clone())))
        })
        .await
    }

    async fn save_content_data(&self, content: &ContentData) -> Result<()> {
        let content = content.clone();
        self.with_conn(move |conn| save_content_data(conn, &content))
            .await
    }
}
