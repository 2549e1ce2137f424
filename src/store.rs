use crate::models::{Album, Artist, ContentData, Playlist, PlatformId, Token, Track};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Read access to stored bearer credentials. The synchronization and
/// export paths only ever read tokens; writing is the auth flow's job.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, user_id: &str, platform: PlatformId) -> Result<Option<Token>>;
}

/// Batch entity persistence: get-by-id and idempotent upsert keyed by
/// entity identity (ISRC / UPC / native id).
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn save_tracks(&self, user_id: &str, tracks: &[Track]) -> Result<()>;
    async fn get_tracks(&self, user_id: &str, isrcs: &[String]) -> Result<Vec<Track>>;

    async fn save_playlists(&self, user_id: &str, playlists: &[Playlist]) -> Result<()>;
    async fn get_playlists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Playlist>>;

    async fn save_albums(&self, user_id: &str, albums: &[Album]) -> Result<()>;
    async fn get_albums(&self, user_id: &str, upcs: &[String]) -> Result<Vec<Album>>;

    async fn save_artists(&self, user_id: &str, artists: &[Artist]) -> Result<()>;
    async fn get_artists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Artist>>;
}

/// Persistence for the per-user [`ContentData`] snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Missing users get a fresh, empty snapshot.
    async fn get_content_data(&self, user_id: &str) -> Result<ContentData>;
    async fn save_content_data(&self, content: &ContentData) -> Result<()>;
}

/// In-memory store used by tests. All three collaborator roles in one
/// struct, mirroring the SQLite implementation.
#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<(String, PlatformId), Token>>,
    tracks: Mutex<HashMap<(String, String), Track>>,
    playlists: Mutex<HashMap<(String, String), Playlist>>,
    albums: Mutex<HashMap<(String, String), Album>>,
    artists: Mutex<HashMap<(String, String), Artist>>,
    snapshots: Mutex<HashMap<String, ContentData>>,
    pub snapshot_saves: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_token(&self, token: Token) {
        self.tokens
            .lock()
            .unwrap()
            .insert((token.user_id.clone(), token.platform), token);
    }

    pub fn put_snapshot(&self, content: ContentData) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(content.user_id.clone(), content);
    }

    pub fn snapshot_of(&self, user_id: &str) -> Option<ContentData> {
        self.snapshots.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_token(&self, user_id: &str, platform: PlatformId) -> Result<Option<Token>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), platform))
            .cloned())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn save_tracks(&self, user_id: &str, tracks: &[Track]) -> Result<()> {
        let mut map = self.tracks.lock().unwrap();
        for t in tracks {
            map.insert((user_id.to_string(), t.isrc.clone()), t.clone());
        }
        Ok(())
    }

    async fn get_tracks(&self, user_id: &str, isrcs: &[String]) -> Result<Vec<Track>> {
        let map = self.tracks.lock().unwrap();
        Ok(isrcs
            .iter()
            .filter_map(|i| map.get(&(user_id.to_string(), i.clone())).cloned())
            .collect())
    }

    async fn save_playlists(&self, user_id: &str, playlists: &[Playlist]) -> Result<()> {
        let mut map = self.playlists.lock().unwrap();
        for p in playlists {
            map.insert((user_id.to_string(), p.id.clone()), p.clone());
        }
        Ok(())
    }

    async fn get_playlists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Playlist>> {
        let map = self.playlists.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|i| map.get(&(user_id.to_string(), i.clone())).cloned())
            .collect())
    }

    async fn save_albums(&self, user_id: &str, albums: &[Album]) -> Result<()> {
        let mut map = self.albums.lock().unwrap();
        for a in albums {
            map.insert((user_id.to_string(), a.upc.clone()), a.clone());
        }
        Ok(())
    }

    async fn get_albums(&self, user_id: &str, upcs: &[String]) -> Result<Vec<Album>> {
        let map = self.albums.lock().unwrap();
        Ok(upcs
            .iter()
            .filter_map(|u| map.get(&(user_id.to_string(), u.clone())).cloned())
            .collect())
    }

    async fn save_artists(&self, user_id: &str, artists: &[Artist]) -> Result<()> {
        let mut map = self.artists.lock().unwrap();
        for a in artists {
            map.insert((user_id.to_string(), a.id.clone()), a.clone());
        }
        Ok(())
    }

    async fn get_artists(&self, user_id: &str, ids: &[String]) -> Result<Vec<Artist>> {
        let map = self.artists.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|i| map.get(&(user_id.to_string(), i.clone())).cloned())
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get_content_data(&self, user_id: &str) -> Result<ContentData> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ContentData::new(user_id)))
    }

    async fn save_content_data(&self, content: &ContentData) -> Result<()> {
        *self.snapshot_saves.lock().unwrap() += 1;
        self.snapshots
            .lock()
            .unwrap()
            .insert(content.user_id.clone(), content.clone());
        Ok(())
    }
}
