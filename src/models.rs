use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Streaming services this library can mirror against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlatformId {
    Spotify,
}

impl PlatformId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Spotify => "SPOTIFY",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SPOTIFY" => Ok(PlatformId::Spotify),
            other => Err(anyhow::anyhow!("unknown platform: {}", other)),
        }
    }
}

/// The four kinds of library content a platform can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Track,
    Playlist,
    Album,
    Artist,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Track => "TRACK",
            ContentKind::Playlist => "PLAYLIST",
            ContentKind::Album => "ALBUM",
            ContentKind::Artist => "ARTIST",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACK" => Ok(ContentKind::Track),
            "PLAYLIST" => Ok(ContentKind::Playlist),
            "ALBUM" => Ok(ContentKind::Album),
            "ARTIST" => Ok(ContentKind::Artist),
            other => Err(anyhow::anyhow!("unknown content kind: {}", other)),
        }
    }
}

/// A track, identified across platforms by its ISRC. Payloads without an
/// ISRC are dropped during conversion and never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Cross-platform identity (ISRC).
    pub isrc: String,
    /// Platform-native id on the origin platform.
    pub platform_id: String,
    pub platform: PlatformId,
    pub name: String,
    pub album_art_url: String,
    pub artists: Vec<String>,
    pub album_name: String,
    pub duration_ms: u64,
}

/// A playlist. Playlists carry no cross-platform code; identity is the
/// platform-native id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub platform: PlatformId,
    pub name: String,
    pub description: String,
    pub cover_url: String,
    /// Member track identities (ISRCs), in playlist order.
    pub track_isrcs: Vec<String>,
    pub owner: String,
    pub track_count: u32,
}

/// An album, identified across platforms by its UPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    /// Cross-platform identity (UPC).
    pub upc: String,
    pub platform_id: String,
    pub platform: PlatformId,
    pub name: String,
    pub cover_url: String,
    pub artists: Vec<String>,
    pub track_isrcs: Vec<String>,
    /// Release date encoded as YYYYMMDD for cheap comparison.
    pub released: u32,
    pub track_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub platform: PlatformId,
    pub name: String,
    pub thumbnail_url: String,
    pub genres: Vec<String>,
    pub follower_count: u64,
    pub external_url: String,
    pub popularity: u32,
}

/// Bearer credential for one (user, platform) pair. Expiry is signaled
/// only by 401 responses, never by a stored timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub user_id: String,
    pub platform: PlatformId,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Per-platform id sets inside a [`ContentData`] snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContent {
    pub liked_tracks: BTreeSet<String>,
    pub playlists: BTreeSet<String>,
    pub albums: BTreeSet<String>,
    pub artists: BTreeSet<String>,
}

impl PlatformContent {
    fn set(&self, kind: ContentKind) -> &BTreeSet<String> {
        match kind {
            ContentKind::Track => &self.liked_tracks,
            ContentKind::Playlist => &self.playlists,
            ContentKind::Album => &self.albums,
            ContentKind::Artist => &self.artists,
        }
    }

    fn set_mut(&mut self, kind: ContentKind) -> &mut BTreeSet<String> {
        match kind {
            ContentKind::Track => &mut self.liked_tracks,
            ContentKind::Playlist => &mut self.playlists,
            ContentKind::Album => &mut self.albums,
            ContentKind::Artist => &mut self.artists,
        }
    }
}

/// One user's library snapshot: for each platform, which content ids are
/// currently considered saved. Membership is the sole source of truth;
/// no payload content is cached here. The snapshot is mutated only
/// through the paired save/unsave operations, loaded once per request
/// and persisted once at the end of a successful synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentData {
    pub user_id: String,
    platforms: BTreeMap<PlatformId, PlatformContent>,
}

impl ContentData {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            platforms: BTreeMap::new(),
        }
    }

    /// Ids currently saved for one kind on one platform.
    pub fn ids(&self, kind: ContentKind, platform: PlatformId) -> Vec<String> {
        self.platforms
            .get(&platform)
            .map(|pc| pc.set(kind).iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: ContentKind, id: &str, platform: PlatformId) -> bool {
        self.platforms
            .get(&platform)
            .map(|pc| pc.set(kind).contains(id))
            .unwrap_or(false)
    }

    /// Mark an id as saved. Re-saving an already-saved id is a no-op.
    /// Returns true when membership actually changed.
    pub fn save(&mut self, kind: ContentKind, id: &str, platform: PlatformId) -> bool {
        self.platforms
            .entry(platform)
            .or_default()
            .set_mut(kind)
            .insert(id.to_string())
    }

    /// Remove an id from the saved set. Returns true when it was present.
    pub fn unsave(&mut self, kind: ContentKind, id: &str, platform: PlatformId) -> bool {
        self.platforms
            .get_mut(&platform)
            .map(|pc| pc.set_mut(kind).remove(id))
            .unwrap_or(false)
    }

    pub fn save_liked_track(&mut self, isrc: &str, platform: PlatformId) -> bool {
        self.save(ContentKind::Track, isrc, platform)
    }

    pub fn unsave_liked_track(&mut self, isrc: &str, platform: PlatformId) -> bool {
        self.unsave(ContentKind::Track, isrc, platform)
    }

    pub fn save_playlist(&mut self, id: &str, platform: PlatformId) -> bool {
        self.save(ContentKind::Playlist, id, platform)
    }

    pub fn unsave_playlist(&mut self, id: &str, platform: PlatformId) -> bool {
        self.unsave(ContentKind::Playlist, id, platform)
    }

    pub fn save_album(&mut self, upc: &str, platform: PlatformId) -> bool {
        self.save(ContentKind::Album, upc, platform)
    }

    pub fn unsave_album(&mut self, upc: &str, platform: PlatformId) -> bool {
        self.unsave(ContentKind::Album, upc, platform)
    }

    pub fn save_artist(&mut self, id: &str, platform: PlatformId) -> bool {
        self.save(ContentKind::Artist, id, platform)
    }

    pub fn unsave_artist(&mut self, id: &str, platform: PlatformId) -> bool {
        self.unsave(ContentKind::Artist, id, platform)
    }
}

/// Encode a release date string as a comparable integer, e.g.
/// "2024-03-05" -> 20240305. Year-only and year-month precision pad the
/// missing components with 01; unparseable input yields 0.
pub fn convert_date_to_int(date: &str) -> u32 {
    let mut parts = date.splitn(3, '-');
    let year: u32 = match parts.next().and_then(|p| p.trim().parse().ok()) {
        Some(y) => y,
        None => return 0,
    };
    let month: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
    let day: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
    year * 10_000 + month * 100 + day
}
