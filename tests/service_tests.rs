use music_library_platform_sync::api::mock::MockPlatform;
use music_library_platform_sync::models::{
    Album, Artist, ContentData, ContentKind, Playlist, PlatformId, Token, Track,
};
use music_library_platform_sync::service::{self, Deps};
use music_library_platform_sync::store::MemoryStore;
use std::sync::Arc;

fn track(isrc: &str) -> Track {
    Track {
        isrc: isrc.to_string(),
        platform_id: format!("sp-{}", isrc),
        platform: PlatformId::Spotify,
        name: isrc.to_string(),
        album_art_url: String::new(),
        artists: vec!["Artist".into()],
        album_name: String::new(),
        duration_ms: 1000,
    }
}

fn playlist(id: &str, track_isrcs: &[&str]) -> Playlist {
    Playlist {
        id: id.to_string(),
        platform: PlatformId::Spotify,
        name: format!("List {}", id),
        description: String::new(),
        cover_url: String::new(),
        track_isrcs: track_isrcs.iter().map(|s| s.to_string()).collect(),
        owner: "owner1".into(),
        track_count: track_isrcs.len() as u32,
    }
}

fn album(upc: &str) -> Album {
    Album {
        upc: upc.to_string(),
        platform_id: format!("alb-{}", upc),
        platform: PlatformId::Spotify,
        name: upc.to_string(),
        cover_url: String::new(),
        artists: vec!["Artist".into()],
        track_isrcs: vec![],
        released: 20200101,
        track_count: 0,
    }
}

fn artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        platform: PlatformId::Spotify,
        name: id.to_string(),
        thumbnail_url: String::new(),
        genres: vec![],
        follower_count: 0,
        external_url: String::new(),
        popularity: 0,
    }
}

fn token_for(user: &str) -> Token {
    Token {
        user_id: user.to_string(),
        platform: PlatformId::Spotify,
        access_token: "acc".into(),
        refresh_token: None,
    }
}

fn deps_with(store: &Arc<MemoryStore>) -> Deps {
    Deps {
        tokens: store.clone(),
        content: store.clone(),
        snapshots: store.clone(),
    }
}

#[test]
fn sync_reconciles_snapshot_to_fetched_set_and_saves_once() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let mut prior = ContentData::new("u1");
    for id in ["A", "B", "C"] {
        prior.save_liked_track(id, PlatformId::Spotify);
    }
    store.put_snapshot(prior);

    let platform = MockPlatform::new().with_tracks(vec![track("B"), track("C"), track("D")]);
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Track))
        .expect("sync");

    assert!(envelope.success);
    let data = envelope.data.expect("data");
    assert_eq!(data["added"], serde_json::json!(["D"]));
    assert_eq!(data["removed"], serde_json::json!(["A"]));
    assert_eq!(data["total"], 3);

    let snapshot = store.snapshot_of("u1").expect("snapshot persisted");
    assert_eq!(
        snapshot.ids(ContentKind::Track, PlatformId::Spotify),
        vec!["B", "C", "D"]
    );
    assert_eq!(*store.snapshot_saves.lock().unwrap(), 1);
}

#[test]
fn sync_persists_fetched_track_payloads() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let platform = MockPlatform::new().with_tracks(vec![track("X")]);
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Track))
        .expect("sync");

    let stored = rt
        .block_on(service::liked_content(
            &deps,
            "u1",
            PlatformId::Spotify,
            ContentKind::Track,
        ))
        .expect("liked");
    let tracks = stored.data.expect("data");
    assert_eq!(tracks.as_array().map(Vec::len), Some(1));
    assert_eq!(tracks[0]["isrc"], "X");
}

#[test]
fn expired_token_yields_failure_envelope_and_no_snapshot_write() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let platform = MockPlatform::new().expired();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Track))
        .expect("expired token is not an internal error");

    assert!(!envelope.success);
    assert_eq!(
        envelope.message.as_deref(),
        Some("access token is expired or invalid")
    );
    assert_eq!(*store.snapshot_saves.lock().unwrap(), 0);
}

#[test]
fn blank_user_id_propagates_as_an_error() {
    let store = Arc::new(MemoryStore::new());
    let platform = MockPlatform::new();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();

    // a request with no identity is a caller bug, never an envelope
    for user in ["", "  "] {
        let res = rt.block_on(service::sync_content(&deps, &platform, user, ContentKind::Track));
        assert!(res.is_err());

        let res = rt.block_on(service::export_content(&deps, &platform, user, ContentKind::Track));
        assert!(res.is_err());

        let res = rt.block_on(service::liked_content(
            &deps,
            user,
            PlatformId::Spotify,
            ContentKind::Track,
        ));
        assert!(res.is_err());

        let res = rt.block_on(service::content_count(
            &deps,
            user,
            PlatformId::Spotify,
            ContentKind::Track,
        ));
        assert!(res.is_err());
    }
}

#[test]
fn missing_stored_token_is_a_failure_envelope() {
    let store = Arc::new(MemoryStore::new());
    let platform = MockPlatform::new();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let missing = rt
        .block_on(service::sync_content(&deps, &platform, "nobody", ContentKind::Track))
        .expect("missing token");
    assert!(!missing.success);
    assert_eq!(missing.message.as_deref(), Some("authentication required"));
}

#[test]
fn export_reads_snapshot_without_mutating_it() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let mut prior = ContentData::new("u1");
    prior.save_liked_track("A", PlatformId::Spotify);
    prior.save_liked_track("B", PlatformId::Spotify);
    store.put_snapshot(prior.clone());

    let platform = MockPlatform::new();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        deps.content
            .save_tracks("u1", &[track("A"), track("B")])
            .await
            .unwrap();
    });

    let envelope = rt
        .block_on(service::export_content(&deps, &platform, "u1", ContentKind::Track))
        .expect("export");

    assert!(envelope.success);
    let data = envelope.data.expect("data");
    assert_eq!(data["requested"], 2);
    assert_eq!(data["written"], 2);

    // the adapter saw both stored tracks
    assert_eq!(*platform.exported_tracks.lock().unwrap(), vec!["A", "B"]);
    // export never writes the snapshot back
    assert_eq!(*store.snapshot_saves.lock().unwrap(), 0);
    assert_eq!(store.snapshot_of("u1"), Some(prior));
}

#[test]
fn playlist_sync_persists_playlists_and_harvested_tracks() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let platform = MockPlatform::new()
        .with_playlists(vec![playlist("pl1", &["AA"]), playlist("pl2", &["AA", "BB"])])
        .with_tracks(vec![track("AA"), track("BB")]);
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Playlist))
        .expect("sync playlists");
    assert!(envelope.success);

    let snapshot = store.snapshot_of("u1").expect("snapshot persisted");
    assert_eq!(
        snapshot.ids(ContentKind::Playlist, PlatformId::Spotify),
        vec!["pl1", "pl2"]
    );

    rt.block_on(async {
        let playlists = deps
            .content
            .get_playlists("u1", &["pl1".into(), "pl2".into()])
            .await
            .unwrap();
        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[1].track_isrcs, vec!["AA", "BB"]);

        // tracks harvested during the playlist fetch are persisted too
        let tracks = deps
            .content
            .get_tracks("u1", &["AA".into(), "BB".into()])
            .await
            .unwrap();
        assert_eq!(tracks.len(), 2);
    });
}

#[test]
fn album_sync_persists_albums_and_harvested_tracks() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let platform = MockPlatform::new()
        .with_albums(vec![album("upc1"), album("upc2")])
        .with_tracks(vec![track("AA")]);
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Album))
        .expect("sync albums");
    assert!(envelope.success);

    let snapshot = store.snapshot_of("u1").expect("snapshot persisted");
    assert_eq!(
        snapshot.ids(ContentKind::Album, PlatformId::Spotify),
        vec!["upc1", "upc2"]
    );

    rt.block_on(async {
        let albums = deps
            .content
            .get_albums("u1", &["upc1".into(), "upc2".into()])
            .await
            .unwrap();
        assert_eq!(albums.len(), 2);
        let tracks = deps.content.get_tracks("u1", &["AA".into()]).await.unwrap();
        assert_eq!(tracks.len(), 1);
    });
}

#[test]
fn artist_sync_reconciles_followed_set() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let mut prior = ContentData::new("u1");
    prior.save_artist("gone", PlatformId::Spotify);
    store.put_snapshot(prior);

    let platform = MockPlatform::new().with_artists(vec![artist("ar1"), artist("ar2")]);
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::sync_content(&deps, &platform, "u1", ContentKind::Artist))
        .expect("sync artists");
    assert!(envelope.success);

    let snapshot = store.snapshot_of("u1").expect("snapshot persisted");
    assert_eq!(
        snapshot.ids(ContentKind::Artist, PlatformId::Spotify),
        vec!["ar1", "ar2"]
    );
}

#[test]
fn album_and_playlist_export_push_stored_entities() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let mut snapshot = ContentData::new("u1");
    snapshot.save_album("upc1", PlatformId::Spotify);
    snapshot.save_playlist("pl1", PlatformId::Spotify);
    store.put_snapshot(snapshot);

    let platform = MockPlatform::new();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        deps.content.save_albums("u1", &[album("upc1")]).await.unwrap();
        deps.content
            .save_playlists("u1", &[playlist("pl1", &["AA"])])
            .await
            .unwrap();
    });

    let albums = rt
        .block_on(service::export_content(&deps, &platform, "u1", ContentKind::Album))
        .expect("export albums");
    assert!(albums.success);
    assert_eq!(albums.data.expect("data")["written"], 1);
    assert_eq!(*platform.exported_albums.lock().unwrap(), vec!["upc1"]);

    let playlists = rt
        .block_on(service::export_content(&deps, &platform, "u1", ContentKind::Playlist))
        .expect("export playlists");
    assert!(playlists.success);
    assert_eq!(playlists.data.expect("data")["written"], 1);
    assert_eq!(*platform.exported_playlists.lock().unwrap(), vec!["pl1"]);

    // export never writes the snapshot back
    assert_eq!(*store.snapshot_saves.lock().unwrap(), 0);
}

#[test]
fn artists_cannot_be_exported() {
    let store = Arc::new(MemoryStore::new());
    store.put_token(token_for("u1"));

    let platform = MockPlatform::new();
    let deps = deps_with(&store);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(service::export_content(
        &deps,
        &platform,
        "u1",
        ContentKind::Artist,
    ));

    assert!(res.is_err());
}

#[test]
fn content_count_reflects_snapshot() {
    let store = Arc::new(MemoryStore::new());

    let mut snapshot = ContentData::new("u1");
    snapshot.save_album("upc1", PlatformId::Spotify);
    snapshot.save_album("upc2", PlatformId::Spotify);
    store.put_snapshot(snapshot);

    let deps = deps_with(&store);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let envelope = rt
        .block_on(service::content_count(
            &deps,
            "u1",
            PlatformId::Spotify,
            ContentKind::Album,
        ))
        .expect("count");

    assert!(envelope.success);
    assert_eq!(envelope.data.expect("data")["count"], 2);
}
