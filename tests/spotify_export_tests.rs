use mockito::{Matcher, Server};
use music_library_platform_sync::api::spotify::SpotifyPlatform;
use music_library_platform_sync::api::Platform;
use music_library_platform_sync::config::Config;
use music_library_platform_sync::models::{Playlist, PlatformId, Track};
use serde_json::json;

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.page_size = 2;
    cfg.track_chunk_size = 2;
    cfg.album_chunk_size = 2;
    cfg.playlist_track_chunk_size = 2;
    cfg.max_retries_on_error = 1;
    cfg.rate_limit_floor_secs = 0;
    cfg.inter_call_delay_ms = 0;
    cfg
}

fn track(isrc: &str) -> Track {
    Track {
        isrc: isrc.to_string(),
        platform_id: format!("src-{}", isrc),
        platform: PlatformId::Spotify,
        name: isrc.to_string(),
        album_art_url: String::new(),
        artists: vec![],
        album_name: String::new(),
        duration_ms: 0,
    }
}

fn search_mock(server: &mut Server, isrc: &str, hit: Option<&str>) -> mockito::Mock {
    let body = match hit {
        Some(id) => json!({ "tracks": { "items": [{"id": id}] } }),
        None => json!({ "tracks": { "items": [] } }),
    };
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), format!("isrc:{}", isrc)))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create()
}

#[test]
fn export_tracks_skips_unresolvable_isrcs() {
    let mut server = Server::new();
    let base = server.url();

    let _s1 = search_mock(&mut server, "AA", Some("spA"));
    let _s2 = search_mock(&mut server, "BB", None);
    let _s3 = search_mock(&mut server, "CC", Some("spC"));

    // one chunk of exactly the two resolved ids
    let m_put = server
        .mock("PUT", "/me/tracks")
        .match_body(Matcher::Json(json!({ "ids": ["spA", "spC"] })))
        .with_status(200)
        .with_body("{}")
        .create();

    let platform = SpotifyPlatform::new(&test_config()).with_bases(&base, &base);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let report = rt
        .block_on(platform.export_tracks(&[track("AA"), track("BB"), track("CC")], "tok"))
        .expect("export tracks");

    m_put.assert();
    assert_eq!(report.resolved, 2);
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 0);
}

#[test]
fn persistent_rate_limit_skips_chunk_without_failing_run() {
    let mut server = Server::new();
    let base = server.url();

    let _s = search_mock(&mut server, "AA", Some("spA"));
    let _m_put = server
        .mock("PUT", "/me/tracks")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"error":"rate_limited"}"#)
        .create();

    let platform = SpotifyPlatform::new(&test_config()).with_bases(&base, &base);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let report = rt
        .block_on(platform.export_tracks(&[track("AA")], "tok"))
        .expect("export should not error on exhausted retries");

    assert_eq!(report.resolved, 1);
    assert_eq!(report.written, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn export_playlist_creates_then_fills_in_chunks() {
    let mut server = Server::new();
    let base = server.url();

    let m_create = server
        .mock("POST", "/me/playlists")
        .match_body(Matcher::PartialJson(json!({
            "name": "Road Trip [imported]",
            "public": false,
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"newpl"}"#)
        .create();

    let _s1 = search_mock(&mut server, "AA", Some("spA"));
    let _s2 = search_mock(&mut server, "BB", Some("spB"));
    let _s3 = search_mock(&mut server, "CC", Some("spC"));

    // chunk size 2: two add calls, 2 uris then 1
    let m_add1 = server
        .mock("POST", "/playlists/newpl/tracks")
        .match_body(Matcher::Json(
            json!({ "uris": ["spotify:track:spA", "spotify:track:spB"] }),
        ))
        .with_status(201)
        .with_body("{}")
        .create();
    let m_add2 = server
        .mock("POST", "/playlists/newpl/tracks")
        .match_body(Matcher::Json(json!({ "uris": ["spotify:track:spC"] })))
        .with_status(201)
        .with_body("{}")
        .create();

    let playlist = Playlist {
        id: "pl1".into(),
        platform: PlatformId::Spotify,
        name: "Road Trip".into(),
        description: "tunes".into(),
        cover_url: String::new(),
        track_isrcs: vec!["AA".into(), "BB".into(), "CC".into()],
        owner: "owner1".into(),
        track_count: 3,
    };

    let platform = SpotifyPlatform::new(&test_config()).with_bases(&base, &base);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let report = rt
        .block_on(platform.export_playlists(&[playlist], "tok"))
        .expect("export playlist");

    m_create.assert();
    m_add1.assert();
    m_add2.assert();
    assert_eq!(report.resolved, 3);
    assert_eq!(report.written, 3);
    assert_eq!(report.skipped, 0);
}

#[test]
fn failed_playlist_creation_skips_that_playlist() {
    let mut server = Server::new();
    let base = server.url();

    let _m_create = server
        .mock("POST", "/me/playlists")
        .with_status(500)
        .with_body(r#"{"error":"server"}"#)
        .create();

    let playlist = Playlist {
        id: "pl1".into(),
        platform: PlatformId::Spotify,
        name: "Broken".into(),
        description: String::new(),
        cover_url: String::new(),
        track_isrcs: vec!["AA".into()],
        owner: "owner1".into(),
        track_count: 1,
    };

    let platform = SpotifyPlatform::new(&test_config()).with_bases(&base, &base);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let report = rt
        .block_on(platform.export_playlists(&[playlist], "tok"))
        .expect("export run survives one failed creation");

    assert_eq!(report.resolved, 0);
    assert_eq!(report.written, 0);
}
