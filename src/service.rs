use crate::api::Platform;
use crate::error::PlatformError;
use crate::models::{ContentKind, PlatformId, Token};
use crate::reconcile::reconcile;
use crate::store::{ContentStore, SnapshotStore, TokenStore};
use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Uniform response envelope at the request boundary. Expected failures
/// (no stored credentials, expired token) come back as `success: false`
/// with a message; everything else propagates as an error.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Collaborators every operation needs. Split into three roles so tests
/// can substitute any of them independently.
#[derive(Clone)]
pub struct Deps {
    pub tokens: Arc<dyn TokenStore>,
    pub content: Arc<dyn ContentStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

/// A request with no user identity is a caller bug, not a recoverable
/// outcome; it propagates instead of coming back as an envelope.
fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("authentication required: request carries no user id");
    }
    Ok(())
}

async fn stored_token(
    deps: &Deps,
    user_id: &str,
    platform: PlatformId,
) -> Result<Option<Token>> {
    deps.tokens.get_token(user_id, platform).await
}

/// Expired tokens are an expected outcome the caller reports to the
/// user, not an internal failure. Anything else bubbles up.
fn auth_failure_or_bail(err: PlatformError) -> Result<Envelope> {
    if err.is_token_expired() {
        Ok(Envelope::failure("access token is expired or invalid"))
    } else {
        Err(err.into())
    }
}

/// Synchronize one content kind for one user against a platform: fetch
/// the platform's current saved set, reconcile the snapshot to match,
/// persist the fetched payload entities, then persist the snapshot once.
pub async fn sync_content(
    deps: &Deps,
    platform: &dyn Platform,
    user_id: &str,
    kind: ContentKind,
) -> Result<Envelope> {
    require_user(user_id)?;
    let token = match stored_token(deps, user_id, platform.id()).await? {
        Some(t) => t,
        None => return Ok(Envelope::failure("authentication required")),
    };

    let mut snapshot = deps.snapshots.get_content_data(user_id).await?;

    let fetched_ids: Vec<String> = match kind {
        ContentKind::Track => {
            let fetch = match platform.fetch_liked_tracks(&token.access_token).await {
                Ok(f) => f,
                Err(e) => return auth_failure_or_bail(e),
            };
            deps.content.save_tracks(user_id, &fetch.tracks).await?;
            fetch.track_ids
        }
        ContentKind::Playlist => {
            let fetch = match platform.fetch_playlists(&token.access_token).await {
                Ok(f) => f,
                Err(e) => return auth_failure_or_bail(e),
            };
            deps.content.save_tracks(user_id, &fetch.tracks).await?;
            deps.content.save_playlists(user_id, &fetch.playlists).await?;
            fetch.playlists.iter().map(|p| p.id.clone()).collect()
        }
        ContentKind::Album => {
            let fetch = match platform.fetch_albums(&token.access_token).await {
                Ok(f) => f,
                Err(e) => return auth_failure_or_bail(e),
            };
            deps.content.save_tracks(user_id, &fetch.tracks).await?;
            deps.content.save_albums(user_id, &fetch.albums).await?;
            fetch.albums.iter().map(|a| a.upc.clone()).collect()
        }
        ContentKind::Artist => {
            let artists = match platform.fetch_followed_artists(&token.access_token).await {
                Ok(a) => a,
                Err(e) => return auth_failure_or_bail(e),
            };
            deps.content.save_artists(user_id, &artists).await?;
            artists.iter().map(|a| a.id.clone()).collect()
        }
    };

    let outcome = reconcile(&mut snapshot, platform.id(), kind, &fetched_ids);
    deps.snapshots.save_content_data(&snapshot).await?;

    info!(
        user = user_id,
        platform = platform.name(),
        kind = %kind,
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        total = fetched_ids.len(),
        "synchronized content"
    );
    Ok(Envelope::ok(json!({
        "added": outcome.added,
        "removed": outcome.removed,
        "total": fetched_ids.len(),
    })))
}

/// Export one content kind to a destination platform. Reads the snapshot
/// and stored entities only; never mutates library state.
pub async fn export_content(
    deps: &Deps,
    platform: &dyn Platform,
    user_id: &str,
    kind: ContentKind,
) -> Result<Envelope> {
    require_user(user_id)?;
    let token = match stored_token(deps, user_id, platform.id()).await? {
        Some(t) => t,
        None => return Ok(Envelope::failure("authentication required")),
    };

    let snapshot = deps.snapshots.get_content_data(user_id).await?;
    let ids = snapshot.ids(kind, platform.id());

    let report = match kind {
        ContentKind::Track => {
            let tracks = deps.content.get_tracks(user_id, &ids).await?;
            match platform.export_tracks(&tracks, &token.access_token).await {
                Ok(r) => r,
                Err(e) => return auth_failure_or_bail(e),
            }
        }
        ContentKind::Playlist => {
            let playlists = deps.content.get_playlists(user_id, &ids).await?;
            match platform.export_playlists(&playlists, &token.access_token).await {
                Ok(r) => r,
                Err(e) => return auth_failure_or_bail(e),
            }
        }
        ContentKind::Album => {
            let albums = deps.content.get_albums(user_id, &ids).await?;
            match platform.export_albums(&albums, &token.access_token).await {
                Ok(r) => r,
                Err(e) => return auth_failure_or_bail(e),
            }
        }
        ContentKind::Artist => bail!("content kind {} cannot be exported", kind),
    };

    info!(
        user = user_id,
        platform = platform.name(),
        kind = %kind,
        requested = ids.len(),
        resolved = report.resolved,
        written = report.written,
        skipped = report.skipped,
        "exported content"
    );
    Ok(Envelope::ok(json!({
        "requested": ids.len(),
        "resolved": report.resolved,
        "written": report.written,
        "skipped": report.skipped,
    })))
}

/// List the stored entities for the ids currently saved on one platform.
pub async fn liked_content(
    deps: &Deps,
    user_id: &str,
    platform: PlatformId,
    kind: ContentKind,
) -> Result<Envelope> {
    require_user(user_id)?;
    let snapshot = deps.snapshots.get_content_data(user_id).await?;
    let ids = snapshot.ids(kind, platform);

    let data = match kind {
        ContentKind::Track => serde_json::to_value(deps.content.get_tracks(user_id, &ids).await?)?,
        ContentKind::Playlist => {
            serde_json::to_value(deps.content.get_playlists(user_id, &ids).await?)?
        }
        ContentKind::Album => serde_json::to_value(deps.content.get_albums(user_id, &ids).await?)?,
        ContentKind::Artist => {
            serde_json::to_value(deps.content.get_artists(user_id, &ids).await?)?
        }
    };
    Ok(Envelope::ok(data))
}

/// Count the ids currently saved for one kind on one platform.
pub async fn content_count(
    deps: &Deps,
    user_id: &str,
    platform: PlatformId,
    kind: ContentKind,
) -> Result<Envelope> {
    require_user(user_id)?;
    let snapshot = deps.snapshots.get_content_data(user_id).await?;
    Ok(Envelope::ok(json!({
        "count": snapshot.ids(kind, platform).len(),
    })))
}
