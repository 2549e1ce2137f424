use crate::api::Platform;
use crate::config::Config;
use crate::db::SqliteStore;
use anyhow::{anyhow, Result};
use tracing::info;
use url::Url;

/// Manual OAuth bootstrap:
/// 1. Build the Spotify authorization URL and print it.
/// 2. User opens it in a browser, approves and gets redirected to the
///    redirect URI (which may fail to load if it's a dummy address).
/// 3. User copies the full redirect URL and pastes it into this CLI.
/// 4. The CLI extracts the `code` param and exchanges it for an
///    access_token + refresh_token pair.
/// 5. The token pair is stored in the DB keyed by (user, platform).
///
/// This avoids running an embedded HTTP server and works well for
/// manual setup.
pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    use std::io;

    if cfg.spotify_client_id.is_empty() {
        return Err(anyhow!("spotify_client_id is not configured"));
    }
    if cfg.spotify_client_secret().is_empty() {
        return Err(anyhow!(
            "spotify client secret is not configured (config file or SPOTIFY_CLIENT_SECRET)"
        ));
    }

    println!("Enter the user id to store credentials under:");
    let mut user_id = String::new();
    io::stdin().read_line(&mut user_id)?;
    let user_id = user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(anyhow!("no user id provided"));
    }

    let platform = super::spotify::SpotifyPlatform::new(cfg);
    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        platform.build_auth_url()
    );
    println!("After authorizing, you'll be redirected to your redirect URI. Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    let parsed = Url::parse(input).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    let code = parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_else(|| anyhow!("no code in redirect URL"))?
        .1
        .into_owned();

    let token = platform.exchange_code_for_token(&user_id, &code).await?;

    let store = SqliteStore::new(cfg.db_path.clone());
    store.put_token(token).await?;

    info!(user = %user_id, "Spotify tokens saved to DB");
    println!("Saved tokens. You can now run sync and export commands for this user.");

    Ok(())
}
