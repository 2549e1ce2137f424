use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use music_library_platform_sync as lib;
use lib::config::Config;
use lib::db::SqliteStore;
use lib::models::{ContentKind, PlatformId};
use lib::service::{self, Deps, Envelope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "music-library-platform-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror saved content from a platform into the local library
    Sync(ContentArgs),
    /// Push stored library content to a platform
    Export(ContentArgs),
    /// List stored entities currently saved on a platform
    Liked(ContentArgs),
    /// Count ids currently saved on a platform
    Count(ContentArgs),
    /// Validate config file and exit
    ConfigValidate,
    /// Auth helpers
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
}

#[derive(clap::Args)]
struct ContentArgs {
    /// User id the operation runs as
    #[arg(long)]
    user: String,

    /// Platform to operate on (e.g. "spotify")
    #[arg(long, default_value = "spotify")]
    platform: String,

    /// Content kind: track, playlist, album or artist
    #[arg(long)]
    kind: String,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Authorize Spotify and store tokens in DB (interactive)
    Spotify,
}

impl ContentArgs {
    fn parse_target(&self) -> Result<(PlatformId, ContentKind)> {
        let platform: PlatformId = self.platform.parse()?;
        let kind: ContentKind = self.kind.parse()?;
        Ok((platform, kind))
    }
}

fn deps_for(cfg: &Config) -> Deps {
    let store = Arc::new(SqliteStore::new(cfg.db_path.clone()));
    Deps {
        tokens: store.clone(),
        content: store.clone(),
        snapshots: store,
    }
}

fn report(envelope: Envelope) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.success {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // the system-wide file and fall back to the repository example
    // config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/music-library-sync/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging. Logs go to
    // stderr and a daily-rotated file in cfg.log_dir; stdout is reserved
    // for the JSON result envelopes.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "music-library-sync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer);

    // Install as global default tracing subscriber without triggering
    // tracing-subscriber's internal log bridge (we already call LogTracer).
    if let Err(e) = tracing_subscriber_global::set_global_default(subscriber) {
        eprintln!("failed to set global tracing subscriber: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Sync(args) => {
            let (platform_id, kind) = args.parse_target()?;
            let platform = lib::api::platform_for(platform_id, &cfg);
            let deps = deps_for(&cfg);
            let envelope = service::sync_content(&deps, platform.as_ref(), &args.user, kind)
                .await
                .with_context(|| format!("syncing {} from {}", kind, platform_id))?;
            report(envelope)?;
        }
        Commands::Export(args) => {
            let (platform_id, kind) = args.parse_target()?;
            let platform = lib::api::platform_for(platform_id, &cfg);
            let deps = deps_for(&cfg);
            let envelope = service::export_content(&deps, platform.as_ref(), &args.user, kind)
                .await
                .with_context(|| format!("exporting {} to {}", kind, platform_id))?;
            report(envelope)?;
        }
        Commands::Liked(args) => {
            let (platform_id, kind) = args.parse_target()?;
            let deps = deps_for(&cfg);
            let envelope = service::liked_content(&deps, &args.user, platform_id, kind).await?;
            report(envelope)?;
        }
        Commands::Count(args) => {
            let (platform_id, kind) = args.parse_target()?;
            let deps = deps_for(&cfg);
            let envelope = service::content_count(&deps, &args.user, platform_id, kind).await?;
            report(envelope)?;
        }
        Commands::ConfigValidate => match Config::from_path(resolved_config_path.as_path()) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
        Commands::Auth { sub } => match sub {
            AuthCommands::Spotify => {
                lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
            }
        },
    }

    Ok(())
}
