use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use groupmix::catalog::{CredentialRefresher, RetryingCatalog};
use groupmix::models::{AccessToken, Role, TrackStatus};
use groupmix::spotify::{SpotifyCatalog, SpotifyTokenRefresher};
use groupmix::{AppConfig, EventStore, PlaylistGenerator, SqliteStore, TrackCurator};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared playlists from the taste of a whole group
#[derive(Parser, Debug)]
#[clap(name = "groupmix", version)]
struct Args {
    /// SQLite database to use instead of the configured one
    #[clap(long, value_name = "FILE")]
    database: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Throw away the event's last generation and build a new playlist
    Generate { event: String },
    /// Overwrite the remote playlist with its stored tracks
    Save { event: String, playlist: String },
    /// Accept a generated playlist
    Accept { event: String, playlist: String },
    /// Set a track's status by hand (denied, accepted_playlist, accepted)
    Status {
        event: String,
        track: String,
        status: TrackStatus,
    },
}

struct App {
    config: AppConfig,
    store: Arc<SqliteStore>,
    catalog: Arc<RetryingCatalog<SpotifyCatalog>>,
    refresher: Arc<SpotifyTokenRefresher>,
}

impl App {
    async fn init(database: Option<PathBuf>) -> Result<Self> {
        let mut config = AppConfig::load()?;
        if let Some(path) = database {
            config.database_path = path;
        }
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            log::warn!("Spotify client credentials are not configured, token refresh will fail");
        }

        let store = SqliteStore::connect(&config.database_path)
            .await
            .with_context(|| format!("opening database {:?}", config.database_path))?;
        let catalog = RetryingCatalog::new(
            SpotifyCatalog::with_base_url(&config.api_base_url)?,
            config.retry.clone(),
        );
        let refresher = SpotifyTokenRefresher::with_token_url(
            &config.client_id,
            &config.client_secret,
            &config.accounts_url,
        )?;

        Ok(Self {
            config,
            store: Arc::new(store),
            catalog: Arc::new(catalog),
            refresher: Arc::new(refresher),
        })
    }

    fn curator(&self) -> TrackCurator {
        TrackCurator::new(self.store.clone(), self.catalog.clone())
            .with_save_batch_size(self.config.generator.save_batch_size)
    }

    async fn owner_token(&self, event_id: &str) -> Result<AccessToken> {
        let members = self.store.list_members(event_id).await?;
        let owner = members
            .iter()
            .find(|m| m.role == Role::Owner)
            .with_context(|| format!("event {} has no owner", event_id))?;
        let token = self.refresher.refresh(owner).await?;
        self.store.save_access_token(&owner.user_id, &token).await?;
        Ok(token)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let app = App::init(args.database).await?;

    match args.command {
        Command::Generate { event } => {
            let generator = PlaylistGenerator::new(
                app.catalog.clone(),
                app.refresher.clone(),
                app.store.clone(),
                app.config.generator.clone(),
            );
            let outcome = generator.generate(&event).await?;
            print_json(&outcome)
        }
        Command::Save { event, playlist } => {
            let token = app.owner_token(&event).await?;
            let saved = app.curator().save_playlist(&event, &playlist, &token).await?;
            print_json(&serde_json::json!({ "playlist_id": playlist, "saved": saved }))
        }
        Command::Accept { event, playlist } => {
            let accepted = app.curator().accept_playlist(&event, &playlist).await?;
            print_json(&accepted)
        }
        Command::Status {
            event,
            track,
            status,
        } => {
            let association = app.curator().set_track_status(&event, &track, status).await?;
            print_json(&association)
        }
    }
}
