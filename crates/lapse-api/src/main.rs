//! lapse-server binary.
//!
//! Reads `lapse.toml` (or the path given with `--config`) layered under
//! `LAPSE_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Seeding the catalog and directory
//!
//! ```text
//! lapse-server add-course "Fire safety" --validity-months 12
//! lapse-server grant <caller-uuid> manager --location <location-uuid>
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lapse_api::ServerConfig;
use lapse_core::{engine::ComplianceEngine, scope::RoleTier};
use lapse_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Lapse training compliance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "lapse.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Add a course to the catalog and print its id.
  AddCourse {
    name: String,
    /// Months a completion stays valid; omit for a one-off course.
    #[arg(long)]
    validity_months: Option<u32>,
  },
  /// Give a caller a role, optionally adding location memberships.
  Grant {
    caller_id: Uuid,
    /// One of admin, manager, scheduler, staff.
    role:      RoleTier,
    #[arg(long = "location")]
    locations: Vec<Uuid>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open_with(&store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, &server_cfg).await,
    Command::AddCourse { name, validity_months } => {
      let course = store
        .add_course(name, validity_months)
        .await
        .context("failed to add course")?;
      println!("{}", course.course_id);
      Ok(())
    }
    Command::Grant { caller_id, role, locations } => {
      store
        .set_caller_role(caller_id, role)
        .await
        .context("failed to set caller role")?;
      for location_id in locations {
        store
          .add_location_member(caller_id, location_id)
          .await
          .with_context(|| format!("failed to add membership at {location_id}"))?;
      }
      Ok(())
    }
  }
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let engine = ComplianceEngine::new(store.clone(), store.clone(), store)
    .with_config(server_cfg.engine_config());

  let app = lapse_api::api_router(Arc::new(engine));
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
