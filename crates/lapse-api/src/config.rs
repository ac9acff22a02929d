//! Runtime server configuration.
//!
//! Values come from an optional TOML file layered under `LAPSE_*`
//! environment variables (e.g. `LAPSE_PORT=8080`). Every field has a default.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use lapse_core::engine::EngineConfig;
use lapse_store_sqlite::StoreOptions;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// How long a write waits for the SQLite write lock.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:     u64,
  /// Upper bound on any single store call.
  #[serde(default = "default_call_timeout_ms")]
  pub call_timeout_ms:     u64,
  /// Days before expiry at which a completion counts as expiring soon.
  #[serde(default = "default_expiry_warning_days")]
  pub expiry_warning_days: u32,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("lapse.db") }
fn default_busy_timeout_ms() -> u64 { 5_000 }
fn default_call_timeout_ms() -> u64 { 10_000 }
fn default_expiry_warning_days() -> u32 { 30 }

impl ServerConfig {
  /// Load from `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from(path).required(false)))
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(Environment::with_prefix("LAPSE"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
      call_timeout: Duration::from_millis(self.call_timeout_ms),
    }
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig { expiry_warning_days: self.expiry_warning_days }
  }
}
