use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secret shipped as the default. Fine for local runs only.
pub const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: Storage,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub seed: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let port = var("DEFENSERAMA_PORT", "5000")
            .parse()
            .context("DEFENSERAMA_PORT must be a port number")?;

        let storage = match var("DEFENSERAMA_STORAGE", "sqlite").to_ascii_lowercase().as_str() {
            "sqlite" => Storage::Sqlite,
            "memory" => Storage::Memory,
            other => bail!("DEFENSERAMA_STORAGE must be `sqlite` or `memory`, got `{}`", other),
        };

        let seed = match var("DEFENSERAMA_SEED", "true").to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => bail!("DEFENSERAMA_SEED must be a boolean, got `{}`", other),
        };

        Ok(Self {
            host: var("DEFENSERAMA_HOST", "0.0.0.0"),
            port,
            storage,
            db_path: var("DEFENSERAMA_DB_PATH", "defenserama.db").into(),
            jwt_secret: var("DEFENSERAMA_JWT_SECRET", PLACEHOLDER_SECRET),
            seed,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || self.jwt_secret == PLACEHOLDER_SECRET
    }
}
