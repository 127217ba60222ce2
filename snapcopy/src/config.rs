use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{CopyOptions, Token};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:0";

/// A directory published at startup under a fixed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: Token,
    pub root: Utf8PathBuf,
}

/// Configuration of the `snapcopyd` daemon.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: Option<String>,
    pub sessions: Vec<SessionConfig>,
}

impl Config {
    pub async fn load_from_file(path: &Utf8Path) -> anyhow::Result<Self> {
        load_json(path).await
    }

    pub fn listen(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }
}

impl CopyOptions {
    pub async fn load_from_file(path: &Utf8Path) -> anyhow::Result<Self> {
        load_json(path).await
    }
}

async fn load_json<T: DeserializeOwned>(path: &Utf8Path) -> anyhow::Result<T> {
    let json = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read config from {path}"))?;
    let json = std::str::from_utf8(&json)?;
    serde_json::from_str(json).with_context(|| format!("Failed to parse {path}"))
}
