//! Server configuration: built-in defaults, an optional TOML file, then
//! environment and command line on top.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{DaemonOpts, StoreOpts};
use crate::protocol::{timeouts, DEFAULT_BIND, DEFAULT_USERS_DB};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub ftp_root: PathBuf,
    pub users_db: PathBuf,
    pub idle_timeout_secs: u64,
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            ftp_root: PathBuf::from("./"),
            users_db: PathBuf::from(DEFAULT_USERS_DB),
            idle_timeout_secs: timeouts::IDLE_SECS,
            log_file: None,
        }
    }
}

/// Accept the `:port` shorthand for all interfaces.
pub fn normalize_bind(bind: &str) -> String {
    match bind.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => bind.to_string(),
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse configuration")
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults or the `--config` file, with the store overrides applied.
    pub fn load(store: &StoreOpts) -> Result<Self> {
        let mut cfg = match &store.config {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        if let Some(root) = &store.root {
            cfg.ftp_root = root.clone();
        }
        if let Some(db) = &store.users_db {
            cfg.users_db = db.clone();
        }
        Ok(cfg)
    }

    pub fn from_daemon_opts(opts: &DaemonOpts) -> Result<Self> {
        let mut cfg = Self::load(&opts.store)?;
        if let Some(bind) = &opts.bind {
            cfg.bind = bind.clone();
        }
        if let Some(secs) = opts.idle_timeout {
            cfg.idle_timeout_secs = secs;
        }
        if let Some(log) = &opts.log_file {
            cfg.log_file = Some(log.clone());
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the ftp root and canonicalize it; normalize the bind address.
    pub fn validate(&mut self) -> Result<()> {
        if !self.ftp_root.exists() {
            bail!("ftp root does not exist: {}", self.ftp_root.display());
        }
        if !self.ftp_root.is_dir() {
            bail!("ftp root is not a directory: {}", self.ftp_root.display());
        }
        self.ftp_root = std::fs::canonicalize(&self.ftp_root)
            .with_context(|| format!("canonicalize ftp root {}", self.ftp_root.display()))?;
        self.bind = normalize_bind(&self.bind);
        Ok(())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
