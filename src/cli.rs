//! Shared CLI helpers and small reusable Clap fragments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Where the server keeps its data. Shared by burrowd and burrow-admin.
#[derive(Clone, Debug, Default, Parser)]
pub struct StoreOpts {
    /// TOML configuration file
    #[arg(long, env = "BURROW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding every user's sandbox
    #[arg(long, env = "FTP_ROOT")]
    pub root: Option<PathBuf>,

    /// User database file
    #[arg(long = "users-db", env = "DB_PATH")]
    pub users_db: Option<PathBuf>,
}

/// Options for the burrowd daemon
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "burrow file transfer daemon")]
pub struct DaemonOpts {
    #[command(flatten)]
    pub store: StoreOpts,

    /// Bind address (host:port, or :port for all interfaces)
    #[arg(long, env = "LISTEN_ADDR")]
    pub bind: Option<String>,

    /// Close sessions idle for this many seconds (0 = never)
    #[arg(long = "idle-timeout", env = "IDLE_TIMEOUT_SECS")]
    pub idle_timeout: Option<u64>,

    /// Append a session audit log to this file
    #[arg(long = "log-file", env = "BURROW_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Options for burrow-admin
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "Manage burrow users")]
pub struct AdminOpts {
    #[command(flatten)]
    pub store: StoreOpts,

    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Clone, Debug, Subcommand)]
pub enum AdminCommand {
    /// Create a user and their sandbox directory
    Add {
        username: String,
        /// Password for the new user
        #[arg(long, env = "BURROW_PASSWORD")]
        password: String,
    },
    /// Remove a user record (the sandbox directory is kept)
    Del { username: String },
    /// List users
    List,
    /// Exit non-zero if the user does not exist
    Check { username: String },
}

/// Options for the interactive client
#[derive(Clone, Debug, Parser)]
#[command(author, version, about = "burrow interactive client")]
pub struct ClientOpts {
    /// Server address (host:port)
    #[arg(default_value = "127.0.0.1:2121")]
    pub addr: String,

    /// Username; prompted for when absent
    #[arg(long, short)]
    pub user: Option<String>,

    /// Password; prompted for when absent
    #[arg(long, env = "BURROW_PASSWORD")]
    pub password: Option<String>,
}
