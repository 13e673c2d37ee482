use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use burrow::auth::{CredentialAuthority, UserStore};
use burrow::cli::DaemonOpts;
use burrow::config::ServerConfig;
use burrow::logger::{Logger, NoopLogger, TextLogger};
use burrow::net::{self, ServerContext};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = DaemonOpts::parse();
    let cfg = ServerConfig::from_daemon_opts(&opts)?;

    let store = UserStore::open(&cfg.users_db)
        .with_context(|| format!("Failed to open user database: {}", cfg.users_db.display()))?;
    let store = Arc::new(store);
    let users = store.list_users().len();

    let logger: Arc<dyn Logger> = match &cfg.log_file {
        Some(path) => Arc::new(
            TextLogger::new(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?,
        ),
        None => Arc::new(NoopLogger),
    };

    println!("Starting burrow daemon:");
    println!("  Root: {}", cfg.ftp_root.display());
    println!("  Bind: {}", cfg.bind);
    println!("  Users: {} ({})", users, store.path().display());
    match cfg.idle_timeout() {
        Some(t) => println!("  Idle timeout: {}s", t.as_secs()),
        None => println!("  Idle timeout: disabled"),
    }

    if cfg.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: Binding to 0.0.0.0 exposes the daemon to all network interfaces");
        eprintln!("   The protocol is unencrypted; passwords travel in plain text");
        eprintln!("");
    }

    let ctx = ServerContext {
        authority: store.clone(),
        logger,
        idle_timeout: cfg.idle_timeout(),
    };
    let result = net::serve(&cfg.bind, ctx);
    store.close()?;
    result
}
