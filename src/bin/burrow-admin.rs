use anyhow::{bail, Context, Result};
use clap::Parser;

use burrow::auth::UserStore;
use burrow::cli::{AdminCommand, AdminOpts};
use burrow::config::ServerConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opts = AdminOpts::parse();
    let cfg = ServerConfig::load(&opts.store)?;
    let store = UserStore::open(&cfg.users_db)
        .with_context(|| format!("Failed to open user database: {}", cfg.users_db.display()))?;

    match opts.command {
        AdminCommand::Add { username, password } => {
            let user = store.create_user(&username, &password, &cfg.ftp_root)?;
            println!(
                "Created user {} (id {}) with home {}",
                user.username,
                user.id,
                user.root.display()
            );
        }
        AdminCommand::Del { username } => {
            if !store.delete_user(&username)? {
                bail!("no such user: {}", username);
            }
            println!("Deleted user {} (home directory kept)", username);
        }
        AdminCommand::List => {
            for user in store.list_users() {
                println!("{:>4}  {:<20} {}", user.id, user.username, user.root.display());
            }
        }
        AdminCommand::Check { username } => {
            if !store.user_exists(&username) {
                bail!("no such user: {}", username);
            }
            println!("{} exists", username);
        }
    }
    Ok(())
}
