use anyhow::{Context, Result};
use log::{error, info, warn};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::auth::CredentialAuthority;
use crate::error::SessionEnd;
use crate::logger::Logger;
use crate::session::Session;

/// Everything a connection thread needs. Cheap to clone per connection.
#[derive(Clone)]
pub struct ServerContext {
    pub authority: Arc<dyn CredentialAuthority>,
    pub logger: Arc<dyn Logger>,
    pub idle_timeout: Option<Duration>,
}

// Disable Nagle for the lockstep replies and arm the idle timeout
fn tune_socket(stream: &TcpStream, idle_timeout: Option<Duration>) {
    let _ = stream.set_nodelay(true);
    if let Err(e) = stream.set_read_timeout(idle_timeout) {
        warn!("set read timeout: {}", e);
    }
}

pub fn serve(bind: &str, ctx: ServerContext) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("bind {}", bind))?;
    serve_listener(listener, ctx)
}

/// Accept forever, one thread per connection. Accept errors are logged and
/// the loop continues.
pub fn serve_listener(listener: TcpListener, ctx: ServerContext) -> Result<()> {
    info!(
        "burrow daemon listening on {}",
        listener.local_addr().context("listener address")?
    );
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                tune_socket(&stream, ctx.idle_timeout);
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                info!("conn from {}", peer);
                let ctx = ctx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("session-{}", peer))
                    .spawn(move || handle_conn(stream, peer, ctx));
                if let Err(e) = spawned {
                    error!("failed to spawn session thread: {}", e);
                }
            }
            Err(e) => {
                warn!("accept error: {}", e);
            }
        }
    }
    Ok(())
}

fn handle_conn(stream: TcpStream, peer: String, ctx: ServerContext) {
    let session = Session::new(stream, peer.clone(), ctx.authority, ctx.logger);
    match session.run() {
        Ok(SessionEnd::Rejected) => info!("{}: login rejected, connection closed", peer),
        Ok(end) => info!("{}: session ended ({})", peer, end.as_str()),
        Err(e) => warn!(
            "{}: connection error during handling (possible client disconnect): {}",
            peer, e
        ),
    }
}
