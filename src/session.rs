//! Per-connection login handshake and hand-off to the command loop.

use log::{error, info, warn};
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::auth::{CredentialAuthority, User};
use crate::conn::Conn;
use crate::engine::CommandEngine;
use crate::error::SessionEnd;
use crate::logger::Logger;
use crate::protocol::{replies, PROMPT_PASSWORD, PROMPT_USERNAME};
use crate::sandbox::Sandbox;

/// Login progress. There is one attempt per connection and no transition
/// goes backwards.
#[derive(Debug)]
enum LoginState {
    AwaitingUsername,
    AwaitingPassword { username: String },
    Authenticated(User),
    Rejected { username: String },
}

pub struct Session<S: Read + Write> {
    conn: Conn<S>,
    peer: String,
    authority: Arc<dyn CredentialAuthority>,
    logger: Arc<dyn Logger>,
}

impl<S: Read + Write> Session<S> {
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        authority: Arc<dyn CredentialAuthority>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            conn: Conn::new(stream),
            peer: peer.into(),
            authority,
            logger,
        }
    }

    /// Run the session to completion. The connection is dropped, and so
    /// closed, on every return path.
    pub fn run(mut self) -> io::Result<SessionEnd> {
        self.logger.connect(&self.peer);
        let result = self.serve();
        let reason = match &result {
            Ok(end) => end.as_str(),
            Err(_) => "error",
        };
        self.logger.end(&self.peer, reason);
        result
    }

    fn serve(&mut self) -> io::Result<SessionEnd> {
        let user = match self.login()? {
            Some(user) => user,
            None => return Ok(SessionEnd::Rejected),
        };
        let sandbox = match Sandbox::new(&user.root) {
            Ok(sb) => sb,
            Err(e) => {
                error!("{}: sandbox for {} unavailable: {:#}", self.peer, user.username, e);
                self.conn.send(replies::HOME_UNAVAILABLE)?;
                return Ok(SessionEnd::Rejected);
            }
        };
        info!("{}: {} logged in (id {})", self.peer, user.username, user.id);
        self.logger.login(&self.peer, &user.username);
        self.conn.send(replies::LOGGED_IN)?;

        let mut engine =
            CommandEngine::new(sandbox, &user.username, &mut self.conn, self.logger.clone());
        engine.run()
    }

    fn login(&mut self) -> io::Result<Option<User>> {
        let mut state = LoginState::AwaitingUsername;
        loop {
            state = match state {
                LoginState::AwaitingUsername => {
                    self.conn.send(PROMPT_USERNAME)?;
                    let username = self.read_credential()?;
                    LoginState::AwaitingPassword { username }
                }
                LoginState::AwaitingPassword { username } => {
                    self.conn.send(PROMPT_PASSWORD)?;
                    let password = self.read_credential()?;
                    match self.authority.authenticate(&username, &password) {
                        Ok(Some(user)) => LoginState::Authenticated(user),
                        Ok(None) => LoginState::Rejected { username },
                        Err(e) => {
                            error!("{}: credential store error: {:#}", self.peer, e);
                            LoginState::Rejected { username }
                        }
                    }
                }
                LoginState::Authenticated(user) => return Ok(Some(user)),
                LoginState::Rejected { username } => {
                    warn!("{}: login incorrect for {:?}", self.peer, username);
                    self.logger.login_failed(&self.peer, &username);
                    self.conn.send(replies::LOGIN_INCORRECT)?;
                    return Ok(None);
                }
            };
        }
    }

    fn read_credential(&mut self) -> io::Result<String> {
        match self.conn.read_line()? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the connection during login",
            )),
        }
    }
}
