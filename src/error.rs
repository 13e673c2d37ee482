//! Error taxonomy for session and command handling
//!
//! Every per-command failure is recovered inside the engine and turned into a
//! reply line via [`CommandError::reply`]. Only [`CommandError::Transport`]
//! ends a session.

use std::io;
use thiserror::Error;

use crate::protocol::{reply, replies};

#[derive(Debug, Error)]
pub enum CommandError {
    /// Unrecognized verb or malformed argument.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Local filesystem failure while serving a command.
    #[error("{context}: {source}")]
    Filesystem {
        code: u16,
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Target missing or of the wrong kind; carries its fixed reply.
    #[error("unavailable: {0}")]
    Unavailable(&'static str),

    /// Resolved path escapes the sandbox root.
    #[error("access denied: {0}")]
    Security(String),

    /// Read or write failure on the control connection itself.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl CommandError {
    pub fn fs(context: &'static str, source: io::Error) -> Self {
        CommandError::Filesystem {
            code: 550,
            context,
            source,
        }
    }

    /// Failure in the middle of a PUT or GET frame.
    pub fn transfer(context: &'static str, source: io::Error) -> Self {
        CommandError::Filesystem {
            code: 451,
            context,
            source,
        }
    }

    /// Transport failures are the only ones that terminate the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }

    /// Underlying I/O error, for handing a fatal failure back to the caller.
    pub fn into_io(self) -> io::Error {
        match self {
            CommandError::Transport(e) => e,
            CommandError::Filesystem { source, .. } => source,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }

    /// The single reply line sent to the peer for a recoverable error.
    pub fn reply(&self) -> String {
        match self {
            CommandError::Protocol(text) | CommandError::Unavailable(text) => {
                (*text).to_string()
            }
            CommandError::Filesystem {
                code,
                context,
                source,
            } => reply::error(*code, context, source),
            CommandError::Security(_) => replies::ACCESS_DENIED.to_string(),
            CommandError::Transport(e) => reply::error(500, "Internal server error", e),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer sent QUIT.
    Quit,
    /// Peer closed the control connection.
    Disconnected,
    /// Login was refused.
    Rejected,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Quit => "quit",
            SessionEnd::Disconnected => "disconnected",
            SessionEnd::Rejected => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_fatal() {
        assert!(CommandError::Transport(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!CommandError::Protocol(replies::UNKNOWN_COMMAND).is_fatal());
        assert!(!CommandError::Security("/etc".into()).is_fatal());
        assert!(!CommandError::Unavailable(replies::FILE_NOT_FOUND).is_fatal());
        assert!(!CommandError::fs("Error removing file", io::Error::from(io::ErrorKind::NotFound)).is_fatal());
        let e = CommandError::Transport(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(e.into_io().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn replies_are_crlf_terminated() {
        let errs = [
            CommandError::Protocol(replies::MISSING_ARGUMENT),
            CommandError::Security("x".into()),
            CommandError::fs("Error reading directory", io::Error::new(io::ErrorKind::Other, "boom")),
        ];
        for e in errs {
            assert!(e.reply().ends_with("\r\n"), "{:?}", e.reply());
        }
        let e = CommandError::fs("Error reading directory", io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(e.reply(), "550 Error reading directory: boom\r\n");
        assert_eq!(CommandError::Security("x".into()).reply(), "550 Access denied.\r\n");
        let e = CommandError::transfer("Error receiving file", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(e.reply().starts_with("451 Error receiving file: "));
    }
}
