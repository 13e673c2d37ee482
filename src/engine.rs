//! Authenticated command loop.
//!
//! One engine serves one session on one thread. It owns the current
//! directory; every path argument goes through the [`Sandbox`] before it
//! reaches the filesystem, and every command produces exactly one reply (or
//! one framed exchange) before the next line is read.

use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{is_separator, Component, Path, PathBuf};
use std::sync::Arc;

use crate::command::{Command, Verb};
use crate::conn::Conn;
use crate::error::{CommandError, CommandResult, SessionEnd};
use crate::listing;
use crate::logger::Logger;
use crate::protocol::{replies, reply};
use crate::protocol_core::{copy_exact, read_frame_len, write_frame_len};
use crate::sandbox::Sandbox;

/// What the loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

type Handler<'c, S> = fn(&mut CommandEngine<'c, S>, &str) -> CommandResult<Flow>;

pub struct CommandEngine<'c, S: Read + Write> {
    sandbox: Sandbox,
    current: PathBuf,
    username: String,
    conn: &'c mut Conn<S>,
    logger: Arc<dyn Logger>,
}

impl<'c, S: Read + Write> CommandEngine<'c, S> {
    /// The current directory starts at the sandbox root.
    pub fn new(
        sandbox: Sandbox,
        username: &str,
        conn: &'c mut Conn<S>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let current = sandbox.root().to_path_buf();
        Self {
            sandbox,
            current,
            username: username.to_string(),
            conn,
            logger,
        }
    }

    pub fn current_dir(&self) -> &Path {
        &self.current
    }

    /// Serve commands until QUIT, peer EOF, or a control-channel error.
    pub fn run(&mut self) -> io::Result<SessionEnd> {
        loop {
            let line = match self.conn.read_line()? {
                Some(line) => line,
                None => return Ok(SessionEnd::Disconnected),
            };
            let line = line.trim();
            debug!("{} > {}", self.username, line);
            self.logger.command(&self.username, line);

            match self.dispatch(line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Ok(SessionEnd::Quit),
                Err(e) if e.is_fatal() => return Err(e.into_io()),
                Err(e) => {
                    match &e {
                        CommandError::Security(detail) => {
                            warn!("{}: denied {:?} ({})", self.username, line, detail);
                            self.logger.denied(&self.username, line);
                        }
                        CommandError::Filesystem { .. } => {
                            warn!("{}: {}", self.username, e);
                            self.logger.error(&self.username, line, &e.to_string());
                        }
                        _ => debug!("{}: {}", self.username, e),
                    }
                    self.conn.send(&e.reply())?;
                }
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> CommandResult<Flow> {
        let cmd = Command::parse(line)?;
        let handler = Self::handler(cmd.verb);
        handler(self, &cmd.arg)
    }

    fn handler(verb: Verb) -> Handler<'c, S> {
        match verb {
            Verb::Ls => Self::handle_ls,
            Verb::Cd => Self::handle_cd,
            Verb::Rm => Self::handle_rm,
            Verb::Put => Self::handle_put,
            Verb::Get => Self::handle_get,
            Verb::Pwd => Self::handle_pwd,
            Verb::Mkdir => Self::handle_mkdir,
            Verb::Drm => Self::handle_drm,
            Verb::Quit => Self::handle_quit,
        }
    }

    fn display(&self, p: &Path) -> String {
        self.sandbox.display_path(p, &self.username)
    }

    fn handle_ls(&mut self, _arg: &str) -> CommandResult<Flow> {
        let lines = listing::list_dir(&self.current)
            .map_err(|e| CommandError::fs("Error reading directory", e))?;
        let mut out = String::new();
        for line in &lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out.push_str(&reply::listing_complete(lines.len()));
        self.conn.send(&out)?;
        Ok(Flow::Continue)
    }

    fn handle_cd(&mut self, arg: &str) -> CommandResult<Flow> {
        let target = self.sandbox.resolve(&self.current, arg)?;
        match fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(CommandError::Unavailable(replies::NOT_A_DIRECTORY)),
        }
        debug_assert!(self.sandbox.contains(&target));
        self.current = target;
        let shown = self.display(&self.current);
        self.conn.send(&reply::directory_changed(&shown))?;
        Ok(Flow::Continue)
    }

    fn handle_pwd(&mut self, _arg: &str) -> CommandResult<Flow> {
        let shown = self.display(&self.current);
        self.conn.send(&reply::current_directory(&shown))?;
        Ok(Flow::Continue)
    }

    /// Removes the named entry itself; a symlink is unlinked, never its target.
    fn handle_rm(&mut self, arg: &str) -> CommandResult<Flow> {
        let target = self.sandbox.resolve_entry(&self.current, arg)?;
        let meta = match fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CommandError::Unavailable(replies::FILE_NOT_FOUND))
            }
            Err(e) => return Err(CommandError::fs("Error removing file", e)),
        };
        if meta.is_dir() {
            return Err(CommandError::Unavailable(replies::NOT_A_FILE));
        }
        fs::remove_file(&target).map_err(|e| CommandError::fs("Error removing file", e))?;
        self.logger.delete(&self.username, &target);
        self.conn.send(&reply::file_removed(arg))?;
        Ok(Flow::Continue)
    }

    fn handle_put(&mut self, arg: &str) -> CommandResult<Flow> {
        let target = self.sandbox.resolve(&self.current, arg)?;
        let mut file =
            File::create(&target).map_err(|e| CommandError::fs("Error creating file", e))?;
        self.conn.send(replies::FILE_CREATED)?;

        let len = read_frame_len(self.conn.reader())
            .map_err(|e| frame_read_error("Error reading file size", e))?;
        if len < 0 {
            return Err(CommandError::Protocol(replies::INVALID_LENGTH));
        }
        // A short read leaves the partial file on disk
        let mut sink = UploadSink::new(&mut file);
        copy_exact(self.conn.reader(), &mut sink, len as u64)
            .map_err(|e| frame_read_error("Error receiving file", e))?;
        if let Some(e) = sink.failed {
            return Err(CommandError::transfer("Error writing file", e));
        }

        info!("{}: uploaded {} ({} bytes)", self.username, target.display(), len);
        self.logger.upload(&self.username, &target, len as u64);
        self.conn.send(&reply::upload_complete(arg))?;
        Ok(Flow::Continue)
    }

    fn handle_get(&mut self, arg: &str) -> CommandResult<Flow> {
        let target = self.sandbox.resolve(&self.current, arg)?;
        let meta = match fs::metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CommandError::Unavailable(replies::FILE_NOT_FOUND))
            }
            Err(e) => return Err(CommandError::fs("Error accessing file", e)),
        };
        if !meta.is_file() {
            return Err(CommandError::Unavailable(replies::NOT_A_FILE));
        }
        let mut file = File::open(&target).map_err(|e| CommandError::fs("Error opening file", e))?;
        let size = meta.len();

        write_frame_len(self.conn.writer(), size)
            .map_err(|e| CommandError::transfer("Error sending file size", e))?;
        copy_exact(&mut file, self.conn.writer(), size)
            .map_err(|e| CommandError::transfer("Error sending file", e))?;

        info!("{}: downloaded {} ({} bytes)", self.username, target.display(), size);
        self.logger.download(&self.username, &target, size);
        Ok(Flow::Continue)
    }

    fn handle_mkdir(&mut self, name: &str) -> CommandResult<Flow> {
        if !is_plain_name(name) {
            return Err(CommandError::Protocol(replies::INVALID_DIR_NAME));
        }
        // Any entry by that name counts, including links that do not resolve
        if child_exists(&self.current, name, false)
            .map_err(|e| CommandError::fs("Error while creating a new directory", e))?
        {
            self.conn.send(&reply::dir_exists(name))?;
            return Ok(Flow::Continue);
        }
        let target = self.sandbox.resolve(&self.current, name)?;
        fs::create_dir(&target)
            .map_err(|e| CommandError::fs("Error while creating a new directory", e))?;
        self.conn.send(&reply::dir_created(name))?;
        Ok(Flow::Continue)
    }

    /// Only direct children of the current directory are candidates; the
    /// argument never goes through path resolution.
    fn handle_drm(&mut self, name: &str) -> CommandResult<Flow> {
        let found = child_exists(&self.current, name, true)
            .map_err(|e| CommandError::fs("Error while deleting a directory", e))?;
        if !found {
            self.conn.send(&reply::dir_missing(name))?;
            return Ok(Flow::Continue);
        }
        let target = self.current.join(name);
        fs::remove_dir_all(&target)
            .map_err(|e| CommandError::fs("Error while deleting a directory", e))?;
        self.logger.delete(&self.username, &target);
        self.conn.send(&reply::dir_removed(name))?;
        Ok(Flow::Continue)
    }

    fn handle_quit(&mut self, _arg: &str) -> CommandResult<Flow> {
        self.conn.send(replies::GOODBYE)?;
        Ok(Flow::Quit)
    }
}

/// A frame cut short by the peer fails only the transfer. Any other read
/// error, an idle timeout included, leaves the stream position unknown, so
/// the session cannot go on reading commands from it.
fn frame_read_error(context: &'static str, e: io::Error) -> CommandError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CommandError::transfer(context, e)
    } else {
        CommandError::Transport(e)
    }
}

/// Upload destination that keeps consuming the frame after the file stops
/// accepting writes, so the next command starts where the client expects.
struct UploadSink<W: Write> {
    inner: W,
    failed: Option<io::Error>,
}

impl<W: Write> UploadSink<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            failed: None,
        }
    }
}

impl<W: Write> Write for UploadSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed.is_none() {
            if let Err(e) = self.inner.write_all(buf) {
                self.failed = Some(e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.failed.is_none() {
            if let Err(e) = self.inner.flush() {
                self.failed = Some(e);
            }
        }
        Ok(())
    }
}

/// A single normal path component with no separators.
fn is_plain_name(name: &str) -> bool {
    if name.contains('\0') || name.chars().any(|c| c == '/' || is_separator(c)) {
        return false;
    }
    let mut comps = Path::new(name).components();
    matches!(
        (comps.next(), comps.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Scan `dir` for an entry named exactly `name` (case-sensitive). With
/// `dirs_only`, symlinks and files never match.
fn child_exists(dir: &Path, name: &str, dirs_only: bool) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() != name {
            continue;
        }
        if !dirs_only || entry.file_type()?.is_dir() {
            return Ok(true);
        }
    }
    Ok(false)
}
