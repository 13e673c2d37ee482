use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Session audit trail. Every hook has an empty default so sinks only
/// implement what they record.
pub trait Logger: Send + Sync {
    fn connect(&self, _peer: &str) {}
    fn login(&self, _peer: &str, _user: &str) {}
    fn login_failed(&self, _peer: &str, _user: &str) {}
    fn command(&self, _user: &str, _line: &str) {}
    fn upload(&self, _user: &str, _path: &Path, _bytes: u64) {}
    fn download(&self, _user: &str, _path: &Path, _bytes: u64) {}
    fn delete(&self, _user: &str, _path: &Path) {}
    fn denied(&self, _user: &str, _arg: &str) {}
    fn error(&self, _user: &str, _context: &str, _msg: &str) {}
    fn end(&self, _peer: &str, _reason: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connect(&self, peer: &str) {
        self.line(&format!("CONNECT peer={}", peer));
    }
    fn login(&self, peer: &str, user: &str) {
        self.line(&format!("LOGIN peer={} user={}", peer, user));
    }
    fn login_failed(&self, peer: &str, user: &str) {
        self.line(&format!("LOGIN_FAILED peer={} user={}", peer, user));
    }
    fn command(&self, user: &str, line: &str) {
        self.line(&format!("CMD user={} line={:?}", user, line));
    }
    fn upload(&self, user: &str, path: &Path, bytes: u64) {
        self.line(&format!(
            "PUT user={} path={} bytes={}",
            user,
            path.display(),
            bytes
        ));
    }
    fn download(&self, user: &str, path: &Path, bytes: u64) {
        self.line(&format!(
            "GET user={} path={} bytes={}",
            user,
            path.display(),
            bytes
        ));
    }
    fn delete(&self, user: &str, path: &Path) {
        self.line(&format!("DELETE user={} path={}", user, path.display()));
    }
    fn denied(&self, user: &str, arg: &str) {
        self.line(&format!("DENIED user={} arg={:?}", user, arg));
    }
    fn error(&self, user: &str, context: &str, msg: &str) {
        self.line(&format!("ERROR user={} ctx={} msg={}", user, context, msg));
    }
    fn end(&self, peer: &str, reason: &str) {
        self.line(&format!("END peer={} reason={}", peer, reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_logger_appends_timestamped_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/audit.log");
        let log = TextLogger::new(&path).unwrap();
        log.login("127.0.0.1:5000", "alice");
        log.upload("alice", Path::new("/srv/alice/a.txt"), 13);
        log.end("127.0.0.1:5000", "quit");

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("LOGIN peer=127.0.0.1:5000 user=alice"));
        assert!(lines[1].ends_with("PUT user=alice path=/srv/alice/a.txt bytes=13"));
        assert!(lines[2].ends_with("END peer=127.0.0.1:5000 reason=quit"));
    }
}
