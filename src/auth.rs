//! Credential authority and the file-backed user store.

use anyhow::{bail, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Authenticated identity handed to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub root: PathBuf,
}

/// Resolves login credentials to a user. Implementations serialize their own
/// state; sessions call them concurrently without extra locking.
pub trait CredentialAuthority: Send + Sync {
    /// `Ok(None)` for an unknown user or a wrong password.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>>;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub root: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    users: Vec<UserRecord>,
}

// Version of the file held in memory. Writes replace the file by rename, so
// a new inode also means new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
    ino: u64,
}

fn file_stamp(path: &Path) -> Option<FileStamp> {
    let meta = std::fs::metadata(path).ok()?;
    #[cfg(unix)]
    let ino = std::os::unix::fs::MetadataExt::ino(&meta);
    #[cfg(not(unix))]
    let ino = 0;
    Some(FileStamp {
        modified: meta.modified().ok(),
        len: meta.len(),
        ino,
    })
}

#[derive(Debug, Default)]
struct StoreState {
    file: StoreFile,
    stamp: Option<FileStamp>,
}

fn read_store(path: &Path) -> Result<StoreState> {
    if !path.exists() {
        return Ok(StoreState::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read user store {}", path.display()))?;
    let file = serde_json::from_str(&text)
        .with_context(|| format!("parse user store {}", path.display()))?;
    Ok(StoreState {
        file,
        stamp: file_stamp(path),
    })
}

/// Users persisted as JSON, keyed by username, with Argon2 password hashes.
///
/// The file is the source of truth: the daemon and burrow-admin may both
/// have it open, so every write starts from a fresh read and lookups reload
/// when the file has changed.
pub struct UserStore {
    path: PathBuf,
    state: Mutex<StoreState>,
    // Verified against when the username is unknown
    dummy_hash: String,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("stored password hash is malformed: {}", e);
            false
        }
    }
}

pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        bail!("username must be 1-64 characters");
    }
    if name.starts_with('.') {
        bail!("username must not start with '.'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        bail!("username may only contain letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

impl UserStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = read_store(&path)?;
        let dummy_hash = hash_password("burrow-dummy-password")?;
        Ok(Self {
            path,
            state: Mutex::new(state),
            dummy_hash,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, state: &mut StoreState, force: bool) -> Result<()> {
        if force || file_stamp(&self.path) != state.stamp {
            debug!("reloading user store {}", self.path.display());
            *state = read_store(&self.path)?;
        }
        Ok(())
    }

    // Lookups fall back to the cached copy when the file cannot be re-read
    fn current(&self) -> parking_lot::MutexGuard<'_, StoreState> {
        let mut state = self.state.lock();
        if let Err(e) = self.refresh(&mut state, false) {
            warn!("{:#}", e);
        }
        state
    }

    fn persist(&self, state: &mut StoreState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).ok();
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &state.file)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("write user store {}", self.path.display()))?;
        state.stamp = file_stamp(&self.path);
        Ok(())
    }

    pub fn user_exists(&self, username: &str) -> bool {
        self.current().file.users.iter().any(|u| u.username == username)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.current()
            .file
            .users
            .iter()
            .map(|r| User {
                id: r.id,
                username: r.username.clone(),
                root: r.root.clone(),
            })
            .collect()
    }

    /// Register a user and create their sandbox `<ftp_root>/<username>`.
    pub fn create_user(&self, username: &str, password: &str, ftp_root: &Path) -> Result<User> {
        validate_username(username)?;
        if password.is_empty() {
            bail!("password must not be empty");
        }
        let mut state = self.state.lock();
        self.refresh(&mut state, true)?;
        if state.file.users.iter().any(|u| u.username == username) {
            bail!("user {} already exists", username);
        }
        let password_hash = hash_password(password)?;
        let root = create_user_directory(ftp_root, username)?;

        let id = state.file.next_id + 1;
        state.file.next_id = id;
        state.file.users.push(UserRecord {
            id,
            username: username.to_string(),
            password_hash,
            root: root.clone(),
        });
        if let Err(e) = self.persist(&mut state) {
            state.file.users.pop();
            state.file.next_id -= 1;
            return Err(e);
        }
        info!("created user {} root={}", username, root.display());
        Ok(User {
            id,
            username: username.to_string(),
            root,
        })
    }

    /// Remove the user record. The sandbox directory is left on disk.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let mut state = self.state.lock();
        self.refresh(&mut state, true)?;
        let before = state.file.users.len();
        state.file.users.retain(|u| u.username != username);
        if state.file.users.len() == before {
            return Ok(false);
        }
        self.persist(&mut state)?;
        info!("deleted user {}", username);
        Ok(true)
    }
}

impl CredentialAuthority for UserStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let record = {
            let mut state = self.state.lock();
            self.refresh(&mut state, false)?;
            state.file.users.iter().find(|u| u.username == username).cloned()
        };
        match record {
            Some(r) => {
                if verify_password(password, &r.password_hash) {
                    Ok(Some(User {
                        id: r.id,
                        username: r.username,
                        root: r.root,
                    }))
                } else {
                    Ok(None)
                }
            }
            None => {
                // Unknown names still pay for one hash verification
                let _ = verify_password(password, &self.dummy_hash);
                debug!("login for unknown user {:?}", username);
                Ok(None)
            }
        }
    }
}

fn create_user_directory(ftp_root: &Path, username: &str) -> Result<PathBuf> {
    let ftp_root = std::fs::canonicalize(ftp_root)
        .with_context(|| format!("canonicalize ftp root {}", ftp_root.display()))?;
    let dir = ftp_root.join(username);
    std::fs::create_dir(&dir)
        .with_context(|| format!("failed to create directory for user {}", username))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("set permissions on {}", dir.display()))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_authenticate() {
        let tmp = TempDir::new().unwrap();
        let store = UserStore::open(tmp.path().join("users.json")).unwrap();
        let user = store.create_user("alice", "s3cret", tmp.path()).unwrap();
        assert_eq!(user.id, 1);
        assert!(user.root.ends_with("alice"));
        assert!(user.root.is_dir());

        let got = store.authenticate("alice", "s3cret").unwrap().unwrap();
        assert_eq!(got, user);
        assert!(store.authenticate("alice", "wrong").unwrap().is_none());
        assert!(store.authenticate("bob", "s3cret").unwrap().is_none());
    }

    #[test]
    fn test_store_persists_across_open() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("db/users.json");
        {
            let store = UserStore::open(&db).unwrap();
            store.create_user("alice", "pw1", tmp.path()).unwrap();
            store.create_user("bob", "pw2", tmp.path()).unwrap();
            store.close().unwrap();
        }
        let store = UserStore::open(&db).unwrap();
        assert!(store.user_exists("alice"));
        assert_eq!(store.list_users().len(), 2);
        assert_eq!(store.authenticate("bob", "pw2").unwrap().unwrap().id, 2);

        // the hash, not the password, is on disk
        let text = std::fs::read_to_string(&db).unwrap();
        assert!(text.contains("$argon2"));
        assert!(!text.contains("pw2"));
    }

    #[test]
    fn test_two_handles_share_the_file() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("users.json");
        let daemon = UserStore::open(&db).unwrap();
        let admin = UserStore::open(&db).unwrap();

        admin.create_user("bob", "pw2", tmp.path()).unwrap();
        // visible to the other handle without a restart
        assert!(daemon.authenticate("bob", "pw2").unwrap().is_some());

        daemon.create_user("carol", "pw3", tmp.path()).unwrap();
        daemon.close().unwrap();
        assert!(admin.user_exists("carol"));

        let reopened = UserStore::open(&db).unwrap();
        let names: Vec<String> = reopened.list_users().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["bob".to_string(), "carol".to_string()]);
        assert_eq!(reopened.authenticate("carol", "pw3").unwrap().unwrap().id, 2);
    }

    #[test]
    fn test_duplicate_and_invalid_users() {
        let tmp = TempDir::new().unwrap();
        let store = UserStore::open(tmp.path().join("users.json")).unwrap();
        store.create_user("alice", "pw", tmp.path()).unwrap();
        assert!(store.create_user("alice", "pw", tmp.path()).is_err());
        assert!(store.create_user("../evil", "pw", tmp.path()).is_err());
        assert!(store.create_user(".hidden", "pw", tmp.path()).is_err());
        assert!(store.create_user("", "pw", tmp.path()).is_err());
        assert!(store.create_user("carol", "", tmp.path()).is_err());
        assert_eq!(store.list_users().len(), 1);
    }

    #[test]
    fn test_delete_user() {
        let tmp = TempDir::new().unwrap();
        let store = UserStore::open(tmp.path().join("users.json")).unwrap();
        store.create_user("alice", "pw", tmp.path()).unwrap();
        assert!(store.delete_user("alice").unwrap());
        assert!(!store.delete_user("alice").unwrap());
        assert!(store.authenticate("alice", "pw").unwrap().is_none());
        // sandbox stays
        assert!(tmp.path().join("alice").is_dir());
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("pw", "not-a-phc-string"));
        let h = hash_password("pw").unwrap();
        assert!(verify_password("pw", &h));
        assert!(!verify_password("pW", &h));
    }
}
