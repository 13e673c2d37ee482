//! Per-session path containment.
//!
//! Every user-supplied path is joined onto the session's current directory,
//! normalized, canonicalized where it exists on disk, and then proven to lie
//! inside the sandbox root before any filesystem call sees it.

use anyhow::{Context, Result};
use std::path::{is_separator, Component, Path, PathBuf};

use crate::error::{CommandError, CommandResult};

/// True when `candidate` is `root` itself or lies beneath it.
///
/// The byte after the root prefix must be a separator, so `/home/alice2` is
/// not inside `/home/alice`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    let root = root.as_os_str().as_encoded_bytes();
    let cand = candidate.as_os_str().as_encoded_bytes();
    if cand == root {
        return true;
    }
    // A root such as "/" already ends with its separator
    let prefix = match root.last() {
        Some(&b) if is_separator(b as char) => &root[..root.len() - 1],
        _ => root,
    };
    cand.len() > prefix.len()
        && cand.starts_with(prefix)
        && is_separator(cand[prefix.len()] as char)
}

/// Resolve `.` and `..` without touching the filesystem. `..` never climbs
/// above the filesystem root.
pub fn normalize_lexically(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(s) => out.push(s),
        }
    }
    out
}

/// Canonicalize as much of `p` as exists: the full path if it exists,
/// otherwise its parent plus the final name. A dangling symlink yields `None`.
fn canonicalize_existing(p: &Path) -> Option<PathBuf> {
    if let Ok(canon) = std::fs::canonicalize(p) {
        return Some(canon);
    }
    if let Ok(meta) = std::fs::symlink_metadata(p) {
        if meta.file_type().is_symlink() {
            return None;
        }
    }
    match (p.parent(), p.file_name()) {
        (Some(parent), Some(name)) => match std::fs::canonicalize(parent) {
            Ok(canon_parent) => Some(canon_parent.join(name)),
            Err(_) => Some(p.to_path_buf()),
        },
        _ => Some(p.to_path_buf()),
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Bind to `root`, which must exist. The root is canonicalized once here.
    pub fn new(root: &Path) -> Result<Self> {
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("canonicalize sandbox root {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("sandbox root is not a directory: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, p: &Path) -> bool {
        is_within(&self.root, p)
    }

    /// Resolve `arg` against `current`. A leading `/` anchors the argument at
    /// the sandbox root instead of the current directory.
    pub fn resolve(&self, current: &Path, arg: &str) -> CommandResult<PathBuf> {
        let lexical = self.lexical(current, arg)?;
        let resolved = canonicalize_existing(&lexical)
            .ok_or_else(|| CommandError::Security(format!("dangling link {}", lexical.display())))?;
        if !self.contains(&resolved) {
            return Err(CommandError::Security(resolved.display().to_string()));
        }
        Ok(resolved)
    }

    /// Resolve `arg` to the directory entry it names without following a
    /// symlink in the last component. Only the parent is canonicalized and
    /// checked, so a link can be removed even when its target is gone or
    /// lies outside the root.
    pub fn resolve_entry(&self, current: &Path, arg: &str) -> CommandResult<PathBuf> {
        let lexical = self.lexical(current, arg)?;
        let (parent, name) = match (lexical.parent(), lexical.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return Err(CommandError::Security(lexical.display().to_string())),
        };
        let parent = std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
        if !self.contains(&parent) {
            return Err(CommandError::Security(lexical.display().to_string()));
        }
        Ok(parent.join(name))
    }

    fn lexical(&self, current: &Path, arg: &str) -> CommandResult<PathBuf> {
        if arg.contains('\0') {
            return Err(CommandError::Security("path contains NUL byte".into()));
        }
        let joined = match arg.strip_prefix('/') {
            Some(rest) => self.root.join(rest.trim_start_matches('/')),
            None => current.join(arg),
        };
        let lexical = normalize_lexically(&joined);
        if !self.contains(&lexical) {
            return Err(CommandError::Security(lexical.display().to_string()));
        }
        Ok(lexical)
    }

    /// Root-relative, slash-prefixed form of `p` for replies. The root itself
    /// is shown as `/<username>`.
    pub fn display_path(&self, p: &Path, username: &str) -> String {
        let rel = p.strip_prefix(&self.root).unwrap_or(Path::new(""));
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            format!("/{}", username)
        } else {
            format!("/{}", parts.join("/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Sandbox) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("alice/docs/deep")).unwrap();
        fs::create_dir_all(tmp.path().join("alice2")).unwrap();
        fs::write(tmp.path().join("alice2/secret.txt"), b"nope").unwrap();
        let sb = Sandbox::new(&tmp.path().join("alice")).unwrap();
        (tmp, sb)
    }

    #[cfg(unix)]
    #[test]
    fn test_is_within_is_separator_aware() {
        let root = Path::new("/home/alice");
        assert!(is_within(root, Path::new("/home/alice")));
        assert!(is_within(root, Path::new("/home/alice/docs")));
        assert!(!is_within(root, Path::new("/home/alice2")));
        assert!(!is_within(root, Path::new("/home/alice2/docs")));
        assert!(!is_within(root, Path::new("/home")));
        assert!(is_within(Path::new("/"), Path::new("/etc")));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_lexically(Path::new("/../../x")), PathBuf::from("/x"));
        assert_eq!(normalize_lexically(Path::new("/a/b/")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_resolve_inside_root() {
        let (_tmp, sb) = setup();
        let root = sb.root().to_path_buf();

        let p = sb.resolve(&root, "docs").unwrap();
        assert_eq!(p, root.join("docs"));

        let p = sb.resolve(&root, "docs/deep/../deep/.").unwrap();
        assert_eq!(p, root.join("docs").join("deep"));

        let p = sb.resolve(&root.join("docs"), "..").unwrap();
        assert_eq!(p, root);

        // Not-yet-existing target is fine as long as it stays inside
        let p = sb.resolve(&root, "new.txt").unwrap();
        assert_eq!(p, root.join("new.txt"));
    }

    #[test]
    fn test_leading_slash_is_root_anchored() {
        let (_tmp, sb) = setup();
        let root = sb.root().to_path_buf();
        let deep = root.join("docs").join("deep");
        assert_eq!(sb.resolve(&deep, "/").unwrap(), root);
        assert_eq!(sb.resolve(&deep, "/docs").unwrap(), root.join("docs"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let (_tmp, sb) = setup();
        let root = sb.root().to_path_buf();

        assert!(matches!(sb.resolve(&root, ".."), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve(&root, "../alice2"), Err(CommandError::Security(_))));
        assert!(matches!(
            sb.resolve(&root, "docs/../../alice2/secret.txt"),
            Err(CommandError::Security(_))
        ));
        assert!(matches!(sb.resolve(&root, "/../alice2"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve(&root, "bad\0name"), Err(CommandError::Security(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let (tmp, sb) = setup();
        let root = sb.root().to_path_buf();
        std::os::unix::fs::symlink(tmp.path().join("alice2"), root.join("link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing"), root.join("dangling")).unwrap();

        assert!(matches!(sb.resolve(&root, "link"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve(&root, "link/secret.txt"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve(&root, "link/new.txt"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve(&root, "dangling"), Err(CommandError::Security(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_keeps_final_symlink() {
        let (tmp, sb) = setup();
        let root = sb.root().to_path_buf();
        std::os::unix::fs::symlink(tmp.path().join("alice2"), root.join("link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing"), root.join("dangling")).unwrap();

        assert_eq!(sb.resolve_entry(&root, "link").unwrap(), root.join("link"));
        assert_eq!(sb.resolve_entry(&root, "dangling").unwrap(), root.join("dangling"));
        assert_eq!(sb.resolve_entry(&root, "docs/deep").unwrap(), root.join("docs").join("deep"));

        // the parent still has to resolve inside the root
        assert!(matches!(sb.resolve_entry(&root, "link/secret.txt"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve_entry(&root, "/"), Err(CommandError::Security(_))));
        assert!(matches!(sb.resolve_entry(&root, "../alice2"), Err(CommandError::Security(_))));
    }

    #[test]
    fn test_display_path() {
        let (_tmp, sb) = setup();
        let root = sb.root().to_path_buf();
        assert_eq!(sb.display_path(&root, "alice"), "/alice");
        assert_eq!(sb.display_path(&root.join("docs"), "alice"), "/docs");
        assert_eq!(sb.display_path(&root.join("docs").join("deep"), "alice"), "/docs/deep");
    }
}
