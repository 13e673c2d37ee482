//! Directory listing lines for `LS`.

use chrono::{DateTime, Local};
use log::warn;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Ten-character `ls -l` style mode, e.g. `drwxr-xr-x`.
pub fn mode_string(meta: &Metadata) -> String {
    let ft = meta.file_type();
    let kind = if ft.is_dir() {
        'd'
    } else if ft.is_symlink() {
        'L'
    } else {
        '-'
    };
    let mut s = String::with_capacity(10);
    s.push(kind);
    s.push_str(&permission_bits(meta));
    s
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> String {
    if meta.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}

pub fn format_mtime(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%b %e %H:%M").to_string()
}

/// One listing line (no line terminator): mode, size, mtime, name.
pub fn format_entry(name: &str, meta: &Metadata) -> String {
    let mtime = meta
        .modified()
        .map(format_mtime)
        .unwrap_or_else(|_| "            ".to_string());
    format!("{} {:>8} {} {}", mode_string(meta), meta.len(), mtime, name)
}

/// Listing lines for `dir`, sorted by name. Entries whose metadata cannot be
/// read are skipped.
pub fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries: Vec<(String, Metadata)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.metadata() {
            Ok(meta) => entries.push((name, meta)),
            Err(e) => warn!("listing: cannot stat {}: {}", entry.path().display(), e),
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries
        .iter()
        .map(|(name, meta)| format_entry(name, meta))
        .collect())
}
