//! Filesystem utility functions
//!
//! Helpers for writing owner-only files (vault records, private keys) and for
//! replacing symlinks without a window where the link is missing.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create `dir` (and parents) and restrict it to the owner
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

/// Restrict an existing file to owner read/write (0600)
pub fn set_owner_only(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// Write `contents` to `path` atomically with owner-only permissions
///
/// The data goes to a sibling temp file that is chmod'ed before being renamed
/// over the destination, so readers never observe a partial or world-readable
/// file.
pub fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_temp(path);
    fs::write(&temp_path, contents)?;
    if let Err(e) = set_owner_only(&temp_path).and_then(|_| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Point `link` at `target`, replacing whatever symlink is there atomically
///
/// `target` does not need to exist.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_link = sibling_temp(link);
    let _ = fs::remove_file(&temp_link);

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, &temp_link)?;

    #[cfg(windows)]
    std::os::windows::fs::symlink_file(target, &temp_link)?;

    if let Err(e) = fs::rename(&temp_link, link) {
        let _ = fs::remove_file(&temp_link);
        return Err(e);
    }
    Ok(())
}

/// Move a file into `backups_dir` under a timestamped name, returning the new path
pub fn backup_file(path: &Path, backups_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(backups_dir)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let backup_path = backups_dir.join(format!("{}.{}.bak", name, timestamp));

    fs::copy(path, &backup_path)?;
    set_owner_only(&backup_path)?;
    fs::remove_file(path)?;
    Ok(backup_path)
}

fn sibling_temp(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
