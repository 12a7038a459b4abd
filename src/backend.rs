//! The externally held identity: global git config plus the `~/.ssh/id_rsa` link.
//!
//! [`IdentityBackend`] is the seam between the engine and that process-wide
//! state. [`GitBackend`] is the real thing; tests substitute an in-memory one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::parse_identity;
use crate::error::{SwitchError, SwitchResult};
use crate::fs_utils::{backup_file, replace_symlink};
use crate::paths::Paths;
use crate::profile::CurrentIdentity;
use crate::runner::CommandRunner;

/// Where the active identity lives
pub trait IdentityBackend: Send + Sync {
    /// Apply name, email and key link. `key_path` need not exist.
    fn set_active(&self, name: &str, email: &str, key_path: &Path) -> SwitchResult<()>;

    /// Snapshot of what is active; absent values are empty/`None`
    fn get_active(&self) -> CurrentIdentity;

    /// Raw `key=value` listing of every config entry, tab-prefixed with origin
    fn config_listing(&self) -> String;
}

/// Represents the state of the ~/.ssh/id_rsa path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLinkStatus {
    Missing,
    RegularFile,
    Symlink { target: PathBuf },
    BrokenSymlink { target: PathBuf },
}

impl KeyLinkStatus {
    pub fn detect(path: &Path) -> Self {
        // symlink_metadata does not follow the link, so dangling links still show up
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => match fs::read_link(path) {
                Ok(target) => {
                    let target = absolutize(path, &target);
                    if target.exists() {
                        Self::Symlink { target }
                    } else {
                        Self::BrokenSymlink { target }
                    }
                }
                Err(_) => Self::BrokenSymlink {
                    target: PathBuf::from("?"),
                },
            },
            Ok(_) => Self::RegularFile,
            Err(_) => Self::Missing,
        }
    }

    /// Key in effect for this status, `None` when there is none
    pub fn resolved(&self, link: &Path) -> Option<PathBuf> {
        match self {
            Self::Symlink { target } | Self::BrokenSymlink { target } => Some(target.clone()),
            Self::RegularFile => Some(link.to_path_buf()),
            Self::Missing => None,
        }
    }
}

/// Relative link targets are relative to the link's directory
fn absolutize(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        link.parent()
            .map(|dir| dir.join(target))
            .unwrap_or_else(|| target.to_path_buf())
    }
}

/// Drives `git config --global` and manages the active key symlink
#[derive(Clone)]
pub struct GitBackend {
    runner: Arc<dyn CommandRunner>,
    paths: Paths,
}

impl GitBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, paths: Paths) -> Self {
        Self { runner, paths }
    }

    fn git(&self, args: &[&str]) -> SwitchResult<String> {
        self.runner
            .run("git", args)
            .map_err(|source| SwitchError::Command {
                program: "git".to_string(),
                source,
            })
    }

    fn git_or_empty(&self, args: &[&str]) -> String {
        self.git(args).unwrap_or_else(|e| {
            warn!(error = %e, "could not read git config");
            String::new()
        })
    }

    fn link_key(&self, key_path: &Path) -> SwitchResult<()> {
        let link = &self.paths.active_key;
        if key_path == link.as_path() {
            // the key already lives at the link location; a link to itself would loop
            warn!(key = %key_path.display(), "profile key is the active key path, leaving it in place");
            return Ok(());
        }

        match KeyLinkStatus::detect(link) {
            KeyLinkStatus::RegularFile => {
                // a real key sits where the link goes; keep a copy before replacing it
                let backup = backup_file(link, &self.paths.backups_dir)?;
                warn!(backup = %backup.display(), "moved existing key aside");
            }
            status => debug!(?status, "replacing active key link"),
        }

        replace_symlink(key_path, link)?;
        Ok(())
    }
}

impl IdentityBackend for GitBackend {
    fn set_active(&self, name: &str, email: &str, key_path: &Path) -> SwitchResult<()> {
        self.git(&["config", "--global", "user.name", name])?;
        self.git(&["config", "--global", "user.email", email])?;
        self.link_key(key_path)?;

        info!(name, email, key = %key_path.display(), "identity applied");
        Ok(())
    }

    fn get_active(&self) -> CurrentIdentity {
        let listing = self.git_or_empty(&["config", "--global", "--list"]);
        let (name, email) = parse_identity(&listing);
        let resolved_key_path =
            KeyLinkStatus::detect(&self.paths.active_key).resolved(&self.paths.active_key);

        CurrentIdentity {
            name,
            email,
            resolved_key_path,
        }
    }

    fn config_listing(&self) -> String {
        self.git_or_empty(&["config", "--list", "--show-origin"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeHost, setup_test_paths};
    use tempfile::TempDir;

    fn backend(paths: &Paths) -> (GitBackend, Arc<FakeHost>) {
        let git = Arc::new(FakeHost::default());
        (GitBackend::new(git.clone(), paths.clone()), git)
    }

    #[test]
    fn test_key_link_status_detect() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        fs::create_dir_all(&paths.ssh_dir).unwrap();

        // 1. Missing
        assert_eq!(KeyLinkStatus::detect(&paths.active_key), KeyLinkStatus::Missing);
        assert_eq!(KeyLinkStatus::Missing.resolved(&paths.active_key), None);

        // 2. Regular file
        fs::write(&paths.active_key, "key").unwrap();
        let status = KeyLinkStatus::detect(&paths.active_key);
        assert_eq!(status, KeyLinkStatus::RegularFile);
        assert_eq!(status.resolved(&paths.active_key), Some(paths.active_key.clone()));
        fs::remove_file(&paths.active_key).unwrap();

        // 3. Relative symlink to an existing key
        let target = paths.ssh_dir.join("id_rsa_work");
        fs::write(&target, "key").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("id_rsa_work", &paths.active_key).unwrap();
        #[cfg(unix)]
        assert_eq!(
            KeyLinkStatus::detect(&paths.active_key),
            KeyLinkStatus::Symlink { target: target.clone() }
        );

        // 4. Dangling
        #[cfg(unix)]
        {
            fs::remove_file(&target).unwrap();
            assert!(matches!(
                KeyLinkStatus::detect(&paths.active_key),
                KeyLinkStatus::BrokenSymlink { .. }
            ));
        }
    }

    #[test]
    fn test_set_active_writes_git_config_and_link() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (backend, git) = backend(&paths);
        let key = paths.ssh_dir.join("id_rsa_work");

        backend.set_active("Alice", "alice@work.com", &key).unwrap();

        assert_eq!(git.value("user.name").as_deref(), Some("Alice"));
        assert_eq!(git.value("user.email").as_deref(), Some("alice@work.com"));
        assert_eq!(fs::read_link(&paths.active_key).unwrap(), key);

        let current = backend.get_active();
        assert_eq!(current.name, "Alice");
        assert_eq!(current.email, "alice@work.com");
        assert_eq!(current.resolved_key_path, Some(key));
    }

    #[test]
    fn test_set_active_backs_up_regular_key() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (backend, _git) = backend(&paths);
        fs::create_dir_all(&paths.ssh_dir).unwrap();
        fs::write(&paths.active_key, "original key").unwrap();

        let key = paths.ssh_dir.join("id_rsa_work");
        backend.set_active("A", "a@b.c", &key).unwrap();

        assert!(fs::symlink_metadata(&paths.active_key).unwrap().file_type().is_symlink());
        let backups: Vec<_> = fs::read_dir(&paths.backups_dir).unwrap().collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_set_active_never_links_key_to_itself() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (backend, _git) = backend(&paths);
        fs::create_dir_all(&paths.ssh_dir).unwrap();
        fs::write(&paths.active_key, "ORIGINAL KEY").unwrap();

        backend.set_active("A", "a@b.c", &paths.active_key).unwrap();

        assert_eq!(KeyLinkStatus::detect(&paths.active_key), KeyLinkStatus::RegularFile);
        assert_eq!(fs::read_to_string(&paths.active_key).unwrap(), "ORIGINAL KEY");
        let backed_up = fs::read_dir(&paths.backups_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(backed_up, 0);
    }

    #[test]
    fn test_get_active_with_nothing_configured() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (backend, _git) = backend(&paths);

        assert_eq!(backend.get_active(), CurrentIdentity::default());
    }

    #[test]
    fn test_config_listing_passthrough() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let (backend, git) = backend(&paths);
        git.set("user.name", "Alice");

        let listing = backend.config_listing();
        assert!(listing.contains("\tuser.name=Alice"));
    }
}
