use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// All computed paths used by gitswitch
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~
    pub home: PathBuf,
    /// ~/.gitswitch
    pub base_dir: PathBuf,
    /// ~/.gitswitch/vault
    pub vault_dir: PathBuf,
    /// ~/.gitswitch/backups
    pub backups_dir: PathBuf,
    /// ~/.gitswitch/state.json
    pub state_file: PathBuf,
    /// ~/.gitswitch/keygen.lock
    pub keygen_lock: PathBuf,
    /// ~/.ssh
    pub ssh_dir: PathBuf,
    /// ~/.ssh/id_rsa
    pub active_key: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        Ok(Self::from_home(base_dirs.home_dir()))
    }

    /// Lay out every location relative to `home`
    pub fn from_home(home: &Path) -> Self {
        let base_dir = home.join(".gitswitch");
        let ssh_dir = home.join(".ssh");

        Self {
            home: home.to_path_buf(),
            vault_dir: base_dir.join("vault"),
            backups_dir: base_dir.join("backups"),
            state_file: base_dir.join("state.json"),
            keygen_lock: base_dir.join("keygen.lock"),
            active_key: ssh_dir.join("id_rsa"),
            base_dir,
            ssh_dir,
        }
    }

    /// Expand a leading `~` into the home directory
    pub fn expand(&self, path: &str) -> PathBuf {
        if path == "~" {
            self.home.clone()
        } else if let Some(rest) = path.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            PathBuf::from(path)
        }
    }

    /// Inverse of [`Paths::expand`]: render paths under home with `~/`
    pub fn contract(&self, path: &Path) -> String {
        match path.strip_prefix(&self.home) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => path.display().to_string(),
        }
    }

    /// Private key file for a key label, e.g. ~/.ssh/id_rsa_work
    pub fn private_key_for(&self, label: &str) -> PathBuf {
        self.ssh_dir.join(format!("id_rsa_{}", label))
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        crate::fs_utils::ensure_private_dir(&self.base_dir).with_context(|| {
            format!("Failed to create base directory: {:?}", self.base_dir)
        })?;
        crate::fs_utils::ensure_private_dir(&self.vault_dir).with_context(|| {
            format!("Failed to create vault directory: {:?}", self.vault_dir)
        })?;
        std::fs::create_dir_all(&self.backups_dir).with_context(|| {
            format!("Failed to create backups directory: {:?}", self.backups_dir)
        })?;
        Ok(())
    }
}
