//! Profile switching and key generation.
//!
//! This module implements the core mechanism of `gitswitch`:
//! - Applying a profile as the global git identity and re-pointing
//!   `~/.ssh/id_rsa` at its key.
//! - Minting new RSA key pairs through `ssh-keygen` under collision-free names.
//! - Seeding an empty store from whatever identity git already has. A plain
//!   `~/.ssh/id_rsa` is renamed to `id_rsa_default` and linked back first.
//!
//! Activation never checks that the key file exists: pointing the link at a
//! missing key is allowed and simply leaves it dangling.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tracing::{info, warn};

use crate::backend::{IdentityBackend, KeyLinkStatus};
use crate::config::ConfigReader;
use crate::error::{SwitchError, SwitchResult};
use crate::fs_utils::{ensure_private_dir, replace_symlink, set_owner_only, write_private};
use crate::keyname::{self, KeyAllocation};
use crate::paths::Paths;
use crate::profile::{
    CurrentIdentity, KeyMaterial, Profile, is_openssh_private_key, public_key_path,
};
use crate::runner::CommandRunner;
use crate::state::LockedState;
use crate::store::ProfileStore;

const KEY_TYPE: &str = "rsa";
const KEY_BITS: &str = "4096";

#[derive(Clone)]
pub struct SwitchEngine {
    backend: Arc<dyn IdentityBackend>,
    runner: Arc<dyn CommandRunner>,
    reader: ConfigReader,
    paths: Paths,
}

impl SwitchEngine {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        runner: Arc<dyn CommandRunner>,
        paths: Paths,
    ) -> Self {
        let reader = ConfigReader::new(backend.clone(), paths.clone());
        Self {
            backend,
            runner,
            reader,
            paths,
        }
    }

    pub fn reader(&self) -> &ConfigReader {
        &self.reader
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn current(&self) -> CurrentIdentity {
        self.reader.read_current()
    }

    /// First profile matching the active identity
    pub fn active_profile<'a>(&self, profiles: &'a [Profile]) -> Option<&'a Profile> {
        let current = self.current();
        profiles.iter().find(|p| p.matches(&current, &self.paths))
    }

    /// Make `profile` the active identity
    pub fn activate(&self, profile: &Profile) -> SwitchResult<()> {
        let key_path = profile.key_path(&self.paths);
        if !key_path.exists() {
            warn!(key = %key_path.display(), "activating profile whose key does not exist");
        }

        self.backend
            .set_active(&profile.name, &profile.email, &key_path)?;

        // bookkeeping only; the switch itself already happened
        if let Err(e) = self.record_activation(profile) {
            warn!(error = %e, "could not record activation in state file");
        }

        info!(id = %profile.id, label = %profile.label, "profile activated");
        Ok(())
    }

    fn record_activation(&self, profile: &Profile) -> anyhow::Result<()> {
        let mut locked = LockedState::lock(&self.paths.state_file)?;
        locked.update(|s| s.last_activated = Some(profile.id))
    }

    /// Generate a key pair for `label` without blocking the caller
    pub async fn generate_key_pair(&self, label: &str, email: &str) -> SwitchResult<KeyMaterial> {
        let engine = self.clone();
        let label = label.to_string();
        let email = email.to_string();

        tokio::task::spawn_blocking(move || engine.generate_key_pair_blocking(&label, &email))
            .await
            .map_err(|e| SwitchError::Task(e.to_string()))?
    }

    /// Blocking body of [`SwitchEngine::generate_key_pair`]
    pub fn generate_key_pair_blocking(&self, label: &str, email: &str) -> SwitchResult<KeyMaterial> {
        self.ensure_ssh_dir()?;

        // allocate-then-write is only safe while no other generator runs
        let _lock = KeygenLock::acquire(&self.paths.keygen_lock)?;
        let allocation = keyname::allocate(&self.paths.ssh_dir, label)?;
        let private = allocation.private_key_path.to_string_lossy().into_owned();

        self.runner
            .run(
                "ssh-keygen",
                &[
                    "-q", "-t", KEY_TYPE, "-b", KEY_BITS, "-C", email, "-f", &private, "-N", "",
                ],
            )
            .map_err(|e| SwitchError::GenerationFailed {
                reason: format!("could not run ssh-keygen: {}", e),
            })?;

        let material = read_generated(allocation)?;
        set_owner_only(&material.private_key_path)?;

        info!(label = %material.label, path = %material.private_key_path.display(), "key pair generated");
        Ok(material)
    }

    /// Store a pasted private key under a free `~/.ssh/id_rsa_<label>` name
    ///
    /// Existing key files are never overwritten: a taken name is suffixed the
    /// same way generated keys are. Only the private half is written.
    pub fn install_private_key(&self, label: &str, contents: &str) -> SwitchResult<KeyAllocation> {
        if !is_openssh_private_key(contents) {
            return Err(SwitchError::MalformedKeyMaterial {
                path: self.paths.private_key_for(label.trim()),
            });
        }

        self.ensure_ssh_dir()?;
        let _lock = KeygenLock::acquire(&self.paths.keygen_lock)?;
        let allocation = keyname::allocate(&self.paths.ssh_dir, label)?;

        let mut data = contents.to_string();
        // ssh refuses keys without the trailing newline
        if !data.ends_with('\n') {
            data.push('\n');
        }
        write_private(&allocation.private_key_path, data.as_bytes())?;

        info!(path = %allocation.private_key_path.display(), "private key installed");
        Ok(allocation)
    }

    /// Contents of the profile's `.pub` file, if there is one
    pub fn public_key_for(&self, profile: &Profile) -> Option<String> {
        fs::read_to_string(public_key_path(&profile.key_path(&self.paths))).ok()
    }

    /// Seed an empty store with the identity git already has
    pub fn import_ambient_profile_if_empty(
        &self,
        store: &ProfileStore,
    ) -> SwitchResult<Option<Profile>> {
        if !store.load_all().is_empty() {
            return Ok(None);
        }

        let Some(mut profile) = self.reader.extract_ambient_profile() else {
            return Ok(None);
        };

        let key_path = profile.key_path(&self.paths);
        if key_path == self.paths.active_key
            && KeyLinkStatus::detect(&key_path) == KeyLinkStatus::RegularFile
        {
            let adopted = self.adopt_active_key(&profile.label)?;
            profile.ssh_key_path = self.paths.contract(&adopted);
        }
        store.save(&profile)?;

        info!(name = %profile.name, email = %profile.email, "imported existing git identity");
        Ok(Some(profile))
    }

    /// Move a plain `~/.ssh/id_rsa` to a managed name and link it back
    fn adopt_active_key(&self, label: &str) -> SwitchResult<PathBuf> {
        let active = &self.paths.active_key;
        let _lock = KeygenLock::acquire(&self.paths.keygen_lock)?;
        let allocation = keyname::allocate(&self.paths.ssh_dir, label)?;

        fs::rename(active, &allocation.private_key_path)?;
        let active_public = public_key_path(active);
        if active_public.exists() {
            fs::rename(&active_public, &allocation.public_key_path)?;
        }
        replace_symlink(&allocation.private_key_path, active)?;

        info!(
            from = %active.display(),
            to = %allocation.private_key_path.display(),
            "adopted existing key"
        );
        Ok(allocation.private_key_path)
    }

    fn ensure_ssh_dir(&self) -> io::Result<()> {
        if self.paths.ssh_dir.exists() {
            Ok(())
        } else {
            ensure_private_dir(&self.paths.ssh_dir)
        }
    }
}

fn read_generated(allocation: KeyAllocation) -> SwitchResult<KeyMaterial> {
    let read = |path: &Path| {
        fs::read_to_string(path).map_err(|e| SwitchError::GenerationFailed {
            reason: format!("{} was not produced: {}", path.display(), e),
        })
    };

    let private_key = read(&allocation.private_key_path)?;
    let public_key = read(&allocation.public_key_path)?;

    if !is_openssh_private_key(&private_key) {
        return Err(SwitchError::MalformedKeyMaterial {
            path: allocation.private_key_path,
        });
    }

    Ok(KeyMaterial {
        label: allocation.label,
        private_key_path: allocation.private_key_path,
        public_key_path: allocation.public_key_path,
        private_key,
        public_key,
    })
}

/// Exclusive lock serializing key generation across processes
struct KeygenLock {
    file: File,
}

impl KeygenLock {
    fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for KeygenLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
