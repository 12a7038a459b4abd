//! Identity records.
//!
//! A [`Profile`] is a saved identity; a [`CurrentIdentity`] is what git and the
//! `~/.ssh/id_rsa` link say is in effect right now.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::paths::Paths;

/// Marker every private key we accept must carry
pub const OPENSSH_PRIVATE_KEY_MARKER: &str = "BEGIN OPENSSH PRIVATE KEY";

/// A saved git identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// Short name chosen by the user, not necessarily unique
    pub label: String,
    /// Value applied to `user.name`
    pub name: String,
    /// Value applied to `user.email`
    pub email: String,
    /// Private key path, may start with `~`
    pub ssh_key_path: String,
}

impl Profile {
    /// Create a profile with a freshly assigned id
    pub fn new(
        label: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        ssh_key_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            name: name.into(),
            email: email.into(),
            ssh_key_path: ssh_key_path.into(),
        }
    }

    /// Short form of the id for display and lookup
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// Key path with `~` expanded
    pub fn key_path(&self, paths: &Paths) -> PathBuf {
        paths.expand(&self.ssh_key_path)
    }

    /// True when this profile is the identity currently in effect.
    ///
    /// Key paths are compared after `~` expansion; an unresolved current key
    /// never matches.
    pub fn matches(&self, current: &CurrentIdentity, paths: &Paths) -> bool {
        self.name == current.name
            && self.email == current.email
            && current
                .resolved_key_path
                .as_deref()
                .is_some_and(|active| self.key_path(paths) == active)
    }
}

/// Snapshot of the identity active outside the process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentIdentity {
    pub name: String,
    pub email: String,
    pub resolved_key_path: Option<PathBuf>,
}

impl CurrentIdentity {
    pub fn is_configured(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty()
    }
}

/// A freshly generated key pair
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// Label the files were created under, possibly with a numeric suffix
    pub label: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub private_key: String,
    pub public_key: String,
}

/// Whether `contents` looks like an OpenSSH private key
pub fn is_openssh_private_key(contents: &str) -> bool {
    contents.contains(OPENSSH_PRIVATE_KEY_MARKER)
}

/// Public key path for a private key path
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut os = private_key.as_os_str().to_owned();
    os.push(".pub");
    PathBuf::from(os)
}
