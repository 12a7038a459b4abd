//! Collision-free naming for generated key pairs.

use std::path::{Path, PathBuf};

use crate::error::{SwitchError, SwitchResult};
use crate::profile::public_key_path;

/// Names chosen for a new key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAllocation {
    pub label: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

/// Find a free `id_rsa_<label>` name in `ssh_dir`
///
/// Tries `label`, then `label 2`, `label 3`, ... until neither the private
/// nor the public file exists. The check is a snapshot; callers racing on the
/// same directory must serialize themselves.
pub fn allocate(ssh_dir: &Path, base_label: &str) -> SwitchResult<KeyAllocation> {
    let base = base_label.trim();
    if base.is_empty() || base.contains(['/', '\\']) || base == "." || base == ".." {
        return Err(SwitchError::InvalidLabel(base_label.to_string()));
    }

    let mut suffix = 1u32;
    loop {
        let label = if suffix == 1 {
            base.to_string()
        } else {
            format!("{} {}", base, suffix)
        };

        let private_key_path = ssh_dir.join(format!("id_rsa_{}", label));
        let public_key_path = public_key_path(&private_key_path);

        if !occupied(&private_key_path) && !occupied(&public_key_path) {
            return Ok(KeyAllocation {
                label,
                private_key_path,
                public_key_path,
            });
        }
        suffix += 1;
    }
}

// dangling symlinks count as taken
fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
