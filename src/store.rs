//! Profile persistence.
//!
//! Each profile is one JSON record in the vault, keyed by its id:
//!
//! ```json
//! {"version":1,"id":"…","label":"work","name":"…","email":"…","ssh_key_path":"~/.ssh/id_rsa_work"}
//! ```
//!
//! Loading is tolerant: a record that cannot be read or decoded is skipped
//! and logged, never fatal for the rest.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LookupError, StoreError};
use crate::profile::Profile;
use crate::vault::SecretStore;

/// Current record layout
pub const RECORD_VERSION: u32 = 1;

/// Shortest id prefix accepted by [`ProfileStore::resolve`]
const MIN_ID_PREFIX: usize = 4;

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    #[serde(flatten)]
    profile: &'a Profile,
}

#[derive(Deserialize)]
struct Record {
    version: u32,
    #[serde(flatten)]
    profile: Profile,
}

/// Result of a full load, including how many records were skipped
#[derive(Debug, Default)]
pub struct LoadReport {
    pub profiles: Vec<Profile>,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ProfileStore {
    vault: Arc<dyn SecretStore>,
}

impl ProfileStore {
    pub fn new(vault: Arc<dyn SecretStore>) -> Self {
        Self { vault }
    }

    /// Insert or fully replace the profile with this id
    pub fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(&RecordRef {
            version: RECORD_VERSION,
            profile,
        })?;

        self.vault
            .set(&profile.id.to_string(), &data)
            .map_err(StoreError::StorageUnavailable)?;

        debug!(id = %profile.id, label = %profile.label, "profile saved");
        Ok(())
    }

    /// Every readable profile, sorted by label
    pub fn load_all(&self) -> Vec<Profile> {
        self.load_report().profiles
    }

    pub fn load_report(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let keys = match self.vault.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "profile storage unreadable, continuing without profiles");
                return report;
            }
        };

        for key in keys {
            match self.vault.get(&key) {
                Ok(Some(data)) => match decode(&key, &data) {
                    Some(profile) => report.profiles.push(profile),
                    None => report.skipped += 1,
                },
                // removed between listing and reading
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unreadable profile record");
                    report.skipped += 1;
                }
            }
        }

        report.profiles.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        report
    }

    /// Remove a profile; unknown ids are ignored
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.vault
            .delete(&id.to_string())
            .map_err(StoreError::StorageUnavailable)?;
        debug!(id = %id, "profile deleted");
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Profile> {
        match self.vault.get(&id.to_string()) {
            Ok(Some(data)) => decode(&id.to_string(), &data),
            Ok(None) => None,
            Err(e) => {
                warn!(id = %id, error = %e, "profile record unreadable");
                None
            }
        }
    }

    /// Overwrite the record for `id` with `updated`, keeping the id
    ///
    /// A single keyed write: if it fails the old record is still there.
    pub fn replace(&self, id: Uuid, updated: Profile) -> Result<Profile, StoreError> {
        let profile = Profile { id, ..updated };
        self.save(&profile)?;
        Ok(profile)
    }

    /// Find a profile by full id, unique id prefix, or unique label
    pub fn resolve(&self, query: &str) -> Result<Profile, LookupError> {
        let query = query.trim();
        let profiles = self.load_all();

        if let Ok(id) = Uuid::parse_str(query) {
            return profiles
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| LookupError::NotFound(query.to_string()));
        }

        let needle = query.to_lowercase();
        let by_label: Vec<_> = profiles
            .iter()
            .filter(|p| p.label.to_lowercase() == needle)
            .collect();
        let candidates: Vec<_> = if !by_label.is_empty() {
            by_label
        } else if needle.len() >= MIN_ID_PREFIX {
            profiles
                .iter()
                .filter(|p| p.id.simple().to_string().starts_with(&needle))
                .collect()
        } else {
            Vec::new()
        };

        match candidates.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(LookupError::NotFound(query.to_string())),
            many => Err(LookupError::Ambiguous {
                query: query.to_string(),
                count: many.len(),
            }),
        }
    }
}

fn decode(key: &str, data: &[u8]) -> Option<Profile> {
    match serde_json::from_slice::<Record>(data) {
        Ok(record) if record.version != RECORD_VERSION => {
            warn!(key, version = record.version, "skipping profile with unknown record version");
            None
        }
        Ok(record) if record.profile.id.to_string() != key => {
            warn!(key, "skipping profile stored under a foreign key");
            None
        }
        Ok(record) => Some(record.profile),
        Err(e) => {
            warn!(key, error = %e, "skipping undecodable profile record");
            None
        }
    }
}
