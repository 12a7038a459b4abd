//! Reading the active git identity.
//!
//! Parsing is a single pass over `key=value` lines: each line is split on the
//! first `=`, key and value are trimmed, and the first occurrence of a key wins.
//! This covers both `git config --list` output and hand-formatted variants such
//! as `user.name = Alice`.

use std::sync::Arc;

use crate::backend::IdentityBackend;
use crate::paths::Paths;
use crate::profile::{CurrentIdentity, Profile};

/// Label given to the profile synthesized from the ambient git identity
pub const AMBIENT_LABEL: &str = "default";

const NAME_KEY: &str = "user.name";
const EMAIL_KEY: &str = "user.email";

/// Split a config line into trimmed key and value
///
/// Lines without `=` carry no value and yield `None`.
pub fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Extract `(user.name, user.email)` from config listing text
///
/// Missing keys come back as empty strings.
pub fn parse_identity(text: &str) -> (String, String) {
    let mut name: Option<&str> = None;
    let mut email: Option<&str> = None;

    for (key, value) in text.lines().filter_map(split_entry) {
        match key {
            NAME_KEY if name.is_none() => name = Some(value),
            EMAIL_KEY if email.is_none() => email = Some(value),
            _ => {}
        }
    }

    (
        name.unwrap_or_default().to_string(),
        email.unwrap_or_default().to_string(),
    )
}

/// One configuration entry and the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub origin: String,
}

/// Parse a line of `git config --list --show-origin` output
///
/// The origin and the entry are separated by a tab; `file:` origins are
/// reduced to their path.
pub fn parse_origin_line(line: &str) -> Option<ConfigEntry> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return None;
    }

    let (origin, entry) = match line.split_once('\t') {
        Some((origin, entry)) => (normalize_origin(origin), entry),
        None => (String::new(), line),
    };

    let (key, value) = match entry.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        // valueless boolean keys are listed bare
        None => (entry.trim(), ""),
    };
    if key.is_empty() {
        return None;
    }

    Some(ConfigEntry {
        key: key.to_string(),
        value: value.to_string(),
        origin,
    })
}

fn normalize_origin(origin: &str) -> String {
    let origin = origin.strip_prefix("file:").unwrap_or(origin);
    origin.trim_matches('"').to_string()
}

/// Every configuration entry across system, global and local scope
///
/// Holds the captured listing; [`ConfigEntries::iter`] parses lazily and can
/// be called again to restart.
#[derive(Debug, Clone, Default)]
pub struct ConfigEntries {
    listing: String,
}

impl ConfigEntries {
    pub fn new(listing: String) -> Self {
        Self { listing }
    }

    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.listing.lines().filter_map(parse_origin_line)
    }
}

/// Queries the identity backend for what is active right now
#[derive(Clone)]
pub struct ConfigReader {
    backend: Arc<dyn IdentityBackend>,
    paths: Paths,
}

impl ConfigReader {
    pub fn new(backend: Arc<dyn IdentityBackend>, paths: Paths) -> Self {
        Self { backend, paths }
    }

    /// Fresh snapshot of the active identity; never fails
    pub fn read_current(&self) -> CurrentIdentity {
        self.backend.get_active()
    }

    pub fn read_all(&self) -> ConfigEntries {
        ConfigEntries::new(self.backend.config_listing())
    }

    /// A profile labeled `default` mirroring the active identity
    ///
    /// Returns `None` unless both name and email are set.
    pub fn extract_ambient_profile(&self) -> Option<Profile> {
        let current = self.read_current();
        if !current.is_configured() {
            return None;
        }

        let key_path = current
            .resolved_key_path
            .as_deref()
            .unwrap_or(&self.paths.active_key);

        Some(Profile::new(
            AMBIENT_LABEL,
            current.name,
            current.email,
            self.paths.contract(key_path),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryBackend;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_parse_identity() {
        let (name, email) = parse_identity("user.name=Alice\nuser.email=alice@example.com\n");
        assert_eq!(name, "Alice");
        assert_eq!(email, "alice@example.com");
    }

    #[test]
    fn test_parse_identity_alternate_spacing() {
        let text = "core.editor=vim\nuser.name = Alice\nuser.email =  alice@example.com \n";
        let (name, email) = parse_identity(text);
        assert_eq!(name, "Alice");
        assert_eq!(email, "alice@example.com");
    }

    #[test]
    fn test_parse_identity_first_match_wins() {
        let text = "user.name=First\nuser.name=Second\nuser.email=a@b.c\n";
        assert_eq!(parse_identity(text).0, "First");
    }

    #[test]
    fn test_parse_identity_missing_fields() {
        let (name, email) = parse_identity("core.bare\ncore.autocrlf=input\n");
        assert!(name.is_empty());
        assert!(email.is_empty());
    }

    #[test]
    fn test_parse_identity_keeps_equals_in_value() {
        let (name, _) = parse_identity("user.name=A=B\n");
        assert_eq!(name, "A=B");
    }

    #[test]
    fn test_parse_origin_line() {
        let entry = parse_origin_line("file:/home/a/.gitconfig\tuser.name=Alice").unwrap();
        assert_eq!(
            entry,
            ConfigEntry {
                key: "user.name".into(),
                value: "Alice".into(),
                origin: "/home/a/.gitconfig".into(),
            }
        );

        let quoted = parse_origin_line("file:\"/srv/my repo/.git/config\"\tcore.bare=false").unwrap();
        assert_eq!(quoted.origin, "/srv/my repo/.git/config");

        let bare = parse_origin_line("command line:\tcore.quiet").unwrap();
        assert_eq!(bare.origin, "command line:");
        assert_eq!(bare.value, "");

        assert!(parse_origin_line("").is_none());
    }

    #[test]
    fn test_config_entries_restartable() {
        let entries = ConfigEntries::new(
            "file:/etc/gitconfig\tcore.pager=less\nfile:/h/.gitconfig\tuser.name=A\n".to_string(),
        );
        let first: Vec<_> = entries.iter().collect();
        let second: Vec<_> = entries.iter().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[0].origin, "/etc/gitconfig");
    }

    #[test]
    fn test_extract_ambient_profile() {
        let paths = Paths::from_home(Path::new("/home/bob"));
        let backend = MemoryBackend::with_identity(
            "Bob",
            "bob@x.com",
            Some(PathBuf::from("/home/bob/.ssh/id_rsa_personal")),
        );
        let reader = ConfigReader::new(Arc::new(backend), paths);

        let profile = reader.extract_ambient_profile().unwrap();
        assert_eq!(profile.label, AMBIENT_LABEL);
        assert_eq!(profile.name, "Bob");
        assert_eq!(profile.email, "bob@x.com");
        assert_eq!(profile.ssh_key_path, "~/.ssh/id_rsa_personal");
    }

    #[test]
    fn test_extract_ambient_profile_falls_back_to_default_key() {
        let paths = Paths::from_home(Path::new("/home/bob"));
        let backend = MemoryBackend::with_identity("Bob", "bob@x.com", None);
        let reader = ConfigReader::new(Arc::new(backend), paths);

        let profile = reader.extract_ambient_profile().unwrap();
        assert_eq!(profile.ssh_key_path, "~/.ssh/id_rsa");
    }

    #[test]
    fn test_extract_ambient_profile_requires_name_and_email() {
        let paths = Paths::from_home(Path::new("/home/bob"));
        let backend = MemoryBackend::with_identity("Bob", "", None);
        let reader = ConfigReader::new(Arc::new(backend), paths);
        assert!(reader.extract_ambient_profile().is_none());
    }
}
