//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs` and coordinates:
//! - `crate::store` for saved profiles.
//! - `crate::switch` for activation and key generation.
//! - `crate::config` for what git currently reports.
//! - `crate::ui` for output and prompts.

use anstyle::AnsiColor;
use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{GitBackend, KeyLinkStatus};
use crate::doctor::run_doctor;
use crate::paths::Paths;
use crate::profile::Profile;
use crate::runner::SystemRunner;
use crate::state::{LockedState, State};
use crate::store::ProfileStore;
use crate::switch::SwitchEngine;
use crate::ui::Ui;
use crate::vault::FileVault;

/// Everything a command needs, wired together once per invocation
#[derive(Clone)]
pub struct App {
    pub paths: Paths,
    pub store: ProfileStore,
    pub engine: SwitchEngine,
}

impl App {
    /// Production wiring: file vault, real git, real ssh-keygen
    pub fn new(paths: Paths) -> Result<Self> {
        paths.ensure_dirs()?;

        let runner = Arc::new(SystemRunner);
        let backend = Arc::new(GitBackend::new(runner.clone(), paths.clone()));
        let store = ProfileStore::new(Arc::new(FileVault::new(&paths.vault_dir)));
        let engine = SwitchEngine::new(backend, runner, paths.clone());

        Ok(Self {
            paths,
            store,
            engine,
        })
    }

    pub fn from_parts(paths: Paths, store: ProfileStore, engine: SwitchEngine) -> Self {
        Self {
            paths,
            store,
            engine,
        }
    }

    /// Import the ambient git identity on first run
    ///
    /// Once the store has held a profile this never runs again, even if the
    /// user later deletes every profile.
    pub fn bootstrap(&self, ui: &Ui) -> Result<()> {
        let mut locked = LockedState::lock(&self.paths.state_file)?;
        if locked.state().bootstrapped {
            return Ok(());
        }

        if let Some(profile) = self.engine.import_ambient_profile_if_empty(&self.store)? {
            ui.info(format!(
                "Imported your current git identity as profile '{}'",
                profile.label
            ));
        }

        if !self.store.load_all().is_empty() {
            locked.update(|s| s.bootstrapped = true)?;
        }
        Ok(())
    }

    fn resolve(&self, query: &str) -> Result<Profile> {
        self.store.resolve(query).map_err(|e| {
            anyhow!("{}\nHint: Use 'gitswitch list' to see available profiles and their ids.", e)
        })
    }
}

/// Where the private key of a new profile comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Use an existing key at this path
    Path(String),
    /// Copy the OpenSSH private key in this file into ~/.ssh/id_rsa_<label>
    Import(PathBuf),
    /// Generate a fresh key pair
    Generate,
    /// ~/.ssh/id_rsa_<label>
    Default,
}

/// Inputs for `gitswitch add`
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub label: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub key: KeySource,
    pub activate: bool,
}

/// Inputs for `gitswitch edit`
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub label: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// New key; `None` keeps the current one
    pub key: Option<KeySource>,
}

impl EditOptions {
    fn is_empty(&self) -> bool {
        self.label.is_none() && self.name.is_none() && self.email.is_none() && self.key.is_none()
    }
}

/// List all saved profiles
pub fn list(app: &App, ui: &Ui) -> Result<()> {
    let profiles = app.store.load_all();

    if profiles.is_empty() {
        ui.warn("No profiles found.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!(
            "  {} add <label> --name <name> --email <email> --generate",
            ui.bold("gitswitch")
        ));
        return Ok(());
    }

    let current = app.engine.current();

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Id"),
        ui.header_cell("Label"),
        ui.header_cell("Name"),
        ui.header_cell("Email"),
        ui.header_cell("Key"),
    ]);

    for profile in &profiles {
        let active = profile.matches(&current, &app.paths);
        let label_cell = if active {
            ui.colored_cell(&profile.label, AnsiColor::Green)
        } else {
            ui.cell(&profile.label)
        };

        table.add_row(vec![
            ui.cell(ui.active_marker(active)),
            ui.cell(ui.dim(profile.short_id())),
            label_cell,
            ui.cell(&profile.name),
            ui.cell(&profile.email),
            ui.cell(&profile.ssh_key_path),
        ]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());

    Ok(())
}

/// Show the identity git is using right now
pub fn current(app: &App, ui: &Ui) -> Result<()> {
    let current = app.engine.current();
    let state = State::read(&app.paths.state_file).unwrap_or_default();

    ui.section("Current Identity");
    ui.newline();

    let mut table = ui.simple_table();
    let or_unset = |value: &str| {
        if value.is_empty() {
            ui.colored_cell("(not set)", AnsiColor::Yellow)
        } else {
            ui.header_cell(value)
        }
    };
    table.add_row(vec![ui.cell("Name:"), or_unset(&current.name)]);
    table.add_row(vec![ui.cell("Email:"), or_unset(&current.email)]);

    let status = KeyLinkStatus::detect(&app.paths.active_key);
    table.add_row(vec![
        ui.cell("SSH key:"),
        ui.key_link_cell(&status, &app.paths),
    ]);

    let profiles = app.store.load_all();
    match profiles.iter().find(|p| p.matches(&current, &app.paths)) {
        Some(profile) => table.add_row(vec![
            ui.cell("Profile:"),
            ui.colored_cell(
                format!("{} ({})", profile.label, profile.short_id()),
                AnsiColor::Green,
            ),
        ]),
        None => table.add_row(vec![ui.cell("Profile:"), ui.cell("(no saved profile matches)")]),
    };

    if let Some(updated) = &state.updated_at {
        table.add_row(vec![
            ui.cell("Last switched:"),
            ui.cell(updated.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    ui.println(table.to_string());
    Ok(())
}

/// Show a single profile and its public key
pub fn show(app: &App, query: &str, ui: &Ui) -> Result<()> {
    let profile = app.resolve(query)?;
    let active = profile.matches(&app.engine.current(), &app.paths);
    let key_path = profile.key_path(&app.paths);

    ui.section(format!("Profile: {}", profile.label));
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![ui.cell("Id:"), ui.cell(profile.id.to_string())]);
    table.add_row(vec![ui.cell("Name:"), ui.cell(&profile.name)]);
    table.add_row(vec![ui.cell("Email:"), ui.cell(&profile.email)]);
    table.add_row(vec![
        ui.cell("SSH key:"),
        if key_path.exists() {
            ui.cell(&profile.ssh_key_path)
        } else {
            ui.colored_cell(format!("{} (missing)", profile.ssh_key_path), AnsiColor::Red)
        },
    ]);
    table.add_row(vec![
        ui.cell("Status:"),
        if active {
            ui.colored_cell("active", AnsiColor::Green)
        } else {
            ui.cell("-")
        },
    ]);
    ui.println(table.to_string());
    ui.newline();

    ui.section("Public Key");
    match app.engine.public_key_for(&profile) {
        Some(public_key) => ui.println(public_key.trim_end()),
        None => {
            ui.println(ui.dim("Public key not found."));
            ui.println(format!(
                "Generate a new pair with: gitswitch keygen {} --email {}",
                profile.label, profile.email
            ));
        }
    }

    Ok(())
}

/// Add a new profile
pub async fn add(app: &App, opts: AddOptions, ui: &Ui) -> Result<Profile> {
    let label = opts.label.trim().to_string();
    if label.is_empty() {
        bail!("Profile label cannot be empty");
    }

    let name = match opts.name {
        Some(name) => name,
        None => prompt("Username (user.name):")?,
    };
    let email = match opts.email {
        Some(email) => email,
        None => prompt("Email (user.email):")?,
    };
    if name.trim().is_empty() || email.trim().is_empty() {
        bail!("Both name and email are required");
    }

    let (label, ssh_key_path) = key_for_profile(app, label, email.trim(), opts.key, ui).await?;

    let profile = Profile::new(label, name.trim(), email.trim(), ssh_key_path);
    app.store
        .save(&profile)
        .context("Failed to save profile")?;
    ui.ok(format!("Created profile '{}' ({})", profile.label, profile.short_id()));

    if opts.activate {
        app.engine.activate(&profile)?;
        ui.ok(format!("Active profile: {}", profile.label));
    } else {
        ui.println("To activate it:");
        ui.println(format!("  gitswitch use {}", profile.short_id()));
    }

    Ok(profile)
}

/// Settle where a profile's key lives, returning the label it ends up under
///
/// Generated and imported keys may take a suffixed label when
/// `id_rsa_<label>` is already taken.
async fn key_for_profile(
    app: &App,
    label: String,
    email: &str,
    source: KeySource,
    ui: &Ui,
) -> Result<(String, String)> {
    match source {
        KeySource::Path(path) => {
            let cwd = std::env::current_dir().context("Failed to read the current directory")?;
            Ok((label, absolute_key_path(&app.paths, &path, &cwd)))
        }
        KeySource::Default => {
            let path = app.paths.private_key_for(&label);
            if !path.exists() {
                ui.warn(format!(
                    "{} does not exist yet; the profile will point at it anyway",
                    app.paths.contract(&path)
                ));
            }
            let path = app.paths.contract(&path);
            Ok((label, path))
        }
        KeySource::Import(file) => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read key file: {}", file.display()))?;
            let installed = app.engine.install_private_key(&label, &contents)?;
            if installed.label != label {
                ui.info(format!(
                    "id_rsa_{} is taken; saved the key as id_rsa_{}",
                    label, installed.label
                ));
            }
            let path = app.paths.contract(&installed.private_key_path);
            Ok((installed.label, path))
        }
        KeySource::Generate => {
            let material = generate_with_spinner(app, &label, email, ui).await?;
            ui.newline();
            ui.section("Public Key");
            ui.println(material.public_key.trim_end());
            ui.newline();
            Ok((material.label, app.paths.contract(&material.private_key_path)))
        }
    }
}

/// `~`-form of a user supplied key path, relative paths taken from `cwd`
fn absolute_key_path(paths: &Paths, raw: &str, cwd: &Path) -> String {
    let expanded = paths.expand(raw.trim());
    if expanded.is_absolute() {
        paths.contract(&expanded)
    } else {
        paths.contract(&cwd.join(expanded))
    }
}

/// Switch to a profile
pub fn use_profile(app: &App, query: &str, ui: &Ui) -> Result<()> {
    let profile = app.resolve(query)?;
    let spinner = ui.spinner(format!("Switching to profile '{}'...", profile.label));

    match app.engine.activate(&profile) {
        Ok(()) => {
            ui.spinner_finish_ok(
                &spinner,
                format!("Active profile: {} <{}>", profile.name, profile.email),
            );
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch: {}", e));
            return Err(e.into());
        }
    }

    // confirm by reading the identity back
    if !profile.matches(&app.engine.current(), &app.paths) {
        ui.warn("git does not report the new identity; check 'gitswitch current'");
    } else if !profile.key_path(&app.paths).exists() {
        ui.warn(format!(
            "{} does not exist; ~/.ssh/id_rsa now points at a missing key",
            profile.ssh_key_path
        ));
    }

    Ok(())
}

/// Change fields of a profile, keeping its id
pub async fn edit(app: &App, query: &str, opts: EditOptions, ui: &Ui) -> Result<Profile> {
    if opts.is_empty() {
        bail!(
            "Nothing to change.\nHint: Pass at least one of --label, --name, --email, --key, --key-file, --generate."
        );
    }

    let existing = app.resolve(query)?;
    let was_active = existing.matches(&app.engine.current(), &app.paths);

    let email = opts.email.unwrap_or_else(|| existing.email.clone());
    let label = opts.label.unwrap_or_else(|| existing.label.clone());
    let (label, ssh_key_path) = match opts.key {
        Some(source) => key_for_profile(app, label, &email, source, ui).await?,
        None => (label, existing.ssh_key_path.clone()),
    };

    let updated = Profile {
        label,
        name: opts.name.unwrap_or_else(|| existing.name.clone()),
        email,
        ssh_key_path,
        ..existing.clone()
    };
    let updated = app
        .store
        .replace(existing.id, updated)
        .context("Failed to update profile")?;

    if was_active {
        app.engine.activate(&updated)?;
        ui.ok(format!("Updated profile '{}' (re-applied as active)", updated.label));
    } else {
        ui.ok(format!("Updated profile '{}'", updated.label));
    }

    Ok(updated)
}

/// Remove a profile
pub fn remove(app: &App, query: &str, ui: &Ui, force: bool) -> Result<()> {
    let profile = app.resolve(query)?;

    if !force {
        if profile.matches(&app.engine.current(), &app.paths) {
            bail!(
                "Cannot remove '{}' because it is the currently active profile.\nHint: Switch to another profile first, or pass --force.",
                profile.label
            );
        }

        let confirm = inquire::Confirm::new(&format!(
            "Are you sure you want to remove profile '{}'?",
            profile.label
        ))
        .with_default(false)
        .with_help_message("The key files in ~/.ssh are left untouched")
        .prompt()
        .context("Confirmation cancelled")?;

        if !confirm {
            ui.warn("Removal cancelled.");
            return Ok(());
        }
    }

    app.store
        .delete(profile.id)
        .context("Failed to remove profile")?;
    ui.ok(format!("Removed profile '{}'", profile.label));
    Ok(())
}

/// Generate a key pair, optionally saving it as a profile
pub async fn keygen(
    app: &App,
    label: &str,
    email: &str,
    name: Option<String>,
    ui: &Ui,
) -> Result<()> {
    let material = generate_with_spinner(app, label, email, ui).await?;

    ui.newline();
    ui.section("Public Key");
    ui.println(material.public_key.trim_end());
    ui.newline();
    ui.info(format!(
        "Private key: {}",
        app.paths.contract(&material.private_key_path)
    ));

    if let Some(name) = name {
        let profile = Profile::new(
            material.label.clone(),
            name,
            email,
            app.paths.contract(&material.private_key_path),
        );
        app.store.save(&profile).context("Failed to save profile")?;
        ui.ok(format!("Created profile '{}' ({})", profile.label, profile.short_id()));
    }

    Ok(())
}

async fn generate_with_spinner(
    app: &App,
    label: &str,
    email: &str,
    ui: &Ui,
) -> Result<crate::profile::KeyMaterial> {
    // spaces are legal but awkward in file names
    let base = label.trim().replace(' ', "_");
    let spinner = ui.spinner(format!("Generating 4096-bit RSA key for '{}'...", base));

    match app.engine.generate_key_pair(&base, email).await {
        Ok(material) => {
            ui.spinner_finish_ok(
                &spinner,
                format!("Generated {}", app.paths.contract(&material.private_key_path)),
            );
            Ok(material)
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Key generation failed: {}", e));
            Err(e).context("Hint: Make sure ssh-keygen is installed and ~/.ssh is writable.")
        }
    }
}

/// Print every git config entry with the file it came from
pub fn config(app: &App, ui: &Ui) -> Result<()> {
    let entries = app.engine.reader().read_all();

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("Key"),
        ui.header_cell("Value"),
        ui.header_cell("Origin"),
    ]);

    let mut count = 0;
    for entry in entries.iter() {
        table.add_row(vec![
            ui.cell(entry.key),
            ui.cell(entry.value),
            ui.cell(ui.dim(entry.origin)),
        ]);
        count += 1;
    }

    if count == 0 {
        ui.warn("git reported no configuration entries.");
        return Ok(());
    }

    ui.section("Git Configuration");
    ui.println(table.to_string());
    ui.info(format!("{} entries", count));
    Ok(())
}

/// Run diagnostics
pub fn doctor(app: &App, ui: &Ui) -> Result<()> {
    run_doctor(app, ui);
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    inquire::Text::new(message)
        .prompt()
        .with_context(|| format!("Prompt cancelled: {}", message))
}
