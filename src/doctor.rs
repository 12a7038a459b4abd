//! Diagnostic tool for gitswitch.
//!
//! Implements `gitswitch doctor`, which checks the system for common issues:
//! - Existence and permissions of ~/.gitswitch and ~/.ssh.
//! - State of the ~/.ssh/id_rsa link.
//! - Readability of saved profiles and their keys.
//! - Availability of git and ssh-keygen.

use anstyle::AnsiColor;
use std::path::Path;

use crate::backend::KeyLinkStatus;
use crate::commands::App;
use crate::state::State;
use crate::ui::Ui;

/// Run the doctor diagnostics
pub fn run_doctor(app: &App, ui: &Ui) {
    let paths = &app.paths;

    ui.section("gitswitch Doctor");
    ui.newline();

    // 1. Directories
    check_step(ui, "Directories", || {
        let mut ok = true;
        for (what, dir) in [("Base", &paths.base_dir), ("Vault", &paths.vault_dir)] {
            if dir.exists() {
                ui.println(format!("  {} {} directory exists: {}", ui.icon_ok(), what, dir.display()));
                ok &= check_private(ui, dir);
            } else {
                ui.println(format!("  {} {} directory missing: {}", ui.icon_err(), what, dir.display()));
                ok = false;
            }
        }

        if paths.ssh_dir.exists() {
            ui.println(format!("  {} SSH directory exists: {}", ui.icon_ok(), paths.ssh_dir.display()));
        } else {
            // created on first key generation
            ui.println(format!("  {} SSH directory missing: {}", ui.icon_warn(), paths.ssh_dir.display()));
        }
        ok
    });

    // 2. State
    check_step(ui, "State File", || match State::read(&paths.state_file) {
        Ok(state) => {
            ui.println(format!("  {} State file readable", ui.icon_ok()));
            match state.last_activated {
                Some(id) if app.store.get(id).is_some() => {
                    ui.println(format!("  {} Last activated profile: {}", ui.icon_info(), id));
                }
                Some(id) => {
                    ui.println(format!("  {} Last activated profile {} no longer exists", ui.icon_warn(), id));
                }
                None => ui.println(format!("  {} No profile activated yet", ui.icon_info())),
            }
            true
        }
        Err(e) => {
            ui.println(format!("  {} State file corrupt: {}", ui.icon_err(), e));
            false
        }
    });

    // 3. Active key link
    check_step(ui, "Active SSH Key", || {
        match KeyLinkStatus::detect(&paths.active_key) {
            KeyLinkStatus::Missing => {
                ui.println(format!("  {} ~/.ssh/id_rsa is missing", ui.icon_warn()));
                true
            }
            KeyLinkStatus::RegularFile => {
                ui.println(format!(
                    "  {} ~/.ssh/id_rsa is a regular file; it will be backed up on the next switch",
                    ui.icon_info()
                ));
                true
            }
            KeyLinkStatus::Symlink { target } => {
                ui.println(format!("  {} Symlink points to: {}", ui.icon_ok(), paths.contract(&target)));
                true
            }
            KeyLinkStatus::BrokenSymlink { target } => {
                ui.println(format!(
                    "  {} Dangling symlink pointing to: {}",
                    ui.icon_err(),
                    paths.contract(&target)
                ));
                false
            }
        }
    });

    // 4. Profiles
    check_step(ui, "Profiles", || {
        let report = app.store.load_report();
        let mut all_valid = report.skipped == 0;

        if report.skipped > 0 {
            ui.println(format!(
                "  {} {} unreadable record(s) in {}",
                ui.icon_err(),
                report.skipped,
                paths.vault_dir.display()
            ));
        }
        if report.profiles.is_empty() {
            ui.println(format!("  {} No profiles found", ui.icon_warn()));
            return all_valid;
        }

        let current = app.engine.current();
        ui.println(format!("  Found {} profiles:", report.profiles.len()));
        for profile in &report.profiles {
            let key = profile.key_path(paths);
            let active = if profile.matches(&current, paths) { " (active)" } else { "" };

            if key.exists() {
                ui.println(format!("    {} {}{}", ui.icon_ok(), profile.label, active));
                all_valid &= check_private(ui, &key);
            } else {
                ui.println(format!(
                    "    {} {}{} (key missing: {})",
                    ui.icon_warn(),
                    profile.label,
                    active,
                    profile.ssh_key_path
                ));
            }
        }
        all_valid
    });

    // 5. Tools
    check_step(ui, "Tools", || {
        let mut ok = true;
        for tool in ["git", "ssh-keygen"] {
            if find_in_path(tool) {
                ui.println(format!("  {} {} found", ui.icon_ok(), tool));
            } else {
                ui.println(format!("  {} {} not found in PATH", ui.icon_err(), tool));
                ok = false;
            }
        }
        ok
    });
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}

/// Warn when group/other can read `path`
#[cfg(unix)]
fn check_private(ui: &Ui, path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) if meta.permissions().mode() & 0o077 != 0 => {
            ui.println(format!(
                "      {} {} is accessible by other users (mode {:o})",
                ui.icon_warn(),
                path.display(),
                meta.permissions().mode() & 0o777
            ));
            false
        }
        _ => true,
    }
}

#[cfg(not(unix))]
fn check_private(_ui: &Ui, _path: &Path) -> bool {
    true
}

fn find_in_path(program: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|path| {
        std::env::split_paths(&path).any(|dir| {
            let candidate = dir.join(program);
            candidate.is_file() || candidate.with_extension("exe").is_file()
        })
    })
}
