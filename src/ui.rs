//! UI module for gitswitch - styling, color detection, tables, spinners.
//!
//! # No-color detection (in priority order):
//! 1. `--no-color` CLI flag (highest priority)
//! 2. `NO_COLOR` environment variable (any value)
//! 3. `TERM=dumb` environment variable
//! 4. Non-TTY stdout

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::time::Duration;

use crate::backend::KeyLinkStatus;
use crate::paths::Paths;

/// Color mode for output
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Always emit ANSI colors
    Always,
    /// Emit colors only if TTY and not disabled
    #[default]
    Auto,
    /// Never emit ANSI colors
    Never,
}

/// UI context holding resolved display settings
#[derive(Debug, Clone)]
pub struct Ui {
    /// ANSI styling is emitted
    pub color_enabled: bool,
    /// Spinners need both a TTY and color
    pub spinner_enabled: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new(ColorMode::Auto, false)
    }
}

impl Ui {
    /// Resolve color and spinner support for this run.
    ///
    /// `--no-color` wins over everything, then `NO_COLOR`, then `TERM=dumb`;
    /// only after those does `mode` apply. Turning color off also switches
    /// anstream's global choice to `Never`.
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = Self::resolve_color(mode, force_no_color);
        let spinner_enabled = color_enabled && std::io::stdout().is_terminal();

        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled,
        }
    }

    fn resolve_color(mode: ColorMode, force_no_color: bool) -> bool {
        if force_no_color || std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
            return false;
        }

        match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    // -------------------------------------------------------------------------
    // Styled labels
    // -------------------------------------------------------------------------

    fn style_label(&self, color: AnsiColor) -> Style {
        if self.color_enabled {
            Style::new().fg_color(Some(Color::Ansi(color))).bold()
        } else {
            Style::new()
        }
    }

    /// `OK` line on stdout, label in green
    pub fn ok(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Green);
        println!("{label}OK{label:#} {}", msg.as_ref());
    }

    /// `WARN` line on stdout, label in yellow
    pub fn warn(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Yellow);
        println!("{label}WARN{label:#} {}", msg.as_ref());
    }

    /// Errors go to stderr
    pub fn err(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Red);
        eprintln!("{label}ERROR{label:#} {}", msg.as_ref());
    }

    /// `INFO` line on stdout, label in cyan
    pub fn info(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Cyan);
        println!("{label}INFO{label:#} {}", msg.as_ref());
    }

    /// Gray text for secondary details such as short ids
    pub fn dim(&self, s: impl AsRef<str>) -> String {
        self.styled(s, Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
    }

    /// Bold text; returned unchanged without color
    pub fn bold(&self, s: impl AsRef<str>) -> String {
        self.styled(s, Style::new().bold())
    }

    /// Foreground-colored text for inline use
    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        self.styled(s, Style::new().fg_color(Some(Color::Ansi(color))))
    }

    fn styled(&self, s: impl AsRef<str>, style: Style) -> String {
        if self.color_enabled {
            format!("{style}{}{style:#}", s.as_ref())
        } else {
            s.as_ref().to_string()
        }
    }

    // -------------------------------------------------------------------------
    // Status icons (with fallback for no-color)
    // -------------------------------------------------------------------------

    /// Check mark, or `[OK]` in plain mode
    pub fn icon_ok(&self) -> &'static str {
        if self.color_enabled { "✓" } else { "[OK]" }
    }

    pub fn icon_warn(&self) -> &'static str {
        if self.color_enabled { "⚠" } else { "[!]" }
    }

    pub fn icon_err(&self) -> &'static str {
        if self.color_enabled { "✗" } else { "[X]" }
    }

    pub fn icon_info(&self) -> &'static str {
        if self.color_enabled { "•" } else { "-" }
    }

    /// Marker shown next to the profile that is currently in effect
    pub fn active_marker(&self, active: bool) -> &'static str {
        match (active, self.color_enabled) {
            (true, true) => "●",
            (true, false) => "*",
            (false, _) => " ",
        }
    }

    // -------------------------------------------------------------------------
    // Tables (comfy-table)
    // -------------------------------------------------------------------------

    /// Bordered table; ASCII markdown borders when color is off
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);

        if self.color_enabled {
            table.load_preset(presets::UTF8_FULL_CONDENSED);
        } else {
            table.load_preset(presets::ASCII_MARKDOWN);
        }

        table
    }

    /// Borderless table for lists and key/value blocks
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(presets::NOTHING);
        table
    }

    /// Plain table cell
    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    /// Header cell, bold when color is on
    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.add_attribute(Attribute::Bold)
        } else {
            cell
        }
    }

    /// Colored via comfy-table so column widths stay correct
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.fg(ansi_to_comfy_color(color))
        } else {
            cell
        }
    }

    /// Describe the ~/.ssh/id_rsa link
    pub fn key_link_cell(&self, status: &KeyLinkStatus, paths: &Paths) -> Cell {
        match status {
            KeyLinkStatus::Missing => self.colored_cell("missing", AnsiColor::Yellow),
            KeyLinkStatus::RegularFile => self.cell("regular file (not managed)"),
            KeyLinkStatus::Symlink { target } => {
                self.cell(format!("symlink → {}", paths.contract(target)))
            }
            KeyLinkStatus::BrokenSymlink { target } => self.colored_cell(
                format!("dangling symlink → {}", paths.contract(target)),
                AnsiColor::Red,
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Spinners (indicatif)
    // -------------------------------------------------------------------------

    /// Spinner for work that waits on an external program; hidden when disabled
    pub fn spinner(&self, message: impl Into<Cow<'static, str>>) -> ProgressBar {
        if !self.spinner_enabled {
            let pb = ProgressBar::hidden();
            pb.set_message(message);
            return pb;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Stop `pb` and leave a success line behind
    pub fn spinner_finish_ok(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.spinner_finish(pb, msg.into(), true);
    }

    /// Stop `pb` and leave a failure line behind (stderr when spinners are off)
    pub fn spinner_finish_err(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.spinner_finish(pb, msg.into(), false);
    }

    fn spinner_finish(&self, pb: &ProgressBar, msg: Cow<'static, str>, success: bool) {
        if !self.spinner_enabled {
            pb.finish_and_clear();
            if success { self.ok(msg) } else { self.err(msg) }
            return;
        }

        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            pb.set_style(style);
        }
        let icon = if success {
            self.colored("✓", AnsiColor::Green)
        } else {
            self.colored("✗", AnsiColor::Red)
        };
        pb.finish_with_message(format!("{} {}", icon, msg));
    }

    // -------------------------------------------------------------------------
    // Plain output
    // -------------------------------------------------------------------------

    /// Write a line to stdout as is
    pub fn println(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    pub fn newline(&self) {
        println!();
    }

    /// Bold section title
    pub fn section(&self, title: impl AsRef<str>) {
        println!("{}", self.bold(title));
    }
}

fn ansi_to_comfy_color(color: AnsiColor) -> comfy_table::Color {
    match color {
        AnsiColor::Black => comfy_table::Color::Black,
        AnsiColor::Red | AnsiColor::BrightRed => comfy_table::Color::Red,
        AnsiColor::Green | AnsiColor::BrightGreen => comfy_table::Color::Green,
        AnsiColor::Yellow | AnsiColor::BrightYellow => comfy_table::Color::Yellow,
        AnsiColor::Blue | AnsiColor::BrightBlue => comfy_table::Color::Blue,
        AnsiColor::Magenta | AnsiColor::BrightMagenta => comfy_table::Color::Magenta,
        AnsiColor::Cyan | AnsiColor::BrightCyan => comfy_table::Color::Cyan,
        AnsiColor::White | AnsiColor::BrightWhite => comfy_table::Color::White,
        AnsiColor::BrightBlack => comfy_table::Color::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_ui_force_no_color() {
        let ui = Ui::new(ColorMode::Always, true);
        assert!(!ui.color_enabled);
        assert!(!ui.spinner_enabled);
    }

    #[test]
    fn test_plain_output_without_color() {
        let ui = Ui::new(ColorMode::Never, false);
        assert_eq!(ui.icon_ok(), "[OK]");
        assert_eq!(ui.icon_err(), "[X]");
        assert_eq!(ui.active_marker(true), "*");
        assert_eq!(ui.active_marker(false), " ");
        assert_eq!(ui.dim("test"), "test");
        assert_eq!(ui.bold("test"), "test");
    }

    #[test]
    fn test_key_link_cell() {
        let ui = Ui::new(ColorMode::Never, false);
        let paths = Paths::from_home(Path::new("/home/a"));
        let status = KeyLinkStatus::Symlink {
            target: PathBuf::from("/home/a/.ssh/id_rsa_work"),
        };
        assert_eq!(
            ui.key_link_cell(&status, &paths).content(),
            "symlink → ~/.ssh/id_rsa_work"
        );
    }

    #[test]
    fn test_spinner_disabled() {
        let ui = Ui::new(ColorMode::Never, false);
        let pb = ui.spinner("generating");
        ui.spinner_finish_ok(&pb, "done");
    }
}
