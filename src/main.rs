use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gitswitch::{
    commands::{self, AddOptions, App, EditOptions, KeySource},
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "gitswitch")]
#[command(about = "Git identity switcher - manage multiple git users and SSH keys")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Log debug details to stderr (overridden by GITSWITCH_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved profiles
    List,

    /// Show the identity git is using right now
    Current,

    /// Show a profile and its public key
    Show {
        /// Profile label or id
        profile: String,
    },

    /// Add a new profile
    Add {
        /// Short label for the profile, e.g. work
        label: String,

        /// Value for user.name (prompted when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Value for user.email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Use an existing private key at this path
        #[arg(long, value_name = "PATH", conflicts_with_all = ["key_file", "generate"])]
        key: Option<String>,

        /// Copy an OpenSSH private key from this file into ~/.ssh/id_rsa_<label>
        #[arg(long, value_name = "FILE", conflicts_with = "generate")]
        key_file: Option<PathBuf>,

        /// Generate a new 4096-bit RSA key pair
        #[arg(long)]
        generate: bool,

        /// Switch to the profile right away
        #[arg(long = "use")]
        activate: bool,
    },

    /// Switch to a profile (activate it)
    Use {
        /// Profile label or id
        profile: String,
    },

    /// Change fields of a profile
    Edit {
        /// Profile label or id
        profile: String,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Point the profile at an existing private key
        #[arg(long, value_name = "PATH", conflicts_with_all = ["key_file", "generate"])]
        key: Option<String>,

        /// Copy an OpenSSH private key from this file into ~/.ssh
        #[arg(long, value_name = "FILE", conflicts_with = "generate")]
        key_file: Option<PathBuf>,

        /// Generate a new 4096-bit RSA key pair for the profile
        #[arg(long)]
        generate: bool,
    },

    /// Remove a profile (key files are kept)
    Remove {
        /// Profile label or id
        profile: String,

        /// Skip confirmation and allow removing the active profile
        #[arg(short, long)]
        force: bool,
    },

    /// Generate a new SSH key pair
    Keygen {
        /// Label the key files are named after
        label: String,

        /// Comment embedded in the key, usually your email
        #[arg(long)]
        email: String,

        /// Also save a profile with this user.name
        #[arg(long)]
        name: Option<String>,
    },

    /// List every git config entry with its origin file
    Config,

    /// Run diagnostics on the gitswitch setup
    Doctor,

    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

/// Key flags shared by `add` and `edit`; clap keeps them mutually exclusive
fn key_source(key: Option<String>, key_file: Option<PathBuf>, generate: bool) -> Option<KeySource> {
    match (key, key_file, generate) {
        (Some(path), _, _) => Some(KeySource::Path(path)),
        (None, Some(file), _) => Some(KeySource::Import(file)),
        (None, None, true) => Some(KeySource::Generate),
        (None, None, false) => None,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "gitswitch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GITSWITCH_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "gitswitch", &mut std::io::stdout());
        return Ok(());
    }

    let ui = Ui::new(cli.color, cli.no_color);
    let app = App::new(Paths::new()?)?;

    if !matches!(cli.command, Commands::Doctor | Commands::Config) {
        app.bootstrap(&ui)?;
    }

    match cli.command {
        Commands::List => commands::list(&app, &ui),
        Commands::Current => commands::current(&app, &ui),
        Commands::Show { profile } => commands::show(&app, &profile, &ui),
        Commands::Add {
            label,
            name,
            email,
            key,
            key_file,
            generate,
            activate,
        } => {
            let opts = AddOptions {
                label,
                name,
                email,
                key: key_source(key, key_file, generate).unwrap_or(KeySource::Default),
                activate,
            };
            commands::add(&app, opts, &ui).await.map(|_| ())
        }
        Commands::Use { profile } => commands::use_profile(&app, &profile, &ui),
        Commands::Edit {
            profile,
            label,
            name,
            email,
            key,
            key_file,
            generate,
        } => {
            let opts = EditOptions {
                label,
                name,
                email,
                key: key_source(key, key_file, generate),
            };
            commands::edit(&app, &profile, opts, &ui).await.map(|_| ())
        }
        Commands::Remove { profile, force } => commands::remove(&app, &profile, &ui, force),
        Commands::Keygen { label, email, name } => {
            commands::keygen(&app, &label, &email, name, &ui).await
        }
        Commands::Config => commands::config(&app, &ui),
        Commands::Doctor => commands::doctor(&app, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
