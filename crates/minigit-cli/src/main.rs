//! Minigit CLI - a small git-compatible version control tool.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod http;
mod settings;

use commands::{CatMode, DiffFormat, HashKind, ListFormat};
use error::Result;
use settings::Settings;

/// Minigit - git-compatible objects, diffs and smart-HTTP clone
#[derive(Parser, Debug)]
#[command(name = "minigit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show an object's content, type or size
    CatFile(CatFileArgs),

    /// Compute an object digest, optionally writing it to the store
    HashObject {
        /// File or directory to hash
        path: PathBuf,
        /// Kind of object to produce
        #[arg(short = 't', long = "type", value_enum, default_value_t = HashKind::Blob)]
        kind: HashKind,
        /// Write the object(s) into the store
        #[arg(short, long)]
        write: bool,
    },

    /// List the entries of a tree
    LsTree {
        /// Tree or commit
        tree_ish: String,
        /// Show only subdirectories
        #[arg(short = 't', short_alias = 'd')]
        dirs_only: bool,
        /// Show only names
        #[arg(long, conflicts_with = "hash_only")]
        name_only: bool,
        /// Show only digests
        #[arg(long)]
        hash_only: bool,
    },

    /// Store the working tree and print its tree digest
    WriteTree {
        /// Snapshot this subdirectory instead
        #[arg(long)]
        prefix: Option<PathBuf>,
    },

    /// Record the working tree as a new commit on main
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Show commit history
    Log,

    /// Compare a commit with the working tree
    Diff {
        /// Commit to compare against (default: HEAD)
        commit: Option<String>,
        /// Show only changed paths
        #[arg(long, conflicts_with = "compact_summary")]
        name_only: bool,
        /// Show a per-file change summary
        #[arg(long)]
        compact_summary: bool,
    },

    /// Clone a repository over smart HTTP
    Clone {
        /// Repository URL
        url: String,
        /// Destination directory
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["pretty", "kind", "size"])))]
struct CatFileArgs {
    /// Pretty-print the content
    #[arg(short = 'p')]
    pretty: bool,
    /// Show the object type
    #[arg(short = 't')]
    kind: bool,
    /// Show the payload size
    #[arg(short = 's')]
    size: bool,
    /// Object to show
    object: String,
}

impl CatFileArgs {
    fn mode(&self) -> CatMode {
        if self.kind {
            CatMode::Type
        } else if self.size {
            CatMode::Size
        } else {
            CatMode::Pretty
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("minigit={log_level},minigit_storage={log_level},minigit_diff={log_level},minigit_transfer={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let settings = Settings::load()?;
    let cwd = std::env::current_dir()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Init { path } => {
            let dir = path.map_or_else(|| cwd.clone(), |p| cwd.join(p));
            commands::init(&dir, &mut out)?;
        }
        Commands::CatFile(args) => commands::cat_file(&cwd, &args.object, args.mode(), &mut out)?,
        Commands::HashObject { path, kind, write } => {
            commands::hash_object(&cwd, &path, kind, write, &settings, &mut out)?;
        }
        Commands::LsTree {
            tree_ish,
            dirs_only,
            name_only,
            hash_only,
        } => {
            let format = if name_only {
                ListFormat::NameOnly
            } else if hash_only {
                ListFormat::HashOnly
            } else {
                ListFormat::Full
            };
            commands::ls_tree(&cwd, &tree_ish, dirs_only, format, &mut out)?;
        }
        Commands::WriteTree { prefix } => {
            commands::write_tree(&cwd, prefix.as_deref(), &settings, &mut out)?;
        }
        Commands::Commit { message } => commands::commit(&cwd, &message, &settings, &mut out)?,
        Commands::Log => commands::log(&cwd, &mut out)?,
        Commands::Diff {
            commit,
            name_only,
            compact_summary,
        } => {
            let format = if name_only {
                DiffFormat::NameOnly
            } else if compact_summary {
                DiffFormat::CompactSummary
            } else {
                DiffFormat::Patch
            };
            commands::diff(&cwd, commit.as_deref(), format, &settings, &mut out)?;
        }
        Commands::Clone { url, dir } => {
            commands::clone(&cwd, &url, dir.as_deref(), &settings, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
