#![deny(clippy::mod_module_files)]
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use minigit::{Config, ObjectId};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "minigit")]
#[command(version, about = "A small Git: loose objects, trees, commits and clone over smart HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run as if started in PATH
    #[arg(short = 'C', global = true, value_name = "PATH")]
    directory: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty repository
    Init {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Show the type, size or contents of an object
    #[command(name = "cat-file")]
    #[command(group(ArgGroup::new("mode").required(true).args(["pretty", "kind", "size"])))]
    CatFile {
        /// Pretty-print the object's contents
        #[arg(short = 'p')]
        pretty: bool,
        /// Show the object's type
        #[arg(short = 't')]
        kind: bool,
        /// Show the object's size
        #[arg(short = 's')]
        size: bool,
        object: String,
    },

    /// Compute a blob id for a file, optionally storing it
    #[command(name = "hash-object")]
    HashObject {
        /// Write the blob into the object store
        #[arg(short = 'w')]
        write: bool,
        file: PathBuf,
    },

    /// List the entries of a tree (or of a commit's root tree)
    #[command(name = "ls-tree")]
    LsTree {
        #[arg(long)]
        name_only: bool,
        object: String,
    },

    /// Store the working directory as tree objects and print the root id
    #[command(name = "write-tree")]
    WriteTree,

    /// Create a commit object from a tree
    #[command(name = "commit-tree")]
    CommitTree {
        tree: ObjectId,
        #[arg(short = 'p', value_name = "PARENT")]
        parents: Vec<ObjectId>,
        #[arg(short = 'm', value_name = "MESSAGE")]
        message: String,
    },

    /// Clone a repository over smart HTTP
    Clone {
        url: String,
        directory: Option<PathBuf>,
    },

    /// Show first-parent history
    Log { object: Option<String> },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "minigit=debug" } else { "minigit=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("minigit: {}", describe(&e));
        std::process::exit(1);
    }
}

/// The error and its causes on one line, skipping causes a message already
/// spells out
fn describe(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
    }
    message
}

fn run(cli: Cli) -> Result<()> {
    let work_dir = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let stdout = io::stdout();
    let mut output = stdout.lock();

    match cli.command {
        Commands::Init { path } => {
            let target = path.map(|p| work_dir.join(p)).unwrap_or(work_dir);
            commands::init::handle(&target, &mut output)?;
        }
        Commands::CatFile {
            pretty,
            kind,
            size,
            object,
        } => {
            let mode = match (pretty, kind, size) {
                (true, _, _) => commands::cat_file::Mode::Pretty,
                (_, true, _) => commands::cat_file::Mode::Kind,
                _ => commands::cat_file::Mode::Size,
            };
            let repo = commands::open_repository(&work_dir)?;
            commands::cat_file::handle(&repo, &object, mode, &mut output)?;
        }
        Commands::HashObject { write, file } => {
            let file = work_dir.join(file);
            if write {
                let repo = commands::open_repository(&work_dir)?;
                commands::hash_object::handle(Some(&repo), &file, &mut output)?;
            } else {
                commands::hash_object::handle(None, &file, &mut output)?;
            }
        }
        Commands::LsTree { name_only, object } => {
            let repo = commands::open_repository(&work_dir)?;
            commands::ls_tree::handle(&repo, &object, name_only, &mut output)?;
        }
        Commands::WriteTree => {
            let repo = commands::open_repository(&work_dir)?;
            commands::write_tree::handle(&repo, &mut output)?;
        }
        Commands::CommitTree {
            tree,
            parents,
            message,
        } => {
            let config = Config::load()?;
            let repo = commands::open_repository(&work_dir)?;
            commands::commit_tree::handle(&repo, &config, &tree, &parents, &message, &mut output)?;
        }
        Commands::Clone { url, directory } => {
            let config = Config::load()?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(commands::clone::handle(
                &config,
                &url,
                directory.map(|d| work_dir.join(d)),
                &work_dir,
                &mut output,
            ))?;
        }
        Commands::Log { object } => {
            let repo = commands::open_repository(&work_dir)?;
            commands::log::handle(&repo, object.as_deref(), &mut output)?;
        }
    }

    output.flush()?;
    Ok(())
}
