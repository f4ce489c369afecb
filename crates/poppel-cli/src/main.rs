//! Poppel CLI
//!
//! Command-line interface for inspecting and editing Poppel files.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use poppel_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "poppel")]
#[command(about = "Poppel - directory-backed hierarchical array storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output (overrides the configured log level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty file
    Init {
        /// Directory of the file to create
        file: PathBuf,
        /// Erase and recreate an existing file
        #[arg(long)]
        force: bool,
    },
    /// List every group and dataset
    #[command(alias = "ls")]
    Tree {
        file: PathBuf,
    },
    /// Show details of a group or dataset
    Info {
        file: PathBuf,
        /// Node path inside the file ("/" for the root)
        node: String,
    },
    /// Show the header of a standalone .npy file
    Header {
        npy_file: PathBuf,
    },
    /// Create a group and any missing parent groups
    Mkgroup {
        file: PathBuf,
        /// Group path inside the file
        path: String,
    },
    /// Delete a group or dataset and everything below it
    Rm {
        file: PathBuf,
        /// Node path inside the file
        path: String,
    },
    /// Show the attributes of a node
    Attrs {
        file: PathBuf,
        /// Node path inside the file (defaults to the root)
        node: Option<String>,
    },
    /// Replace the attributes of a node
    SetAttrs {
        file: PathBuf,
        /// Node path inside the file ("/" for the root)
        node: String,
        /// Attributes as a JSON object
        #[arg(value_name = "JSON")]
        attributes: String,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config, cli.verbose);
    debug!("Configuration from {:?}", Config::config_file_path());

    match cli.command {
        Commands::Init { file, force } => commands::init::init(&file, force, &config, &output),
        Commands::Tree { file } => commands::tree::tree(&file, &config, &output),
        Commands::Info { file, node } => commands::tree::info(&file, &node, &config, &output),
        Commands::Header { npy_file } => commands::header::show(&npy_file, &output),
        Commands::Mkgroup { file, path } => {
            commands::node::mkgroup(&file, &path, &config, &output)
        }
        Commands::Rm { file, path } => commands::node::rm(&file, &path, &config, &output),
        Commands::Attrs { file, node } => {
            commands::attrs::show(&file, node.as_deref(), &config, &output)
        }
        Commands::SetAttrs {
            file,
            node,
            attributes,
        } => commands::attrs::set(&file, &node, &attributes, &config, &output),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&config, &output),
        },
    }
}

/// Install the tracing subscriber for the poppel crates
///
/// Logs go to the configured log file when one is set, else to stderr.
fn init_logging(config: &Config, verbose: bool) {
    let log_level: &str = if verbose { "debug" } else { &config.log_level };
    let env_filter = EnvFilter::new(format!(
        "poppel_core={},poppel_cli={}",
        log_level, log_level
    ));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore the error if a subscriber is already installed
    match &config.log_file {
        Some(path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                    return;
                }
            };
            let _ = builder.with_ansi(false).with_writer(Mutex::new(log_file)).try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
