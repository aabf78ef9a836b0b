use std::path::PathBuf;

use clap::{Parser, Subcommand};
use disk_analyzer::config::Config;
use disk_analyzer::model::Priority;
use disk_analyzer::output::Format;
use disk_analyzer::{build_info, commands, logging};

#[derive(Parser)]
#[command(
    name = "da",
    version = build_info::long_version(),
    about = "Background disk usage analysis tasks"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    format: Format,
    /// Shorthand for --format json
    #[arg(long, global = true, hide = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start analyzing a directory in the background
    Add {
        /// Directory to analyze
        path: String,
        /// Scheduling priority: 1 (low), 2 (normal) or 3 (high)
        #[arg(default_value = "2")]
        priority: Priority,
    },
    /// Pause a running analysis
    Suspend {
        /// Task ID
        id: u32,
    },
    /// Continue a suspended analysis
    Resume {
        /// Task ID
        id: u32,
    },
    /// Stop an analysis and forget it
    Remove {
        /// Task ID
        id: u32,
    },
    /// List tracked tasks
    List,
    /// Show a task's status record
    Info {
        /// Task ID
        id: u32,
    },
    /// Print the report of a finished analysis
    Print {
        /// Task ID
        id: u32,
    },
    /// Print the size of a path without walking it
    Check {
        /// Path to measure
        path: PathBuf,
    },
    /// Run an analysis in the foreground (spawned by `add`)
    #[command(hide = true)]
    Worker {
        path: PathBuf,
        #[arg(long, default_value = "2")]
        priority: Priority,
    },
}

fn run(cli: Cli, format: Format) -> disk_analyzer::error::Result<()> {
    let config = Config::from_env()?;
    match cli.command {
        Commands::Add { path, priority } => {
            commands::add::run(&config, &path, priority, format)?;
        }
        Commands::Suspend { id } => {
            commands::lifecycle::suspend(&config, id, format)?;
        }
        Commands::Resume { id } => {
            commands::lifecycle::resume(&config, id, format)?;
        }
        Commands::Remove { id } => {
            commands::remove::run(&config, id, format)?;
        }
        Commands::List => {
            commands::list::run(&config, format)?;
        }
        Commands::Info { id } => {
            commands::info::run(&config, id, format)?;
        }
        Commands::Print { id } => {
            commands::info::print(&config, id, format)?;
        }
        Commands::Check { path } => {
            commands::check::run(&path, format)?;
        }
        Commands::Worker { path, priority } => {
            commands::worker::run(&config, &path, priority)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.json { Format::Json } else { cli.format };
    if !matches!(cli.command, Commands::Worker { .. }) {
        logging::init_controller();
    }
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            Format::Pretty => eprintln!("error: {e}"),
        }
        std::process::exit(if e.is_fatal() { 1 } else { 0 });
    }
}
