//! Kopi command-line runner
//!
//! Loads resolved compilation units (JSON) and runs their entry class, or
//! runs one of the bundled sample programs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "kopi")]
#[command(about = "Run Kopi compilation units", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a compilation unit from a JSON file
    Run {
        /// Unit file
        file: PathBuf,
        /// Entry class (defaults to the unit's declared entry)
        #[arg(short, long)]
        main: Option<String>,
        /// Runtime options as TOML
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the call depth limit
        #[arg(long)]
        max_call_depth: Option<usize>,
    },

    /// Run a bundled sample program
    Demo {
        /// Sample name
        name: Option<String>,
        /// List the available samples
        #[arg(short, long)]
        list: bool,
        /// Compare output against the recorded expectation
        #[arg(long)]
        verify: bool,
    },

    /// Print a bundled sample as a JSON unit
    Dump {
        /// Sample name
        name: String,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            file,
            main,
            config,
            max_call_depth,
        } => commands::run::execute(commands::run::RunArgs {
            file,
            main,
            config,
            max_call_depth,
        }),
        Commands::Demo { name, list, verify } => {
            if list {
                commands::demo::list();
                Ok(())
            } else {
                match name {
                    Some(name) => commands::demo::execute(&name, verify),
                    None => anyhow::bail!("no sample named; use --list to see them"),
                }
            }
        }
        Commands::Dump { name } => commands::dump::execute(&name),
    }
}
