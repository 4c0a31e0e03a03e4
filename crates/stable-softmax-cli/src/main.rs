use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Top-level CLI argument parser for the `ssx` command
#[derive(Parser)]
#[command(
    name = "ssx",
    about = "ssx: run and inspect numerically stable softmax operators",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. debug, stable_softmax=trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `ssx` CLI
#[derive(Subcommand)]
enum Commands {
    /// Validate an operator configuration file
    Validate {
        /// Path to the operator YAML file
        config: PathBuf,
    },
    /// Show how an input shape would be reduced, without computing
    Plan {
        /// Path to the operator YAML file
        config: PathBuf,
        /// Input shape, comma separated (e.g. 2,3,4)
        #[arg(long, value_delimiter = ',', required = true)]
        shape: Vec<usize>,
    },
    /// Run an operator on a tensor file
    Run {
        /// Path to the operator YAML file
        config: PathBuf,
        /// Input tensor file (.yaml or .json with `shape` and `data`)
        #[arg(short, long)]
        input: PathBuf,
        /// Additive mask tensor file for the fused operator
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
        /// Reduction strategy: auto, warp or block (overrides the config)
        #[arg(long)]
        strategy: Option<String>,
    },
    /// List registered operator kernels
    Ops,
}

/// Dispatch a parsed CLI subcommand to its handler
fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Validate { config } => commands::validate::run(&config),
        Commands::Plan { config, shape } => commands::plan::run(&config, &shape),
        Commands::Run {
            config,
            input,
            mask,
            format,
            strategy,
        } => {
            let format = commands::run::OutputFormat::from_str(&format)?;
            commands::run::run(&config, &input, mask.as_deref(), format, strategy.as_deref())
        }
        Commands::Ops => commands::ops::run(),
    }
}

/// Install the stderr `tracing` subscriber; `RUST_LOG` wins over `--log-level`
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point: parse CLI arguments and run the selected subcommand
fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    if let Err(e) = run_command(cli.command) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
