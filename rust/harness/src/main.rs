//! Experiment Harness CLI
//!
//! Allocates experiment dump directories and prints derived settings.

use clap::{Parser, Subcommand};
use expkit_config::{ExperimentParams, bcast_json_list, get_device_mapping};
use expkit_harness::{config::BatchConfig, prepare::prepare_run};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "expkit", about = "Experiment directory and settings helper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dump directory for a single run
    New {
        #[command(flatten)]
        params: ExperimentParams,
    },

    /// Create dump directories for every run in a batch config
    Prepare {
        /// Path to expkit.toml config file
        #[arg(short, long, default_value = "expkit.toml")]
        config: String,

        /// Only print what would be created
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the checkpoint device mapping as JSON
    DeviceMap {
        /// GPU to map onto, negative for CPU
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        gpu_id: i32,
    },

    /// Broadcast a JSON integer or list to a fixed length
    Bcast {
        /// JSON value, e.g. `5` or `[1,2,3]`
        param: String,

        /// Required list length
        #[arg(short, long)]
        length: usize,
    },
}

fn init_tracing(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or("info")));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::New { params } => {
            init_tracing(None);
            let run = prepare_run(&params)?;
            tracing::info!(
                "{} threads, checkpoints mapped to {}",
                params.threads,
                run.manifest.device_mapping.target()
            );
            println!("{}", run.dump_path.display());
        }

        Commands::Prepare { config, dry_run } => {
            let batch = BatchConfig::load(&config)?;
            init_tracing(batch.harness.log_level.as_deref());

            if dry_run {
                println!("=== Dry Run ===");
                for run in &batch.runs {
                    println!(
                        "  - {}: {}/{}/<id>",
                        run.name, run.params.dump_path, run.params.exp_name
                    );
                }
                return Ok(());
            }

            println!("Preparing {} runs from {config}", batch.runs.len());
            let mut failed = 0;
            for run in &batch.runs {
                match prepare_run(&run.params) {
                    Ok(prepared) => println!("{}: {}", run.name, prepared.dump_path.display()),
                    Err(e) => {
                        tracing::error!("Failed to prepare {}: {}", run.name, e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{failed} of {} runs failed", batch.runs.len()).into());
            }
        }

        Commands::DeviceMap { gpu_id } => {
            let mapping = get_device_mapping(gpu_id);
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }

        Commands::Bcast { param, length } => {
            let list: Vec<serde_json::Value> = bcast_json_list(&param, length)?;
            println!("{}", serde_json::to_string(&list)?);
        }
    }

    Ok(())
}
