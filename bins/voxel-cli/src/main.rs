mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voxel-cli")]
#[command(about = "voxel CLI - Manage the model registry and workload images", long_about = None)]
struct Cli {
    /// Path to the model registry file
    #[arg(long, default_value = "config/models.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new inference model
    AddModel {
        /// Model id (e.g., unet_t1c, deepmedic)
        #[arg(short, long)]
        id: String,

        /// Workload image reference (e.g., mailabhaske/glioma_unet:latest)
        #[arg(long)]
        image: String,

        /// Command template argv; {input}, {output} and {filename} are
        /// substituted at dispatch time
        #[arg(long, num_args = 1.., required = true)]
        command: Vec<String>,

        /// Output image the workload must write
        #[arg(long, default_value = "output_image.png")]
        output_filename: String,

        /// Metrics sidecar the workload must write
        #[arg(long, default_value = "metrics.json")]
        metrics_filename: String,

        /// Per-model timeout override in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Pull the workload image after registering
        #[arg(long)]
        pull: bool,
    },

    /// Remove a model from the registry
    RemoveModel {
        /// Model id to remove
        #[arg(short, long)]
        id: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List all registered models
    ListModels,

    /// Pre-pull a model's workload image onto this host
    PullImage {
        /// Model id
        #[arg(short, long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::AddModel {
            id,
            image,
            command,
            output_filename,
            metrics_filename,
            timeout_ms,
            pull,
        } => {
            commands::add_model(
                &cli.config,
                &id,
                &image,
                command,
                &output_filename,
                &metrics_filename,
                timeout_ms,
                pull,
            )?;
        }
        Commands::RemoveModel { id, yes } => {
            commands::remove_model(&cli.config, &id, yes)?;
        }
        Commands::ListModels => {
            commands::list_models(&cli.config)?;
        }
        Commands::PullImage { id } => {
            commands::pull_image(&cli.config, &id)?;
        }
    }

    Ok(())
}
