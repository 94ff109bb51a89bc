use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use frd_pipeline::{PipelineConfig, ReviewPipeline, ReviewQuery};
use frd_storage::ApprovalStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "frd-cli")]
#[command(about = "Flex review dashboard backend")]
struct Cli {
    /// Directory the default dataset and approval paths are resolved against.
    #[arg(long, env = "FRD_WORKSPACE_ROOT", default_value = ".", global = true)]
    workspace_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the JSON API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print one reviews report as JSON.
    Fetch {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        limit: Option<String>,
    },
    /// Print the approval map.
    Approvals,
    /// Approve (or with --reject, un-approve) a review.
    Approve {
        review_id: String,
        #[arg(long)]
        reject: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env();
    config.workspace_root = cli.workspace_root;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            info!("starting frd v{}", env!("CARGO_PKG_VERSION"));
            frd_web::serve(config).await?;
        }
        Commands::Fetch { source, limit } => {
            let pipeline = ReviewPipeline::from_config(&config)?;
            let report = pipeline.run(&ReviewQuery { source, limit }).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Approvals => {
            let store = ApprovalStore::new(config.resolved_approvals_path());
            println!("{}", serde_json::to_string_pretty(&store.read().await)?);
        }
        Commands::Approve { review_id, reject } => {
            let store = ApprovalStore::new(config.resolved_approvals_path());
            let approvals = store.write(&review_id, !reject).await?;
            println!("{}", serde_json::to_string_pretty(&approvals)?);
        }
    }

    Ok(())
}
