//! Command-line interface for swarmforge.
//!
//! Wires the providers (from environment variables) and the SQLite
//! repository into the orchestrator and reports the run summary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::llm::{CompletionChain, CompletionProvider, OpenAiClient, OpenAiEmbeddings};
use crate::pipeline::{Collaborators, Orchestrator};
use crate::storage::SqliteRepository;
use crate::swarm::SwarmConfig;

/// Top-level CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "swarmforge", version, about = "Synthetic training scenario generator")]
pub struct Cli {
    /// Log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one scenario generation workflow.
    Generate {
        /// Scenario category to generate for.
        #[arg(long)]
        category: String,

        /// Number of approved scenarios to produce.
        #[arg(long, default_value_t = 5)]
        target_count: usize,

        /// Minimum final score for approval (0-100).
        #[arg(long, default_value_t = 70.0)]
        score_threshold: f64,

        /// Maximum number of generation cycles.
        #[arg(long, default_value_t = 5)]
        max_iterations: u32,

        /// Candidates requested per generation cycle.
        #[arg(long, default_value_t = 8)]
        batch_size: usize,

        /// Repair budget per rejected candidate.
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Cosine-similarity duplicate cutoff (inclusive).
        #[arg(long, default_value_t = 0.92)]
        diversity_threshold: f32,

        /// SQLite database path.
        #[arg(long, env = "SWARMFORGE_DB", default_value = "swarmforge.db")]
        database: PathBuf,

        /// Write the resulting bundle as JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the parsed CLI command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Generate {
            category,
            target_count,
            score_threshold,
            max_iterations,
            batch_size,
            max_retries,
            diversity_threshold,
            database,
            out,
        } => {
            let config = SwarmConfig {
                category,
                target_count,
                score_threshold,
                max_iterations,
                batch_size,
                max_retries_per_scenario: max_retries,
                diversity_threshold,
            };

            let database_url = format!("sqlite://{}?mode=rwc", database.display());
            let repository = Arc::new(SqliteRepository::connect(&database_url).await?);

            let orchestrator = Orchestrator::new(build_collaborators(repository));
            let state = orchestrator.run(config).await;

            let summary = state.summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(path) = out {
                let bundle = state.bundle();
                std::fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
                tracing::info!(path = %path.display(), scenarios = bundle.len(), "Bundle written");
            }

            if !state.errors.is_empty() {
                for error in &state.errors {
                    tracing::warn!(error = error.as_str(), "Run error");
                }
            }

            Ok(())
        }
    }
}

/// Build the provider set from environment variables.
///
/// Model roles fall back as follows:
/// - `SWARMFORGE_FAST_MODEL`: scout/curator/clerk (defaults to the base model)
/// - `SWARMFORGE_WRITER_MODEL`, `SWARMFORGE_WRITER_FALLBACK_MODEL`: writer chain
/// - `SWARMFORGE_JUDGE_MODEL`: judge
///
/// Providers are optional by design: a run without any configured provider
/// still terminates cleanly with a populated error list.
fn build_collaborators(repository: Arc<SqliteRepository>) -> Collaborators {
    let client = |model_var: &str| -> Option<Arc<dyn CompletionProvider>> {
        match OpenAiClient::from_env() {
            Ok(client) => {
                let client = match std::env::var(model_var) {
                    Ok(model) => client.with_model(model),
                    Err(_) => client,
                };
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, role = model_var, "Provider not configured");
                None
            }
        }
    };

    let fast = client("SWARMFORGE_FAST_MODEL");
    let quality = client("SWARMFORGE_MODEL");
    let judge = client("SWARMFORGE_JUDGE_MODEL");

    let mut writer_chain = CompletionChain::new();
    if let Some(primary) = client("SWARMFORGE_WRITER_MODEL") {
        writer_chain.push("writer-primary", primary);
    }
    if let Some(fallback) = client("SWARMFORGE_WRITER_FALLBACK_MODEL") {
        writer_chain.push("writer-fallback", fallback);
    }
    if let Some(tertiary) = &fast {
        writer_chain.push("writer-fast", tertiary.clone());
    }

    let embeddings = match OpenAiEmbeddings::from_env() {
        Ok(client) => Some(Arc::new(client) as Arc<dyn crate::llm::EmbeddingProvider>),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding provider not configured");
            None
        }
    };

    Collaborators {
        fast,
        quality,
        judge,
        writer_chain,
        embeddings,
        repository,
    }
}
