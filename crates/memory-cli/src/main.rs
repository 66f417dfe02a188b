use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use memory_core::config::MemoryConfig;
use memory_core::error::Error;
use memory_core::query::consolidate::ConsolidateRequest;
use memory_core::query::read::ReadRequest;
use memory_core::query::write::WriteRequest;
use memory_core::scoring::noop::NoopScoring;
use memory_core::scoring::openai::OpenAiScoring;
use memory_core::scoring::Scoring;
use memory_core::store::duckdb::DuckDbStore;
use memory_core::store::Store;
use memory_core::MemoryEngine;

#[derive(Parser)]
#[command(name = "memoryctl", about = "Operational CLI for the agent memory store")]
struct Cli {
    /// Path to the DuckDB database file
    #[arg(long, default_value = "memory.db", env = "MEMORY_DB_PATH", global = true)]
    db_path: PathBuf,

    /// OpenAI API key; when unset, falls back to deterministic offline scoring
    #[arg(long, env = "OPENAI_API_KEY", global = true)]
    openai_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(long, default_value = "text-embedding-3-small", env = "MEMORY_EMBEDDING_MODEL", global = true)]
    embedding_model: String,

    /// Chat-completion model identifier for topics/importance/summaries
    #[arg(long, default_value = "gpt-5-mini", env = "MEMORY_SCORING_MODEL", global = true)]
    scoring_model: String,

    /// Embedding vector dimension; must match the store's schema
    #[arg(long, default_value = "1536", env = "MEMORY_DIMENSIONS", global = true)]
    dimensions: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a new memory, or reinforce an existing near-duplicate
    Store {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        content: String,
        #[arg(long = "type")]
        memory_type: Option<String>,
        #[arg(long)]
        importance: Option<f32>,
        #[arg(long, num_args = 0..)]
        topics: Option<Vec<String>>,
        #[arg(long = "event-date")]
        event_date: Option<String>,
        #[arg(long = "expires")]
        expires: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        session: Option<String>,
        #[arg(long = "skip-dedup")]
        skip_dedup: bool,
        #[arg(long = "auto-score")]
        auto_score: bool,
        #[arg(long = "auto-topics")]
        auto_topics: bool,
    },
    /// Retrieve memories by semantic similarity, with associative expansion
    Retrieve {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
        #[arg(long = "no-associations")]
        no_associations: bool,
        #[arg(long = "min-retention", default_value = "0.2")]
        min_retention: f32,
        #[arg(long, num_args = 0..)]
        types: Option<Vec<String>>,
    },
    /// Run the decay/compression/promotion-scan/soft-delete pipeline for one agent
    Consolidate {
        #[arg(long)]
        agent: String,
        #[arg(long = "compression-threshold", default_value = "5")]
        compression_threshold: usize,
    },
    /// Strengthen (or create) the association between two memories
    Link {
        #[arg(long)]
        source: Uuid,
        #[arg(long)]
        target: Uuid,
        #[arg(long, default_value = "0.1")]
        strength: f32,
    },
    /// Extract keywords from arbitrary text via the scoring provider
    ExtractTopics {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "5")]
        max: usize,
    },
    /// Score the importance of arbitrary text via the scoring provider
    ScoreImportance {
        #[arg(long)]
        text: String,
        #[arg(long)]
        context: Option<String>,
    },
    /// Summarize a fixed set of existing memories on demand
    Summarize {
        #[arg(long)]
        agent: String,
        #[arg(long, num_args = 1..)]
        ids: Vec<Uuid>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(value) => {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| value.to_string()));
            ExitCode::from(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, Error> {
    let config = MemoryConfig { memory_db_url: cli.db_path.clone(), embedding_dim: cli.dimensions, ..Default::default() };

    let store: Arc<dyn Store> = Arc::new(DuckDbStore::open(&cli.db_path, cli.dimensions)?);

    let scoring: Arc<dyn Scoring> = match cli.openai_api_key {
        Some(key) => {
            tracing::info!(model = %cli.embedding_model, "using OpenAI scoring provider");
            Arc::new(OpenAiScoring::new(key, cli.embedding_model, cli.scoring_model, cli.dimensions))
        }
        None => {
            tracing::warn!("no OPENAI_API_KEY set, using deterministic offline scoring (semantic search will not be meaningful)");
            Arc::new(NoopScoring::new(cli.dimensions))
        }
    };

    let engine = MemoryEngine::new(store, scoring, config);

    match cli.command {
        Command::Store {
            agent,
            content,
            memory_type,
            importance,
            topics,
            event_date,
            expires,
            channel,
            session,
            skip_dedup,
            auto_score,
            auto_topics,
        } => {
            let memory_type = memory_type.map(|t| t.parse()).transpose()?;
            let outcome = engine
                .write(WriteRequest {
                    agent_id: agent,
                    content,
                    memory_type,
                    importance,
                    topics,
                    event_date,
                    expires_at: expires,
                    channel,
                    session,
                    skip_dedup,
                    auto_score_importance: auto_score,
                    auto_extract_topics: auto_topics,
                    dedup_threshold: engine.config().dedup_threshold,
                })
                .await?;
            Ok(serde_json::to_value(outcome).unwrap())
        }
        Command::Retrieve { agent, query, limit, no_associations, min_retention, types } => {
            let memory_types = types
                .map(|ts| ts.into_iter().map(|t| t.parse()).collect::<Result<Vec<_>, _>>())
                .transpose()?;
            let outcome = engine
                .read(ReadRequest {
                    agent_id: agent,
                    query,
                    limit,
                    include_associations: !no_associations,
                    min_retention,
                    memory_types,
                })
                .await?;
            Ok(serde_json::to_value(outcome).unwrap())
        }
        Command::Consolidate { agent, compression_threshold } => {
            let report = engine
                .consolidate(ConsolidateRequest {
                    agent_id: agent,
                    compression_threshold,
                    ..default_consolidate_request()
                })
                .await?;
            Ok(serde_json::to_value(report).unwrap())
        }
        Command::Link { source, target, strength } => {
            let outcome = engine.link(source, target, strength).await?;
            Ok(serde_json::to_value(outcome).unwrap())
        }
        Command::ExtractTopics { text, max } => {
            let topics = engine.scoring().extract_topics(&text, max).await?;
            Ok(serde_json::json!({ "count": topics.len(), "topics": topics }))
        }
        Command::ScoreImportance { text, context } => {
            let importance = engine.scoring().score_importance(&text, context.as_deref()).await.unwrap_or(0.5);
            let text_preview: String = text.chars().take(100).collect();
            Ok(serde_json::json!({ "importance": importance, "text_preview": text_preview }))
        }
        Command::Summarize { agent, ids } => {
            let mut memories = Vec::with_capacity(ids.len());
            for id in &ids {
                let memory = engine
                    .store()
                    .get(*id)
                    .await?
                    .filter(|m| m.agent_id == agent && !m.is_deleted)
                    .ok_or_else(|| Error::NotFound(format!("memory {id} not found for agent {agent}")))?;
                memories.push(memory);
            }
            let summary = engine.scoring().summarize(&memories).await?;
            Ok(serde_json::json!({ "summary": summary, "source_count": memories.len(), "source_ids": ids }))
        }
    }
}

/// `compression_threshold` is overridden per-invocation from the
/// `consolidate` subcommand's flag; the rest stay at the documented
/// defaults since the CLI doesn't expose flags for them.
fn default_consolidate_request() -> ConsolidateRequest {
    ConsolidateRequest {
        agent_id: String::new(),
        compression_threshold: 5,
        decay_cutoff: 0.2,
        trash_cutoff: 0.05,
        dormancy_days: 30,
        promotion_stability: 0.9,
        promotion_access: 10,
    }
}
