//! `medsense` CLI: offline ingest of condition records into a vector index
//! dump, and ad-hoc analysis of a single patient case against that dump.
//! Converts [`medsense_core::DiagnosisError`] to `anyhow::Error` at this
//! boundary; the library itself never depends on `anyhow`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fastembed::EmbeddingModel;
use tracing_subscriber::EnvFilter;

use medsense_core::cache::EmbeddingCache;
use medsense_core::core::config::{EncoderConfig, EngineConfig};
use medsense_core::encoder::{FastEmbedEncoder, TextEncoder};
use medsense_core::index::{Distance, InMemoryVectorStore, IndexPoint, VectorStoreClient};
use medsense_core::ingest::sources::CuratedConditionRow;
use medsense_core::ingest::{build_embedding_text, merge_rows, CuratedSource, OntologySource};
use medsense_core::redflag::RedFlagLexicon;
use medsense_core::service::{AnalysisOptions, AnalysisService};
use medsense_core::PatientCase;

#[derive(Parser)]
#[command(name = "medsense", version, about = "Diagnostic retrieval and ranking engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a curated condition file, embed each condition, and write the
    /// resulting index points to a JSON dump.
    Ingest {
        /// Path to a JSON array of curated condition rows.
        #[arg(long)]
        curated: PathBuf,
        /// Path to write the resulting index points (JSON).
        #[arg(long)]
        output: PathBuf,
    },
    /// Analyze a single patient case against a previously-produced index
    /// dump, printing the resulting differential as JSON.
    Analyze {
        /// Path to a JSON-encoded `PatientCase`.
        #[arg(long)]
        case: PathBuf,
        /// Path to an index-point dump produced by `ingest`.
        #[arg(long)]
        seed: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest { curated, output } => run_ingest(curated, output).await,
        Commands::Analyze { case, seed } => run_analyze(case, seed).await,
    }
}

async fn run_ingest(curated_path: PathBuf, output_path: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&curated_path)?;
    let rows: Vec<CuratedConditionRow> = serde_json::from_str(&raw)?;
    let source = CuratedSource::new(rows);
    let conditions = merge_rows(source.read()?);

    let encoder_config = EncoderConfig::default();
    let encoder = FastEmbedEncoder::new(EmbeddingModel::BGESmallENV15, encoder_config.model_id.clone(), encoder_config.dimension)?;

    let mut points = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let text = build_embedding_text(&condition.name, &condition.typical_symptoms, &condition.rare_symptoms);
        let vector = encoder.encode(&text).await?;
        points.push(IndexPoint { condition, vector });
    }

    tracing::info!(count = points.len(), "ingest produced index points");
    std::fs::write(&output_path, serde_json::to_string_pretty(&points)?)?;
    Ok(())
}

async fn run_analyze(case_path: PathBuf, seed_path: PathBuf) -> anyhow::Result<()> {
    let case: PatientCase = serde_json::from_str(&std::fs::read_to_string(&case_path)?)?;
    let points: Vec<IndexPoint> = serde_json::from_str(&std::fs::read_to_string(&seed_path)?)?;

    let config = Arc::new(EngineConfig::default());
    let encoder: Arc<dyn TextEncoder> = Arc::new(FastEmbedEncoder::new(
        EmbeddingModel::BGESmallENV15,
        config.encoder.model_id.clone(),
        config.encoder.dimension,
    )?);

    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_collection(config.encoder.dimension, Distance::Cosine).await?;
    store.upsert(points).await?;

    let cache = Arc::new(EmbeddingCache::new(config.cache));
    let service = AnalysisService::new(config, encoder, store, cache, &RedFlagLexicon::default())?;

    let result = service.analyze(case, AnalysisOptions::default()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
