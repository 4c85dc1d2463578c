//! Operator CLI for the refinery pipeline.
//!
//! Drives the library end to end against a SQLite store: ingest a JSONL
//! batch of crawled records, rebuild the derived indexes, run hybrid
//! queries, and print the upcoming-deadline briefing. The `query` command
//! prints the ranked context set (the generation step's input); composing a
//! user-facing answer is out of scope here.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refinery::{
    find_unindexed, ingest_batch, rebuild_indexes, repair_pass, upcoming_deadlines,
    BriefingWindow, ExtractorConfig, FactExtractor, HybridRetriever, KnowledgeStore,
    LexicalIndex, OllamaEmbedder, OllamaStructurer, PipelineConfig, RateLimitedStructurer,
    RawRecord, RecordState, SemanticIndex, SqliteStore, Structurer,
};

#[derive(Parser)]
#[command(name = "dev", about = "Refinery operator commands")]
struct Cli {
    /// SQLite database URL
    #[arg(long, global = true, default_value = "sqlite://refinery.db?mode=rwc")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSONL batch of raw crawler records
    Ingest {
        /// Path to the JSONL file (one raw record per line)
        records: PathBuf,

        /// Only ingest records for this course
        #[arg(long)]
        course: Option<String>,

        /// Concurrent structuring calls
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Max structuring calls per second (unlimited when absent)
        #[arg(long)]
        rps: Option<u32>,

        /// Per-call timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Run a hybrid query and print the ranked context set as JSON
    Query {
        /// The natural-language question
        query: String,

        /// Number of context candidates
        #[arg(short, default_value_t = 5)]
        k: usize,
    },

    /// Print records due in the briefing window
    Brief {
        /// Days to look back
        #[arg(long, default_value_t = 3)]
        lookback: u64,

        /// Days to look ahead
        #[arg(long, default_value_t = 14)]
        horizon: u64,
    },

    /// List all stored structured records
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,refinery=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::new(&cli.db)
        .await
        .with_context(|| format!("failed to open store at {}", cli.db))?;

    match cli.command {
        Commands::Ingest {
            records,
            course,
            concurrency,
            rps,
            timeout,
        } => ingest(&store, &records, course, concurrency, rps, timeout).await,
        Commands::Query { query, k } => run_query(&store, &query, k).await,
        Commands::Brief { lookback, horizon } => brief(&store, lookback, horizon).await,
        Commands::List => list(&store).await,
    }
}

/// Raw record line as the crawler hands it over; identity is derived here.
#[derive(serde::Deserialize)]
struct RawRecordLine {
    text: String,
    source_url: String,
    course_id: String,
    posted_at: chrono::DateTime<Utc>,
    #[serde(default)]
    fetched_at: Option<chrono::DateTime<Utc>>,
}

/// Load raw records from JSONL, skipping malformed lines.
fn load_raw_records(path: &PathBuf) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawRecordLine>(line) {
            Ok(parsed) => records.push(RawRecord::new(
                parsed.text,
                parsed.source_url,
                parsed.course_id,
                parsed.posted_at,
                parsed.fetched_at.unwrap_or_else(Utc::now),
            )),
            Err(e) => warn!(line = number + 1, error = %e, "skipping malformed record line"),
        }
    }
    Ok(records)
}

fn structurer_from_env() -> OllamaStructurer {
    let mut structurer = OllamaStructurer::new();
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        structurer = structurer.with_base_url(url);
    }
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        structurer = structurer.with_model(model);
    }
    structurer
}

fn embedder_from_env() -> OllamaEmbedder {
    let mut embedder = OllamaEmbedder::new();
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        embedder = embedder.with_base_url(url);
    }
    if let Ok(model) = std::env::var("OLLAMA_EMBED_MODEL") {
        embedder = embedder.with_model(model);
    }
    embedder
}

async fn ingest(
    store: &SqliteStore,
    records: &PathBuf,
    course: Option<String>,
    concurrency: usize,
    rps: Option<u32>,
    timeout: u64,
) -> Result<()> {
    let mut raws = load_raw_records(records)?;
    if let Some(course) = &course {
        raws.retain(|r| &r.course_id == course);
    }
    if raws.is_empty() {
        println!("no records to ingest");
        return Ok(());
    }

    let extractor_config = ExtractorConfig::default().with_timeout(Duration::from_secs(timeout));
    let pipeline_config = PipelineConfig::default().with_concurrency(concurrency);

    let structurer = structurer_from_env();
    let report = match rps {
        Some(rps) => {
            let limited = RateLimitedStructurer::new(structurer, rps);
            run_ingest(&raws, store, limited, extractor_config, &pipeline_config).await
        }
        None => run_ingest(&raws, store, structurer, extractor_config, &pipeline_config).await,
    };

    println!(
        "stored {} / pending {} / failed {} / inconsistent {}",
        report.stored_count(),
        report.ids_in(RecordState::Pending).len(),
        report.ids_in(RecordState::Failed).len(),
        report.inconsistent_ids().len(),
    );
    for outcome in report
        .outcomes
        .iter()
        .filter(|o| o.state != RecordState::Stored)
    {
        println!(
            "  {:?} {} {}",
            outcome.state,
            outcome.id,
            outcome.detail.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn run_ingest<S: Structurer>(
    raws: &[RawRecord],
    store: &SqliteStore,
    structurer: S,
    extractor_config: ExtractorConfig,
    pipeline_config: &PipelineConfig,
) -> refinery::IngestReport {
    let extractor = FactExtractor::with_config(structurer, extractor_config);
    let semantic = SemanticIndex::new(embedder_from_env());
    let lexical = LexicalIndex::new();

    // The indexes are per-process; reindex everything already stored so a
    // partially filled store still searches correctly within this run.
    if let Err(e) = rebuild_indexes(store, &semantic, &lexical).await {
        warn!(error = %e, "could not pre-build indexes from store");
    }

    let report = ingest_batch(
        raws,
        pipeline_config,
        &extractor,
        store,
        &semantic,
        &lexical,
    )
    .await;

    // Heal any records the batch left inconsistent before this run exits.
    let inconsistent: Vec<String> = report
        .inconsistent_ids()
        .iter()
        .map(|s| s.to_string())
        .collect();
    if !inconsistent.is_empty() {
        if let Err(e) = repair_pass(store, &semantic, &lexical, &inconsistent).await {
            warn!(error = %e, "repair pass failed");
        }
    }

    report
}

async fn run_query(store: &SqliteStore, query: &str, k: usize) -> Result<()> {
    let semantic = SemanticIndex::new(embedder_from_env());
    let lexical = LexicalIndex::new();

    // Derived state: both indexes rebuild from the store alone.
    rebuild_indexes(store, &semantic, &lexical).await?;
    let missing = find_unindexed(store, &semantic, &lexical).await?;
    if !missing.is_empty() {
        warn!(count = missing.len(), "records missing from indexes after rebuild");
    }

    let retriever = HybridRetriever::new(&semantic, &lexical, store);
    let context = retriever.retrieve_with_records(query, k).await?;

    if context.is_empty() {
        // The consumer owns the "no information found" wording; this is a
        // valid outcome, not an error.
        println!("[]");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

async fn brief(store: &SqliteStore, lookback: u64, horizon: u64) -> Result<()> {
    let records = store.all().await?;
    let window = BriefingWindow {
        lookback_days: lookback,
        horizon_days: horizon,
    };
    let items = upcoming_deadlines(&records, Utc::now().date_naive(), window);

    if items.is_empty() {
        println!("no deadlines in window");
        return Ok(());
    }
    for item in items {
        println!(
            "{:>8}  {}  [{}] {} ({})",
            item.d_day_label(),
            item.record.due_date.map(|d| d.to_string()).unwrap_or_default(),
            item.record.category,
            item.record.summary,
            item.record.course_id,
        );
    }
    Ok(())
}

async fn list(store: &SqliteStore) -> Result<()> {
    let mut records = store.all().await?;
    records.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));

    println!("{} records", records.len());
    for record in records {
        println!(
            "{}  [{}] imp {}  due {}  {}",
            record.posted_at.date_naive(),
            record.category,
            record.importance,
            record
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.summary,
        );
    }
    Ok(())
}
