use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir};
use crate::database::sqlite::Database;
use crate::database::vector::index::VectorIndex;
use crate::embeddings::provider_from_config;
use crate::indexer::{ConsistencyReport, ConsistencyValidator, IngestOutcome, IngestRequest, Ingestor};
use crate::retrieval::{DateRange, RetrievedContext, Retriever};
use crate::synthesis::CompletionClient;

/// Everything a command needs, opened from one configuration
pub struct Services {
    pub config: Config,
    pub ingestor: Ingestor,
    pub retriever: Retriever,
    pub completion: CompletionClient,
}

impl Services {
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .context("Failed to initialize database")?;
        let index = VectorIndex::open(config.vector_index_path(), config.embedding.dimension)
            .await
            .context("Failed to open vector index")?;
        let provider = provider_from_config(&config).context("Failed to build embedding provider")?;
        let completion =
            CompletionClient::from_config(&config).context("Failed to build completion client")?;

        let ingestor = Ingestor::new(
            database,
            index.clone(),
            Arc::clone(&provider),
            config.chunking,
        );
        let retriever = Retriever::new(index, provider);

        Ok(Self {
            config,
            ingestor,
            retriever,
            completion,
        })
    }

    #[inline]
    pub fn database(&self) -> &Database {
        self.ingestor.database()
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        self.ingestor.index()
    }
}

/// Resolve the data directory, falling back to `~/.second-brain`
#[inline]
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to determine data directory"),
    }
}

#[inline]
pub fn load_config(data_dir: &Path) -> Result<Config> {
    Config::load(data_dir)
}

fn spinner(message: String) -> Result<ProgressBar> {
    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    Ok(bar)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn report_outcome(outcome: &IngestOutcome) -> Result<()> {
    match outcome {
        IngestOutcome::Ok {
            document_id,
            chunk_count,
        } => eprintln!(
            "{} Indexed {} chunks as document {}",
            style("✓").green(),
            chunk_count,
            style(document_id).cyan()
        ),
        IngestOutcome::Empty => eprintln!("{} Nothing to ingest", style("⚠").yellow()),
        IngestOutcome::Skipped { reason } => {
            eprintln!("{} Skipped: {}", style("⚠").yellow(), reason);
        }
    }
    print_json(outcome)
}

/// Ingest text given on the command line
#[inline]
pub async fn ingest_text(
    services: &Services,
    text: String,
    source: String,
    source_type: String,
    title: Option<String>,
) -> Result<IngestOutcome> {
    let bar = spinner(format!("Ingesting {}", source))?;
    let result = services
        .ingestor
        .ingest(IngestRequest::new(text, source, source_type).with_title(title))
        .await;
    bar.finish_and_clear();

    let outcome = result.context("Ingestion failed")?;
    report_outcome(&outcome)?;
    Ok(outcome)
}

/// Ingest a local text, markdown or pdf-text file
#[inline]
pub async fn ingest_file(
    services: &Services,
    path: &Path,
    source_type: &str,
    title: Option<String>,
) -> Result<IngestOutcome> {
    let bar = spinner(format!("Ingesting {}", path.display()))?;
    let result = services
        .ingestor
        .ingest_file(path, source_type, title)
        .await;
    bar.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to ingest {}", path.display()))?;
    report_outcome(&outcome)?;
    Ok(outcome)
}

/// Fetch and ingest a web page
#[inline]
pub async fn ingest_url(services: &Services, url: &str) -> Result<IngestOutcome> {
    let bar = spinner(format!("Fetching {}", url))?;
    let result = services.ingestor.ingest_url(url).await;
    bar.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to ingest {}", url))?;
    report_outcome(&outcome)?;
    Ok(outcome)
}

/// Print matching contexts, or a synthesized answer when `answer` is set
#[inline]
pub async fn query(
    services: &Services,
    query: &str,
    top_k: Option<usize>,
    date_range: Option<DateRange>,
    answer: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(services.config.retrieval.top_k);
    info!("Querying top {} contexts", top_k);

    if answer {
        let answer = services
            .retriever
            .answer(query, top_k, &services.completion)
            .await
            .context("Failed to answer query")?;
        return print_json(&answer);
    }

    let contexts: Vec<RetrievedContext> = services
        .retriever
        .retrieve(query, top_k, date_range)
        .await
        .context("Failed to retrieve contexts")?;
    if contexts.is_empty() {
        eprintln!("No relevant data found. Ingest some documents first.");
    }
    print_json(&contexts)
}

/// Show counts and the consistency summary
#[inline]
pub async fn show_status(services: &Services) -> Result<ConsistencyReport> {
    eprintln!("{}", style("📊 Second Brain Status").bold().cyan());
    eprintln!("{}", "=".repeat(40));
    eprintln!(
        "  Data directory: {}",
        style(services.config.get_base_dir().display()).cyan()
    );
    eprintln!(
        "  Embedding: {} ({} dimensions)",
        style(&services.config.embedding.model).cyan(),
        services.index().dimension()
    );

    let report = ConsistencyValidator::new(services.database(), services.index())
        .validate_consistency()
        .await
        .context("Failed to check consistency")?;

    eprintln!("  Documents: {}", report.documents);
    eprintln!("  Chunks: {}", report.chunks);
    eprintln!("  Vectors: {}", report.vectors);
    eprintln!();

    if report.is_consistent {
        eprintln!("{} {}", style("✅").green(), report.summary());
    } else {
        eprintln!("{} {}", style("⚠️").yellow(), report.summary());
        for document_id in &report.unindexed_documents {
            eprintln!("   Unindexed document: {}", document_id);
        }
        for warning in &report.dangling_chunks {
            eprintln!("   {}", warning);
        }
        if !report.unindexed_documents.is_empty() {
            eprintln!();
            eprintln!("Run 'second-brain repair --apply' to remove unindexed documents.");
        }
    }

    Ok(report)
}

/// Remove unindexed documents. Without `apply` only reports what would go.
#[inline]
pub async fn repair(services: &Services, apply: bool) -> Result<usize> {
    let validator = ConsistencyValidator::new(services.database(), services.index());
    let report = validator
        .validate_consistency()
        .await
        .context("Failed to check consistency")?;

    if report.unindexed_documents.is_empty() {
        eprintln!("{} Nothing to repair", style("✓").green());
        return Ok(0);
    }

    if !apply {
        eprintln!(
            "{} unindexed documents would be removed:",
            report.unindexed_documents.len()
        );
        for document_id in &report.unindexed_documents {
            eprintln!("   {}", document_id);
        }
        eprintln!("Re-run with --apply to remove them.");
        return Ok(0);
    }

    let removed = validator
        .repair(&report)
        .await
        .context("Failed to repair store")?;
    if removed < report.unindexed_documents.len() {
        warn!(
            "Only {} of {} unindexed documents were removed",
            removed,
            report.unindexed_documents.len()
        );
    }
    eprintln!("{} Removed {} unindexed documents", style("✓").green(), removed);
    if !report.orphaned_vectors.is_empty() {
        eprintln!(
            "{} orphaned vectors remain in the index",
            report.orphaned_vectors.len()
        );
    }

    Ok(removed)
}
