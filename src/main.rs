use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use second_brain::commands::{
    Services, ingest_file, ingest_text, ingest_url, load_config, query, repair, resolve_data_dir,
    show_status,
};
use second_brain::config::{run_interactive_config, show_config};
use second_brain::retrieval::DateRange;

#[derive(Parser)]
#[command(name = "second-brain")]
#[command(about = "A personal knowledge base with vector search and answer synthesis")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, brain.db and the vector index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the provider, models and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest text passed on the command line
    IngestText {
        /// Text to ingest
        text: String,
        /// Source identifier recorded with every chunk
        #[arg(long)]
        source: String,
        /// One of pdf, md, txt, audio, web
        #[arg(long, default_value = "txt")]
        source_type: String,
        /// Document title, defaults to the source
        #[arg(long)]
        title: Option<String>,
    },
    /// Ingest a local text, markdown or extracted pdf file
    IngestFile {
        path: PathBuf,
        /// One of pdf, md, txt, audio
        #[arg(long, default_value = "txt")]
        source_type: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Fetch a web page and ingest its readable text
    IngestUrl { url: String },
    /// Retrieve the chunks closest to a query
    Query {
        query: String,
        /// Number of contexts to return, defaults to the configured value
        #[arg(long)]
        top_k: Option<usize>,
        /// Earliest creation date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest creation date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Synthesize an answer from the retrieved contexts
        #[arg(long)]
        answer: bool,
    },
    /// Show store counts and consistency
    Status,
    /// Remove documents that never finished indexing
    Repair {
        /// Actually delete; otherwise only list what would be removed
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&load_config(&data_dir)?);
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let services = Services::open(load_config(&data_dir)?).await?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::IngestText {
            text,
            source,
            source_type,
            title,
        } => {
            ingest_text(&services, text, source, source_type, title).await?;
        }
        Commands::IngestFile {
            path,
            source_type,
            title,
        } => {
            ingest_file(&services, &path, &source_type, title).await?;
        }
        Commands::IngestUrl { url } => {
            ingest_url(&services, &url).await?;
        }
        Commands::Query {
            query: text,
            top_k,
            from,
            to,
            answer,
        } => {
            let date_range = (from.is_some() || to.is_some()).then_some(DateRange {
                start: from,
                end: to,
            });
            query(&services, &text, top_k, date_range, answer).await?;
        }
        Commands::Status => {
            show_status(&services).await?;
        }
        Commands::Repair { apply } => {
            repair(&services, apply).await?;
        }
    }

    Ok(())
}
