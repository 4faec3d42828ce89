use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_vault_core::{
    DocumentProcessor, DocumentStore, IndexController, IndexStatusResponse, OllamaVisionClient,
    PdftoppmRenderer, ProcessorOptions, VaultApi, VisionConfig, VisionServiceState,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-vault", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path of the document database
    #[arg(long, env = "PDF_VAULT_DB", default_value = "pdfvault.redb")]
    db: PathBuf,

    /// Ollama base URL (falls back to OLLAMA_URL)
    #[arg(long)]
    ollama_url: Option<String>,

    /// Vision model name (falls back to OLLAMA_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Per-document vision timeout in seconds (falls back to OLLAMA_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Pages rendered from each end of long documents; 0 renders all
    #[arg(long, default_value = "3")]
    pages_per_end: u32,

    /// Render resolution, capped at 300
    #[arg(long, default_value = "150")]
    dpi: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Index every PDF below a directory and follow progress until done.
    Index {
        /// Directory to scan recursively.
        #[arg(long)]
        path: String,
        /// Reprocess documents that are already indexed.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Progress polling interval in milliseconds.
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },
    /// Rank indexed documents against a query.
    Search {
        /// Search query; empty lists every document.
        #[arg(long, default_value = "")]
        query: String,
        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print one stored record as JSON.
    Show {
        #[arg(long)]
        hash: String,
    },
    /// Reprocess one stored record from its file on disk.
    Reindex {
        #[arg(long)]
        hash: String,
    },
    /// Remove one record from the index.
    Delete {
        #[arg(long)]
        hash: String,
    },
    /// Remove every record from the index.
    Clear,
    /// Record counts by document type.
    Stats,
    /// Probe the vision service and the configured model.
    VisionStatus,
    /// Print the effective configuration as JSON.
    Config,
}

fn open_vault(cli: &Cli) -> anyhow::Result<VaultApi> {
    let mut vision = VisionConfig::from_env();
    if let Some(url) = &cli.ollama_url {
        vision.base_url = url.clone();
    }
    if let Some(model) = &cli.model {
        vision.model = model.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        vision.timeout = Duration::from_secs(secs);
    }

    let options = ProcessorOptions {
        max_pages_per_end: cli.pages_per_end,
        render_dpi: cli.dpi,
        vision_timeout: vision.timeout,
        ..ProcessorOptions::default()
    };

    let store = DocumentStore::open(&cli.db)
        .with_context(|| format!("opening document database {}", cli.db.display()))?;
    let client = Arc::new(OllamaVisionClient::new(vision)?);
    let processor = DocumentProcessor::new(
        Arc::new(PdftoppmRenderer::default()),
        client.clone(),
        options,
    );

    Ok(VaultApi::new(
        IndexController::new(Arc::new(store), Arc::new(processor)),
        client,
    ))
}

fn print_progress(status: &IndexStatusResponse) {
    println!(
        "[{}] {}/{} processed={} skipped={} errors={} {}",
        status.phase,
        status.processed + status.skipped + status.errors,
        status.total,
        status.processed,
        status.skipped,
        status.errors,
        status.current_file
    );
}

async fn run_index(api: &VaultApi, path: &str, force: bool, poll: Duration) -> anyhow::Result<()> {
    let accepted = api.start_index(path, force);
    if !accepted.success {
        bail!(accepted.error.unwrap_or_default());
    }

    let mut last = None;
    let mut stop_sent = false;
    let mut ticker = tokio::time::interval(poll);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !stop_sent => {
                warn!("interrupt received, stopping after the current file");
                api.stop_index();
                stop_sent = true;
            }
            _ = ticker.tick() => {
                let status = api.index_status();
                if last.as_ref() != Some(&status) {
                    print_progress(&status);
                }
                let done = !status.is_running;
                last = Some(status);
                if done {
                    break;
                }
            }
        }
    }

    if let Some(status) = last {
        println!(
            "indexed {} at {}: processed={} skipped={} errors={}{}",
            status.last_directory,
            Utc::now().to_rfc3339(),
            status.processed,
            status.skipped,
            status.errors,
            if stop_sent { " (stopped)" } else { "" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        db = %cli.db.display(),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-vault boot"
    );

    let api = open_vault(&cli)?;

    match cli.command {
        Command::Index {
            path,
            force,
            poll_ms,
        } => {
            run_index(&api, &path, force, Duration::from_millis(poll_ms.max(10))).await?;
        }
        Command::Search { query, limit, json } => {
            let api = match limit {
                Some(limit) => api.with_search_limit(limit),
                None => api,
            };
            let items = api.search(&query)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                println!("query: {query} ({} results)", items.len());
                for item in items {
                    println!(
                        "score={} hash={} path={}",
                        item.relevance_score, item.content_hash, item.file_path
                    );
                    if let Some(subject) = &item.subject {
                        println!("  subject={subject}");
                    }
                    for matched in &item.matched_terms_by_field {
                        let fields = matched
                            .fields
                            .iter()
                            .map(|field| field.as_str())
                            .collect::<Vec<_>>()
                            .join(",");
                        println!("  term={} fields={fields}", matched.term);
                    }
                    if let Some(error) = &item.processing_error {
                        println!("  processing_error={error}");
                    }
                }
            }
        }
        Command::Show { hash } => {
            let record = api.get_document(&hash)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Reindex { hash } => {
            let response = api.reindex_document(&hash).await;
            if !response.success {
                bail!(response.error.unwrap_or_default());
            }
            let record = api.get_document(&hash)?;
            match &record.processing_error {
                Some(error) => println!("reindexed {hash} with error: {error}"),
                None => println!("reindexed {hash}"),
            }
        }
        Command::Delete { hash } => {
            let response = api.delete_document(&hash);
            if !response.success {
                bail!(response.error.unwrap_or_default());
            }
            println!("deleted {hash}");
        }
        Command::Clear => {
            let response = api.clear_index();
            if !response.success {
                bail!(response.error.unwrap_or_default());
            }
            println!("index cleared");
        }
        Command::Stats => {
            let stats = api.stats()?;
            println!("total={} errors={}", stats.total, stats.errors);
            for (kind, count) in &stats.by_type {
                println!("  {kind}={count}");
            }
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&api.config())?);
        }
        Command::VisionStatus => {
            let status = api.vision_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if status.status != VisionServiceState::Running {
                bail!("vision service is not available");
            }
        }
    }

    Ok(())
}
