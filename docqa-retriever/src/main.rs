use clap::{Parser, Subcommand};
use docqa_context::PageText;
use docqa_embed::{ProviderKind, create_provider};
use docqa_retriever::{
    RetrieverConfig,
    retrieval::{DocumentId, DocumentSession, SearchHit, format_context},
    storage::{FileStore, IndexHeader, IndexStore},
};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Ask questions about a single document using semantic retrieval.
#[derive(Parser, Debug)]
#[command(name = "docqa", author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding persisted document indexes
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Embedding provider: `fastembed` or `hash`
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and persist a document
    Ingest {
        /// JSON array of `{page, type, content}` records, or `-` for stdin
        #[arg(short, long)]
        pages: PathBuf,
        /// Display name of the source document (defaults to the pages file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Search a persisted document
    Search {
        /// Document ID printed by `ingest`
        #[arg(short, long)]
        document: DocumentId,
        /// Question or keywords to search for
        #[arg(short, long)]
        query: String,
        /// Number of chunks to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show metadata of a persisted document index
    Info {
        #[arg(short, long)]
        document: DocumentId,
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List persisted document indexes
    List {
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Delete a persisted document index
    Remove {
        #[arg(short, long)]
        document: DocumentId,
    },
    /// Ingest a document and print the retrieved context for one question
    Ask {
        #[arg(short, long)]
        pages: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
    Context,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            "context" => Ok(OutputFormat::Context),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct HitOutput {
    rank: usize,
    page: u32,
    #[serde(rename = "type")]
    kind: String,
    distance: f32,
    content: String,
}

#[derive(Serialize)]
struct IngestOutput {
    document_id: String,
    source_name: String,
    chunks: usize,
    reused: bool,
}

const NO_RESULTS: &str = "No relevant information found in the document.";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RetrieverConfig::load(args.config.as_deref())?;
    if let Some(index_dir) = args.index_dir {
        config.index_dir = index_dir;
    }
    if let Some(provider) = args.provider {
        config.embedding.provider = provider;
    }
    config.validate()?;

    let store = Arc::new(FileStore::new(&config.index_dir));

    match args.command {
        Commands::Ingest { pages, name } => {
            let session = open_session(&config, store).await?;
            let source_name = source_name(&pages, name);
            let document = session.upload(&source_name, &read_pages(&pages)?).await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&IngestOutput {
                    document_id: document.document_id().to_string(),
                    source_name: document.source_name().to_string(),
                    chunks: document.chunk_count(),
                    reused: document.reused(),
                })?
            );
            Ok(())
        }
        Commands::Search {
            document,
            query,
            top_k,
            format,
        } => {
            let session = open_session(&config, store).await?;
            session.open(&document).await?;
            let hits = session.search_with_scores(&query, top_k).await?;
            print_hits(&hits, &format)
        }
        Commands::Info { document, format } => {
            let header = store.header(&document).await?;
            print_headers(&[header], &format)
        }
        Commands::List { format } => {
            let mut headers = Vec::new();
            for document in store.list().await? {
                match store.header(&document).await {
                    Ok(header) => headers.push(header),
                    Err(e) => warn!("Skipping index {document}: {e}"),
                }
            }
            if headers.is_empty() && format != OutputFormat::Json {
                println!("No indexed documents in {}", config.index_dir.display());
                return Ok(());
            }
            print_headers(&headers, &format)
        }
        Commands::Remove { document } => {
            if store.delete(&document).await? {
                println!("Removed index for {document}");
            } else {
                println!("No index found for {document}");
            }
            Ok(())
        }
        Commands::Ask {
            pages,
            name,
            query,
            top_k,
        } => {
            let session = open_session(&config, store).await?;
            let source_name = source_name(&pages, name);
            session.upload(&source_name, &read_pages(&pages)?).await?;
            let hits = session.search_with_scores(&query, top_k).await?;
            print_hits(&hits, &OutputFormat::Context)
        }
    }
}

async fn open_session(
    config: &RetrieverConfig,
    store: Arc<FileStore>,
) -> anyhow::Result<DocumentSession> {
    let provider = create_provider(&config.embedding).await?;
    Ok(DocumentSession::from_config(config, provider, store)?)
}

fn source_name(pages: &Path, name: Option<String>) -> String {
    name.unwrap_or_else(|| {
        pages
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n != "-")
            .unwrap_or("document")
            .to_string()
    })
}

fn read_pages(path: &Path) -> anyhow::Result<Vec<PageText>> {
    let input = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?
    };
    Ok(serde_json::from_str(&input)?)
}

fn print_hits(hits: &[SearchHit], format: &OutputFormat) -> anyhow::Result<()> {
    if hits.is_empty() && *format != OutputFormat::Json {
        println!("{NO_RESULTS}");
        return Ok(());
    }

    match format {
        OutputFormat::Summary => {
            for (rank, hit) in hits.iter().enumerate() {
                let preview: String = hit.chunk.content.chars().take(80).collect();
                println!(
                    "{:>2}. page {:<4} {:<4} distance {:.4}  {}",
                    rank + 1,
                    hit.chunk.page,
                    hit.chunk.kind,
                    hit.distance,
                    preview.replace('\n', " ")
                );
            }
        }
        OutputFormat::Full => {
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "--- #{} (page {}, {}, distance {:.4}) ---",
                    rank + 1,
                    hit.chunk.page,
                    hit.chunk.kind,
                    hit.distance
                );
                println!("{}", hit.chunk.content);
            }
        }
        OutputFormat::Json => {
            let output: Vec<HitOutput> = hits
                .iter()
                .enumerate()
                .map(|(rank, hit)| HitOutput {
                    rank: rank + 1,
                    page: hit.chunk.page,
                    kind: hit.chunk.kind.to_string(),
                    distance: hit.distance,
                    content: hit.chunk.content.clone(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Context => {
            let chunks: Vec<_> = hits.iter().map(|hit| hit.chunk.clone()).collect();
            println!("{}", format_context(&chunks));
        }
    }
    Ok(())
}

fn print_headers(headers: &[IndexHeader], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(headers)?),
        OutputFormat::Full => {
            for header in headers {
                println!("Document ID: {}", header.document_id);
                println!("  Source:     {}", header.source_name);
                println!("  Chunks:     {}", header.count);
                println!("  Model:      {}", header.model.model_id());
                println!("  Created:    {}", header.created_at.to_rfc3339());
            }
        }
        OutputFormat::Summary | OutputFormat::Context => {
            for header in headers {
                println!(
                    "{}  {} chunks  {}",
                    header.document_id, header.count, header.source_name
                );
            }
        }
    }
    Ok(())
}
