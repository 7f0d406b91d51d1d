use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use quarry_clients::{ClientConfig, HttpCompletionClient, HttpEmbeddingClient};
use quarry_ingest::IngestConfig;
use quarry_retriever::{
    BuilderConfig, ChatEngine, EngineConfig, IndexBuilder, IndexStorage, QueryOutcome,
    RetrievalEngine, ScoredUnit,
};
use serde::Deserialize;

const DEFAULT_SERVER_URL: &str = "http://localhost:8081";
const DEFAULT_STORAGE_DIR: &str = "quarry-index";

/// Index a document corpus and answer questions against it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML config file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the model server
    #[arg(long)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index from a corpus directory
    Index {
        /// Directory tree of documents to index
        corpus: Option<PathBuf>,
        /// Directory where the index database is written
        #[arg(short, long)]
        storage: Option<PathBuf>,
        /// Persist and reload after this many files
        #[arg(long)]
        checkpoint_interval: Option<usize>,
        /// Expected embedding dimension
        #[arg(long)]
        dimension: Option<usize>,
        /// Neighbor sentences on each side of a window
        #[arg(long)]
        window_size: Option<usize>,
        /// File extensions to index (comma-separated)
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,
    },
    /// Answer a single question against the index
    Query {
        /// The question to answer
        question: String,
        /// Directory containing the index database
        #[arg(short, long)]
        storage: Option<PathBuf>,
        /// Candidates taken from vector search
        #[arg(long)]
        top_k: Option<usize>,
        /// Units surviving the reranker
        #[arg(long)]
        top_n: Option<usize>,
        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Hold a multi-turn conversation against the index
    Chat {
        /// Directory containing the index database
        #[arg(short, long)]
        storage: Option<PathBuf>,
        /// Candidates taken from vector search
        #[arg(long)]
        top_k: Option<usize>,
        /// Units surviving the reranker
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Show statistics for a persisted index
    Stats {
        /// Directory containing the index database
        #[arg(short, long)]
        storage: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

/// Settings read from the optional TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    corpus_root: Option<PathBuf>,
    storage_dir: Option<PathBuf>,
    checkpoint_interval: Option<usize>,
    embedding_dimension: Option<usize>,
    window_size: Option<usize>,
    extensions: Option<Vec<String>>,
    similarity_top_k: Option<usize>,
    rerank_top_n: Option<usize>,
}

impl FileConfig {
    fn load(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(FileConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config file {}: {}", path.display(), e))?;
        let config = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Cannot parse config file {}: {}", path.display(), e))?;
        Ok(config)
    }
}

fn pick<T>(flag: Option<T>, file: Option<T>, default: T) -> T {
    flag.or(file).unwrap_or(default)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let file = FileConfig::load(args.config.as_ref())?;

    let server_url = pick(
        args.server_url,
        file.server_url.clone(),
        DEFAULT_SERVER_URL.to_string(),
    );
    let clients = ClientConfig::new(server_url);

    match args.command {
        Commands::Index {
            corpus,
            storage,
            checkpoint_interval,
            dimension,
            window_size,
            extensions,
        } => {
            let corpus = corpus.or(file.corpus_root.clone()).ok_or_else(|| {
                anyhow::anyhow!(
                    "No corpus directory given; pass one or set corpus_root in the config file"
                )
            })?;
            let storage = storage_dir(storage, &file);

            let mut ingest =
                IngestConfig::default().with_window_size(pick(window_size, file.window_size, 3));
            if let Some(exts) = extensions.or(file.extensions.clone()) {
                ingest = ingest.with_allowed_extensions(exts);
            }

            let config = BuilderConfig::new(&corpus, &storage)
                .with_checkpoint_interval(pick(checkpoint_interval, file.checkpoint_interval, 10))
                .with_embedding_dimension(pick(dimension, file.embedding_dimension, 768))
                .with_ingest(ingest);

            let embedding = Arc::new(HttpEmbeddingClient::new(clients)?);
            let mut builder = IndexBuilder::new(config, embedding);
            let report = builder.run().await?;

            println!(
                "Indexed {} files ({} units) into {}",
                report.files_indexed,
                report.units_indexed,
                storage.display()
            );
            if report.files_skipped > 0 {
                println!("Skipped {} files; see the log for reasons", report.files_skipped);
            }
            println!("Checkpoints written: {}", report.persist_count);
            Ok(())
        }
        Commands::Query {
            question,
            storage,
            top_k,
            top_n,
            stream,
            format,
        } => {
            let engine = open_engine(storage, top_k, top_n, &file, clients).await?;

            if stream {
                let (mut deltas, sources) = engine.stream_query(&question).await?;
                while let Some(delta) = deltas.next_delta().await {
                    print!("{}", delta?.text);
                    std::io::stdout().flush()?;
                }
                println!();
                print_sources(&sources);
                return Ok(());
            }

            let outcome = engine.query_with_sources(&question).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                OutputFormat::Text => {
                    println!("{}", outcome.answer);
                    print_sources(&outcome.sources);
                }
            }
            Ok(())
        }
        Commands::Chat {
            storage,
            top_k,
            top_n,
        } => {
            let engine = open_engine(storage, top_k, top_n, &file, clients).await?;
            let mut chat = ChatEngine::new(engine);

            println!("Chat ready. Type a question, or \"exit\" to leave.");
            let stdin = std::io::stdin();
            loop {
                print!("> ");
                std::io::stdout().flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                if message == "exit" || message == "quit" {
                    break;
                }

                match chat.chat(message).await {
                    Ok(QueryOutcome { answer, sources }) => {
                        println!("{answer}");
                        print_sources(&sources);
                    }
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Ok(())
        }
        Commands::Stats { storage, format } => {
            let storage = storage_dir(storage, &file);
            let store = IndexStorage::open_existing(&storage).await?;

            let Some(stats) = store.stats().await? else {
                println!("No index has been persisted yet");
                return Ok(());
            };

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("Index statistics:");
                    println!("  Units: {}", stats.unit_count);
                    println!("  Dimension: {}", stats.dimension);
                    println!("  Source files: {}", stats.source_files);
                    println!("  Created: {}", stats.created_at);
                    println!("  Updated: {}", stats.updated_at);
                }
            }
            Ok(())
        }
    }
}

fn storage_dir(flag: Option<PathBuf>, file: &FileConfig) -> PathBuf {
    pick(
        flag,
        file.storage_dir.clone(),
        PathBuf::from(DEFAULT_STORAGE_DIR),
    )
}

async fn open_engine(
    storage: Option<PathBuf>,
    top_k: Option<usize>,
    top_n: Option<usize>,
    file: &FileConfig,
    clients: ClientConfig,
) -> anyhow::Result<RetrievalEngine> {
    let storage = storage_dir(storage, file);
    let config = EngineConfig::new()
        .with_similarity_top_k(pick(top_k, file.similarity_top_k, 100))
        .with_rerank_top_n(pick(top_n, file.rerank_top_n, 5));

    let embedding = Arc::new(HttpEmbeddingClient::new(clients.clone())?);
    let completion = Arc::new(HttpCompletionClient::new(clients)?);
    Ok(RetrievalEngine::open(&storage, embedding, completion, config).await?)
}

fn print_sources(sources: &[ScoredUnit]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in sources {
        println!(
            "  {:.3} | {}#{}",
            source.score, source.unit.source_path, source.unit.sequence
        );
    }
}
