//! CLI entry point for the JuRAG pipeline (for dev and testing).

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use jurag_core::{
    app_data_dir, load_config, load_pdfs, set_pdf_dir, Answer, Config, Embedder, GroqClient,
    InitReport, LanguageModel, LlmProvider, OllamaClient, Pipeline, PipelineSettings,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jurag")]
#[command(about = "JuRAG: ask questions about a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory with the PDF corpus (overrides config).
    #[arg(long, global = true, value_name = "PATH")]
    pdf_dir: Option<PathBuf>,

    /// Where the index is persisted (overrides config).
    #[arg(long, global = true, value_name = "PATH")]
    index_path: Option<PathBuf>,

    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    #[arg(long, global = true)]
    overlap: Option<usize>,

    /// Number of chunks retrieved per question.
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Debug logging (RUST_LOG still wins when set).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show the resolved configuration.
    Status,
    /// Show where JuRAG stores its config and index (app data directory).
    DataDir,
    /// Remember PATH as the PDF directory in the config file.
    SetPdfDir {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Scan a directory for PDFs and list their pages.
    Scan {
        /// Directory to scan.
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Build the index, or load it if it was already persisted.
    Index {
        /// Rebuild from the PDFs even if an index is persisted; the old one is
        /// replaced only once the new one is complete.
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer one question.
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Answer questions read line by line from stdin.
    Chat,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,jurag_core=debug,jurag=debug"
    } else {
        "info,jurag_core=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn settings(cli: &Cli, config: &Config) -> PipelineSettings {
    let mut s = config.pipeline_settings();
    if let Some(p) = &cli.pdf_dir {
        s.pdf_dir = p.clone();
    }
    if let Some(p) = &cli.index_path {
        s.index_path = p.clone();
    }
    if let Some(n) = cli.chunk_size {
        s.chunk_size = n;
    }
    if let Some(n) = cli.overlap {
        s.overlap = n;
    }
    if let Some(n) = cli.top_k {
        s.top_k = n;
    }
    s
}

fn build_pipeline(cli: &Cli, config: &Config) -> Result<Pipeline, String> {
    let ollama = OllamaClient::from_url(&config.embedding.base_url)
        .map_err(|e| e.to_string())?
        .with_embed_model(&config.embedding.model, config.embedding.dimensions);
    let embedder: Arc<dyn Embedder> = Arc::new(ollama.clone());
    tracing::debug!(provider = ?config.llm.provider, model = %config.llm.model, "using language model");
    let llm: Arc<dyn LanguageModel> = match config.llm.provider {
        LlmProvider::Groq => {
            let mut client = GroqClient::from_env()
                .map_err(|e| e.to_string())?
                .with_model(&config.llm.model);
            if let Some(url) = &config.llm.base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        LlmProvider::Ollama => {
            let client = match &config.llm.base_url {
                Some(url) => OllamaClient::from_url(url).map_err(|e| e.to_string())?,
                None => ollama,
            };
            Arc::new(client.with_completion_model(&config.llm.model))
        }
    };
    Ok(Pipeline::new(settings(cli, config), embedder, llm))
}

async fn ready_pipeline(cli: &Cli, config: &Config) -> Result<Pipeline, String> {
    let mut pipeline = build_pipeline(cli, config)?;
    let report = pipeline.initialize().await.map_err(|e| e.to_string())?;
    eprintln!("{}", describe(&report));
    Ok(pipeline)
}

async fn rebuilt_pipeline(cli: &Cli, config: &Config) -> Result<Pipeline, String> {
    let mut pipeline = build_pipeline(cli, config)?;
    let report = pipeline.rebuild().await.map_err(|e| e.to_string())?;
    eprintln!("{}", describe(&report));
    Ok(pipeline)
}

fn describe(report: &InitReport) -> String {
    match report {
        InitReport::Restored { chunks } => format!("Loaded persisted index ({chunks} chunks)."),
        InitReport::Built {
            pages,
            chunks,
            skipped_files,
        } => format!(
            "Indexed {pages} page(s) into {chunks} chunk(s); {skipped_files} file(s) skipped."
        ),
        InitReport::AlreadyReady { chunks } => format!("Index ready ({chunks} chunks)."),
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for s in &answer.sources {
            println!("  - {s}");
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = load_config();
    let status = Commands::Status;
    let command = cli.command.as_ref().unwrap_or(&status);
    match command {
        Commands::Status => {
            let s = settings(&cli, &config);
            println!("JuRAG");
            println!("  pdf dir:     {}", s.pdf_dir.display());
            println!("  index path:  {}", s.index_path.display());
            println!("  chunking:    {} chars, {} overlap", s.chunk_size, s.overlap);
            println!("  top k:       {}", s.top_k);
            println!(
                "  embeddings:  {} ({} dims) at {}",
                config.embedding.model, config.embedding.dimensions, config.embedding.base_url
            );
            println!("  llm:         {:?} / {}", config.llm.provider, config.llm.model);
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => return Err("could not determine app data directory".to_string()),
        },
        Commands::SetPdfDir { path } => {
            set_pdf_dir(path).map_err(|e| e.to_string())?;
            println!("PDF directory set to {}", path.display());
        }
        Commands::Scan { path } => {
            let corpus = load_pdfs(path).map_err(|e| e.to_string())?;
            println!(
                "Scanned {} page(s) under {}",
                corpus.documents.len(),
                path.display()
            );
            for d in &corpus.documents {
                let first = d.text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
                let preview: String = first.chars().take(60).collect();
                println!("  {}  {}", d.source, preview);
            }
            for s in &corpus.skipped {
                println!("  skipped {}: {}", s.path.display(), s.reason);
            }
        }
        Commands::Index { rebuild } => {
            let pipeline = if *rebuild {
                rebuilt_pipeline(&cli, &config).await?
            } else {
                ready_pipeline(&cli, &config).await?
            };
            println!("Index at {}", pipeline.settings().index_path.display());
        }
        Commands::Ask { question, json } => {
            let pipeline = ready_pipeline(&cli, &config).await?;
            let answer = pipeline.ask(question).await.map_err(|e| e.to_string())?;
            if *json {
                let out = serde_json::to_string_pretty(&answer).map_err(|e| e.to_string())?;
                println!("{out}");
            } else {
                print_answer(&answer);
            }
        }
        Commands::Chat => {
            let pipeline = ready_pipeline(&cli, &config).await?;
            eprintln!("Ask a question (Ctrl+D to quit).");
            for line in std::io::stdin().lock().lines() {
                let line = line.map_err(|e| e.to_string())?;
                if line.trim().is_empty() {
                    continue;
                }
                match pipeline.ask(&line).await {
                    Ok(answer) => print_answer(&answer),
                    Err(e) => eprintln!("Error: {e}"),
                }
                println!();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
