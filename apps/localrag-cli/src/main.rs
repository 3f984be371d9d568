use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use localrag_core::config::Config;
use localrag_core::{DirectoryLoader, Settings};
use localrag_pipeline::{IngestMode, Pipeline, QueryOutcome};

#[derive(Parser)]
#[command(name = "localrag", version, about = "Ask questions about a local document folder")]
struct Cli {
    /// Configuration file; `config.<RUST_ENV>.toml` next to it and APP_* variables override it.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index a directory, then write the index snapshot.
    Ingest {
        /// Defaults to `data.docs_dir`.
        dir: Option<PathBuf>,
        /// Defaults to `data.snapshot_path`.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Start from an empty index instead of extending the existing snapshot.
        #[arg(long)]
        replace: bool,
    },
    /// Answer a single question.
    Ask {
        question: String,
        #[arg(long)]
        k: Option<usize>,
        /// Print the retrieved chunks after the answer.
        #[arg(long)]
        sources: bool,
    },
    /// Interactive loop; an empty line, EOF or Ctrl-C exits.
    Chat {
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        sources: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("localrag=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Relative paths in the config resolve against the config file's directory.
fn config_base(config: &Path) -> PathBuf {
    match config.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn ingest_dir(pipeline: &Pipeline, settings: &Settings, dir: &Path, mode: IngestMode) -> anyhow::Result<()> {
    let loader = DirectoryLoader::new(dir, &settings.data.extensions)?;
    println!("Ingesting {} files from {}", loader.remaining(), dir.display());
    let report = pipeline.ingest(loader, mode).await.with_context(|| format!("ingesting {}", dir.display()))?;
    println!(
        "Indexed {} chunks from {} documents ({} in index, {:.1}s)",
        report.chunks,
        report.documents,
        report.index_size,
        report.elapsed.as_secs_f32()
    );
    Ok(())
}

/// Load the snapshot when there is one, otherwise ingest `data.docs_dir`.
async fn ready_pipeline(settings: &Settings, base: &Path) -> anyhow::Result<Pipeline> {
    let pipeline = Pipeline::from_settings(settings).context("initializing pipeline")?;
    let snapshot = settings.data.snapshot_path(base);
    if snapshot.exists() {
        pipeline
            .load_snapshot(&snapshot)
            .with_context(|| format!("loading {} (rebuild it with `localrag ingest --replace`)", snapshot.display()))?;
        info!(path = %snapshot.display(), "using snapshot");
    } else {
        warn!(path = %snapshot.display(), "no snapshot, ingesting documents first");
        ingest_dir(&pipeline, settings, &settings.data.docs_dir(base), IngestMode::Append).await?;
    }
    Ok(pipeline)
}

fn print_outcome(outcome: &QueryOutcome, sources: bool) {
    println!("{}", outcome.answer);
    if sources {
        for (i, hit) in outcome.retrieval.iter().enumerate() {
            let c = &hit.chunk;
            println!(
                "  {}. score={:.4}  {} (chunk {} of {}, chars {}..{})",
                i + 1,
                hit.score,
                c.source.path,
                c.chunk_index + 1,
                c.total_chunks,
                c.start,
                c.end
            );
        }
    }
}

async fn chat(pipeline: &Pipeline, k: Option<usize>, sources: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Query: ");
        std::io::stdout().flush()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else { break };
        let question = line.trim();
        if question.is_empty() {
            break;
        }
        match pipeline.ask(question, k).await {
            Ok(outcome) => print_outcome(&outcome, sources),
            Err(e) => {
                warn!(error = %e, "query failed");
                println!("Error: {}", e);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;
    let settings = config.settings().with_context(|| format!("reading {}", cli.config.display()))?;
    let base = config_base(&cli.config);

    match cli.command {
        Command::Ingest { dir, snapshot, replace } => {
            let dir = dir.unwrap_or_else(|| settings.data.docs_dir(&base));
            let snapshot = snapshot.unwrap_or_else(|| settings.data.snapshot_path(&base));
            let pipeline = Pipeline::from_settings(&settings).context("initializing pipeline")?;
            if !replace && snapshot.exists() {
                pipeline.load_snapshot(&snapshot).with_context(|| format!("loading {}", snapshot.display()))?;
            }
            let mode = if replace { IngestMode::Replace } else { IngestMode::Append };
            ingest_dir(&pipeline, &settings, &dir, mode).await?;
            pipeline.save_snapshot(&snapshot).with_context(|| format!("writing {}", snapshot.display()))?;
            println!("Snapshot written to {}", snapshot.display());
        }
        Command::Ask { question, k, sources } => {
            let pipeline = ready_pipeline(&settings, &base).await?;
            let outcome = pipeline.ask(&question, k).await?;
            print_outcome(&outcome, sources);
        }
        Command::Chat { k, sources } => {
            let pipeline = ready_pipeline(&settings, &base).await?;
            let stats = pipeline.stats();
            println!("{} chunks indexed with {}, answering with {}", stats.index_size, stats.embedder, stats.generator);
            chat(&pipeline, k, sources).await?;
        }
    }
    Ok(())
}
