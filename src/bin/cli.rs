//! Interactive command-line interface driving the same in-process components
//! as the HTTP server

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use docqa::config::RagConfig;
use docqa::engine::DEFAULT_SESSION;
use docqa::providers::ProviderRegistry;
use docqa::server::state::AppState;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Document Q&A with retrieval-augmented answers")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "docqa.toml")]
    config: PathBuf,

    /// Path to the providers file
    #[arg(long, default_value = "providers.toml")]
    providers: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files or directories into the index
    Ingest {
        /// Files or directories (directories are walked recursively)
        paths: Vec<PathBuf>,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Session to converse in
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Interactive question loop
    Chat {
        /// Session to converse in
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Similarity search without generation
    Search {
        query: String,
        /// Number of results
        #[arg(long, short)]
        k: Option<usize>,
    },
    /// Show indexed documents and session counts
    Status,
    /// Show a session's conversation history
    History {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Clear a session's history, or the whole index with --documents
    Clear {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
        /// Also remove every indexed document
        #[arg(long)]
        documents: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        RagConfig::load(&cli.config)?
    } else {
        RagConfig::default()
    };
    let registry = if cli.providers.exists() {
        ProviderRegistry::load(&cli.providers)?
    } else {
        ProviderRegistry::empty()
    };

    let state = AppState::new(config, registry)?;

    match cli.command {
        Commands::Ingest { paths } => ingest(&state, &paths).await?,
        Commands::Ask { question, session } => ask(&state, &session, &question).await?,
        Commands::Chat { session } => chat_loop(&state, &session).await?,
        Commands::Search { query, k } => search(&state, &query, k).await?,
        Commands::Status => show_status(&state),
        Commands::History { session } => show_history(&state, &session),
        Commands::Clear { session, documents } => {
            state.engine().clear(&session);
            println!("Cleared session '{}'", session);
            if documents {
                let removed = state.index().clear()?;
                state.clear_records();
                println!("Removed {} indexed chunks", removed);
            }
        }
    }

    Ok(())
}

/// Expand directories recursively, keeping plain files as-is
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

async fn ingest(state: &AppState, paths: &[PathBuf]) -> anyhow::Result<()> {
    let files = collect_files(paths);
    if files.is_empty() {
        println!("{}", style("No files to ingest").yellow());
        return Ok(());
    }

    let mut total_chunks = 0usize;
    let mut failures = 0usize;

    for file in &files {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let data = match std::fs::read(file) {
            Ok(d) => d,
            Err(e) => {
                println!("{} {}: {}", style("✗").red(), file.display(), e);
                failures += 1;
                continue;
            }
        };

        match ingest_file(state, &filename, &data).await {
            Ok(chunks) => {
                total_chunks += chunks;
                println!(
                    "{} {} ({} chunks)",
                    style("✓").green(),
                    filename,
                    chunks
                );
            }
            Err(e) => {
                println!("{} {}: {}", style("✗").red(), filename, e);
                failures += 1;
            }
        }
    }

    println!(
        "\nIngested {} file(s), {} chunk(s), {} failure(s)",
        files.len() - failures,
        total_chunks,
        failures
    );
    Ok(())
}

async fn ingest_file(state: &AppState, filename: &str, data: &[u8]) -> docqa::Result<usize> {
    let output = state.pipeline().ingest(filename, data)?;
    let chunk_count = output.chunks.len();
    state.index().add(output.chunks).await?;
    state.add_record(docqa::types::DocumentRecord {
        source_id: filename.to_string(),
        file_kind: output.file_kind,
        chunk_count,
        bytes: data.len(),
        content_hash: output.content_hash,
        ingested_at: chrono::Utc::now(),
    });
    Ok(chunk_count)
}

async fn ask(state: &AppState, session: &str, question: &str) -> anyhow::Result<()> {
    let result = state.engine().ask(session, question).await?;
    println!("\n{}", result.answer.trim());
    if !result.sources.is_empty() {
        println!("\n{}", style("Sources:").bold());
        for source in &result.sources {
            println!("  - {}, chunk {}", source.source_id, source.position);
        }
    }
    Ok(())
}

async fn chat_loop(state: &AppState, session: &str) -> anyhow::Result<()> {
    println!(
        "{} (session '{}', empty line to exit)",
        style("Interactive chat").bold(),
        session
    );

    let stdin = std::io::stdin();
    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match state.engine().ask(session, question).await {
            Ok(result) => {
                println!("\n{}\n", result.answer.trim());
                for source in &result.sources {
                    println!(
                        "  {} {}, chunk {}",
                        style("→").dim(),
                        source.source_id,
                        source.position
                    );
                }
                println!();
            }
            Err(e) => println!("{} {}", style("Error:").red().bold(), e),
        }
    }

    Ok(())
}

async fn search(state: &AppState, query: &str, k: Option<usize>) -> anyhow::Result<()> {
    let k = k.unwrap_or(state.config().retrieval.top_k);
    let results = state.index().search(query, k).await?;

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }

    for hit in results {
        println!(
            "{} {} [{}, chunk {}]",
            style(format!("{:.3}", hit.score)).dim(),
            preview(&hit.chunk.text),
            hit.chunk.source_id,
            hit.chunk.position
        );
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flattened = text.replace('\n', " ");
    let mut out: String = flattened.chars().take(100).collect();
    if flattened.chars().count() > 100 {
        out.push('…');
    }
    out
}

fn show_status(state: &AppState) {
    println!("{}", style("Index").bold());
    println!("  documents: {}", state.record_count());
    println!("  chunks:    {}", state.index().chunk_count());
    println!("  sessions:  {}", state.memory().session_count());
    match state.registry().active_id() {
        Some(id) => println!("  provider:  {}", id),
        None => println!("  provider:  {}", style("none configured").yellow()),
    }

    let records = state.list_records();
    if !records.is_empty() {
        println!("\n{}", style("Documents").bold());
        for record in records {
            println!(
                "  {} ({}, {} chunks, {} bytes)",
                record.source_id, record.file_kind, record.chunk_count, record.bytes
            );
        }
    }
}

fn show_history(state: &AppState, session: &str) {
    let turns = state.memory().get(session);
    if turns.is_empty() {
        println!("No history for session '{}'", session);
        return;
    }

    for turn in turns {
        println!("{} {}", style("Q:").cyan().bold(), turn.question);
        println!("{} {}", style("A:").green().bold(), turn.answer.trim());
        for source in &turn.sources {
            println!("   - {}, chunk {}", source.source_id, source.position);
        }
        println!();
    }
}
