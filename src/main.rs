//! # ragline CLI
//!
//! ## Usage
//!
//! ```bash
//! ragline --config ./config/ragline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragline ingest <PATH>...` | Load, chunk, embed and index files or directories |
//! | `ragline query "<question>"` | Answer a question from the indexed documents |
//! | `ragline chat` | Interactive multi-turn chat |
//! | `ragline docs list\|delete\|clear` | Inspect or prune the index |
//! | `ragline summarize <FILE>` | Summarize a document |
//! | `ragline extract <FILE>` | Extract entities, keywords and key points |
//! | `ragline sessions list\|show\|delete\|clear` | Manage saved chat sessions |
//! | `ragline serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ragline::commands;
use ragline::config;
use ragline::logging;
use ragline::server;
use ragline::services::Services;
use ragline::session_store::SessionStore;
use ragline_core::prompt::SummaryStyle;

/// ragline: ask questions about your documents with a local language model.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "ragline",
    about = "Retrieval-augmented question answering over local documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragline.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files or directories into the index.
    ///
    /// Directories are walked recursively for .pdf, .txt, .md and .docx
    /// files. Re-ingesting a file overwrites its chunks.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a question from the indexed documents.
    Query {
        question: String,

        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Wait for the full answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,

        /// Print the source files the answer was based on.
        #[arg(long)]
        sources: bool,
    },

    /// Interactive chat without document retrieval.
    Chat {
        /// Resume a saved session.
        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        no_stream: bool,
    },

    /// Inspect or prune the index.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Summarize a document.
    Summarize {
        file: PathBuf,

        /// `concise`, `detailed` or `bullet`.
        #[arg(long, default_value = "concise")]
        style: SummaryStyle,
    },

    /// Extract entities, keywords and key points from a document.
    Extract { file: PathBuf },

    /// Manage saved chat sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Show indexed documents and chunk counts.
    List,
    /// Remove every chunk of one document.
    Delete { doc_id: String },
    /// Drop the whole collection.
    Clear,
}

#[derive(Subcommand)]
enum SessionsAction {
    List,
    Show { session_id: String },
    Delete { session_id: String },
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_or_default(&cli.config)?;

    // Session management only touches the snapshot directory.
    if let Commands::Sessions { action } = &cli.command {
        let store = SessionStore::new(cfg.sessions.dir.clone());
        return match action {
            SessionsAction::List => commands::run_sessions_list(&store),
            SessionsAction::Show { session_id } => commands::run_sessions_show(&store, session_id),
            SessionsAction::Delete { session_id } => {
                commands::run_sessions_delete(&store, session_id)
            }
            SessionsAction::Clear => commands::run_sessions_clear(&store),
        };
    }

    let services = Services::from_config(cfg).await?;

    match cli.command {
        Commands::Ingest { paths } => {
            commands::run_ingest(&services, &paths).await?;
        }
        Commands::Query {
            question,
            top_k,
            no_stream,
            sources,
        } => {
            commands::run_query(&services, &question, top_k, !no_stream, sources).await?;
        }
        Commands::Chat { session, no_stream } => {
            commands::run_chat(&services, session, !no_stream).await?;
        }
        Commands::Docs { action } => match action {
            DocsAction::List => commands::run_docs_list(&services).await?,
            DocsAction::Delete { doc_id } => commands::run_docs_delete(&services, &doc_id).await?,
            DocsAction::Clear => commands::run_docs_clear(&services).await?,
        },
        Commands::Summarize { file, style } => {
            commands::run_summarize(&services, &file, style).await?;
        }
        Commands::Extract { file } => {
            commands::run_extract(&services, &file).await?;
        }
        Commands::Serve => {
            server::run_server(Arc::new(services)).await?;
        }
        Commands::Sessions { .. } => {
            // Handled above (before building services)
            unreachable!()
        }
    }

    Ok(())
}
