//! CLI command implementations.
//!
//! Each `run_*` function drives one subcommand on top of [`Services`] and
//! prints human-readable output to stdout. Diagnostics go through
//! `tracing` to stderr.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ragline_core::prompt::SummaryStyle;

use crate::llm::FragmentStream;
use crate::services::Services;
use crate::session_store::SessionStore;

/// Print fragments as they arrive; returns the full text.
async fn print_stream(mut stream: FragmentStream) -> Result<String> {
    let mut stdout = std::io::stdout();
    let mut full = String::new();
    while let Some(fragment) = stream.recv().await {
        let fragment = fragment?;
        write!(stdout, "{}", fragment)?;
        stdout.flush()?;
        full.push_str(&fragment);
    }
    writeln!(stdout)?;
    Ok(full)
}

pub async fn run_ingest(services: &Services, paths: &[PathBuf]) -> Result<()> {
    let report = services.ingestor.ingest_paths(paths).await;

    for outcome in &report.ingested {
        println!(
            "  ingested {} ({} chunks, id {})",
            outcome.filename, outcome.chunks, outcome.doc_id
        );
    }
    for failure in &report.failed {
        println!("  failed   {}: {}", failure.path, failure.error);
    }
    println!(
        "ingest: {} documents, {} chunks, {} failed",
        report.ingested.len(),
        report.total_chunks(),
        report.failed.len()
    );

    if report.ingested.is_empty() && !report.failed.is_empty() {
        bail!("no documents were ingested");
    }
    Ok(())
}

pub async fn run_query(
    services: &Services,
    question: &str,
    top_k: Option<usize>,
    stream: bool,
    show_sources: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    if stream {
        let fragments = services.rag.answer_stream(question, top_k).await?;
        print_stream(fragments).await?;
        if show_sources {
            print_sources(&services.rag.sources(question, top_k).await?);
        }
    } else {
        let answer = services.rag.answer(question, top_k).await?;
        println!("{}", answer.answer);
        if show_sources {
            print_sources(&answer.sources);
        }
    }
    Ok(())
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in sources {
        println!("  - {}", source);
    }
}

/// Interactive chat over stdin. `/clear` resets history, `/exit` quits.
pub async fn run_chat(services: &Services, session: Option<String>, stream: bool) -> Result<()> {
    let session_id = match session {
        Some(id) => {
            services
                .chat
                .get_session(&id)?
                .with_context(|| format!("session not found: {}", id))?;
            id
        }
        None => services.chat.create_session()?,
    };
    println!("session {} (type /clear to reset, /exit to quit)", session_id);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let message = line.trim();
        match message {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                services.chat.clear_history(&session_id)?;
                println!("history cleared");
                continue;
            }
            _ => {}
        }

        if stream {
            let (_, fragments) = services
                .chat
                .chat_stream(Some(&session_id), message)
                .await?;
            print_stream(fragments).await?;
        } else {
            let reply = services.chat.chat(Some(&session_id), message).await?;
            println!("{}", reply.reply);
        }
    }
    Ok(())
}

pub async fn run_docs_list(services: &Services) -> Result<()> {
    let info = services.index.get_document_info().await?;
    if info.total_chunks == 0 {
        println!("No documents indexed.");
        return Ok(());
    }
    println!(
        "{} documents, {} chunks in collection '{}'",
        info.unique_documents,
        info.total_chunks,
        services.index.collection()
    );
    for file in &info.document_files {
        println!("  {}", file);
    }
    Ok(())
}

pub async fn run_docs_delete(services: &Services, doc_id: &str) -> Result<()> {
    let removed = services.index.delete_document(doc_id).await?;
    if removed == 0 {
        println!("No chunks found for document {}", doc_id);
    } else {
        println!("Deleted {} chunks of document {}", removed, doc_id);
    }
    Ok(())
}

pub async fn run_docs_clear(services: &Services) -> Result<()> {
    services.index.clear_all().await?;
    println!("Index cleared.");
    Ok(())
}

pub async fn run_summarize(services: &Services, path: &Path, style: SummaryStyle) -> Result<()> {
    let summary = services
        .summarizer
        .summarize_file(path, style)
        .await
        .with_context(|| format!("Failed to summarize {}", path.display()))?;
    println!("{}", summary);
    Ok(())
}

pub async fn run_extract(services: &Services, path: &Path) -> Result<()> {
    let result = services
        .extractor
        .extract_from_file(path)
        .await
        .with_context(|| format!("Failed to extract from {}", path.display()))?;

    println!("Entities:");
    for entity in &result.entities {
        println!("  {} ({})", entity.text, entity.kind);
    }
    println!("Keywords:");
    for keyword in &result.keywords {
        println!("  {}", keyword.text);
    }
    println!("Key points:");
    for point in &result.key_points {
        println!("  - {}", point);
    }
    Ok(())
}

pub fn run_sessions_list(store: &SessionStore) -> Result<()> {
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }
    for s in sessions {
        println!(
            "{}  {} messages  updated {}",
            s.session_id,
            s.message_count,
            s.updated_at.to_rfc3339()
        );
    }
    Ok(())
}

pub fn run_sessions_show(store: &SessionStore, session_id: &str) -> Result<()> {
    let session = store
        .load(session_id)?
        .with_context(|| format!("session not found: {}", session_id))?;
    println!("session {}", session.session_id);
    println!("created {}", session.created_at.to_rfc3339());
    for message in &session.messages {
        println!();
        println!("{}: {}", message.role.label(), message.content);
    }
    Ok(())
}

pub fn run_sessions_delete(store: &SessionStore, session_id: &str) -> Result<()> {
    if !store.delete(session_id)? {
        bail!("session not found: {}", session_id);
    }
    println!("Deleted session {}", session_id);
    Ok(())
}

pub fn run_sessions_clear(store: &SessionStore) -> Result<()> {
    let removed = store.clear()?;
    println!("Deleted {} sessions", removed);
    Ok(())
}
