mod cli;
mod config;
mod errors;
mod imaging;
mod layout;
mod llm_client;
mod models;
mod pipeline;
mod render;
mod retry;
mod signing;
mod state;
mod story;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::errors::BookError;
use crate::models::StoryRequest;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.books_dir {
        config.books_dir = dir.clone();
    }

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting storybook v{}", env!("CARGO_PKG_VERSION"));
    let state = AppState::new(config);

    let result = match cli.command {
        Command::Generate {
            theme,
            style,
            pages,
            concurrency,
            no_pdf,
        } => {
            let request = StoryRequest::new(theme, style, pages);
            generate(&state, &request, concurrency, !no_pdf).await
        }
        Command::List => list(&state).await,
        Command::Delete { theme } => delete(&state, &theme).await,
    };

    if let Err(e) = result {
        error!(code = e.code(), "{e}");
        eprintln!("{} [{}]", e.user_message(), e.code());
        std::process::exit(1);
    }
    Ok(())
}

async fn generate(
    state: &AppState,
    request: &StoryRequest,
    concurrency: Option<usize>,
    with_pdf: bool,
) -> Result<(), BookError> {
    request.validate()?;
    let pipeline = state.build_pipeline(concurrency, with_pdf)?;

    // Ctrl-C stops new pages from starting; pages in flight finish.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing pages in flight");
            on_interrupt.cancel();
        }
    });

    let outcome = pipeline.generate_book(request, &cancel).await;
    interrupt.abort();
    let manifest = outcome?;

    println!("Book {} ({})", manifest.theme, manifest.book_id);
    println!("  directory: {}", manifest.directory.display());
    println!(
        "  saved {} of {} pages",
        manifest.saved_pages().count(),
        manifest.pages.len()
    );
    for page in &manifest.pages {
        match page.artifact() {
            Some(artifact) => println!(
                "  page {:>3}: {}{}",
                page.page_number,
                artifact.file_path.display(),
                if artifact.overlay_applied { " (dialogue)" } else { "" }
            ),
            None => println!("  page {:>3}: skipped", page.page_number),
        }
    }
    match &manifest.pdf_path {
        Some(pdf) => println!("  pdf: {}", pdf.display()),
        None if with_pdf => println!("  pdf: not rendered"),
        None => {}
    }
    Ok(())
}

async fn list(state: &AppState) -> Result<(), BookError> {
    let books = state.store.list_books().await?;
    if books.is_empty() {
        println!("No books in {}", state.store.root().display());
        return Ok(());
    }
    for book in books {
        let created = book
            .metadata
            .as_ref()
            .map(|m| m.created_at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{}  {} page(s)  pdf: {}  created: {created}",
            book.theme,
            book.images.len(),
            if book.has_pdf { "yes" } else { "no" },
        );
    }
    Ok(())
}

async fn delete(state: &AppState, theme: &str) -> Result<(), BookError> {
    state.store.delete_book(theme).await?;
    println!("Deleted {theme}");
    Ok(())
}
