use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use doc_chat::api;
use doc_chat::config::Config;
use doc_chat::ingest::pipeline::{run_ingest, IngestOptions};
use doc_chat::models::ChatResponse;
use doc_chat::rag::pipeline::ask_question;
use doc_chat::state::AppState;

#[derive(Parser)]
#[command(name = "doc-chat")]
#[command(version)]
#[command(about = "Chat with your documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Load, chunk, embed and index the documents folder
    Ingest {
        /// Documents folder (defaults to DOC_CHAT_DOCS_DIR)
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Index namespace to write to
        #[arg(long, default_value = "")]
        namespace: String,

        /// Keep existing vectors instead of recreating the index
        #[arg(long)]
        keep_index: bool,

        /// Query to run against the fresh index as a sanity check
        #[arg(long)]
        probe: Option<String>,
    },

    /// Answer one question and print the JSON response
    Ask {
        question: String,

        /// Role used to pick namespace, model and filters
        #[arg(long)]
        role: Option<String>,

        #[arg(long, default_value = "cli")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider keys usually live in .env; load it before tracing so
    // RUST_LOG can come from it as well
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Embedding provider: {} ({})",
        config.embedding.provider,
        config.embedding.base_url
    );

    let state = AppState::new(config.clone())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let app = api::router(state);
            let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
            tracing::info!("Server listening on {}", config.bind_addr);
            axum::serve(listener, app).await?;
        }
        Command::Ingest {
            docs_dir,
            namespace,
            keep_index,
            probe,
        } => {
            let options = IngestOptions {
                docs_dir: docs_dir.unwrap_or_else(|| config.docs_dir.clone()),
                namespace,
                recreate: !keep_index,
                probe,
            };
            let report = run_ingest(&state, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Ask {
            question,
            role,
            user_id,
        } => {
            let answer = ask_question(&state, question.trim(), &user_id, role.as_deref()).await?;
            let response: ChatResponse = answer.into();
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
