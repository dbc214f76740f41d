use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod db;
mod model;
mod service;

use app::{AppError, AppState};
use model::Config;

#[derive(Parser)]
#[command(name = "access-intake", version, about = "Access request intake service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Keep threads, decisions and the corpus in process memory
        #[arg(long)]
        in_memory: bool,
        /// JSON ticket corpus to embed into the in-memory store at startup
        #[arg(long, requires = "in_memory")]
        corpus: Option<PathBuf>,
    },
    /// Embed a JSON ticket corpus and store it in PostgreSQL
    LoadCorpus {
        /// Path to a JSON array of historical ticket records
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Serve { in_memory, corpus } => serve(config, in_memory, corpus.as_deref()).await,
        Command::LoadCorpus { path } => load_corpus(&path).await,
    }
}

async fn serve(
    config: Config,
    in_memory: bool,
    corpus: Option<&std::path::Path>,
) -> Result<(), AppError> {
    let bind_addr = config.bind_addr();
    let state = AppState::new(config, in_memory, corpus).await?;

    let pipeline = web::Data::from(state.pipeline);
    let conversations = api::threads::conversations_data(state.conversations);
    let risk_posture = web::Data::from(state.risk_posture);
    let embeddings = web::Data::from(state.embeddings);
    let db_pool = web::Data::new(state.db_pool);

    tracing::info!("Starting access intake server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(pipeline.clone())
            .app_data(conversations.clone())
            .app_data(risk_posture.clone())
            .app_data(embeddings.clone())
            .app_data(db_pool.clone())
            .configure(api::threads::configure)
            .configure(api::posture::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn load_corpus(path: &std::path::Path) -> Result<(), AppError> {
    let pool = AppState::connect_database().await?;
    let store = db::PgStore::new(pool);
    let capability = AppState::build_capability()?;

    let inserted = service::load_corpus(path, &capability, &store).await?;
    tracing::info!(path = %path.display(), inserted, "Corpus loaded");

    Ok(())
}
