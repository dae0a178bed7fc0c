//! DocQ CLI
//!
//! Upload scanned documents, track their processing, and ask questions
//! against the indexed corpus.

use anyhow::Result;
use clap::Parser;
use docq_core::{
    BlobStore, Config, Database, DocumentPipeline, ExtractionEngine, LlmClient, OcrBackend,
    RagEngine, SqliteVectorStore, VectorIndexer, VisionOcrBackend,
};
use std::sync::Arc;

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    // Open record and blob stores (DOCQ_DB / config override the defaults)
    let db_path = std::env::var("DOCQ_DB")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| Database::default_path());
    let db = Arc::new(Database::open(&db_path)?);
    db.initialize()?;
    let blob_root = config
        .blob_dir
        .clone()
        .unwrap_or_else(BlobStore::default_root);
    let blobs = Arc::new(BlobStore::open(blob_root)?);

    // Wire capabilities: one HTTP client serves embeddings, generation,
    // and the vision OCR passes
    let client = Arc::new(LlmClient::new(config.llm_service.clone())?);
    let ocr_model = config
        .llm_service
        .ocr_model
        .clone()
        .unwrap_or_else(|| config.llm_service.model.clone());
    let primary: Arc<dyn OcrBackend> = Arc::new(VisionOcrBackend::new(client.clone(), ocr_model));
    let fallback: Option<Arc<dyn OcrBackend>> = config
        .llm_service
        .ocr_fallback_model
        .clone()
        .map(|model| Arc::new(VisionOcrBackend::new(client.clone(), model)) as Arc<dyn OcrBackend>);

    let extraction = Arc::new(ExtractionEngine::new(primary, fallback, config.ocr.clone()));
    let indexer = Arc::new(VectorIndexer::new(
        client.clone(),
        Arc::new(SqliteVectorStore::new(db.clone())),
    ));
    let pipeline = DocumentPipeline::new(
        db,
        blobs,
        extraction,
        indexer.clone(),
        config.clone(),
    );
    let qa = RagEngine::new(indexer.clone(), client, config.qa.clone());

    let result = match cli.command {
        Commands::Submit(args) => commands::submit::run(args, &pipeline, cli.format).await,
        Commands::Status(args) => commands::status::run(args, &pipeline, cli.format).await,
        Commands::Ls(args) => commands::status::run_ls(args, &pipeline, cli.format).await,
        Commands::Reprocess(args) => commands::status::run_reprocess(args, &pipeline).await,
        Commands::Cancel(args) => commands::status::run_cancel(args, &pipeline).await,
        Commands::Delete(args) => commands::delete::run(args, &pipeline).await,
        Commands::Ask(args) => commands::qa::run_ask(args, &qa, cli.format).await,
        Commands::Search(args) => commands::qa::run_search(args, &indexer, cli.format).await,
    };

    if let Err(ref e) = result {
        if let Some(docq_err) = e.downcast_ref::<docq_core::DocqError>() {
            eprintln!("Error: {docq_err}");
            std::process::exit(docq_err.exit_code());
        }
    }
    result
}
