//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docq")]
#[command(
    author,
    version,
    about = "Document ingestion with OCR and retrieval-augmented question answering"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Cli,
    /// JSON output
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a document and process it
    Submit(SubmitArgs),

    /// Show a document's processing status
    Status(StatusArgs),

    /// List documents
    Ls(LsArgs),

    /// Re-run processing for a document from scratch
    Reprocess(StatusArgs),

    /// Request cancellation of an in-flight document
    Cancel(StatusArgs),

    /// Delete a document and its indexed chunks
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Ask a question against the indexed corpus
    Ask(AskArgs),

    /// Semantic search over indexed chunks
    Search(SearchArgs),
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Path to the document (pdf, png, jpg, jpeg, tiff)
    pub file: PathBuf,

    /// Wait for processing to finish before returning
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Document id
    pub id: String,
}

#[derive(Args)]
pub struct LsArgs {
    /// Filter by status (uploaded, extracting, extracted, indexing, indexed, failed)
    #[arg(long)]
    pub status: Option<String>,

    /// Maximum number of documents
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Skip this many documents
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Document id
    pub id: String,
}

#[derive(Args)]
pub struct AskArgs {
    /// Question text
    pub question: Vec<String>,

    /// Maximum evidence chunks
    #[arg(long, default_value = "3")]
    pub max_chunks: usize,

    /// Restrict retrieval to one document
    #[arg(long)]
    pub document: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: Vec<String>,

    /// Maximum results
    #[arg(long, default_value = "5")]
    pub limit: usize,

    /// Restrict search to one document
    #[arg(long)]
    pub document: Option<String>,
}
