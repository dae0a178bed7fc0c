//! Question answering and search commands

use crate::app::{AskArgs, OutputFormat, SearchArgs};
use anyhow::{bail, Result};
use docq_core::{RagEngine, VectorIndexer};

pub async fn run_ask(args: AskArgs, qa: &RagEngine, format: OutputFormat) -> Result<()> {
    let question = args.question.join(" ");
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let answer = qa
        .ask(&question, args.max_chunks, args.document.as_deref())
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
        OutputFormat::Cli => {
            println!("{}", answer.answer);
            println!();
            println!("confidence: {:.2}", answer.confidence);
            for source in &answer.sources {
                println!(
                    "  [{:.2}] {}: {}",
                    source.relevance_score,
                    &source.document_id[..source.document_id.len().min(8)],
                    source.chunk_text
                );
            }
        }
    }
    Ok(())
}

pub async fn run_search(
    args: SearchArgs,
    indexer: &VectorIndexer,
    format: OutputFormat,
) -> Result<()> {
    let query = args.query.join(" ");
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let results = indexer
        .search(&query, args.limit, args.document.as_deref())
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Cli => {
            for chunk in &results {
                println!(
                    "[{:.2}] {}#{}",
                    chunk.score, chunk.document_id, chunk.chunk_index
                );
                println!("  {}", chunk.text.replace('\n', " "));
            }
        }
    }
    Ok(())
}
