//! Submit command

use crate::app::{OutputFormat, SubmitArgs};
use anyhow::{Context, Result};
use docq_core::DocumentPipeline;
use std::time::Duration;

pub async fn run(args: SubmitArgs, pipeline: &DocumentPipeline, format: OutputFormat) -> Result<()> {
    let filename = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file path has no usable name")?
        .to_string();
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let id = pipeline.submit(bytes, &filename).await?;

    if args.wait {
        let doc = pipeline
            .wait_for_terminal(&id, Duration::from_secs(600))
            .await?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
            OutputFormat::Cli => {
                println!("{} {}", doc.id, doc.status);
                if let Some(error) = doc.error {
                    println!("  error: {error}");
                }
            }
        }
    } else {
        match format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "id": id })),
            OutputFormat::Cli => println!("{id}"),
        }
    }
    Ok(())
}
