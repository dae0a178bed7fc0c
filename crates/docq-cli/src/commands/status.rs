//! Status and listing commands

use crate::app::{LsArgs, OutputFormat, StatusArgs};
use anyhow::Result;
use docq_core::{Document, DocumentPipeline, DocumentStatus};

pub async fn run(args: StatusArgs, pipeline: &DocumentPipeline, format: OutputFormat) -> Result<()> {
    let doc = pipeline.get_status(&args.id)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
        OutputFormat::Cli => print_document(&doc),
    }
    Ok(())
}

pub async fn run_ls(args: LsArgs, pipeline: &DocumentPipeline, format: OutputFormat) -> Result<()> {
    let status = args
        .status
        .as_deref()
        .map(DocumentStatus::parse)
        .transpose()?;
    let docs = pipeline.list(status, args.limit, args.offset)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&docs)?),
        OutputFormat::Cli => {
            for doc in docs {
                println!("{}  {:10}  {}", doc.id, doc.status.as_str(), doc.filename);
            }
        }
    }
    Ok(())
}

pub async fn run_reprocess(args: StatusArgs, pipeline: &DocumentPipeline) -> Result<()> {
    pipeline.reprocess(&args.id).await?;
    println!("Reprocessing {}", args.id);
    Ok(())
}

pub async fn run_cancel(args: StatusArgs, pipeline: &DocumentPipeline) -> Result<()> {
    pipeline.cancel(&args.id)?;
    println!("Cancellation requested for {}", args.id);
    Ok(())
}

fn print_document(doc: &Document) {
    println!("id:         {}", doc.id);
    println!("filename:   {}", doc.filename);
    println!("status:     {}", doc.status);
    println!("uploaded:   {}", doc.uploaded_at.to_rfc3339());
    println!("updated:    {}", doc.updated_at.to_rfc3339());
    if let Some(confidence) = doc.ocr_confidence {
        println!("confidence: {confidence:.2}");
    }
    if let Some(flagged) = doc.flagged_regions {
        if flagged > 0 {
            println!("flagged:    {flagged} low-confidence regions");
        }
    }
    if let Some(ref metadata) = doc.metadata {
        for (field, values) in metadata {
            println!("{field}: {}", values.join(", "));
        }
    }
    if let Some(ref error) = doc.error {
        println!("error:      {error}");
    }
}
