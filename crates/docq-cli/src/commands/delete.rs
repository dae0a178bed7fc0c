//! Delete command

use crate::app::DeleteArgs;
use anyhow::Result;
use docq_core::DocumentPipeline;

pub async fn run(args: DeleteArgs, pipeline: &DocumentPipeline) -> Result<()> {
    pipeline.delete(&args.id).await?;
    println!("Deleted {}", args.id);
    Ok(())
}
