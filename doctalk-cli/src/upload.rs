use std::path::PathBuf;

use anyhow::{Result, bail};
use doctalk_rag::{
    BatchItem, EmbeddingProvider, IngestionPipeline, RagConfig, Similarity, VectorStore,
    collect_files,
};
use tracing::debug;

use crate::cli::UploadArgs;
use crate::settings::Settings;

pub async fn run(settings: &Settings, args: UploadArgs) -> Result<()> {
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .build()?;

    let files = resolve_paths(&args.paths);

    let embedder = settings.embedding_provider()?;
    let store = settings.vector_store().await?;

    if args.clear {
        let removed = store.clear().await?;
        println!("Cleared {removed} existing chunks");
    }
    if args.create_index {
        store.create_vector_index(embedder.dimensions(), Similarity::Cosine).await?;
        println!("Created vector index '{}'", settings.mongo.vector_index);
    }

    if files.is_empty() {
        bail!("no supported documents found");
    }

    let pipeline = IngestionPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .vector_store(store)
        .build()?;

    println!("Uploading {} document(s)...", files.len());
    let items = pipeline.ingest_batch(&files).await;
    for item in &items {
        println!("{}", item_line(item));
    }

    let usage = embedder.usage();
    debug!(calls = usage.calls, prompt_tokens = usage.prompt_tokens, "embedding usage");

    let summary = Summary::of(&items);
    println!("{summary}");
    if summary.succeeded == 0 {
        bail!("every document failed to upload");
    }
    Ok(())
}

/// Expand every argument into supported files, reporting the ones that
/// cannot be used. Duplicates across arguments are dropped.
fn resolve_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        match collect_files(path) {
            Ok(found) => {
                for file in found {
                    if !files.contains(&file) {
                        files.push(file);
                    }
                }
            }
            Err(e) => eprintln!("Skipping {}: {e}", path.display()),
        }
    }
    files
}

fn item_line(item: &BatchItem) -> String {
    match &item.result {
        Ok(summary) if summary.chunk_count == 0 => {
            format!("  - {}: no text found, nothing stored", summary.document_name)
        }
        Ok(summary) => format!("  + {} ({} chunks)", summary.document_name, summary.chunk_count),
        Err(e) => format!("  ! {}: {e}", item.path.display()),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    succeeded: usize,
    failed: usize,
    chunks: usize,
}

impl Summary {
    fn of(items: &[BatchItem]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            match &item.result {
                Ok(summary) => {
                    acc.succeeded += 1;
                    acc.chunks += summary.chunk_count;
                }
                Err(_) => acc.failed += 1,
            }
            acc
        })
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Uploaded {} of {} document(s), {} chunks stored",
            self.succeeded,
            self.succeeded + self.failed,
            self.chunks
        )?;
        if self.failed > 0 {
            write!(f, "; {} failed", self.failed)?;
        }
        Ok(())
    }
}
