use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use kgnorm_core::pipeline::document_id;
use kgnorm_core::{Document, Pipeline};

use super::load_config;

const EXTENSIONS: &[&str] = &["txt", "md"];

pub async fn run(
    config: Option<&Path>,
    inputs: &[PathBuf],
    output: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let mut config = load_config(config)?;
    if strict {
        config.relations.strict = true;
    }
    let pipeline = Pipeline::from_config(&config).context("invalid configuration")?;

    let paths = collect_inputs(inputs)?;
    let mut documents = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in &paths {
        match Document::load(path).await {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                unreadable.push(document_id(path));
            }
        }
    }

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let mut batch = pipeline.process_batch(documents, cancel).await;
    for id in unreadable {
        batch.summary.record_unreadable(id);
    }

    let json = serde_json::to_string_pretty(&batch.results)?;
    match output {
        Some(path) => tokio::fs::write(path, format!("{json}\n"))
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    let summary = &batch.summary;
    eprintln!(
        "processed {} documents: {} complete, {} partial, {} failed",
        summary.documents, summary.complete, summary.partial, summary.failed
    );
    if !summary.unreadable.is_empty() {
        eprintln!(
            "unreadable: {}",
            summary.unreadable.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    if batch.cancelled {
        eprintln!("cancelled: results contain only completed documents");
    }

    Ok(())
}

/// Expands directories into their `.txt`/`.md` files, sorted by name.
/// Explicit file arguments are taken as-is.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && has_text_extension(path))
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }

    let mut ids: HashMap<String, &Path> = HashMap::new();
    for path in &paths {
        if let Some(first) = ids.insert(document_id(path), path) {
            bail!(
                "document id '{}' is used by both {} and {}",
                document_id(path),
                first.display(),
                path.display()
            );
        }
    }

    Ok(paths)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}
