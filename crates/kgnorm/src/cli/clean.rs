use std::path::Path;

use anyhow::{Context, Result};
use kgnorm_core::Preprocessor;

use super::load_config;

pub async fn run(config: Option<&Path>, file: &Path) -> Result<()> {
    let config = load_config(config)?;
    let preprocessor = Preprocessor::new(&config.preprocess).context("invalid preprocess configuration")?;

    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    println!("{}", preprocessor.clean(&raw));
    Ok(())
}
