use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use kgnorm_core::config::{ExtractorBackend, RecognizerBackend};
use kgnorm_core::services::{build_extractor, build_recognizer};
use kgnorm_core::{
    EntityPostprocessor, PipelineConfig, Preprocessor, RelationCatalog, RelationPostprocessor,
};

use super::load_config;

fn catalog(config: &PipelineConfig) -> Result<RelationCatalog> {
    RelationCatalog::build(
        &config.relations.effective_catalog(),
        config.relations.on_alias_collision,
    )
    .context("invalid relation catalog")
}

/// Compiles every part of the configuration without calling any service.
pub fn run_check(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    config.validate().context("invalid configuration")?;

    let catalog = catalog(&config)?;
    Preprocessor::new(&config.preprocess).context("invalid preprocess configuration")?;
    EntityPostprocessor::new(&config.entities).context("invalid entity configuration")?;

    let ner = match &config.services.ner {
        Some(RecognizerBackend::Http { url }) => format!("http ({url})"),
        Some(RecognizerBackend::Patterns { rules }) => format!("patterns ({} rules)", rules.len()),
        None => "not configured".to_string(),
    };
    let re = match &config.services.re {
        Some(ExtractorBackend::Http { url }) => format!("http ({url})"),
        Some(ExtractorBackend::Keywords) => "keywords".to_string(),
        None => "not configured".to_string(),
    };
    if config.services.ner.is_some() {
        build_recognizer(&config.services).context("invalid NER service")?;
    }
    if config.services.re.is_some() {
        build_extractor(&config.services, &catalog).context("invalid RE service")?;
    }

    let relations = catalog.len();
    RelationPostprocessor::new(&config.relations, Arc::new(catalog))
        .context("invalid relation configuration")?;

    println!("configuration ok");
    println!("  relations: {relations} canonical");
    println!("  strict:    {}", config.relations.strict);
    println!("  ner:       {ner}");
    println!("  re:        {re}");
    Ok(())
}

pub fn run_catalog(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let catalog = catalog(&config)?;

    for relation in catalog.relations() {
        println!("{}: {}", relation.name, relation.aliases.join(", "));
    }
    Ok(())
}
