//! Per-document orchestration: clean, call the external services, repair
//! their output and fold it into statistics.

mod batch;
mod document;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::RelationCatalog;
use crate::config::{ConfigResult, PipelineConfig};
use crate::entity::RawEntity;
use crate::postprocess::{EntityPostprocessor, RelationPostprocessor};
use crate::preprocess::Preprocessor;
use crate::relation::RawTriple;
use crate::services::{
    build_extractor, build_recognizer, EntityRecognizer, RelationExtractor, RetryPolicy,
    ServiceResult,
};

pub use batch::BatchOutput;
pub use document::{document_id, Document, DocumentResult};
pub use stats::{BatchSummary, Diagnostics, DocumentStatistics, DocumentStatus, EntityMention};

/// Everything a document needs, compiled once and shared read-only across
/// concurrent documents.
#[derive(Clone)]
pub struct Pipeline {
    preprocessor: Arc<Preprocessor>,
    entities: Arc<EntityPostprocessor>,
    relations: Arc<RelationPostprocessor>,
    recognizer: Arc<dyn EntityRecognizer>,
    extractor: Arc<dyn RelationExtractor>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl Pipeline {
    /// Validates and compiles `config` with the given services. Any
    /// configuration error here means no pipeline.
    pub fn new(
        config: &PipelineConfig,
        recognizer: Arc<dyn EntityRecognizer>,
        extractor: Arc<dyn RelationExtractor>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let catalog = Arc::new(RelationCatalog::build(
            &config.relations.effective_catalog(),
            config.relations.on_alias_collision,
        )?);

        let pipeline = Self {
            preprocessor: Arc::new(Preprocessor::new(&config.preprocess)?),
            entities: Arc::new(EntityPostprocessor::new(&config.entities)?),
            relations: Arc::new(RelationPostprocessor::new(&config.relations, catalog)?),
            recognizer,
            extractor,
            retry: RetryPolicy::from_config(&config.retry)
                .with_timeout(Duration::from_secs(config.services.request_timeout_secs)),
            concurrency: config.services.concurrency,
        };

        tracing::debug!(
            relations = pipeline.catalog().len(),
            strict = config.relations.strict,
            concurrency = pipeline.concurrency,
            "Pipeline ready"
        );

        Ok(pipeline)
    }

    /// Builds the services named in `[services]` as well.
    pub fn from_config(config: &PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        let catalog = RelationCatalog::build(
            &config.relations.effective_catalog(),
            config.relations.on_alias_collision,
        )?;
        let recognizer = build_recognizer(&config.services)?;
        let extractor = build_extractor(&config.services, &catalog)?;
        Self::new(config, recognizer, extractor)
    }

    /// Overrides the per-attempt service timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.retry = self.retry.with_timeout(timeout);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &RelationCatalog {
        self.relations.catalog()
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn clean(&self, raw: &str) -> String {
        self.preprocessor.clean(raw)
    }

    /// Never fails: a service that stays down after retries yields an empty
    /// side and a `partial` document.
    pub async fn process(&self, document: &Document) -> DocumentResult {
        let cleaned = self.preprocessor.clean(&document.text);
        let text = cleaned.as_str();

        let (raw_entities, raw_triples) = tokio::join!(
            self.recognize(&document.id, text),
            self.extract(&document.id, text)
        );

        let recognizer_failed = raw_entities.is_err();
        let extractor_failed = raw_triples.is_err();

        let raw_entities = raw_entities.unwrap_or_else(|e| {
            tracing::warn!(document = %document.id, error = %e, "NER failed, continuing without entities");
            Vec::new()
        });
        let raw_triples = raw_triples.unwrap_or_else(|e| {
            tracing::warn!(document = %document.id, error = %e, "RE failed, continuing without relations");
            Vec::new()
        });

        let entity_output = self.entities.postprocess(raw_entities, text);
        let relation_output = self.relations.postprocess(raw_triples);

        let mut diagnostics = entity_output.diagnostics;
        diagnostics.merge(&relation_output.diagnostics);

        let status = DocumentStatus::from_failures(recognizer_failed, extractor_failed);
        let statistics = DocumentStatistics::compute(
            &entity_output.entities,
            &entity_output.mentions,
            &relation_output.triples,
            status,
            diagnostics,
        );

        tracing::info!(
            document = %document.id,
            entities = statistics.total_entities,
            relations = statistics.total_relations,
            status = %status,
            "Processed document"
        );

        DocumentResult {
            entities: entity_output.entities,
            relations: relation_output.triples,
            statistics,
        }
    }

    async fn recognize(&self, document: &str, text: &str) -> ServiceResult<Vec<RawEntity>> {
        let recognizer = &self.recognizer;
        self.retry
            .call(document, "ner", move || recognizer.recognize(text))
            .await
    }

    async fn extract(&self, document: &str, text: &str) -> ServiceResult<Vec<RawTriple>> {
        let extractor = &self.extractor;
        self.retry
            .call(document, "re", move || extractor.extract(text))
            .await
    }
}
