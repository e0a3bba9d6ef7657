#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod relation;
pub mod services;

pub use catalog::{CanonicalRelation, RelationCatalog};
pub use config::{
    AliasCollisionPolicy, CatalogEntry, ConfigError, ConfigResult, EntityConfig, ExtractorBackend,
    PatternRule, PipelineConfig, PreprocessConfig, RecognizerBackend, RelationConfig, RetryConfig,
    ServicesConfig,
};
pub use entity::{Entity, EntityType, RawEntity};
pub use error::{Error, Result};
pub use pipeline::{
    BatchOutput, BatchSummary, Diagnostics, Document, DocumentResult, DocumentStatistics,
    DocumentStatus, EntityMention, Pipeline,
};
pub use postprocess::{EntityOutput, EntityPostprocessor, RelationOutput, RelationPostprocessor};
pub use preprocess::Preprocessor;
pub use relation::{RawTriple, Triple};
pub use services::{
    EntityRecognizer, HttpExtractor, HttpRecognizer, KeywordExtractor, PatternRecognizer,
    RelationExtractor, RetryPolicy, ServiceError, ServiceResult,
};
