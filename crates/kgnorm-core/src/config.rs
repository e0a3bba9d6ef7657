use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required config field: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Relation `{0}` has an empty alias list")]
    EmptyAliasList(String),
    #[error("Relation `{0}` is declared more than once")]
    DuplicateCanonical(String),
    #[error("Alias `{alias}` is declared under both `{first}` and `{second}`")]
    AliasCollision {
        alias: String,
        first: String,
        second: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Compiles a list of configured regexes, naming the offending pattern on
/// failure.
pub(crate) fn compile_patterns(patterns: &[String]) -> ConfigResult<Vec<regex::Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Text preprocessing rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Remove http(s)/ftp/www URLs
    pub strip_urls: bool,
    /// Remove email addresses
    pub strip_emails: bool,
    /// Lines shorter than this (in characters) are candidates for structural noise
    pub max_noise_line_len: usize,
    /// Minimum share of digits and punctuation for a short line to count as noise
    pub noise_symbol_ratio: f64,
    /// Short lines repeated at least this many times are treated as headers/footers
    pub min_repeated_line_count: usize,
    /// Lines longer than this are never treated as repeated headers/footers
    pub max_header_line_len: usize,
    /// Whole-line page markers ("Page 3", "- 3 -", "3 / 10")
    pub page_marker_patterns: Vec<String>,
    /// Boilerplate removed wherever it appears inside a line
    pub boilerplate_patterns: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            strip_urls: true,
            strip_emails: true,
            max_noise_line_len: 40,
            noise_symbol_ratio: 0.5,
            min_repeated_line_count: 3,
            max_header_line_len: 80,
            page_marker_patterns: vec![
                r"(?i)^page\s*\d+(\s*(of|/)\s*\d+)?$".to_string(),
                r"^-\s*\d+\s*-$".to_string(),
                r"^\d+\s*/\s*\d+$".to_string(),
            ],
            boilerplate_patterns: vec![
                r"(?i)copyright\s*(©|\(c\))?\s*\d{4}".to_string(),
                r"(?i)©\s*\d{4}".to_string(),
                r"(?i)all rights reserved\.?".to_string(),
                r"(?i)for internal use only".to_string(),
                r"(?i)\bconfidential\b".to_string(),
            ],
        }
    }
}

/// Entity noise filtering and span repair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Minimum normalized entity length in characters
    pub min_length: usize,
    /// Maximum normalized entity length; longer spans are sentences, not names
    pub max_length: usize,
    /// Normalized strings that are never entities
    pub stoplist: Vec<String>,
    /// Patterns matched against the entity surface text
    pub ignore_patterns: Vec<String>,
    /// Prefix a recognizer puts on subword continuation pieces
    pub continuation_marker: String,
    /// How far (in bytes) around a stale span to search when re-anchoring
    pub reanchor_window: usize,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_length: 100,
            stoplist: ["the", "a", "an", "of", "and", "or", "in", "on", "to", "for"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore_patterns: vec![
                r"^#+".to_string(),
                r"(?i)^document chunk \d+$".to_string(),
                r"(?i)^chunk \d+$".to_string(),
                r"(?i)^column$".to_string(),
                r"(?i)^document$".to_string(),
                r"^[a-zA-Z]$".to_string(),
            ],
            continuation_marker: "##".to_string(),
            reanchor_window: 64,
        }
    }
}

/// What to do when one alias is declared under two canonical relations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasCollisionPolicy {
    /// Refuse to build the catalog (default)
    #[default]
    Reject,
    /// Log a warning and keep the first declaration
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Relation canonicalization and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    /// Drop relations that match no catalog alias
    pub strict: bool,
    pub on_alias_collision: AliasCollisionPolicy,
    /// Relations matching any of these are structural noise
    pub noise_patterns: Vec<String>,
    /// Canonical relations in declaration order; empty means the built-in catalog
    pub catalog: Vec<CatalogEntry>,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            on_alias_collision: AliasCollisionPolicy::Reject,
            noise_patterns: vec![
                r"^(page|pp?|section|sec|chapter|ch|figure|fig|table|appendix|§)\.?\s*\d+([.\s]\d+)*$"
                    .to_string(),
                r"^document chunk".to_string(),
                r"^chunk\b".to_string(),
                r"\bv\d+\.\d+".to_string(),
                r"^\d+([.\s]\d+)*$".to_string(),
            ],
            catalog: Vec::new(),
        }
    }
}

impl RelationConfig {
    /// The declared catalog, or the built-in one when none is declared.
    pub fn effective_catalog(&self) -> Vec<CatalogEntry> {
        if self.catalog.is_empty() {
            default_catalog()
        } else {
            self.catalog.clone()
        }
    }
}

/// Built-in controlled vocabulary.
pub fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        // Taxonomic
        CatalogEntry::new("is_a", &["instance of", "type of", "kind of", "is a", "is an"]),
        CatalogEntry::new("subclass_of", &["subclass of", "subtype of"]),
        // Part-whole
        CatalogEntry::new("part_of", &["part of", "component of", "member of", "belongs to"]),
        CatalogEntry::new(
            "has_part",
            &["has part", "contains", "includes", "comprises", "consists of"],
        ),
        // Functional
        CatalogEntry::new(
            "used_for",
            &["used for", "application", "function", "purpose", "applied to"],
        ),
        CatalogEntry::new(
            "connects_with",
            &["connects with", "interfaces with", "communicates with"],
        ),
        CatalogEntry::new("connects_to", &["connects to", "links to"]),
        CatalogEntry::new("uses", &["uses", "utilizes", "employs"]),
        // Comparison
        CatalogEntry::new("different_from", &["different from", "distinct from", "not same as"]),
        CatalogEntry::new("similar_to", &["similar to", "like", "resembles"]),
        // Temporal
        CatalogEntry::new("followed_by", &["followed by", "succeeds", "comes after"]),
        CatalogEntry::new("follows", &["follows", "preceded by", "comes before"]),
        // Attribution
        CatalogEntry::new("based_on", &["based on", "derived from", "built on"]),
        CatalogEntry::new("operates", &["operates", "runs", "controls", "manages"]),
        CatalogEntry::new("abbreviation_of", &["abbreviation of", "short for"]),
        CatalogEntry::new("implements", &["implements", "provides", "supports"]),
        CatalogEntry::new("transmits", &["transmits", "sends", "receives"]),
        CatalogEntry::new("specifies", &["specifies", "requires", "stipulates"]),
        // Locative
        CatalogEntry::new("located_in", &["located in", "situated in", "found in"]),
        CatalogEntry::new("headquartered_in", &["headquartered in", "based in"]),
        // Technical
        CatalogEntry::new("complies_with", &["complies with", "conforms to"]),
        // Domain-specific
        CatalogEntry::new("field_of_occupation", &["field of this occupation", "practiced by"]),
        CatalogEntry::new("publisher", &["publisher", "published by"]),
    ]
}

/// External call retry schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// Named-entity recognizer backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// JSON-over-HTTP service
    Http { url: String },
    /// Offline regex/gazetteer recognizer
    Patterns { rules: Vec<PatternRule> },
}

/// Relation extractor backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorBackend {
    /// JSON-over-HTTP service
    Http { url: String },
    /// Offline extractor keyed on catalog alias surface forms
    Keywords,
}

/// External services and batch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Maximum documents in flight at once
    pub concurrency: usize,
    /// Per-attempt timeout for each external call
    pub request_timeout_secs: u64,
    pub ner: Option<RecognizerBackend>,
    pub re: Option<ExtractorBackend>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout_secs: 60,
            ner: None,
            re: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub entities: EntityConfig,
    pub relations: RelationConfig,
    pub retry: RetryConfig,
    pub services: ServicesConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Checks scalar settings. Patterns and the catalog are validated when the
    /// pipeline compiles them.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.services.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "services.concurrency",
                reason: "must be at least 1".into(),
            });
        }
        if self.services.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "services.request_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.entities.min_length > self.entities.max_length {
            return Err(ConfigError::InvalidValue {
                field: "entities.min_length",
                reason: format!(
                    "{} exceeds entities.max_length ({})",
                    self.entities.min_length, self.entities.max_length
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.preprocess.noise_symbol_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "preprocess.noise_symbol_ratio",
                reason: "must be between 0 and 1".into(),
            });
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.initial_backoff_ms",
                reason: "exceeds retry.max_backoff_ms".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.entities.min_length, 2);
        assert!(!config.relations.strict);
        assert_eq!(config.relations.on_alias_collision, AliasCollisionPolicy::Reject);
        assert!(config.services.ner.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = PipelineConfig::parse(
            r#"
            [entities]
            stoplist = ["the", "and"]

            [relations]
            strict = true

            [[relations.catalog]]
            canonical = "located_in"
            aliases = ["headquartered in", "located in"]

            [services.ner]
            kind = "http"
            url = "http://localhost:8000/ner"

            [services.re]
            kind = "keywords"
            "#,
        )
        .unwrap();

        assert_eq!(config.entities.stoplist, vec!["the", "and"]);
        assert_eq!(config.entities.min_length, 2);
        assert!(config.relations.strict);
        assert_eq!(config.relations.catalog.len(), 1);
        assert_eq!(config.relations.catalog[0].canonical, "located_in");
        assert!(matches!(
            config.services.ner,
            Some(RecognizerBackend::Http { ref url }) if url == "http://localhost:8000/ner"
        ));
        assert!(matches!(config.services.re, Some(ExtractorBackend::Keywords)));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let result = PipelineConfig::parse(
            r#"
            [services.ner]
            kind = "telepathy"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_effective_catalog_falls_back_to_builtin() {
        let config = RelationConfig::default();
        let catalog = config.effective_catalog();
        assert!(catalog.iter().any(|e| e.canonical == "part_of"));

        let config = RelationConfig {
            catalog: vec![CatalogEntry::new("owns", &["owner of"])],
            ..Default::default()
        };
        assert_eq!(config.effective_catalog().len(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = PipelineConfig::default();
        config.services.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "services.concurrency", .. })
        ));
    }

    #[test]
    fn test_compile_patterns_names_bad_pattern() {
        let err = compile_patterns(&["ok".into(), "(unclosed".into()]).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PipelineConfig::load(Path::new("/nonexistent/kgnorm.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
