use regex::Regex;

use super::{EntityRecognizer, ServiceResult};
use crate::config::{compile_patterns, ConfigError, ConfigResult, PatternRule};
use crate::entity::{EntityType, RawEntity};

pub struct RecognitionPattern {
    pub entity_type: EntityType,
    pub regex: Regex,
}

impl RecognitionPattern {
    pub fn new(entity_type: EntityType, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            entity_type,
            regex: Regex::new(pattern)?,
        })
    }
}

/// Offline recognizer emitting one raw span per regex match.
#[derive(Default)]
pub struct PatternRecognizer {
    patterns: Vec<RecognitionPattern>,
}

impl PatternRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: RecognitionPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn from_rules(rules: &[PatternRule]) -> ConfigResult<Self> {
        let sources: Vec<String> = rules.iter().map(|r| r.pattern.clone()).collect();
        let regexes = compile_patterns(&sources)?;

        let patterns = rules
            .iter()
            .zip(regexes)
            .map(|(rule, regex)| {
                let entity_type = rule
                    .entity_type
                    .parse::<EntityType>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "services.ner.rules.type",
                        reason: e.to_string(),
                    })?;
                Ok(RecognitionPattern { entity_type, regex })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }
}

#[async_trait::async_trait]
impl EntityRecognizer for PatternRecognizer {
    async fn recognize(&self, text: &str) -> ServiceResult<Vec<RawEntity>> {
        let mut entities = Vec::new();

        for pattern in &self.patterns {
            for found in pattern.regex.find_iter(text) {
                entities.push(RawEntity::new(
                    found.as_str(),
                    pattern.entity_type.as_str(),
                    i64::try_from(found.start()).unwrap_or(i64::MAX),
                    i64::try_from(found.end()).unwrap_or(i64::MAX),
                ));
            }
        }

        Ok(entities)
    }
}
