use regex::Regex;

use super::{RelationExtractor, ServiceResult};
use crate::catalog::RelationCatalog;
use crate::config::{compile_patterns, ConfigResult};
use crate::relation::RawTriple;

const AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "has", "have", "had",
];

/// Offline extractor: in each sentence, the first catalog alias splits the
/// sentence into subject and object.
pub struct KeywordExtractor {
    keyword: Option<Regex>,
}

impl KeywordExtractor {
    pub fn from_catalog(catalog: &RelationCatalog) -> ConfigResult<Self> {
        Self::from_keywords(catalog.aliases())
    }

    pub fn from_keywords<'a>(keywords: impl IntoIterator<Item = &'a str>) -> ConfigResult<Self> {
        let mut keywords: Vec<&str> = keywords
            .into_iter()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Ok(Self { keyword: None });
        }

        // Longest first so "based on" wins over "based" at the same position.
        keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        keywords.dedup();

        let alternation = keywords
            .iter()
            .map(|k| {
                k.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        let keyword = compile_patterns(&[format!(r"(?i)\b(?:{alternation})\b")])?.pop();
        Ok(Self { keyword })
    }

    fn extract_sentence(&self, sentence: &str) -> Option<RawTriple> {
        let found = self.keyword.as_ref()?.find(sentence)?;

        let subject = strip_auxiliaries(trim_punctuation(&sentence[..found.start()]));
        let object = trim_punctuation(&sentence[found.end()..]);
        if subject.is_empty() || object.is_empty() {
            return None;
        }

        Some(RawTriple::new(subject, found.as_str(), object))
    }
}

#[async_trait::async_trait]
impl RelationExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> ServiceResult<Vec<RawTriple>> {
        Ok(text
            .split(['.', '!', '?', '\n'])
            .filter_map(|sentence| self.extract_sentence(sentence))
            .collect())
    }
}

fn trim_punctuation(text: &str) -> &str {
    text.trim_matches(|c: char| !c.is_alphanumeric())
}

fn strip_auxiliaries(mut text: &str) -> &str {
    while let Some((head, last)) = text.rsplit_once(char::is_whitespace) {
        if !AUXILIARIES.contains(&last.to_lowercase().as_str()) {
            break;
        }
        text = trim_punctuation(head);
    }
    text
}
