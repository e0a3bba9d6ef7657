use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::RelationCatalog;
use crate::config::{compile_patterns, ConfigResult, RelationConfig};
use crate::normalize::{collapse_whitespace, is_numeric, normalize_key, normalize_relation};
use crate::pipeline::Diagnostics;
use crate::relation::{RawTriple, Triple};

#[derive(Debug, Clone, Default)]
pub struct RelationOutput {
    pub triples: Vec<Triple>,
    pub diagnostics: Diagnostics,
}

/// Canonicalizes extractor triples against the relation catalog and drops
/// the ones that cannot form a valid graph edge.
#[derive(Debug, Clone)]
pub struct RelationPostprocessor {
    catalog: Arc<RelationCatalog>,
    strict: bool,
    noise: Vec<Regex>,
}

impl RelationPostprocessor {
    pub fn new(config: &RelationConfig, catalog: Arc<RelationCatalog>) -> ConfigResult<Self> {
        Ok(Self {
            catalog,
            strict: config.strict,
            noise: compile_patterns(&config.noise_patterns)?,
        })
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn catalog(&self) -> &RelationCatalog {
        &self.catalog
    }

    /// Output order follows the first occurrence of each surviving triple.
    pub fn postprocess<I>(&self, raw: I) -> RelationOutput
    where
        I: IntoIterator<Item = RawTriple>,
    {
        let mut diagnostics = Diagnostics::default();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut triples = Vec::new();

        for triple in raw {
            let key = normalize_relation(&triple.relation);

            let relation = match self.catalog.canonicalize(&key) {
                Some(canonical) => canonical.to_string(),
                None if self.strict => {
                    diagnostics.noncanonical_triples += 1;
                    tracing::debug!(relation = %triple.relation, "Dropping non-canonical relation");
                    continue;
                }
                None => key.clone(),
            };

            let subject = collapse_whitespace(&triple.subject);
            let object = collapse_whitespace(&triple.object);
            let subject_key = normalize_key(&subject);
            let object_key = normalize_key(&object);

            if subject_key.is_empty() || object_key.is_empty() || subject_key == object_key {
                diagnostics.invalid_triples += 1;
                tracing::debug!(subject = %subject, object = %object, "Dropping invalid triple");
                continue;
            }

            if self.is_noise(&triple.relation, &key) {
                diagnostics.noise_triples += 1;
                tracing::debug!(relation = %triple.relation, "Dropping noise relation");
                continue;
            }

            if !seen.insert((subject_key, relation.clone(), object_key)) {
                diagnostics.duplicate_triples += 1;
                continue;
            }

            triples.push(Triple::new(subject, relation, object));
        }

        RelationOutput {
            triples,
            diagnostics,
        }
    }

    /// Pure punctuation, bare numbers and section/page references.
    fn is_noise(&self, raw_relation: &str, key: &str) -> bool {
        if key.is_empty() || is_numeric(key) {
            return true;
        }
        let surface = collapse_whitespace(raw_relation).to_lowercase();
        self.noise
            .iter()
            .any(|re| re.is_match(&surface) || re.is_match(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_catalog, AliasCollisionPolicy, CatalogEntry};

    fn processor(entries: &[CatalogEntry], strict: bool) -> RelationPostprocessor {
        let catalog = RelationCatalog::build(entries, AliasCollisionPolicy::Reject).unwrap();
        let config = RelationConfig {
            strict,
            ..Default::default()
        };
        RelationPostprocessor::new(&config, Arc::new(catalog)).unwrap()
    }

    fn builtin(strict: bool) -> RelationPostprocessor {
        processor(&default_catalog(), strict)
    }

    #[test]
    fn test_canonicalizes_declared_alias() {
        let rp = processor(
            &[CatalogEntry::new("located_in", &["headquartered in", "based in"])],
            false,
        );
        let output = rp.postprocess(vec![RawTriple::new("Apple", "headquartered in", "Cupertino")]);

        assert_eq!(
            output.triples,
            vec![Triple::new("Apple", "located_in", "Cupertino")]
        );
    }

    #[test]
    fn test_alias_match_ignores_case_and_punctuation() {
        let output = builtin(true).postprocess(vec![RawTriple::new("Linux", "  Based-On ", "Unix")]);
        assert_eq!(output.triples, vec![Triple::new("Linux", "based_on", "Unix")]);
    }

    #[test]
    fn test_drops_reflexive_triple() {
        let output = builtin(false).postprocess(vec![RawTriple::new("Apple", "is part of", "Apple")]);

        assert!(output.triples.is_empty());
        assert_eq!(output.diagnostics.invalid_triples, 1);
    }

    #[test]
    fn test_reflexive_check_normalizes_case_and_whitespace() {
        let output = builtin(false).postprocess(vec![RawTriple::new("New  York", "part of", "new york")]);
        assert!(output.triples.is_empty());
    }

    #[test]
    fn test_drops_empty_endpoints() {
        let output = builtin(false).postprocess(vec![
            RawTriple::new("  ", "uses", "Rust"),
            RawTriple::new("Cargo", "uses", ""),
        ]);

        assert!(output.triples.is_empty());
        assert_eq!(output.diagnostics.invalid_triples, 2);
    }

    #[test]
    fn test_lenient_mode_keeps_free_form_relation() {
        let output = builtin(false).postprocess(vec![RawTriple::new("Alice", "Mentored ", "Bob")]);
        assert_eq!(output.triples, vec![Triple::new("Alice", "mentored", "Bob")]);
    }

    #[test]
    fn test_strict_mode_drops_unknown_relation() {
        let strict = builtin(true);
        let output = strict.postprocess(vec![
            RawTriple::new("Alice", "mentored", "Bob"),
            RawTriple::new("Acme", "uses", "Rust"),
        ]);

        assert_eq!(output.triples, vec![Triple::new("Acme", "uses", "Rust")]);
        assert_eq!(output.diagnostics.noncanonical_triples, 1);

        let canonical: HashSet<&str> = strict.catalog().relations().map(|r| r.name.as_str()).collect();
        assert!(output.triples.iter().all(|t| canonical.contains(t.relation.as_str())));
    }

    #[test]
    fn test_drops_noise_relations() {
        let output = builtin(false).postprocess(vec![
            RawTriple::new("Intro", "Section 3.2", "Scope"),
            RawTriple::new("Intro", "page 4", "Scope"),
            RawTriple::new("Intro", "--", "Scope"),
            RawTriple::new("Intro", "42", "Scope"),
            RawTriple::new("Intro", "v2.1", "Scope"),
        ]);

        assert!(output.triples.is_empty());
        assert_eq!(output.diagnostics.noise_triples, 5);
    }

    #[test]
    fn test_collapses_duplicates_after_canonicalization() {
        let output = builtin(false).postprocess(vec![
            RawTriple::new("Rust", "based on", "OCaml"),
            RawTriple::new("rust", "derived from", "ocaml"),
            RawTriple::new("Rust ", "Built on", " OCaml"),
        ]);

        assert_eq!(output.triples, vec![Triple::new("Rust", "based_on", "OCaml")]);
        assert_eq!(output.diagnostics.duplicate_triples, 2);
    }

    #[test]
    fn test_idempotent() {
        let rp = builtin(false);
        let first = rp.postprocess(vec![
            RawTriple::new("Acme", "utilizes", "Rust"),
            RawTriple::new("Acme", "sponsors", "RustConf"),
            RawTriple::new("Acme", "uses", "Rust"),
        ]);
        let again: Vec<RawTriple> = first
            .triples
            .iter()
            .map(|t| RawTriple::new(t.subject.clone(), t.relation.clone(), t.object.clone()))
            .collect();
        let second = rp.postprocess(again);

        assert_eq!(first.triples, second.triples);
        assert_eq!(first.triples.len(), 2);
    }
}
