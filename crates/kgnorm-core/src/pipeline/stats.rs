use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{Entity, EntityType};
use crate::relation::Triple;

/// How many entities `DocumentStatistics::top_entities` lists.
pub const TOP_ENTITIES: usize = 10;

/// Counts of everything the postprocessors dropped or repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub malformed_entities: usize,
    pub merged_fragments: usize,
    pub duplicate_entities: usize,
    pub noise_entities: usize,
    pub unanchored_entities: usize,
    pub invalid_triples: usize,
    pub noncanonical_triples: usize,
    pub noise_triples: usize,
    pub duplicate_triples: usize,
}

impl Diagnostics {
    pub fn merge(&mut self, other: &Self) {
        self.malformed_entities += other.malformed_entities;
        self.merged_fragments += other.merged_fragments;
        self.duplicate_entities += other.duplicate_entities;
        self.noise_entities += other.noise_entities;
        self.unanchored_entities += other.unanchored_entities;
        self.invalid_triples += other.invalid_triples;
        self.noncanonical_triples += other.noncanonical_triples;
        self.noise_triples += other.noise_triples;
        self.duplicate_triples += other.duplicate_triples;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Complete,
    /// Exactly one of the two external services failed
    Partial,
    /// Both external services failed
    Failed,
}

impl DocumentStatus {
    #[must_use]
    pub fn from_failures(recognizer_failed: bool, extractor_failed: bool) -> Self {
        match (recognizer_failed, extractor_failed) {
            (false, false) => Self::Complete,
            (true, true) => Self::Failed,
            _ => Self::Partial,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One deduplicated entity and how many raw spans collapsed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub mentions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatistics {
    pub entity_count_by_type: BTreeMap<String, usize>,
    pub relation_count_by_type: BTreeMap<String, usize>,
    pub total_entities: usize,
    pub total_relations: usize,
    pub distinct_relation_types: usize,
    /// Most-mentioned entities first; ties keep document order.
    pub top_entities: Vec<EntityMention>,
    /// Set whenever at least one external service failed
    pub partial: bool,
    pub status: DocumentStatus,
    pub diagnostics: Diagnostics,
}

impl DocumentStatistics {
    #[must_use]
    pub fn compute(
        entities: &[Entity],
        mentions: &[EntityMention],
        triples: &[Triple],
        status: DocumentStatus,
        diagnostics: Diagnostics,
    ) -> Self {
        let mut entity_count_by_type = BTreeMap::new();
        for entity in entities {
            *entity_count_by_type
                .entry(entity.entity_type.as_str().to_string())
                .or_default() += 1;
        }

        let mut relation_count_by_type = BTreeMap::new();
        for triple in triples {
            *relation_count_by_type
                .entry(triple.relation.clone())
                .or_default() += 1;
        }

        let mut top_entities = mentions.to_vec();
        top_entities.sort_by(|a, b| b.mentions.cmp(&a.mentions));
        top_entities.truncate(TOP_ENTITIES);

        Self {
            distinct_relation_types: relation_count_by_type.len(),
            entity_count_by_type,
            relation_count_by_type,
            total_entities: entities.len(),
            total_relations: triples.len(),
            top_entities,
            partial: status != DocumentStatus::Complete,
            status,
            diagnostics,
        }
    }
}

/// Batch-wide totals. Merging is associative and commutative, so the
/// summary does not depend on the order documents finish in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub documents: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    pub total_entities: usize,
    pub total_relations: usize,
    pub entity_count_by_type: BTreeMap<String, usize>,
    pub relation_count_by_type: BTreeMap<String, usize>,
    pub diagnostics: Diagnostics,
    /// Documents that could not be read and were never processed
    pub unreadable: BTreeSet<String>,
}

impl BatchSummary {
    pub fn record(&mut self, stats: &DocumentStatistics) {
        self.documents += 1;
        match stats.status {
            DocumentStatus::Complete => self.complete += 1,
            DocumentStatus::Partial => self.partial += 1,
            DocumentStatus::Failed => self.failed += 1,
        }
        self.total_entities += stats.total_entities;
        self.total_relations += stats.total_relations;
        add_counts(&mut self.entity_count_by_type, &stats.entity_count_by_type);
        add_counts(&mut self.relation_count_by_type, &stats.relation_count_by_type);
        self.diagnostics.merge(&stats.diagnostics);
    }

    pub fn record_unreadable(&mut self, id: impl Into<String>) {
        self.unreadable.insert(id.into());
    }

    pub fn merge(&mut self, other: &Self) {
        self.documents += other.documents;
        self.complete += other.complete;
        self.partial += other.partial;
        self.failed += other.failed;
        self.total_entities += other.total_entities;
        self.total_relations += other.total_relations;
        add_counts(&mut self.entity_count_by_type, &other.entity_count_by_type);
        add_counts(&mut self.relation_count_by_type, &other.relation_count_by_type);
        self.diagnostics.merge(&other.diagnostics);
        self.unreadable.extend(other.unreadable.iter().cloned());
    }
}

fn add_counts(into: &mut BTreeMap<String, usize>, from: &BTreeMap<String, usize>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_default() += count;
    }
}
