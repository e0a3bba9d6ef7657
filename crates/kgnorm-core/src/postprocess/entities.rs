use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::config::{compile_patterns, ConfigResult, EntityConfig};
use crate::entity::{Entity, EntityType, RawEntity};
use crate::normalize::{is_numeric, normalize_key};
use crate::pipeline::{Diagnostics, EntityMention};

#[derive(Debug, Clone, Default)]
pub struct EntityOutput {
    pub entities: Vec<Entity>,
    /// Mention counts, one per entry of `entities` and in the same order.
    pub mentions: Vec<EntityMention>,
    pub diagnostics: Diagnostics,
}

/// A recognizer span that passed the malformed-output checks.
#[derive(Debug, Clone)]
struct Candidate {
    text: String,
    entity_type: EntityType,
    start: usize,
    end: usize,
    /// Position in the recognizer's output, used as the document-order tie-break.
    order: usize,
    /// The recognizer marked this span as the continuation of the previous one.
    continuation: bool,
    mentions: usize,
}

impl Candidate {
    fn span_len(&self) -> usize {
        self.end - self.start
    }

    fn key(&self) -> String {
        normalize_key(&self.text)
    }

    fn is_anchored_in(&self, text: &str) -> bool {
        text.get(self.start..self.end) == Some(self.text.as_str())
    }

    fn same_span(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// Repairs raw recognizer spans: offset revalidation, fragment merging,
/// deduplication and noise filtering.
#[derive(Debug, Clone)]
pub struct EntityPostprocessor {
    min_length: usize,
    max_length: usize,
    stoplist: HashSet<String>,
    ignore: Vec<Regex>,
    marker: String,
    window: usize,
}

impl EntityPostprocessor {
    pub fn new(config: &EntityConfig) -> ConfigResult<Self> {
        Ok(Self {
            min_length: config.min_length,
            max_length: config.max_length,
            stoplist: config.stoplist.iter().map(|s| normalize_key(s)).collect(),
            ignore: compile_patterns(&config.ignore_patterns)?,
            marker: config.continuation_marker.clone(),
            window: config.reanchor_window,
        })
    }

    /// Never fails: malformed spans are dropped and counted.
    ///
    /// Stale spans are re-anchored before merging, and the merge, dedup and
    /// noise steps repeat until a round changes nothing. The output is
    /// therefore a fixed point: feeding it back in returns it unchanged.
    pub fn postprocess<I>(&self, raw: I, text: &str) -> EntityOutput
    where
        I: IntoIterator<Item = RawEntity>,
    {
        let mut diagnostics = Diagnostics::default();

        let accepted = self.accept(raw, text, &mut diagnostics);
        let mut candidates = self.anchor_all(accepted, text, &mut diagnostics);

        // Every step either keeps the set or shrinks it.
        loop {
            let before = candidates.len();
            let merged = self.merge_fragments(candidates, text, &mut diagnostics);
            let unique = deduplicate(merged, &mut diagnostics);
            let kept = self.drop_noise(unique, &mut diagnostics);
            candidates = self.anchor_all(kept, text, &mut diagnostics);
            if candidates.len() == before {
                break;
            }
        }

        candidates.sort_by_key(|c| (c.start, c.end));

        let mentions = candidates
            .iter()
            .map(|c| EntityMention {
                text: c.text.clone(),
                entity_type: c.entity_type,
                mentions: c.mentions,
            })
            .collect();
        let entities = candidates
            .into_iter()
            .map(|c| Entity::new(c.text, c.entity_type, c.start, c.end))
            .collect();

        EntityOutput {
            entities,
            mentions,
            diagnostics,
        }
    }

    fn accept<I>(&self, raw: I, text: &str, diagnostics: &mut Diagnostics) -> Vec<Candidate>
    where
        I: IntoIterator<Item = RawEntity>,
    {
        let mut candidates = Vec::new();

        for (order, entity) in raw.into_iter().enumerate() {
            let Ok(entity_type) = entity.label.parse::<EntityType>() else {
                diagnostics.malformed_entities += 1;
                tracing::debug!(label = %entity.label, text = %entity.text, "Dropping entity with unknown type");
                continue;
            };

            let (start, end) = match (usize::try_from(entity.start), usize::try_from(entity.end)) {
                (Ok(start), Ok(end)) if start < end && end <= text.len() => (start, end),
                _ => {
                    diagnostics.malformed_entities += 1;
                    tracing::debug!(
                        start = entity.start,
                        end = entity.end,
                        len = text.len(),
                        "Dropping entity with out-of-range offsets"
                    );
                    continue;
                }
            };

            let trimmed = entity.text.trim();
            let (continuation, surface) = match trimmed.strip_prefix(self.marker.as_str()) {
                Some(rest) if !self.marker.is_empty() => (true, rest.trim_start()),
                _ => (false, trimmed),
            };
            if surface.is_empty() {
                diagnostics.malformed_entities += 1;
                tracing::debug!(start, end, "Dropping entity with empty text");
                continue;
            }

            candidates.push(Candidate {
                text: surface.to_string(),
                entity_type,
                start,
                end,
                order,
                continuation,
                mentions: 1,
            });
        }

        candidates
    }

    /// Greedy left-to-right: each candidate either extends the run being
    /// built or closes it. Earlier merges are never revisited.
    fn merge_fragments(
        &self,
        mut candidates: Vec<Candidate>,
        text: &str,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Candidate> {
        candidates.sort_by_key(|c| (c.start, c.end, c.order));

        let mut merged = Vec::with_capacity(candidates.len());
        let mut iter = candidates.into_iter();
        let Some(mut current) = iter.next() else {
            return merged;
        };

        for next in iter {
            if self.continues(&current, &next, text) {
                current = join(current, next, text);
                diagnostics.merged_fragments += 1;
            } else {
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);

        merged
    }

    /// Adjacent spans always join. Overlapping spans join only when both
    /// still slice out their own text, so the merged surface can be re-read.
    /// The same surface on the same span is a duplicate, not a fragment.
    fn continues(&self, current: &Candidate, next: &Candidate, text: &str) -> bool {
        if !current.entity_type.is_compatible(next.entity_type) {
            return false;
        }
        if current.same_span(next) && current.key() == next.key() {
            return false;
        }
        if next.continuation {
            return next.start <= current.end + self.marker.len();
        }
        next.start == current.end
            || (next.start < current.end && current.is_anchored_in(text) && next.is_anchored_in(text))
    }

    fn is_noise(&self, candidate: &Candidate) -> bool {
        let key = candidate.key();
        let length = key.chars().count();

        length < self.min_length
            || length > self.max_length
            || is_numeric(&key)
            || self.stoplist.contains(&key)
            || self.ignore.iter().any(|re| re.is_match(&candidate.text))
    }

    fn drop_noise(&self, candidates: Vec<Candidate>, diagnostics: &mut Diagnostics) -> Vec<Candidate> {
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.is_noise(&candidate) {
                diagnostics.noise_entities += 1;
                tracing::debug!(text = %candidate.text, "Dropping noise entity");
            } else {
                kept.push(candidate);
            }
        }
        kept
    }

    fn anchor_all(
        &self,
        candidates: Vec<Candidate>,
        text: &str,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Candidate> {
        let mut anchored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.reanchor(candidate, text) {
                Some(candidate) => anchored.push(candidate),
                None => diagnostics.unanchored_entities += 1,
            }
        }
        anchored
    }

    /// Keeps the span if it still slices out the entity text, otherwise
    /// searches nearby for the occurrence closest to the recorded start.
    fn reanchor(&self, candidate: Candidate, text: &str) -> Option<Candidate> {
        if candidate.is_anchored_in(text) {
            return Some(candidate);
        }

        let lo = floor_boundary(text, candidate.start.saturating_sub(self.window));
        let hi = ceil_boundary(text, candidate.end.saturating_add(self.window));

        let found = text[lo..hi]
            .match_indices(candidate.text.as_str())
            .map(|(offset, _)| lo + offset)
            .min_by_key(|start| start.abs_diff(candidate.start));

        match found {
            Some(start) => {
                tracing::debug!(
                    text = %candidate.text,
                    from = candidate.start,
                    to = start,
                    "Re-anchored stale entity span"
                );
                let end = start + candidate.text.len();
                Some(Candidate {
                    start,
                    end,
                    ..candidate
                })
            }
            None => {
                tracing::debug!(
                    text = %candidate.text,
                    start = candidate.start,
                    end = candidate.end,
                    "Dropping entity that cannot be re-anchored"
                );
                None
            }
        }
    }
}

fn join(current: Candidate, next: Candidate, text: &str) -> Candidate {
    let start = current.start.min(next.start);
    let end = current.end.max(next.end);

    // Well-anchored neighbours are re-read from the text so overlapping
    // spans do not duplicate characters.
    let contiguous = !next.continuation && current.is_anchored_in(text) && next.is_anchored_in(text);
    let joined = match text.get(start..end) {
        Some(slice) if contiguous => slice.to_string(),
        _ => format!("{}{}", current.text, next.text),
    };

    Candidate {
        text: joined,
        entity_type: current.entity_type.more_specific(next.entity_type),
        start,
        end,
        order: current.order,
        continuation: current.continuation,
        mentions: current.mentions.max(next.mentions),
    }
}

/// One entity per normalized text. Type conflicts go to the specific type;
/// between specific types the majority wins, then the first seen.
fn deduplicate(candidates: Vec<Candidate>, diagnostics: &mut Diagnostics) -> Vec<Candidate> {
    let mut groups: Vec<Vec<Candidate>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key = candidate.key();
        match index.get(&key) {
            Some(&i) => groups[i].push(candidate),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![candidate]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|group| {
            diagnostics.duplicate_entities += group.len() - 1;
            let winner = winning_type(&group);
            let mentions = group.iter().map(|c| c.mentions).sum();
            group
                .into_iter()
                .filter(|c| c.entity_type == winner)
                .min_by_key(|c| (c.span_len(), c.start, c.order))
                .map(|c| Candidate { mentions, ..c })
        })
        .collect()
}

fn winning_type(group: &[Candidate]) -> EntityType {
    let mut tally: Vec<(EntityType, usize, usize)> = Vec::new();

    for candidate in group.iter().filter(|c| c.entity_type.is_specific()) {
        match tally.iter_mut().find(|(t, _, _)| *t == candidate.entity_type) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 = entry.2.min(candidate.start);
            }
            None => tally.push((candidate.entity_type, 1, candidate.start)),
        }
    }

    tally
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map_or(EntityType::Misc, |(entity_type, _, _)| entity_type)
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> EntityPostprocessor {
        EntityPostprocessor::new(&EntityConfig::default()).unwrap()
    }

    fn raw(text: &str, label: &str, start: i64, end: i64) -> RawEntity {
        RawEntity::new(text, label, start, end)
    }

    #[test]
    fn test_merges_subword_fragments() {
        let text = "Contrology is a method.";
        let output = processor().postprocess(
            vec![raw("Contro", "MISC", 0, 6), raw("##logy", "MISC", 6, 12)],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Contrology", EntityType::Misc, 0, 10)]
        );
        assert_eq!(output.diagnostics.merged_fragments, 1);
    }

    #[test]
    fn test_merge_resolves_to_specific_type() {
        let text = "Cupertino is sunny.";
        let output = processor().postprocess(
            vec![raw("Cuper", "MISC", 0, 5), raw("tino", "LOC", 5, 9)],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Cupertino", EntityType::Location, 0, 9)]
        );
    }

    #[test]
    fn test_does_not_merge_incompatible_types() {
        let text = "AppleMaps";
        let output = processor().postprocess(
            vec![raw("Apple", "ORG", 0, 5), raw("Maps", "PER", 5, 9)],
            text,
        );

        assert_eq!(output.entities.len(), 2);
        assert_eq!(output.diagnostics.merged_fragments, 0);
    }

    #[test]
    fn test_does_not_merge_across_whitespace() {
        let text = "Alice Bob";
        let output = processor().postprocess(
            vec![raw("Alice", "PER", 0, 5), raw("Bob", "PER", 6, 9)],
            text,
        );

        assert_eq!(output.entities.len(), 2);
    }

    #[test]
    fn test_greedy_merge_of_mixed_run() {
        // ORG + MISC merge, then the LOC piece cannot join the ORG run.
        let text = "AcmeCorpville";
        let output = processor().postprocess(
            vec![
                raw("Acme", "ORG", 0, 4),
                raw("Corp", "MISC", 4, 8),
                raw("ville", "LOC", 8, 13),
            ],
            text,
        );

        assert_eq!(
            output.entities,
            vec![
                Entity::new("AcmeCorp", EntityType::Organization, 0, 8),
                Entity::new("ville", EntityType::Location, 8, 13),
            ]
        );
    }

    #[test]
    fn test_dedup_keeps_specific_type() {
        let text = "Apple sells. Apple buys.";
        let output = processor().postprocess(
            vec![raw("Apple", "MISC", 0, 5), raw("Apple", "ORG", 13, 18)],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Apple", EntityType::Organization, 13, 18)]
        );
        assert_eq!(output.diagnostics.duplicate_entities, 1);
    }

    #[test]
    fn test_dedup_majority_type_wins() {
        let text = "Jordan. Jordan. Jordan.";
        let output = processor().postprocess(
            vec![
                raw("Jordan", "LOC", 0, 6),
                raw("Jordan", "PER", 8, 14),
                raw("Jordan", "PER", 16, 22),
            ],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Jordan", EntityType::Person, 8, 14)]
        );
    }

    #[test]
    fn test_dedup_tie_goes_to_first_occurrence() {
        let text = "Jordan. Jordan.";
        let output = processor().postprocess(
            vec![raw("Jordan", "PER", 8, 14), raw("Jordan", "LOC", 0, 6)],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Jordan", EntityType::Location, 0, 6)]
        );
    }

    #[test]
    fn test_dedup_is_case_insensitive() {
        let text = "NASA and Nasa";
        let output = processor().postprocess(
            vec![raw("NASA", "ORG", 0, 4), raw("Nasa", "ORG", 9, 13)],
            text,
        );

        assert_eq!(output.entities.len(), 1);
        assert_eq!(output.entities[0].text, "NASA");
    }

    #[test]
    fn test_stoplist_drops_function_words() {
        let config = EntityConfig {
            stoplist: vec!["the".into(), "and".into()],
            ..Default::default()
        };
        let processor = EntityPostprocessor::new(&config).unwrap();
        let output = processor.postprocess(vec![raw("The", "MISC", 0, 3)], "The cat");

        assert!(output.entities.is_empty());
        assert_eq!(output.diagnostics.noise_entities, 1);
    }

    #[test]
    fn test_drops_short_and_numeric_entities() {
        let text = "X paid 2018 dollars";
        let output = processor().postprocess(
            vec![raw("X", "PER", 0, 1), raw("2018", "MISC", 7, 11)],
            text,
        );

        assert!(output.entities.is_empty());
        assert_eq!(output.diagnostics.noise_entities, 2);
    }

    #[test]
    fn test_orphan_continuation_loses_marker() {
        let text = "Hello logy";
        let output = processor().postprocess(vec![raw("##logy", "MISC", 6, 10)], text);

        assert_eq!(output.entities, vec![Entity::new("logy", EntityType::Misc, 6, 10)]);
    }

    #[test]
    fn test_malformed_spans_are_dropped() {
        let text = "Apple";
        let output = processor().postprocess(
            vec![
                raw("Apple", "ORG", -1, 5),
                raw("Apple", "ORG", 0, 50),
                raw("Apple", "ORG", 3, 3),
                raw("   ", "ORG", 0, 3),
                raw("Apple", "DATE", 0, 5),
            ],
            text,
        );

        assert!(output.entities.is_empty());
        assert_eq!(output.diagnostics.malformed_entities, 5);
    }

    #[test]
    fn test_reanchors_stale_offsets() {
        let text = "Yesterday, Tim Cook spoke.";
        let output = processor().postprocess(vec![raw("Tim Cook", "PER", 8, 16)], text);

        assert_eq!(
            output.entities,
            vec![Entity::new("Tim Cook", EntityType::Person, 11, 19)]
        );
    }

    #[test]
    fn test_unanchorable_entity_is_dropped() {
        let text = "Nothing to see here.";
        let output = processor().postprocess(vec![raw("Tim Cook", "PER", 0, 8)], text);

        assert!(output.entities.is_empty());
        assert_eq!(output.diagnostics.unanchored_entities, 1);
    }

    #[test]
    fn test_reanchor_respects_char_boundaries() {
        let text = "Café Müller hosts Zoë.";
        let start = text.find("Zoë").unwrap() as i64;
        let output = processor().postprocess(vec![raw("Zoë", "PER", start - 1, start + 3)], text);

        assert_eq!(output.entities.len(), 1);
        assert!(output.entities[0].is_anchored_in(text));
    }

    #[test]
    fn test_output_invariants_and_idempotence() {
        let text = "Contrology was created by Joseph Pilates in New York. Joseph Pilates taught it.";
        let raw_entities = vec![
            raw("Contro", "MISC", 0, 6),
            raw("##logy", "MISC", 6, 12),
            raw("Joseph", "PER", 26, 32),
            raw("Pil", "PER", 33, 36),
            raw("Joseph Pilates", "PER", 26, 40),
            raw("New York", "LOC", 44, 52),
            raw("Joseph Pilates", "MISC", 54, 68),
            // Stale: the closest "Pilates" lies inside the first mention.
            raw("Pilates", "PER", 20, 27),
        ];

        let processor = processor();
        let first = processor.postprocess(raw_entities, text);
        assert_eq!(
            first.entities,
            vec![
                Entity::new("Contrology", EntityType::Misc, 0, 10),
                Entity::new("Joseph Pilates", EntityType::Person, 26, 40),
                Entity::new("New York", EntityType::Location, 44, 52),
            ]
        );
        assert_eq!(first.mentions[1].mentions, 2);

        let mut seen = HashSet::new();
        for entity in &first.entities {
            assert!(entity.is_anchored_in(text), "{entity:?}");
            assert!(seen.insert((normalize_key(&entity.text), entity.entity_type)));
        }

        let again: Vec<RawEntity> = first
            .entities
            .iter()
            .map(|e| {
                RawEntity::new(
                    e.text.clone(),
                    e.entity_type.as_str(),
                    i64::try_from(e.start).unwrap(),
                    i64::try_from(e.end).unwrap(),
                )
            })
            .collect();
        let second = processor.postprocess(again, text);

        assert_eq!(first.entities, second.entities);
    }

    #[test]
    fn test_reanchored_span_merges_in_the_same_pass() {
        let text = "Johnson went home.";
        let processor = processor();

        let first = processor.postprocess(
            vec![raw("Johnson", "PER", 0, 7), raw("son", "PER", 10, 13)],
            text,
        );
        assert_eq!(
            first.entities,
            vec![Entity::new("Johnson", EntityType::Person, 0, 7)]
        );
        assert_eq!(first.diagnostics.merged_fragments, 1);

        let again = vec![raw("Johnson", "PER", 0, 7)];
        assert_eq!(processor.postprocess(again, text).entities, first.entities);
    }

    #[test]
    fn test_identical_spans_count_as_duplicates() {
        let text = "Apple ships.";
        let output = processor().postprocess(
            vec![raw("Apple", "ORG", 0, 5), raw("Apple", "ORG", 0, 5)],
            text,
        );

        assert_eq!(
            output.entities,
            vec![Entity::new("Apple", EntityType::Organization, 0, 5)]
        );
        assert_eq!(output.diagnostics.merged_fragments, 0);
        assert_eq!(output.diagnostics.duplicate_entities, 1);
    }

    #[test]
    fn test_counts_mentions_per_entity() {
        let text = "Apple sells. Apple buys. Cupertino waits. apple.";
        let output = processor().postprocess(
            vec![
                raw("Apple", "ORG", 0, 5),
                raw("Apple", "ORG", 13, 18),
                raw("Cupertino", "LOC", 25, 34),
                raw("apple", "MISC", 42, 47),
            ],
            text,
        );

        let counts: Vec<(&str, usize)> = output
            .mentions
            .iter()
            .map(|m| (m.text.as_str(), m.mentions))
            .collect();
        assert_eq!(counts, vec![("Apple", 3), ("Cupertino", 1)]);
        assert_eq!(output.mentions.len(), output.entities.len());
    }
}
