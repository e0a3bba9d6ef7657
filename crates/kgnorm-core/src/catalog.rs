use std::collections::HashMap;

use crate::config::{AliasCollisionPolicy, CatalogEntry, ConfigError, ConfigResult};
use crate::normalize::normalize_relation;

#[derive(Debug, Clone)]
pub struct CanonicalRelation {
    pub name: String,
    pub aliases: Vec<String>,
}

/// Read-only alias lookup built once from the declared
/// `canonical -> [aliases]` entries.
///
/// Every alias is stored under its normalized form, and each canonical name
/// is implicitly an alias of itself (`part_of` matches "part of").
#[derive(Debug, Clone)]
pub struct RelationCatalog {
    relations: Vec<CanonicalRelation>,
    index: HashMap<String, usize>,
}

impl RelationCatalog {
    pub fn build(entries: &[CatalogEntry], policy: AliasCollisionPolicy) -> ConfigResult<Self> {
        let mut relations: Vec<CanonicalRelation> = Vec::with_capacity(entries.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let name = entry.canonical.trim();
            if name.is_empty() {
                return Err(ConfigError::MissingField("relations.catalog.canonical"));
            }
            if relations.iter().any(|r| r.name == name) {
                return Err(ConfigError::DuplicateCanonical(name.to_string()));
            }
            if entry.aliases.is_empty() {
                return Err(ConfigError::EmptyAliasList(name.to_string()));
            }

            let position = relations.len();
            let mut aliases = Vec::with_capacity(entry.aliases.len() + 1);

            for alias in std::iter::once(name).chain(entry.aliases.iter().map(String::as_str)) {
                let key = normalize_relation(alias);
                if key.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "relations.catalog.aliases",
                        reason: format!("alias `{alias}` of `{name}` has no letters or digits"),
                    });
                }

                match index.get(&key) {
                    Some(&owner) if owner == position => {}
                    Some(&owner) => {
                        let first = relations[owner].name.clone();
                        match policy {
                            AliasCollisionPolicy::Reject => {
                                return Err(ConfigError::AliasCollision {
                                    alias: key,
                                    first,
                                    second: name.to_string(),
                                });
                            }
                            AliasCollisionPolicy::Warn => {
                                tracing::warn!(
                                    alias = %key,
                                    kept = %first,
                                    ignored = %name,
                                    "Relation alias declared under two canonical names, keeping the first"
                                );
                            }
                        }
                    }
                    None => {
                        index.insert(key.clone(), position);
                        aliases.push(key);
                    }
                }
            }

            relations.push(CanonicalRelation {
                name: name.to_string(),
                aliases,
            });
        }

        Ok(Self { relations, index })
    }

    /// Looks up an already-normalized relation label.
    #[must_use]
    pub fn canonicalize(&self, normalized: &str) -> Option<&str> {
        self.index
            .get(normalized)
            .map(|&idx| self.relations[idx].name.as_str())
    }

    #[must_use]
    pub fn contains_canonical(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r.name == name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &CanonicalRelation> {
        self.relations.iter()
    }

    /// Normalized alias surface forms owned by some canonical relation.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.relations
            .iter()
            .flat_map(|r| r.aliases.iter().map(String::as_str))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_catalog;

    fn catalog(entries: &[CatalogEntry]) -> RelationCatalog {
        RelationCatalog::build(entries, AliasCollisionPolicy::Reject).unwrap()
    }

    #[test]
    fn test_every_alias_maps_to_its_canonical() {
        let entries = default_catalog();
        let catalog = catalog(&entries);

        for entry in &entries {
            for alias in &entry.aliases {
                assert_eq!(
                    catalog.canonicalize(&normalize_relation(alias)),
                    Some(entry.canonical.as_str()),
                    "alias {alias}"
                );
            }
        }
    }

    #[test]
    fn test_canonical_name_is_its_own_alias() {
        let catalog = catalog(&[CatalogEntry::new("part_of", &["component of"])]);
        assert_eq!(catalog.canonicalize("part of"), Some("part_of"));
        assert_eq!(catalog.canonicalize("component of"), Some("part_of"));
        assert_eq!(catalog.canonicalize("piece of"), None);
    }

    #[test]
    fn test_rejects_empty_alias_list() {
        let result = RelationCatalog::build(
            &[CatalogEntry::new("owns", &[])],
            AliasCollisionPolicy::Reject,
        );
        assert!(matches!(result, Err(ConfigError::EmptyAliasList(name)) if name == "owns"));
    }

    #[test]
    fn test_rejects_duplicate_canonical() {
        let result = RelationCatalog::build(
            &[
                CatalogEntry::new("owns", &["owner of"]),
                CatalogEntry::new("owns", &["holds"]),
            ],
            AliasCollisionPolicy::Reject,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateCanonical(_))));
    }

    #[test]
    fn test_rejects_alias_collision() {
        let result = RelationCatalog::build(
            &[
                CatalogEntry::new("is_a", &["type of"]),
                CatalogEntry::new("subclass_of", &["Type  Of"]),
            ],
            AliasCollisionPolicy::Reject,
        );
        match result {
            Err(ConfigError::AliasCollision { alias, first, second }) => {
                assert_eq!(alias, "type of");
                assert_eq!(first, "is_a");
                assert_eq!(second, "subclass_of");
            }
            other => panic!("expected collision, got {other:?}"),
        }
    }

    #[test]
    fn test_warn_policy_keeps_first_declaration() {
        let catalog = RelationCatalog::build(
            &[
                CatalogEntry::new("is_a", &["type of"]),
                CatalogEntry::new("subclass_of", &["type of", "subtype of"]),
            ],
            AliasCollisionPolicy::Warn,
        )
        .unwrap();

        assert_eq!(catalog.canonicalize("type of"), Some("is_a"));
        assert_eq!(catalog.canonicalize("subtype of"), Some("subclass_of"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_rejects_punctuation_only_alias() {
        let result = RelationCatalog::build(
            &[CatalogEntry::new("owns", &["--"])],
            AliasCollisionPolicy::Reject,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_builtin_catalog_has_no_collisions() {
        assert!(RelationCatalog::build(&default_catalog(), AliasCollisionPolicy::Reject).is_ok());
    }
}
