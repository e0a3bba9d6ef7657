use serde::{Deserialize, Serialize};

/// A triple as reported by an external relation extractor. Missing fields
/// deserialize as empty strings and are rejected during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriple {
    #[serde(default, alias = "head")]
    pub subject: String,
    #[serde(default, alias = "predicate", alias = "type")]
    pub relation: String,
    #[serde(default, alias = "tail")]
    pub object: String,
}

impl RawTriple {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl Triple {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_triple_missing_fields_default_to_empty() {
        let raw: RawTriple = serde_json::from_str(r#"{"head": "Apple", "predicate": "owns"}"#).unwrap();
        assert_eq!(raw.subject, "Apple");
        assert_eq!(raw.relation, "owns");
        assert!(raw.object.is_empty());
    }
}
