use serde::{Deserialize, Serialize};

use crate::normalize::normalize_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "ORG")]
    Organization,
    #[serde(rename = "LOC")]
    Location,
    #[serde(rename = "MISC")]
    Misc,
    #[serde(rename = "TECH")]
    Technology,
    #[serde(rename = "SYSTEM")]
    System,
    #[serde(rename = "STANDARD")]
    Standard,
}

impl EntityType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Organization => "ORG",
            Self::Location => "LOC",
            Self::Misc => "MISC",
            Self::Technology => "TECH",
            Self::System => "SYSTEM",
            Self::Standard => "STANDARD",
        }
    }

    /// Every type except `MISC` names a concrete kind of thing.
    #[must_use]
    pub fn is_specific(&self) -> bool {
        !matches!(self, Self::Misc)
    }

    /// Fragments may only be merged when they agree on type or one of them is
    /// `MISC`.
    #[must_use]
    pub fn is_compatible(&self, other: Self) -> bool {
        *self == other || !self.is_specific() || !other.is_specific()
    }

    #[must_use]
    pub fn more_specific(self, other: Self) -> Self {
        if self.is_specific() {
            self
        } else {
            other
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PERSON" | "PER" | "PERS" => Some(Self::Person),
            "ORG" | "ORGANIZATION" | "ORGANISATION" => Some(Self::Organization),
            "LOC" | "LOCATION" | "GPE" | "FAC" => Some(Self::Location),
            "MISC" | "MISCELLANEOUS" => Some(Self::Misc),
            "TECH" | "TECHNOLOGY" => Some(Self::Technology),
            "SYSTEM" | "SYS" => Some(Self::System),
            "STANDARD" | "STD" => Some(Self::Standard),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = crate::Error;

    /// Accepts recognizer tags case-insensitively, with or without a
    /// BIO/BILOU prefix (`B-PER`, `I-ORG`, `U-LOC`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_uppercase();
        let bare = match tag.split_once('-') {
            Some((prefix, rest)) if matches!(prefix, "B" | "I" | "E" | "S" | "L" | "U") => rest,
            _ => tag.as_str(),
        };

        Self::from_tag(bare).ok_or_else(|| crate::Error::InvalidEntityType(s.to_string()))
    }
}

/// A span as reported by an external recognizer, before any repair.
///
/// Offsets are signed so that out-of-range output can be detected instead of
/// failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(alias = "word")]
    pub text: String,
    #[serde(rename = "type", alias = "entity_group", alias = "entity", alias = "label")]
    pub label: String,
    pub start: i64,
    pub end: i64,
}

impl RawEntity {
    #[must_use]
    pub fn new(text: impl Into<String>, label: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            start,
            end,
        }
    }
}

/// A cleaned entity. `start..end` are byte offsets into the cleaned document
/// text and always slice out exactly `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    #[must_use]
    pub fn new(text: impl Into<String>, entity_type: EntityType, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            entity_type,
            start,
            end,
        }
    }

    #[must_use]
    pub fn span_len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn normalized_text(&self) -> String {
        normalize_key(&self.text)
    }

    /// Checks the span invariant against the text the offsets refer to.
    #[must_use]
    pub fn is_anchored_in(&self, text: &str) -> bool {
        self.start < self.end && text.get(self.start..self.end) == Some(self.text.as_str())
    }
}
