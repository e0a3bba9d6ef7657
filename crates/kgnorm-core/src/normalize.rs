//! String normalization shared by the entity and relation stages.

/// Collapses every run of whitespace to a single space and trims the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for entity names and triple arguments: case-folded,
/// whitespace-collapsed.
#[must_use]
pub fn normalize_key(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// Comparison key for relation labels: lower-cased, with punctuation and
/// whitespace runs collapsed to single spaces.
#[must_use]
pub fn normalize_relation(relation: &str) -> String {
    let spaced: String = relation
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&spaced)
}

/// True when the text is made only of digits and numeric separators.
#[must_use]
pub fn is_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  New \t York\n City "), "New York City");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  The   Apple  "), "the apple");
        assert_eq!(normalize_key("APPLE"), normalize_key("apple"));
    }

    #[test]
    fn test_normalize_relation() {
        assert_eq!(normalize_relation("Is_Part-Of"), "is part of");
        assert_eq!(normalize_relation("  headquartered   in "), "headquartered in");
        assert_eq!(normalize_relation("--;;.."), "");
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("2018"));
        assert!(is_numeric("1,000.50"));
        assert!(!is_numeric("B2B"));
        assert!(!is_numeric("..."));
    }
}
