//! Boilerplate removal applied to raw documents before they reach the
//! external recognizers. Every rule is idempotent, so `clean(clean(x)) ==
//! clean(x)`, and the output is never longer than the input.

use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::config::{compile_patterns, ConfigResult, PreprocessConfig};

const URL_PATTERN: &str = r#"(?i)\b(?:(?:https?|ftp)://|www\.)[^\s<>"']*[^\s<>"'.,;:!?)\]}]"#;
const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

#[derive(Debug, Clone)]
pub struct Preprocessor {
    url: Option<Regex>,
    email: Option<Regex>,
    page_markers: Vec<Regex>,
    boilerplate: Vec<Regex>,
    max_noise_line_len: usize,
    noise_symbol_ratio: f64,
    min_repeated_line_count: usize,
    max_header_line_len: usize,
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> ConfigResult<Self> {
        let builtin = |enabled: bool, pattern: &str| -> ConfigResult<Option<Regex>> {
            if enabled {
                Ok(compile_patterns(&[pattern.to_string()])?.pop())
            } else {
                Ok(None)
            }
        };

        Ok(Self {
            url: builtin(config.strip_urls, URL_PATTERN)?,
            email: builtin(config.strip_emails, EMAIL_PATTERN)?,
            page_markers: compile_patterns(&config.page_marker_patterns)?,
            boilerplate: compile_patterns(&config.boilerplate_patterns)?,
            max_noise_line_len: config.max_noise_line_len,
            noise_symbol_ratio: config.noise_symbol_ratio,
            min_repeated_line_count: config.min_repeated_line_count,
            max_header_line_len: config.max_header_line_len,
        })
    }

    /// Produces the cleaned text that every downstream offset refers to.
    #[must_use]
    pub fn clean(&self, raw: &str) -> String {
        let lines: Vec<String> = strip_controls(raw)
            .lines()
            .map(|line| self.clean_line(line))
            .collect();

        let repeated = self.repeated_edges(&lines);

        lines
            .iter()
            .filter(|line| !line.is_empty())
            .filter(|line| !repeated.contains(line.as_str()))
            .filter(|line| !self.is_page_marker(line))
            .filter(|line| !self.is_structural_noise(line))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Removals can splice two halves into a new match, so the rules run
    /// until the line stops changing.
    fn clean_line(&self, line: &str) -> String {
        let mut line = collapse_whitespace(line);

        loop {
            let mut next = line.clone();
            for re in self.url.iter().chain(&self.email).chain(&self.boilerplate) {
                next = re.replace_all(&next, "").into_owned();
            }
            let next = collapse_whitespace(&next);

            if next == line {
                return line;
            }
            line = next;
        }
    }

    /// Short lines that open or close at least `min_repeated_line_count`
    /// page-like blocks. Blank lines, form feeds and page markers separate
    /// blocks; a line repeated inside a block's body is never counted.
    fn repeated_edges<'a>(&self, lines: &'a [String]) -> HashSet<&'a str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for block in lines.split(|line| line.is_empty() || self.is_page_marker(line)) {
            let (Some(first), Some(last)) = (block.first(), block.last()) else {
                continue;
            };

            let mut edges = vec![first.as_str()];
            if last != first {
                edges.push(last.as_str());
            }
            for edge in edges {
                if edge.chars().count() <= self.max_header_line_len {
                    *counts.entry(edge).or_default() += 1;
                }
            }
        }

        let threshold = self.min_repeated_line_count.max(2);
        counts
            .into_iter()
            .filter(|&(_, count)| count >= threshold)
            .map(|(line, _)| line)
            .collect()
    }

    fn is_page_marker(&self, line: &str) -> bool {
        line.chars().all(|c| c.is_ascii_digit()) || self.page_markers.iter().any(|re| re.is_match(line))
    }

    /// Table-of-contents entries and bare section numbers: short, dominated
    /// by digits and punctuation, and not ending a sentence.
    fn is_structural_noise(&self, line: &str) -> bool {
        if line.chars().count() >= self.max_noise_line_len {
            return false;
        }
        if line.ends_with(['.', '!', '?', '。', '！', '？']) && !line.ends_with("..") {
            return false;
        }

        let visible: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
        if visible.is_empty() {
            return true;
        }
        let symbols = visible
            .iter()
            .filter(|c| c.is_ascii_digit() || !c.is_alphanumeric())
            .count();

        symbols as f64 / visible.len() as f64 >= self.noise_symbol_ratio
    }
}

/// Normalizes line endings and drops the BOM and control characters other
/// than newlines and tabs. A form feed becomes a blank line so it still
/// ends a block.
fn strip_controls(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{c}', "\n\n")
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !(c.is_control() || c == '\u{feff}'))
        .collect()
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
