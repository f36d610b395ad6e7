//! Tolerant field extraction from free-form completion text.
//!
//! Every stage asks the model for labelled output (`TITLE: ...`,
//! `OVERALL_SCORE: ...`) and every stage gets something slightly different
//! back: markdown bold, headings, missing colons, labels alone on a line.
//! An [`ExtractionSchema`] is plain data (field names, label patterns in
//! priority order, defaults) compiled once and applied to any response.
//! Extraction never fails: a field that cannot be found takes its default
//! and is reported through [`Extraction::defaulted`].

use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

/// How far a field's value extends after its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// The rest of the label's line, or the next non-empty line when the
    /// label stands alone.
    Line,
    /// Everything up to the next recognised label of any field. Labels
    /// written as list items do not end a block.
    Block,
}

/// Declarative description of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    /// Regex fragments for the label, highest priority first. Matched
    /// case-insensitively at the start of a line.
    pub labels: &'static [&'static str],
    pub default: &'static str,
}

impl FieldSpec {
    pub const fn line(
        name: &'static str,
        labels: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            shape: FieldShape::Line,
            labels,
            default,
        }
    }

    pub const fn block(
        name: &'static str,
        labels: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            shape: FieldShape::Block,
            labels,
            default,
        }
    }
}

struct CompiledField {
    spec: FieldSpec,
    patterns: Vec<Regex>,
}

/// A compiled set of field rules.
pub struct ExtractionSchema {
    fields: Vec<CompiledField>,
}

/// A label occurrence that passed the separator checks.
#[derive(Debug, Clone)]
struct LabelHit {
    field: usize,
    priority: usize,
    /// Start of the label line content.
    start: usize,
    /// The label sits behind a list marker (`- `, `* `, `• `).
    bulleted: bool,
    /// First byte after the label and its separator.
    value_start: usize,
}

impl ExtractionSchema {
    /// Compile a schema from field specs.
    pub fn new(specs: &[FieldSpec]) -> Result<Self, regex::Error> {
        let fields = specs
            .iter()
            .map(|spec| {
                let patterns = spec
                    .labels
                    .iter()
                    .map(|label| Regex::new(&label_pattern(label)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledField {
                    spec: *spec,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { fields })
    }

    /// Extract every field, using each field's static default on a miss.
    pub fn extract(&self, text: &str) -> Extraction {
        self.extract_with_defaults(text, &[])
    }

    /// Extract every field, preferring caller-supplied defaults over the
    /// field defaults for the named fields.
    pub fn extract_with_defaults(&self, text: &str, overrides: &[(&str, &str)]) -> Extraction {
        let hits = self.find_hits(text);
        let mut boundaries: Vec<usize> = hits
            .iter()
            .filter(|h| !h.bulleted)
            .map(|h| h.start)
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut values = BTreeMap::new();
        let mut defaulted = Vec::new();
        let mut covered: Vec<Range<usize>> = Vec::new();

        for (index, field) in self.fields.iter().enumerate() {
            // Plain labels win over list items at any priority.
            let found = [false, true].into_iter().find_map(|bulleted| {
                (0..field.patterns.len()).find_map(|priority| {
                    hits.iter()
                        .filter(|h| {
                            h.field == index && h.priority == priority && h.bulleted == bulleted
                        })
                        .find_map(|hit| {
                            let (value, end) =
                                read_value(text, hit, field.spec.shape, &boundaries);
                            (!value.is_empty()).then_some((value, hit.start..end))
                        })
                })
            });

            match found {
                Some((value, span)) => {
                    values.insert(field.spec.name, value);
                    covered.push(span);
                }
                None => {
                    let default = overrides
                        .iter()
                        .find(|(name, _)| *name == field.spec.name)
                        .map_or(field.spec.default, |(_, value)| *value);
                    tracing::debug!(field = field.spec.name, "field extraction defaulted");
                    values.insert(field.spec.name, default.to_string());
                    defaulted.push(field.spec.name);
                }
            }
        }

        Extraction {
            values,
            defaulted,
            unlabeled: uncovered_text(text, covered),
        }
    }

    fn find_hits(&self, text: &str) -> Vec<LabelHit> {
        let mut hits = Vec::new();
        for (field, compiled) in self.fields.iter().enumerate() {
            for (priority, pattern) in compiled.patterns.iter().enumerate() {
                for caps in pattern.captures_iter(text) {
                    let Some(whole) = caps.get(0) else { continue };
                    let has_separator = caps.name("sep").is_some();
                    let rest = rest_of_line(text, whole.end());
                    let accepted = has_separator
                        || rest.trim().is_empty()
                        || rest.trim_start().starts_with(|c: char| c.is_ascii_digit());
                    if accepted {
                        hits.push(LabelHit {
                            field,
                            priority,
                            start: whole.start(),
                            bulleted: caps.name("bullet").is_some(),
                            value_start: whole.end(),
                        });
                    }
                }
            }
        }
        hits.sort_by_key(|h| h.start);
        hits
    }
}

/// Result of applying a schema to one response.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    values: BTreeMap<&'static str, String>,
    defaulted: Vec<&'static str>,
    unlabeled: String,
}

impl Extraction {
    /// Value for a field (extracted or defaulted). Unknown fields read as "".
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map_or("", String::as_str)
    }

    /// Whether the field fell back to its default.
    pub fn was_defaulted(&self, field: &str) -> bool {
        self.defaulted.contains(&field)
    }

    /// Fields that fell back to their defaults, in schema order.
    pub fn defaulted(&self) -> &[&'static str] {
        &self.defaulted
    }

    /// Text not claimed by any extracted field, trimmed.
    pub fn unlabeled(&self) -> &str {
        &self.unlabeled
    }
}

fn label_pattern(label: &str) -> String {
    format!(
        r"(?im)^[ \t]*(?P<bullet>[-•*+][ \t]+)?(?:#{{1,6}}[ \t]*|>[ \t]*)?[*_]*(?:{label})\b[ \t]*[*_]*[ \t]*(?P<sep>[:=\-–][ \t]*[*_]*)?[ \t]*"
    )
}

fn rest_of_line(text: &str, from: usize) -> &str {
    let tail = &text[from..];
    match tail.find('\n') {
        Some(end) => &tail[..end],
        None => tail,
    }
}

fn read_value(
    text: &str,
    hit: &LabelHit,
    shape: FieldShape,
    boundaries: &[usize],
) -> (String, usize) {
    match shape {
        FieldShape::Line => {
            let line = rest_of_line(text, hit.value_start);
            let mut end = hit.value_start + line.len();
            let mut value = clean_inline(line);
            if value.is_empty() {
                // Label alone on its line: take the next non-empty line,
                // unless another label starts first.
                let mut cursor = end;
                while cursor < text.len() {
                    cursor += 1;
                    if boundaries.contains(&cursor) {
                        break;
                    }
                    let next = rest_of_line(text, cursor);
                    end = cursor + next.len();
                    if !next.trim().is_empty() {
                        value = clean_inline(next);
                        break;
                    }
                    cursor = end;
                }
            }
            (value, end)
        }
        FieldShape::Block => {
            let end = boundaries
                .iter()
                .copied()
                .find(|&b| b >= hit.value_start)
                .unwrap_or(text.len());
            (text[hit.value_start..end].trim().to_string(), end)
        }
    }
}

fn clean_inline(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '"' || c == '`')
        .trim()
        .to_string()
}

fn uncovered_text(text: &str, mut covered: Vec<Range<usize>>) -> String {
    covered.sort_by_key(|r| r.start);
    let mut out = String::new();
    let mut cursor = 0;
    for range in covered {
        if range.start > cursor {
            out.push_str(&text[cursor..range.start]);
        }
        cursor = cursor.max(range.end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out.trim().to_string()
}

// ============================================================================
// Value helpers
// ============================================================================

/// Read the first integer in `value` and clamp it into `lo..=hi`.
///
/// Handles `7`, `7/10`, `**7**` and `7.5` (truncated). Falls back to
/// `default` when no digits are present.
pub fn parse_score(value: &str, lo: u8, hi: u8, default: u8) -> u8 {
    let digits: String = value
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse::<u32>() {
        Ok(n) => n.clamp(u32::from(lo), u32::from(hi)) as u8,
        Err(_) => default,
    }
}

/// Split a comma-separated list, dropping blanks and placeholder words.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|item| item.trim().trim_matches('"').trim())
        .filter(|item| !item.is_empty())
        .filter(|item| !matches!(item.to_ascii_lowercase().as_str(), "none" | "n/a" | "-"))
        .map(str::to_string)
        .collect()
}

/// Collect bullet or numbered items. Unbulleted non-empty text becomes a
/// single item.
pub fn bullet_items(value: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref BULLET: Regex =
            Regex::new(r"^\s*(?:[-•*]|\d+[.)])\s*(.+)$").expect("valid bullet pattern");
    }

    let items: Vec<String> = value
        .lines()
        .filter_map(|line| BULLET.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() && !value.trim().is_empty() {
        vec![value.trim().to_string()]
    } else {
        items
    }
}

/// Interpret a yes/no style answer. Anything unrecognised is `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    let word: String = value
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match word.as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY_FIELDS: &[FieldSpec] = &[
        FieldSpec::line("title", &["title"], "Untitled Story"),
        FieldSpec::block("story", &["story", "content"], ""),
        FieldSpec::block("moral", &["moral", "lesson"], ""),
    ];

    fn schema() -> ExtractionSchema {
        ExtractionSchema::new(STORY_FIELDS).unwrap()
    }

    #[test]
    fn test_canonical_format() {
        let text = "TITLE: The Brave Cat\nSTORY:\nOnce upon a time.\n\nThe end.\nMORAL: Be brave.";
        let out = schema().extract(text);
        assert_eq!(out.get("title"), "The Brave Cat");
        assert_eq!(out.get("story"), "Once upon a time.\n\nThe end.");
        assert_eq!(out.get("moral"), "Be brave.");
        assert!(out.defaulted().is_empty());
    }

    #[test]
    fn test_markdown_and_case_variants() {
        let text = "**Title:** The Sleepy Owl\n\n## story\nThe owl yawned.\n\n**Moral** - Rest is good.";
        let out = schema().extract(text);
        assert_eq!(out.get("title"), "The Sleepy Owl");
        assert_eq!(out.get("story"), "The owl yawned.");
        assert_eq!(out.get("moral"), "Rest is good.");
    }

    #[test]
    fn test_label_alone_on_line() {
        let text = "Title\n\nMoonlight Picnic\nStory:\nThe moon came out.";
        let out = schema().extract(text);
        assert_eq!(out.get("title"), "Moonlight Picnic");
        assert_eq!(out.get("story"), "The moon came out.");
    }

    #[test]
    fn test_missing_label_uses_default() {
        let out = schema().extract("Once upon a time there was a cat.");
        assert_eq!(out.get("title"), "Untitled Story");
        assert!(out.was_defaulted("title"));
        assert!(out.was_defaulted("story"));
        assert!(out.was_defaulted("moral"));
        assert_eq!(out.unlabeled(), "Once upon a time there was a cat.");
    }

    #[test]
    fn test_caller_default_overrides_schema_default() {
        let out = schema().extract_with_defaults("no labels here", &[("title", "A Forest Tale")]);
        assert_eq!(out.get("title"), "A Forest Tale");
        assert!(out.was_defaulted("title"));
    }

    #[test]
    fn test_word_inside_sentence_is_not_a_label() {
        let text = "TITLE: Pip\nSTORY:\nPip told a story about the moon.\nMORAL: Share.";
        let out = schema().extract(text);
        assert_eq!(out.get("story"), "Pip told a story about the moon.");
    }

    #[test]
    fn test_lower_priority_label_used_when_primary_missing() {
        let text = "TITLE: Pip\nLesson: Always share.";
        let out = schema().extract(text);
        assert_eq!(out.get("moral"), "Always share.");
    }

    #[test]
    fn test_unlabeled_excludes_matched_sections() {
        let text = "TITLE: Pip the Mouse\nPip lived in a wall.\nMORAL: Be kind.";
        let out = schema().extract(text);
        assert!(out.was_defaulted("story"));
        assert_eq!(out.unlabeled(), "Pip lived in a wall.");
    }

    #[test]
    fn test_empty_text_defaults_everything() {
        let out = schema().extract("");
        assert_eq!(out.defaulted(), &["title", "story", "moral"]);
        assert_eq!(out.unlabeled(), "");
        assert_eq!(out.get("nonexistent"), "");
    }

    #[test]
    fn test_parse_score_variants() {
        assert_eq!(parse_score("7", 1, 10, 5), 7);
        assert_eq!(parse_score("**8**/10", 1, 10, 5), 8);
        assert_eq!(parse_score("6.5", 1, 10, 5), 6);
        assert_eq!(parse_score("42", 1, 10, 5), 10);
        assert_eq!(parse_score("0", 1, 10, 5), 1);
        assert_eq!(parse_score("great", 1, 10, 5), 5);
    }

    #[test]
    fn test_numeric_label_without_colon() {
        const SCORE: &[FieldSpec] = &[FieldSpec::line("overall", &[r"overall[_ ]?score"], "5")];
        let schema = ExtractionSchema::new(SCORE).unwrap();
        assert_eq!(schema.extract("Overall Score 8").get("overall"), "8");
        assert!(schema.extract("Overall scoring was hard").was_defaulted("overall"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("cat, dog , , owl"), vec!["cat", "dog", "owl"]);
        assert_eq!(split_list("[humor, friendship]"), vec!["humor", "friendship"]);
        assert!(split_list("none").is_empty());
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_bullet_items() {
        let items = bullet_items("- Add dialogue\n• Shorten the ending\n2) Name the cat");
        assert_eq!(items, vec!["Add dialogue", "Shorten the ending", "Name the cat"]);
        assert_eq!(bullet_items("Make it funnier."), vec!["Make it funnier."]);
        assert!(bullet_items("   ").is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("**no**"), Some(false));
        assert_eq!(parse_flag("true - flawless"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}
