//! # Validators
//!
//! Stock predicates for [Step](crate::chain::Step) outputs and reports for structured-output constraints.
//!
//! Every report converts into a step [Validator] so chains can retry until the model complies:
//!
//! ```
//! use promptchain::chain::Step;
//! use promptchain::validators::{max_words, StructuredFormat};
//!
//! let step = Step::new("List the risks in {{input}}")
//!     .with(StructuredFormat::BulletList.validator())
//!     .with(max_words(120));
//! assert_eq!(step.validators().len(), 2);
//! ```

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::chain::Validator;

pub const DEFAULT_MAX_SUMMARY_WORDS: usize = 100;

const BULLET_MARKERS: [&str; 6] = ["•", "-", "*", "1.", "2.", "3."];

lazy_static! {
    static ref BULLET_LINE_RE: Regex = Regex::new(r"^\s*[-*•]\s+.+").unwrap();
    static ref NUMBERED_LINE_RE: Regex = Regex::new(r"^\s*\d+\.\s+.+").unwrap();
}

/// Passes when the output has at most `max` whitespace separated words.
pub fn max_words(max: usize) -> Validator {
    Validator::new("summary_length", move |text| text.split_whitespace().count() <= max)
}

/// Passes when the whole trimmed output parses as JSON.
pub fn json_structure() -> Validator {
    Validator::new("json_structure", |text| serde_json::from_str::<Value>(text.trim()).is_ok())
}

/// Passes when at least one line starts with a bullet or one of the first list numbers.
pub fn bullet_format() -> Validator {
    Validator::new("bullet_format", |text| {
        text.trim()
            .lines()
            .any(|line| {
                let line = line.trim();
                BULLET_MARKERS.iter().any(|marker| line.starts_with(marker))
            })
    })
}

/// Limits on free text. Unset limits are not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentConstraints {
    /// Maximum length in characters
    pub max_length: Option<usize>,
    /// Minimum length in characters
    pub min_length: Option<usize>,
    /// Keywords that must appear, case-insensitively
    pub required_keywords: Vec<String>,
    /// Words that must not appear, case-insensitively
    pub forbidden_words: Vec<String>,
    pub max_sentences: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintReport {
    pub violations: Vec<String>,
}

impl ConstraintReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

impl ContentConstraints {
    pub fn check(&self, text: &str) -> ConstraintReport {
        let mut violations = Vec::new();
        let length = text.chars().count();
        if let Some(max_length) = self.max_length.filter(|max| length > *max) {
            violations.push(format!("Text too long: {} > {}", length, max_length));
        }
        if let Some(min_length) = self.min_length.filter(|min| length < *min) {
            violations.push(format!("Text too short: {} < {}", length, min_length));
        }

        let lowered = text.to_lowercase();
        let missing: Vec<&str> = self.required_keywords.iter()
            .filter(|kw| !lowered.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            violations.push(format!("Missing required keywords: {:?}", missing));
        }
        let forbidden: Vec<&str> = self.forbidden_words.iter()
            .filter(|word| lowered.contains(&word.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !forbidden.is_empty() {
            violations.push(format!("Contains forbidden words: {:?}", forbidden));
        }

        if let Some(max_sentences) = self.max_sentences {
            let sentences = count_sentences(text);
            if sentences > max_sentences {
                violations.push(format!("Too many sentences: {} > {}", sentences, max_sentences));
            }
        }
        ConstraintReport { violations }
    }

    pub fn validator(self) -> Validator {
        Validator::new("content_constraints", move |text| self.check(text).is_valid())
    }
}

/// Non-empty `.`-separated fragments.
pub fn count_sentences(text: &str) -> usize {
    text.split('.').filter(|s| !s.trim().is_empty()).count()
}

/// Output layouts a prompt can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredFormat {
    BulletList,
    NumberedList,
    /// Pipe separated rows, all with the same column count
    Table,
    Json { required_fields: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormatReport {
    pub is_valid: bool,
    /// Lines in the expected layout (rows for tables, 1 for a parsed JSON document)
    pub matching_lines: usize,
    /// Non-empty lines
    pub total_lines: usize,
    pub compliance: f64,
    pub errors: Vec<String>,
}

impl StructuredFormat {
    pub fn name(&self) -> &'static str {
        match self {
            StructuredFormat::BulletList => "bullet_list",
            StructuredFormat::NumberedList => "numbered_list",
            StructuredFormat::Table => "table",
            StructuredFormat::Json { .. } => "json",
        }
    }

    pub fn validate(&self, text: &str) -> FormatReport {
        let lines: Vec<&str> = text.trim().lines().filter(|l| !l.trim().is_empty()).collect();
        match self {
            StructuredFormat::BulletList => line_report(&lines, &BULLET_LINE_RE),
            StructuredFormat::NumberedList => line_report(&lines, &NUMBERED_LINE_RE),
            StructuredFormat::Table => table_report(&lines),
            StructuredFormat::Json { required_fields } => json_report(text, required_fields, lines.len()),
        }
    }

    pub fn validator(self) -> Validator {
        Validator::new(self.name(), move |text| self.validate(text).is_valid)
    }
}

fn line_report(lines: &[&str], pattern: &Regex) -> FormatReport {
    let matching_lines = lines.iter().filter(|line| pattern.is_match(line)).count();
    FormatReport {
        is_valid: matching_lines > 0,
        matching_lines,
        total_lines: lines.len(),
        compliance: matching_lines as f64 / lines.len().max(1) as f64,
        errors: Vec::new(),
    }
}

fn table_report(lines: &[&str]) -> FormatReport {
    let rows: Vec<&str> = lines.iter().copied().filter(|line| line.contains('|')).collect();
    let mut report = FormatReport {
        matching_lines: rows.len(),
        total_lines: lines.len(),
        compliance: rows.len() as f64 / lines.len().max(1) as f64,
        ..FormatReport::default()
    };
    if lines.is_empty() {
        report.errors.push("No content found".to_string());
        return report;
    }
    if rows.is_empty() {
        report.errors.push("No pipe-separated table rows found".to_string());
        return report;
    }
    let columns = rows[0].split('|').count();
    if rows.iter().all(|row| row.split('|').count() == columns) {
        report.is_valid = true;
    } else {
        report.errors.push("Inconsistent column counts".to_string());
    }
    report
}

fn json_report(text: &str, required_fields: &[String], total_lines: usize) -> FormatReport {
    let mut report = FormatReport { total_lines, ..FormatReport::default() };
    let parsed: Value = match serde_json::from_str(text.trim()) {
        Ok(parsed) => parsed,
        Err(e) => {
            report.errors.push(format!("Invalid JSON format: {}", e));
            return report;
        }
    };
    report.matching_lines = 1;
    report.compliance = 1.0;
    if let Value::Object(map) = &parsed {
        let missing: Vec<&str> = required_fields.iter()
            .filter(|field| !map.contains_key(field.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            report.errors.push(format!("Missing required fields: {:?}", missing));
        }
    }
    report.is_valid = report.errors.is_empty();
    report
}

/// Instruction appended to a prompt to ask for a format.
pub fn format_instruction(format: &StructuredFormat, max_length: Option<usize>) -> String {
    let mut instruction = match format {
        StructuredFormat::BulletList => "Format your response as a bullet list using - or • symbols.".to_string(),
        StructuredFormat::NumberedList => "Format your response as a numbered list (1., 2., 3., etc.).".to_string(),
        StructuredFormat::Table => "Format your response as a table using pipe (|) separators.".to_string(),
        StructuredFormat::Json { required_fields } => {
            let mut s = "Format your response as a valid JSON object.".to_string();
            if !required_fields.is_empty() {
                s.push_str(&format!(" Include these required fields: {}.", required_fields.join(", ")));
            }
            s
        }
    };
    if let Some(max_length) = max_length {
        instruction.push_str(&format!(" Keep response under {} characters.", max_length));
    }
    instruction
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternReport {
    pub is_valid: bool,
    /// Captured text of a single-group pattern, otherwise the whole matches
    pub matches: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn multiline_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}

fn find_matches(re: &Regex, text: &str) -> Vec<String> {
    if re.captures_len() == 2 {
        re.captures_iter(text)
            .map(|c| c.get(1).map_or("", |m| m.as_str()).to_string())
            .collect()
    } else {
        re.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }
}

/// Check `text` against a regex where `^`/`$` match at line breaks and `.` matches them.
///
/// An invalid pattern is reported, not returned as an error.
pub fn validate_format_pattern(text: &str, pattern: &str, description: &str) -> PatternReport {
    let mut report = PatternReport { description: description.to_string(), ..PatternReport::default() };
    match multiline_regex(pattern) {
        Ok(re) => {
            report.matches = find_matches(&re, text);
            report.is_valid = !report.matches.is_empty();
            if !report.is_valid {
                report.error = Some(format!("Text does not match expected pattern: {}", description));
            }
        }
        Err(e) => report.error = Some(format!("Invalid regex pattern: {}", e)),
    }
    report
}

/// Passes when the output matches `pattern` at least once, with the flags of [validate_format_pattern].
pub fn pattern_validator(name: impl Into<String>, pattern: &str) -> Result<Validator, regex::Error> {
    let re = multiline_regex(pattern)?;
    Ok(Validator::new(name, move |text| re.is_match(text)))
}

#[cfg(test)]
mod test_validators {
    use super::*;

    #[test]
    fn test_stock_predicates() {
        assert!(max_words(3).check("one two  three"));
        assert!(!max_words(3).check("one two three four"));
        assert!(max_words(DEFAULT_MAX_SUMMARY_WORDS).check(""));

        assert!(json_structure().check("  {\"a\": [1, 2]}\n"));
        assert!(json_structure().check("[1]"));
        assert!(!json_structure().check("Here you go: {\"a\": 1}"));

        assert!(bullet_format().check("Intro\n  - first\n"));
        assert!(bullet_format().check("1. step"));
        assert!(bullet_format().check("• dot"));
        assert!(!bullet_format().check("plain prose\nmore prose"));
    }

    #[test]
    fn test_content_constraints() {
        let constraints = ContentConstraints {
            max_length: Some(40),
            required_keywords: vec!["Rust".to_string(), "safety".to_string()],
            forbidden_words: vec!["guarantee".to_string()],
            max_sentences: Some(1),
            ..ContentConstraints::default()
        };
        assert!(constraints.check("RUST brings memory SAFETY.").is_valid());

        let report = constraints.check("Rust will guarantee speed. Always. It is the best choice ever made.");
        assert_eq!(report.violations.len(), 4);
        assert!(report.violations[0].starts_with("Text too long"));
        assert_eq!(report.violations[1], "Missing required keywords: [\"safety\"]");
        assert_eq!(report.violations[2], "Contains forbidden words: [\"guarantee\"]");
        assert_eq!(report.violations[3], "Too many sentences: 3 > 1");

        let short = ContentConstraints { min_length: Some(10), ..ContentConstraints::default() };
        assert!(!short.validator().check("tiny"));
    }

    #[test]
    fn test_list_formats() {
        let report = StructuredFormat::BulletList.validate("Summary\n- a\n* b\n\n");
        assert!(report.is_valid);
        assert_eq!(report.matching_lines, 2);
        assert_eq!(report.total_lines, 3);

        let report = StructuredFormat::NumberedList.validate("1. a\n2. b");
        assert_eq!(report.compliance, 1.0);
        assert!(!StructuredFormat::NumberedList.validate("- a").is_valid);
    }

    #[test]
    fn test_table_format() {
        assert!(StructuredFormat::Table.validate("| a | b |\n|---|---|\n| 1 | 2 |").is_valid);
        let ragged = StructuredFormat::Table.validate("| a | b |\n| 1 | 2 | 3 |");
        assert!(!ragged.is_valid);
        assert_eq!(ragged.errors, vec!["Inconsistent column counts".to_string()]);
        assert_eq!(StructuredFormat::Table.validate("").errors, vec!["No content found".to_string()]);
    }

    #[test]
    fn test_json_format() {
        let format = StructuredFormat::Json { required_fields: vec!["name".to_string(), "age".to_string()] };
        assert!(format.validate("{\"name\": \"Ada\", \"age\": 36}").is_valid);
        let missing = format.validate("{\"name\": \"Ada\"}");
        assert!(!missing.is_valid);
        assert_eq!(missing.errors, vec!["Missing required fields: [\"age\"]".to_string()]);
        assert!(format.validate("not json").errors[0].starts_with("Invalid JSON format"));
        assert!(!format.validator().check("{}"));
    }

    #[test]
    fn test_format_instruction() {
        let format = StructuredFormat::Json { required_fields: vec!["title".to_string()] };
        assert_eq!(format_instruction(&format, Some(200)),
                   "Format your response as a valid JSON object. Include these required fields: title. Keep response under 200 characters.");
        assert_eq!(format_instruction(&StructuredFormat::Table, None),
                   "Format your response as a table using pipe (|) separators.");
    }

    #[test]
    fn test_format_pattern() {
        let report = validate_format_pattern("Score: 8\nnotes\nScore: 6", r"^Score: (\d+)$", "score lines");
        assert!(report.is_valid);
        assert_eq!(report.matches, vec!["8".to_string(), "6".to_string()]);
        assert_eq!(report.error, None);

        let report = validate_format_pattern("<a>\nx\n</a>", r"<a>.*</a>", "a block");
        assert_eq!(report.matches, vec!["<a>\nx\n</a>".to_string()]);

        let report = validate_format_pattern("nothing here", r"^\d+$", "a number");
        assert!(!report.is_valid);
        assert_eq!(report.error.as_deref(), Some("Text does not match expected pattern: a number"));

        let report = validate_format_pattern("text", r"(unclosed", "broken");
        assert!(!report.is_valid);
        assert!(report.error.unwrap().starts_with("Invalid regex pattern: "));
    }

    #[test]
    fn test_pattern_validator() {
        let validator = pattern_validator("has_verdict", r"^Verdict: (yes|no)$").unwrap();
        assert_eq!(validator.name(), "has_verdict");
        assert!(validator.check("Reasoning...\nVerdict: yes\n"));
        assert!(!validator.check("Verdict: maybe"));
        assert!(pattern_validator("bad", "[").is_err());
    }
}
