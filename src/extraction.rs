//! # Field Extraction Module
//!
//! Pulls candidate fields out of raw OCR text. Two kinds of fields exist:
//!
//! - **Labeled fields** (name, date of birth, email, phone, address): the rest
//!   of the line following a label such as `Name:` or `Mobile-`.
//! - **Section fields** (training, certifications, family): everything between
//!   a numbered start marker and the next section number.
//!
//! Matching is case-insensitive for labels and exact for section markers. A
//! missing label yields [`NOT_FOUND`]; a missing section yields an empty string.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Placeholder stored when a labeled field is absent from the text
pub const NOT_FOUND: &str = "Not Found";

/// A single-line field introduced by one of several equivalent labels
#[derive(Debug, Clone, Copy)]
pub struct LabeledField {
    pub key: &'static str,
    pub labels: &'static [&'static str],
}

/// A multi-line field delimited by a start marker and an end marker
#[derive(Debug, Clone, Copy)]
pub struct SectionField {
    pub key: &'static str,
    pub start_marker: &'static str,
    pub end_marker: &'static str,
}

pub const LABELED_FIELDS: [LabeledField; 5] = [
    LabeledField {
        key: "name",
        labels: &["Name"],
    },
    LabeledField {
        key: "dob",
        labels: &["Date of Birth", "DOB"],
    },
    LabeledField {
        key: "email",
        labels: &["Email"],
    },
    LabeledField {
        key: "phone",
        labels: &["Phone", "Mobile"],
    },
    LabeledField {
        key: "address",
        labels: &["Address"],
    },
];

pub const SECTION_FIELDS: [SectionField; 3] = [
    SectionField {
        key: "training",
        start_marker: "15. Details of any important training undergone:",
        end_marker: "16.",
    },
    SectionField {
        key: "certifications",
        start_marker: "16. Please list the technical or professional certification you completed",
        end_marker: "17.",
    },
    SectionField {
        key: "family",
        start_marker: "17. Details of Family Members:",
        end_marker: "18.",
    },
];

/// Where a label may appear for it to count as a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMatchMode {
    /// Anywhere in the text; the leftmost occurrence wins
    #[default]
    Unanchored,
    /// Only at the start of a line, after optional horizontal whitespace
    LineStart,
}

impl LabelMatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelMatchMode::Unanchored => "unanchored",
            LabelMatchMode::LineStart => "line_start",
        }
    }
}

/// Fields extracted from one document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateFields {
    pub name: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub training: String,
    pub certifications: String,
    pub family: String,
}

impl CandidateFields {
    /// Field values paired with their column names, in storage order
    pub fn as_pairs(&self) -> [(&'static str, &str); 8] {
        [
            ("name", &self.name),
            ("dob", &self.dob),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("training", &self.training),
            ("certifications", &self.certifications),
            ("family", &self.family),
        ]
    }

    /// Keys of labeled fields that were not found
    pub fn missing_labeled_fields(&self) -> Vec<&'static str> {
        self.as_pairs()
            .into_iter()
            .filter(|(key, _)| LABELED_FIELDS.iter().any(|field| field.key == *key))
            .filter(|(_, value)| *value == NOT_FOUND)
            .map(|(key, _)| key)
            .collect()
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            "name" => self.name = value,
            "dob" => self.dob = value,
            "email" => self.email = value,
            "phone" => self.phone = value,
            "address" => self.address = value,
            "training" => self.training = value,
            "certifications" => self.certifications = value,
            "family" => self.family = value,
            _ => trace!(key = key, "Ignoring unknown field key"),
        }
    }
}

/// Build the regex source for a set of equivalent labels.
///
/// Labels are escaped and grouped so that alternation never leaks into the
/// rest of the pattern. The single capture group holds the line content.
pub fn label_pattern(labels: &[&str], mode: LabelMatchMode) -> String {
    let alternatives = labels
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|");

    match mode {
        LabelMatchMode::Unanchored => format!(r"(?:{alternatives})[:\-]?\s*([^\n]+)"),
        LabelMatchMode::LineStart => format!(r"(?m)^[ \t]*(?:{alternatives})[:\-]?\s*([^\n]+)"),
    }
}

fn compile_label_regex(labels: &[&str], mode: LabelMatchMode) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&label_pattern(labels, mode))
        .case_insensitive(true)
        .build()
}

fn capture_trimmed(regex: &Regex, text: &str) -> String {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

/// Extract the value following `label` anywhere in `text`.
///
/// ```rust
/// use candidate_intake::extraction::parse_field;
///
/// assert_eq!(parse_field("Name: Alice Smith\n", "Name"), "Alice Smith");
/// assert_eq!(parse_field("nothing here", "Email"), "Not Found");
/// ```
pub fn parse_field(text: &str, label: &str) -> String {
    parse_labeled_field(text, &[label], LabelMatchMode::Unanchored)
}

/// Extract the value following any of `labels`, honoring `mode`.
pub fn parse_labeled_field(text: &str, labels: &[&str], mode: LabelMatchMode) -> String {
    match compile_label_regex(labels, mode) {
        Ok(regex) => capture_trimmed(&regex, text),
        Err(e) => {
            debug!(error = %e, "Label pattern failed to compile");
            NOT_FOUND.to_string()
        }
    }
}

/// Return the trimmed text between `start_marker` and `end_marker`.
///
/// The end marker is searched only after the end of the start marker, so an
/// end marker that overlaps the start marker (for example both `"15."`) never
/// matches the start marker itself: `"15. A 15. B"` yields `"A"`, not an empty
/// section. If the end marker is absent the section runs to the end of the
/// text; if the start marker is absent the result is empty.
///
/// ```rust
/// use candidate_intake::extraction::extract_section;
///
/// let text = "15. Training:\n  First aid  \n16. Certs";
/// assert_eq!(extract_section(text, "15. Training:", "16."), "First aid");
/// assert_eq!(extract_section(text, "99.", "100."), "");
/// ```
pub fn extract_section(text: &str, start_marker: &str, end_marker: &str) -> String {
    let Some(start_idx) = text.find(start_marker) else {
        return String::new();
    };
    let rest = &text[start_idx + start_marker.len()..];

    let body = match rest.find(end_marker) {
        Some(end_idx) => &rest[..end_idx],
        None => rest,
    };
    body.trim().to_string()
}

/// Precompiled extractor for every candidate field
pub struct FieldExtractor {
    mode: LabelMatchMode,
    label_patterns: Vec<(&'static str, Regex)>,
}

impl FieldExtractor {
    pub fn new(mode: LabelMatchMode) -> Result<Self, regex::Error> {
        let label_patterns = LABELED_FIELDS
            .iter()
            .map(|field| Ok((field.key, compile_label_regex(field.labels, mode)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            mode,
            label_patterns,
        })
    }

    /// Shared extractor for `mode`, compiled once per process
    pub fn shared(mode: LabelMatchMode) -> &'static FieldExtractor {
        match mode {
            LabelMatchMode::Unanchored => &UNANCHORED_EXTRACTOR,
            LabelMatchMode::LineStart => &LINE_START_EXTRACTOR,
        }
    }

    pub fn mode(&self) -> LabelMatchMode {
        self.mode
    }

    pub fn extract(&self, text: &str) -> CandidateFields {
        let mut fields = CandidateFields::default();

        for (key, regex) in &self.label_patterns {
            fields.set(key, capture_trimmed(regex, text));
        }
        for section in &SECTION_FIELDS {
            fields.set(
                section.key,
                extract_section(text, section.start_marker, section.end_marker),
            );
        }

        debug!(
            mode = self.mode.as_str(),
            text_len = text.len(),
            missing = ?fields.missing_labeled_fields(),
            "Extracted candidate fields"
        );
        fields
    }
}

lazy_static! {
    static ref UNANCHORED_EXTRACTOR: FieldExtractor = FieldExtractor::new(LabelMatchMode::Unanchored)
        .expect("Built-in label patterns should be valid");
    static ref LINE_START_EXTRACTOR: FieldExtractor = FieldExtractor::new(LabelMatchMode::LineStart)
        .expect("Built-in label patterns should be valid");
}

/// Extract all fields with the default unanchored label matching
pub fn extract_candidate_fields(text: &str) -> CandidateFields {
    FieldExtractor::shared(LabelMatchMode::Unanchored).extract(text)
}
