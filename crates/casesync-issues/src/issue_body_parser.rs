//! Heading-delimited issue body parsing into a case-creation payload.
//!
//! Issue bodies produced by tracker issue forms use `### <label>` headings as
//! section delimiters. Every heading opens a section; non-empty trimmed lines
//! accumulate under it until the next heading. Lines before the first heading
//! are ignored. Unknown headings are kept but unused by [`parse_case_data`].
//! Heading-like lines inside fenced code blocks are section content.

use casesync_core::take_chars;
use casesync_support::{CaseData, Severity, DEFAULT_CATEGORY_CODE, DEFAULT_SERVICE_CODE};

pub const SUBJECT_MAX_CHARS: usize = 100;
const HEADING_MARKER: &str = "###";
const FENCE: &str = "```";
/// Placeholder issue forms write for an unanswered optional field.
const NO_RESPONSE_PLACEHOLDER: &str = "_No response_";

const SUMMARY_HEADINGS: &[&str] = &["summary", "概要"];
const DETAILS_HEADINGS: &[&str] = &["details", "詳細"];
const REPRODUCTION_HEADINGS: &[&str] = &["reproduction steps", "steps to reproduce", "再現手順"];
const REMEDIES_HEADINGS: &[&str] = &["attempted remedies", "what have you tried", "試したこと"];
const SEVERITY_HEADINGS: &[&str] = &["severity", "重要度"];
const SERVICE_HEADINGS: &[&str] = &["target service", "aws service", "対象サービス"];

const URGENT_MARKERS: &[&str] = &["Critical", "Urgent", "緊急"];
const HIGH_MARKERS: &[&str] = &["High", "高"];
const NORMAL_MARKERS: &[&str] = &["Normal", "通常"];

const SERVICE_CODES: &[(&str, &str)] = &[
    ("EC2", "amazon-elastic-compute-cloud-linux"),
    ("RDS", "amazon-relational-database-service"),
    ("S3", "amazon-simple-storage-service"),
    ("Lambda", "aws-lambda"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSection {
    /// Heading label as written, without the `###` marker.
    pub heading: String,
    pub lines: Vec<String>,
}

impl IssueSection {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIssueBody {
    sections: Vec<IssueSection>,
}

impl ParsedIssueBody {
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<IssueSection> = Vec::new();
        let mut in_fence = false;
        for raw_line in text.lines() {
            if raw_line.trim_start().starts_with(FENCE) {
                in_fence = !in_fence;
            } else if let Some(heading) = parse_heading(raw_line).filter(|_| !in_fence) {
                sections.push(IssueSection {
                    heading: heading.to_string(),
                    lines: Vec::new(),
                });
                continue;
            }
            let line = raw_line.trim();
            if line.is_empty() || line == NO_RESPONSE_PLACEHOLDER {
                continue;
            }
            if let Some(section) = sections.last_mut() {
                section.lines.push(line.to_string());
            }
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[IssueSection] {
        &self.sections
    }

    /// First non-empty section whose heading matches one of `aliases`
    /// (case-insensitive).
    pub fn section(&self, aliases: &[&str]) -> Option<&IssueSection> {
        self.sections.iter().find(|section| {
            !section.is_empty()
                && aliases
                    .iter()
                    .any(|alias| section.heading.to_lowercase() == alias.to_lowercase())
        })
    }
}

fn parse_heading(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix(HEADING_MARKER)?;
    if rest.starts_with('#') {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

/// Maps the first line of a severity section to a [`Severity`].
pub fn severity_from_label(label: &str) -> Severity {
    let contains_any = |markers: &[&str]| markers.iter().any(|marker| label.contains(marker));
    if contains_any(URGENT_MARKERS) {
        Severity::Urgent
    } else if contains_any(HIGH_MARKERS) {
        Severity::High
    } else if contains_any(NORMAL_MARKERS) {
        Severity::Normal
    } else {
        Severity::Low
    }
}

/// Maps a service name to its support service code, falling back to the
/// generic code for unlisted names.
pub fn service_code_for(name: &str) -> &'static str {
    let name = name.trim();
    SERVICE_CODES
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_SERVICE_CODE)
}

pub fn parse_case_data(text: &str) -> CaseData {
    case_data_from_sections(&ParsedIssueBody::parse(text))
}

pub fn case_data_from_sections(parsed: &ParsedIssueBody) -> CaseData {
    let subject = parsed
        .section(SUMMARY_HEADINGS)
        .map(|section| take_chars(&section.lines.join(" "), SUBJECT_MAX_CHARS))
        .unwrap_or_default();

    let body = [DETAILS_HEADINGS, REPRODUCTION_HEADINGS, REMEDIES_HEADINGS]
        .iter()
        .filter_map(|aliases| parsed.section(aliases))
        .map(|section| format!("{HEADING_MARKER} {}\n{}", section.heading, section.text()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let severity = parsed
        .section(SEVERITY_HEADINGS)
        .and_then(IssueSection::first_line)
        .map(severity_from_label)
        .unwrap_or_default();

    let service_code = parsed
        .section(SERVICE_HEADINGS)
        .and_then(IssueSection::first_line)
        .map(service_code_for)
        .unwrap_or(DEFAULT_SERVICE_CODE);

    CaseData {
        subject,
        body,
        severity,
        category: DEFAULT_CATEGORY_CODE.to_string(),
        service_code: service_code.to_string(),
    }
}
