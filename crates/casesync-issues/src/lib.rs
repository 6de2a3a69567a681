//! Issue-tracker text handling for the case bridge: issue body parsing,
//! reply command extraction, and notification comment rendering.

pub mod case_comment;
pub mod issue_body_parser;
pub mod reply_extractor;

pub use issue_body_parser::{parse_case_data, ParsedIssueBody, SUBJECT_MAX_CHARS};
pub use reply_extractor::{extract_reply, REPLY_COMMAND_TOKEN};
