//! Plain-text comment bodies posted to the issue tracker.
//!
//! Every comment ends with a hidden marker line naming the notification kind
//! and case so bridge-authored comments can be recognised later.

use casesync_core::truncate_for_error;
use casesync_support::{CaseData, CaseStatus, Communication, CreatedCase};

pub const COMMENT_MARKER_PREFIX: &str = "<!-- casesync:";
pub const COMMENT_MARKER_SUFFIX: &str = " -->";
const ERROR_MESSAGE_MAX_CHARS: usize = 600;
const COMMUNICATION_BODY_MAX_CHARS: usize = 8_000;

pub fn render_comment_marker(kind: &str, case_id: Option<&str>) -> String {
    match case_id {
        Some(case_id) => format!("{COMMENT_MARKER_PREFIX}{kind}:{case_id}{COMMENT_MARKER_SUFFIX}"),
        None => format!("{COMMENT_MARKER_PREFIX}{kind}{COMMENT_MARKER_SUFFIX}"),
    }
}

fn quote_block(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_case_created_comment(created: &CreatedCase, case_data: &CaseData) -> String {
    format!(
        "Support case `{}` created.\n\n- case id: `{}`\n- subject: {}\n- severity: `{}`\n- service: `{}`\n\nReply to support with a comment starting with `/reply`.\n\n{}",
        created.display_id,
        created.case_id,
        case_data.subject,
        case_data.severity,
        case_data.service_code,
        render_comment_marker("case-created", Some(&created.case_id))
    )
}

pub fn render_reply_relayed_comment(display_id: &str, case_id: &str, reply: &str) -> String {
    format!(
        "Reply sent to support case `{display_id}`:\n\n{}\n\n{}",
        quote_block(reply),
        render_comment_marker("reply-relayed", Some(case_id))
    )
}

pub fn render_status_changed_comment(
    display_id: &str,
    case_id: &str,
    previous: &CaseStatus,
    current: &CaseStatus,
) -> String {
    format!(
        "Support case `{display_id}` status changed: `{previous}` -> `{current}`.\n\n{}",
        render_comment_marker("status-changed", Some(case_id))
    )
}

pub fn render_new_communications_comment(
    display_id: &str,
    case_id: &str,
    communications: &[Communication],
) -> String {
    let mut rendered = format!(
        "Support case `{display_id}` has {} new message{}.",
        communications.len(),
        if communications.len() == 1 { "" } else { "s" }
    );
    for communication in communications {
        let author = if communication.submitted_by.trim().is_empty() {
            "unknown sender"
        } else {
            communication.submitted_by.trim()
        };
        rendered.push_str(&format!(
            "\n\n**{author}** at `{}`:\n\n{}",
            communication.time_created,
            quote_block(&truncate_for_error(
                &communication.body,
                COMMUNICATION_BODY_MAX_CHARS
            ))
        ));
    }
    rendered.push_str("\n\n");
    rendered.push_str(&render_comment_marker("new-communications", Some(case_id)));
    rendered
}

pub fn render_error_comment(operation: &str, error_message: &str) -> String {
    format!(
        "casesync {operation} failed.\n\nError: `{}`\n\n{}",
        truncate_for_error(error_message, ERROR_MESSAGE_MAX_CHARS),
        render_comment_marker("error", None)
    )
}

pub fn render_rate_limit_comment(operation: &str, error_message: &str) -> String {
    format!(
        "casesync {operation} was rate limited and gave up after retrying. The next run will try again.\n\nLast error: `{}`\n\n{}",
        truncate_for_error(error_message, ERROR_MESSAGE_MAX_CHARS),
        render_comment_marker("rate-limited", None)
    )
}
