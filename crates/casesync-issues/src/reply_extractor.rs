//! Extraction of outbound reply text from tracker comments.
//!
//! Two forms are recognised, first match in document order wins:
//!
//! - single line: `/reply <text>` yields `<text>` trimmed;
//! - block: `/reply` with nothing after it (or followed by an opening
//!   fence), then every line up to the next fence line or end of input.
//!
//! Fenced code blocks are tracked while scanning, so a command token quoted
//! inside an earlier fenced block is never mistaken for a command.

pub const REPLY_COMMAND_TOKEN: &str = "/reply";
const FENCE: &str = "```";

pub fn extract_reply(comment: &str) -> Option<String> {
    extract_reply_with_token(comment, REPLY_COMMAND_TOKEN)
}

pub fn extract_reply_with_token(comment: &str, token: &str) -> Option<String> {
    let lines = comment.lines().collect::<Vec<_>>();
    let mut in_fence = false;
    let mut index = 0_usize;
    while index < lines.len() {
        let trimmed = lines[index].trim();
        index += 1;
        if is_fence(trimmed) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let Some(remainder) = command_remainder(trimmed, token) else {
            continue;
        };
        if !remainder.is_empty() && !is_fence(remainder) {
            return Some(remainder.to_string());
        }

        let mut opened_fence = !remainder.is_empty();
        if remainder.is_empty() && lines.get(index).is_some_and(|line| is_fence(line.trim())) {
            opened_fence = true;
            index += 1;
        }
        let start = index;
        while index < lines.len() && !is_fence(lines[index].trim()) {
            index += 1;
        }
        let block = lines[start..index].join("\n");
        let block = block.trim();
        if !block.is_empty() {
            return Some(block.to_string());
        }
        // A fence the command opened is closed here. Any other fence opens a
        // new code block and is left for the outer scan to toggle.
        if opened_fence {
            index += 1;
        }
    }
    None
}

fn command_remainder<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(token)?;
    if rest.is_empty() {
        return Some(rest);
    }
    if rest.starts_with(char::is_whitespace) || rest.starts_with(FENCE) {
        return Some(rest.trim());
    }
    None
}

fn is_fence(line: &str) -> bool {
    line.starts_with(FENCE)
}
