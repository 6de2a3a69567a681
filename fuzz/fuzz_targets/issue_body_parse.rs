#![no_main]

use casesync_issues::{parse_case_data, ParsedIssueBody, SUBJECT_MAX_CHARS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let case_data = parse_case_data(&raw);
    assert!(case_data.subject.chars().count() <= SUBJECT_MAX_CHARS);
    assert!(!case_data.service_code.trim().is_empty());
    assert!(!case_data.category.trim().is_empty());

    let parsed = ParsedIssueBody::parse(&raw);
    for section in parsed.sections() {
        assert!(section.lines.iter().all(|line| !line.trim().is_empty()));
    }
});
