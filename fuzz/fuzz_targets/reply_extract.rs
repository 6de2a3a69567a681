#![no_main]

use casesync_issues::extract_reply;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Some(reply) = extract_reply(&raw) {
        assert!(!reply.is_empty());
        assert_eq!(reply.trim(), reply);
    }
});
