#![no_main]

use libfuzzer_sys::fuzz_target;
use triage_core::{extract_issue_context, is_duplicate_issue_load, PageLocation};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let location = PageLocation::new(raw.as_ref());

    match extract_issue_context(&location) {
        Some(context) => {
            assert!(!context.owner.is_empty());
            assert!(!context.repo.is_empty());
            assert!(!context.owner.contains('/'));
            assert!(!context.repo.contains('/'));
            let rendered = context.to_string();
            assert!(rendered.ends_with(&format!("#{}", context.issue_number)));
        }
        None => assert!(!is_duplicate_issue_load(&location)),
    }
});
