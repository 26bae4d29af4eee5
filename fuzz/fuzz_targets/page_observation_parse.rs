#![no_main]

use libfuzzer_sys::fuzz_target;
use triage_runtime::{PageEventSource, PageObservation, PageSignal};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let mut events = PageEventSource::new();

    for line in raw.lines() {
        let Some(observation) = PageObservation::parse_line(line) else {
            continue;
        };
        assert!(!observation.href.trim().is_empty());
        assert!(!observation.href.contains(char::is_whitespace));
        if let Some(PageSignal::NavigationChanged(location)) = events.observe(&observation) {
            assert_eq!(location.href(), observation.href.trim());
        }
    }
});
