#![no_main]
use libfuzzer_sys::fuzz_target;
use sliver_sync_core::{
    StatusFeedError,
    parse_status_feed,
};

fuzz_target!(|text: &str| {
    match parse_status_feed(text) {
        Ok(statuses) => {
            assert!(!statuses.is_empty());
            for (fqdn, _) in statuses.iter() {
                assert!(!fqdn.is_empty());
                assert!(!fqdn.contains(char::is_whitespace));
                assert!(text.contains(fqdn));
            }
        }
        Err(StatusFeedError::Empty) => {}
    }
});
