#![no_main]
use libfuzzer_sys::fuzz_target;
use sliver_sync_core::{
    AddressLineError,
    SliverTool,
    Status,
    apply_address,
    is_disabled,
    parse_address_feed,
};

fn blank_tool() -> SliverTool {
    SliverTool {
        tool_id: "ndt".to_string(),
        slice_id: "iupui_ndt".to_string(),
        server_id: "mlab1".to_string(),
        site_id: "nuq01".to_string(),
        fqdn: String::new(),
        sliver_ipv4: String::new(),
        sliver_ipv6: String::new(),
        status_ipv4: Status::Offline,
        status_ipv6: Status::Offline,
        when: Default::default(),
    }
}

fuzz_target!(|text: &str| {
    let non_blank = text.lines().filter(|line| !line.trim().is_empty()).count();
    let mut parsed = 0;

    for line in parse_address_feed(text) {
        parsed += 1;
        match line {
            Ok(entry) => {
                for field in [entry.fqdn, entry.ipv4, entry.ipv6] {
                    assert!(!field.contains(','));
                    assert_eq!(field, field.trim());
                }

                // Merging the same entry twice changes nothing the second time.
                let mut tool = blank_tool();
                apply_address(&mut tool, &entry);
                let once = tool.clone();
                assert!(!apply_address(&mut tool, &entry));
                assert_eq!(once, tool);
                assert_eq!(is_disabled(entry.ipv6), is_disabled(&tool.sliver_ipv6));
            }
            Err(AddressLineError::FieldCount { found, .. }) => assert_ne!(found, 3),
        }
    }

    // Exactly one item per non-blank line.
    assert_eq!(parsed, non_blank);
});
