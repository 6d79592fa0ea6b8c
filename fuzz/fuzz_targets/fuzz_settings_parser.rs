#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Settings text comes off a removable card; anything goes, nothing panics.
    let Ok(parsed) = stand_config::parse_settings(data) else {
        let _ = stand_config::parse_settings(&stand_config::rewrite_key(data, "TN", "42"));
        return;
    };
    let _ = parsed.settings.validate();

    // The rewritten line must be the one the parser reads back.
    let bumped = stand_config::rewrite_key(data, "TN", "42");
    if let Ok(again) = stand_config::parse_settings(&bumped) {
        assert_eq!(again.settings.test_sequence_number, 42);
    }
});
