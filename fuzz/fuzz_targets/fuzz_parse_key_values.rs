#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let records = gridwait::table::parse_key_values(data, ':');
    assert!(records.iter().all(|r| r.len() > 1));
    let _ = gridwait::summary::record_pairs(&records);
});
