#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let tables = gridwait::table::parse_tables(data);
    assert!(!tables.is_empty());
    for table in &tables {
        if let Some(width) = table.width() {
            assert!(width > 1);
            assert!(table.rows().iter().all(|row| row.len() == width));
        }
    }
    // Deterministic
    assert_eq!(tables, gridwait::table::parse_tables(data));
    // Serializes cleanly
    let _ = serde_json::to_string(&tables).unwrap();
});
