#![no_main]
use libfuzzer_sys::fuzz_target;

use gridwait::matcher::MatcherRegistry;
use gridwait::schema::ObjectType;

fuzz_target!(|data: &str| {
    let mut registry = MatcherRegistry::for_status(
        ObjectType::Session,
        "session",
        "status",
        "^abc123$",
        "running|failed|stopped|paused",
    )
    .unwrap();
    let tables = gridwait::table::parse_tables(data);
    let report = gridwait::tally::tally(&tables[0], &mut registry);
    assert!(report.full_matches <= report.rows);
    assert_eq!(report.rows, tables[0].len());
    let total: usize = report.tally.iter().map(|(_, n)| n).sum();
    assert!(total >= report.full_matches);
});
