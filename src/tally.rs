use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info};

use crate::matcher::MatcherRegistry;
use crate::table::Table;

/// Occurrences of each group-by value, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, usize)>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value.to_string(), 1)),
        }
    }

    pub fn get(&self, value: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(k, _)| k == value)
            .map(|(_, count)| *count)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    /// Distinct values joined by commas.
    pub fn joined_keys(&self) -> String {
        self.keys().collect::<Vec<_>>().join(",")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// Result of applying a registry to one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyReport {
    pub rows: usize,
    pub full_matches: usize,
    pub summary: String,
    pub tally: Tally,
}

/// Apply every matcher to every row of `table`.
///
/// Per row, matchers run in registry order. A group-by matcher records its
/// cell before testing it. The first miss ends evaluation of that row, so a
/// later group-by column is not tallied for it. Each hit bumps the matcher's
/// session-wide count.
pub fn tally(table: &Table, registry: &mut MatcherRegistry) -> TallyReport {
    let mut report = TallyReport::default();

    for row in table.rows() {
        debug!(?row);
        report.rows += 1;
        let mut all_matched = true;

        for matcher in registry.matchers_mut() {
            let Some(cell) = row.get(matcher.column_index()) else {
                debug!(
                    column = matcher.column_name(),
                    index = matcher.column_index(),
                    "row too short for column"
                );
                all_matched = false;
                break;
            };

            if matcher.is_group_by() {
                report.tally.increment(cell);
            }

            if matcher.is_match(cell) {
                info!("matched {cell}");
                matcher.record_match();
            } else {
                all_matched = false;
                break;
            }
        }

        if all_matched {
            report.full_matches += 1;
        }
    }

    report.summary = report.tally.joined_keys();
    info!(
        "{} entries,{} matches,{}",
        report.rows, report.full_matches, report.summary
    );
    report
}
