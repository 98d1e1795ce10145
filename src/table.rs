//! Reconstruct tables from captured terminal output.
//!
//! The grid CLI renders listings as box-drawn tables (`┃` for header cells,
//! `│` for body cells) and account details as `label: value` lines. Parsing
//! never fails: lines that do not split into at least two cells are dropped.

use serde::Serialize;
use tracing::debug;

/// Cell separators recognised in tabular output.
pub const TABLE_DELIMITERS: &[char] = &['│', '┃', '|'];

/// Default separator for `label: value` output.
pub const KV_DELIMITER: char = ':';

pub type Row = Vec<String>;

/// A run of consecutive rows that all have the same cell count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell count shared by every row, `None` for an empty table.
    pub fn width(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }
}

impl From<Vec<Row>> for Table {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

/// Split a line on any of `delimiters`, trimming every cell.
pub fn split_cells(line: &str, delimiters: &[char]) -> Row {
    line.split(delimiters)
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Parse box-drawn output with the default delimiters and no row limit.
pub fn parse_tables(text: &str) -> Vec<Table> {
    parse_tables_with(text, TABLE_DELIMITERS, None)
}

/// Parse tabular output into one or more tables.
///
/// A change in cell count between two qualifying lines closes the table in
/// progress and opens a new one. The table in progress is always appended at
/// the end, so the result holds at least one (possibly empty) table.
///
/// With `head`, scanning stops as soon as the table in progress holds `head`
/// rows; the counter restarts with each new table.
pub fn parse_tables_with(text: &str, delimiters: &[char], head: Option<usize>) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current = Table::default();
    let mut width: Option<usize> = None;

    for line in text.lines() {
        let cells = split_cells(line, delimiters);
        if cells.len() <= 1 {
            continue;
        }

        match width {
            None => width = Some(cells.len()),
            Some(w) if w != cells.len() => {
                debug!(from = w, to = cells.len(), "new table found");
                tables.push(std::mem::take(&mut current));
                width = Some(cells.len());
            }
            Some(_) => {}
        }

        current.rows.push(cells);
        if head.is_some_and(|limit| current.len() >= limit) {
            break;
        }
    }

    tables.push(current);
    tables
}

// ── key:value output ────────────────────────────────────────────────

pub type Record = Vec<String>;

const TEAMS_LABEL: &str = "Teams";
const ROLE_LABEL: &str = "Role";

/// Parse `label: value` output into one record per qualifying line.
///
/// Every piece of the split is kept, so a value that itself contains the
/// delimiter (a URL, a timestamp) yields more than two cells.
pub fn parse_key_values(text: &str, delimiter: char) -> Vec<Record> {
    let mut records: Vec<Record> = text
        .lines()
        .map(|line| split_cells(line, &[delimiter]))
        .filter(|cells| cells.len() > 1)
        .collect();
    repair_teams_records(&mut records);
    records
}

/// The user listing prints team membership as
///
/// ```text
/// Teams:
///   research - Role: admin
/// ```
///
/// which splits into `[Teams, ""]` and `[research - Role, admin]`. Rewrite
/// that exact pair into `[Teams, research]` and `[Role, admin]`.
fn repair_teams_records(records: &mut [Record]) {
    let Some(pos) = records.iter().position(|r| r[0] == TEAMS_LABEL) else {
        return;
    };

    let team = match records.get(pos + 1) {
        Some(next) => match next[0].split('-').collect::<Vec<_>>().as_slice() {
            [team, role] if role.trim() == ROLE_LABEL => Some(team.trim().to_string()),
            _ => None,
        },
        None => None,
    };

    match team {
        Some(team) => {
            records[pos][1] = team;
            records[pos + 1][0] = ROLE_LABEL.to_string();
        }
        None => debug!("Teams record is not followed by a 'team - Role' record, left as is"),
    }
}
