//! Render results for CI pipelines or as JSON.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::poller::{PollOutcome, PollState};
use crate::runner::CommandResult;
use crate::schema::ObjectType;
use crate::table::{Record, Table};
use crate::tally::Tally;

/// Environment variable naming the step-output file on GitHub runners.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Final verdict of one polling session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub object_type: String,
    pub object_id: String,
    /// Distinct statuses of the last poll, comma-joined.
    pub summary: String,
    pub tally: Tally,
    pub status: String,
    pub exit_code: i32,
    pub state: Option<PollState>,
}

impl SessionSummary {
    pub fn from_outcome(object_type: ObjectType, object_id: &str, outcome: &PollOutcome) -> Self {
        let tally = outcome.report.tally.clone();
        Self {
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
            summary: outcome.report.summary.clone(),
            status: tally.joined_keys(),
            tally,
            exit_code: outcome.exit_code,
            state: outcome.state,
        }
    }

    /// `obj-*` step outputs in their documented order.
    pub fn output_pairs(&self) -> Result<Vec<(String, String)>> {
        let tally = serde_json::to_string(&self.tally).context("Failed to encode tally")?;
        Ok(vec![
            ("obj-type".to_string(), self.object_type.clone()),
            ("obj-id".to_string(), self.object_id.clone()),
            ("obj-summary".to_string(), self.summary.clone()),
            ("obj-tally".to_string(), tally),
            ("obj-status".to_string(), self.status.clone()),
            ("obj-exit-code".to_string(), self.exit_code.to_string()),
        ])
    }
}

/// One output per key:value record, named after its label. Records without
/// a value cell are skipped.
pub fn record_pairs(records: &[Record]) -> Vec<(String, String)> {
    records
        .iter()
        .filter_map(|record| {
            let label = record.first()?;
            let value = record.get(1)?;
            Some((label.replace(' ', "_").to_lowercase(), value.clone()))
        })
        .collect()
}

/// Workflow-command form, one `::set-output` line per pair.
pub fn github_output_lines(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("::set-output name={name}::{value}\n"))
        .collect()
}

/// Append `name=value` lines to a GitHub step-output file.
pub fn append_github_output_file(path: &Path, pairs: &[(String, String)]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for (name, value) in pairs {
        writeln!(file, "{name}={value}")
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Print workflow commands and, on runners that set it, fill `$GITHUB_OUTPUT`.
pub fn emit_github(pairs: &[(String, String)]) -> Result<()> {
    print!("{}", github_output_lines(pairs));
    if let Some(path) = std::env::var_os(GITHUB_OUTPUT_ENV) {
        append_github_output_file(Path::new(&path), pairs)?;
    }
    Ok(())
}

/// `[records, tables]` as a single JSON array.
pub fn capture_json(records: &[Record], tables: &[Table]) -> Result<String> {
    serde_json::to_string(&(records, tables)).context("Failed to encode capture")
}

/// JSON form of a polling session: no key:value records, and the tables of
/// the last poll.
pub fn poll_json(outcome: &PollOutcome) -> Result<String> {
    capture_json(&[], &outcome.tables)
}

pub fn raw_output(result: &CommandResult) -> String {
    format!("{}\n{}", result.stdout, result.stderr)
}
