//! Poll the status command until the observed rows converge.
//!
//! Match counts and per-state counters are cumulative for the life of a
//! session. Once the identifier has matched on any poll the `NoIds` state can
//! no longer occur, and once identifier and status counts diverge they rarely
//! line up again. That coupling is long-standing behaviour callers rely on.

use std::fmt;

use anyhow::Result as AnyhowResult;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{GridError, Result};
use crate::matcher::MatcherRegistry;
use crate::runner::{CommandExecutor, CommandResult, CommandRunner};
use crate::table::{parse_tables, Table};
use crate::tally::{tally, TallyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// The identifier has never matched.
    NoIds,
    /// The identifier matched but the status never did.
    NoMatch,
    /// Identifier and status match counts differ.
    SomeMatch,
    /// Every identifier match also matched on status.
    AllMatch,
}

impl PollState {
    pub fn classify(id_matches: usize, status_matches: usize) -> Self {
        match (id_matches, status_matches) {
            (0, _) => PollState::NoIds,
            (_, 0) => PollState::NoMatch,
            (id, status) if id != status => PollState::SomeMatch,
            _ => PollState::AllMatch,
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::NoIds => write!(f, "id not found"),
            PollState::NoMatch => write!(f, "none matched status"),
            PollState::SomeMatch => write!(f, "some matched status"),
            PollState::AllMatch => write!(f, "all matched status"),
        }
    }
}

/// When to stop. A `max_*` of 0 never stops on that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub max_no_ids_cnt: u32,
    pub max_no_match_cnt: u32,
    pub max_some_match_cnt: u32,
    pub min_all_match_cnt: u32,
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        if self.min_all_match_cnt < 1 {
            return Err(GridError::InvalidConfig(format!(
                "min_all_match_cnt={} must be greater than 0",
                self.min_all_match_cnt
            )));
        }
        Ok(())
    }
}

fn limit_reached(limit: u32, count: u32) -> bool {
    limit > 0 && count >= limit
}

/// Polls classified into each state so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub no_ids: u32,
    pub no_match: u32,
    pub some_match: u32,
    pub all_match: u32,
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// 0 on success, 1 on any other termination.
    pub exit_code: i32,
    /// State of the last classified poll, `None` if no poll completed.
    pub state: Option<PollState>,
    pub polls: u32,
    pub counts: StateCounts,
    pub report: TallyReport,
    /// Every table parsed from the last poll, trailing ones included.
    pub tables: Vec<Table>,
    pub last_output: Option<CommandResult>,
}

impl PollOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct ConvergencePoller<E> {
    runner: CommandRunner<E>,
    registry: MatcherRegistry,
    thresholds: Thresholds,
    counts: StateCounts,
}

impl<E: CommandExecutor> ConvergencePoller<E> {
    /// `registry` must hold exactly the identifier and status matchers.
    pub fn new(
        runner: CommandRunner<E>,
        registry: MatcherRegistry,
        thresholds: Thresholds,
    ) -> Result<Self> {
        thresholds.validate()?;
        if registry.len() != 2 {
            return Err(GridError::InvalidConfig(format!(
                "status tracking needs an identifier and a status matcher, got {} matchers",
                registry.len()
            )));
        }
        Ok(Self {
            runner,
            registry,
            thresholds,
            counts: StateCounts::default(),
        })
    }

    pub fn registry(&self) -> &MatcherRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &CommandRunner<E> {
        &self.runner
    }

    pub fn counts(&self) -> StateCounts {
        self.counts
    }

    fn match_counts(&self) -> (usize, usize) {
        let id = self.registry.identifier().map_or(0, |m| m.match_count());
        let status = self.registry.status().map_or(0, |m| m.match_count());
        (id, status)
    }

    /// Count `state` and return the exit code if it ends the session.
    fn record(&mut self, state: PollState) -> Option<i32> {
        info!("{state}");
        let t = self.thresholds;
        match state {
            PollState::NoIds => {
                self.counts.no_ids = self.counts.no_ids.saturating_add(1);
                limit_reached(t.max_no_ids_cnt, self.counts.no_ids).then_some(1)
            }
            PollState::NoMatch => {
                self.counts.no_match = self.counts.no_match.saturating_add(1);
                limit_reached(t.max_no_match_cnt, self.counts.no_match).then_some(1)
            }
            PollState::SomeMatch => {
                self.counts.some_match = self.counts.some_match.saturating_add(1);
                limit_reached(t.max_some_match_cnt, self.counts.some_match).then_some(1)
            }
            PollState::AllMatch => {
                self.counts.all_match = self.counts.all_match.saturating_add(1);
                (self.counts.all_match >= t.min_all_match_cnt).then_some(0)
            }
        }
    }

    /// Poll `command` until a state threshold or the retry ceiling is hit.
    pub async fn converge(&mut self, command: &str) -> AnyhowResult<PollOutcome> {
        let mut outcome = PollOutcome {
            exit_code: 1,
            state: None,
            polls: 0,
            counts: self.counts,
            report: TallyReport::default(),
            tables: Vec::new(),
            last_output: None,
        };

        while !self.runner.retries_exhausted() {
            let Some(result) = self.runner.run(command).await? else {
                warn!(command, "retries did not yield any result");
                break;
            };
            outcome.polls += 1;

            let tables = parse_tables(&result.stdout);
            if tables.len() > 1 {
                debug!(count = tables.len(), "only the first table is tallied");
            }
            if let Some(first) = tables.first() {
                outcome.report = tally(first, &mut self.registry);
            }
            outcome.tables = tables;
            outcome.last_output = Some(result);

            let (id_matches, status_matches) = self.match_counts();
            let state = PollState::classify(id_matches, status_matches);
            debug!(id_matches, status_matches, ?state, poll = outcome.polls);
            outcome.state = Some(state);

            if let Some(exit_code) = self.record(state) {
                outcome.exit_code = exit_code;
                break;
            }

            self.runner.charge_retry();
            self.runner.pause().await;
        }

        outcome.counts = self.counts;
        if let Some(last) = &outcome.last_output {
            info!("{}", last.stdout);
        }
        Ok(outcome)
    }
}
