//! Shared fixtures and test doubles for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::runner::{CommandExecutor, CommandResult, ExecOutcome};

/// `grid session` output as rendered at a fixed 512-column width.
pub(crate) const SESSION_LISTING: &str = "\
┏━━━━━━━━━┳━━━━━━━━━┳━━━━━━━━━━━━━━━┳━━━━━━━━━━┳━━━━━━━━━━━━━━━━━━━━━━━━━━┓
┃ Session ┃ Status  ┃ Instance Type ┃ Duration ┃ URL                      ┃
┡━━━━━━━━━╇━━━━━━━━━╇━━━━━━━━━━━━━━━╇━━━━━━━━━━╇━━━━━━━━━━━━━━━━━━━━━━━━━━┩
│ abc123  │ running │ g4dn.xlarge   │ 1h 02m   │ https://grid.ai/s/abc123 │
│ def456  │ paused  │ t2.medium     │ 0h 10m   │ https://grid.ai/s/def456 │
└─────────┴─────────┴───────────────┴──────────┴──────────────────────────┘
";

/// Render a session listing with one body row per `(id, status)` pair.
pub(crate) fn session_listing(rows: &[(&str, &str)]) -> String {
    let mut out = String::from("┃ Session ┃ Status ┃ Instance Type ┃ Duration ┃ URL ┃\n");
    out.push_str("┡━━━━━━━━━╇━━━━━━━━╇━━━━━━━━━━━━━━━╇━━━━━━━━━━╇━━━━━┩\n");
    for (id, status) in rows {
        out.push_str(&format!(
            "│ {id} │ {status} │ g4dn.xlarge │ 0h 01m │ https://grid.ai/s/{id} │\n"
        ));
    }
    out.push_str("└─────────┴────────┴───────────────┴──────────┴─────┘\n");
    out
}

pub(crate) fn completed(stdout: &str) -> ExecOutcome {
    ExecOutcome::Completed(CommandResult {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub(crate) fn failed(exit_code: i32, stderr: &str) -> ExecOutcome {
    ExecOutcome::Completed(CommandResult {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// Executor that replays a fixed script of outcomes and records commands.
pub(crate) struct ScriptedExecutor {
    script: Mutex<VecDeque<ExecOutcome>>,
    fallback: Option<ExecOutcome>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub(crate) fn new(outcomes: Vec<ExecOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Returns `outcome` on every call.
    pub(crate) fn repeating(outcome: ExecOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(outcome),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.commands.lock().expect("commands lock poisoned").len()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &str) -> Result<ExecOutcome> {
        self.commands
            .lock()
            .expect("commands lock poisoned")
            .push(command.to_string());
        let next = self.script.lock().expect("script lock poisoned").pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(outcome) => Ok(outcome),
            None => bail!("script exhausted after {} calls", self.calls()),
        }
    }
}
