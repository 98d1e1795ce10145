use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result as AnyhowResult};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::PollConfig;

/// Exit code and captured streams of one finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<std::process::Output> for CommandResult {
    fn from(output: std::process::Output) -> Self {
        Self {
            // Killed by a signal: no code to report.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Completed(CommandResult),
    TimedOut,
}

#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` once. An `Err` means the process could not be started at all.
    async fn execute(&self, command: &str) -> AnyhowResult<ExecOutcome>;
}

/// Production executor: `sh -c <command>` with a pinned terminal width.
pub struct ShellExecutor {
    cwd: PathBuf,
    term_cols: u16,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(cwd: impl Into<PathBuf>, term_cols: u16, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            term_cols,
            timeout,
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(
            config.cwd.clone(),
            config.max_term_cols,
            config.cmd_exec_timeout,
        )
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> AnyhowResult<ExecOutcome> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            // Rich-style renderers size their tables from COLUMNS; a fixed
            // width keeps rows on one line whatever terminal we run under.
            .env("COLUMNS", self.term_cols.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a timeout reaches everything the shell started.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("subprocess failed to execute: {command}"))?;
        let pid = child.id();

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                let output = result
                    .with_context(|| format!("failed to collect output of: {command}"))?;
                Ok(ExecOutcome::Completed(output.into()))
            }
            // Dropping the output future kills the shell; the group kill
            // takes its background jobs and pipelines with it.
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                Ok(ExecOutcome::TimedOut)
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Attempt budgets shared by every invocation of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_total_retry_cnt: u32,
    pub max_cmd_errs_cnt: u32,
    pub max_exceed_time_cnt: u32,
    pub poll_interval: Duration,
}

/// Session-lifetime attempt counters. Never reset between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub total_retry_cnt: u32,
    pub cmd_errs_cnt: u32,
    pub exceed_time_cnt: u32,
}

/// Runs a command until it exits 0 or a budget runs out.
pub struct CommandRunner<E> {
    executor: E,
    policy: RetryPolicy,
    counters: RetryCounters,
}

impl<E: CommandExecutor> CommandRunner<E> {
    pub fn new(executor: E, policy: RetryPolicy) -> Self {
        Self {
            executor,
            policy,
            counters: RetryCounters::default(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn counters(&self) -> RetryCounters {
        self.counters
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// True once the shared attempt ceiling is reached; nothing runs after that.
    pub fn retries_exhausted(&self) -> bool {
        self.counters.total_retry_cnt >= self.policy.max_total_retry_cnt
    }

    /// Spend one unit of the shared ceiling without running anything.
    pub fn charge_retry(&mut self) {
        self.counters.total_retry_cnt += 1;
    }

    pub async fn pause(&self) {
        tokio::time::sleep(self.policy.poll_interval).await;
    }

    /// Run `command`, retrying non-zero exits and timeouts.
    ///
    /// Returns the first successful result. Otherwise returns the last
    /// completed (failed) result, or `None` when every attempt timed out or
    /// no attempt was allowed.
    pub async fn run(&mut self, command: &str) -> AnyhowResult<Option<CommandResult>> {
        let mut last = None;

        while !self.retries_exhausted() {
            self.counters.total_retry_cnt += 1;
            let total_retry_cnt = self.counters.total_retry_cnt;
            let max_total = self.policy.max_total_retry_cnt;

            match self.executor.execute(command).await? {
                ExecOutcome::Completed(result) if result.success() => {
                    debug!(command, total_retry_cnt, "command succeeded");
                    return Ok(Some(result));
                }
                ExecOutcome::Completed(result) => {
                    self.counters.cmd_errs_cnt += 1;
                    info!(
                        "{command}: total_retry_cnt {total_retry_cnt}/{max_total}: cmd_errs_cnt {}/{} exited with {}",
                        self.counters.cmd_errs_cnt, self.policy.max_cmd_errs_cnt, result.exit_code
                    );
                    info!("{}", result.stderr);
                    info!("{}", result.stdout);
                    last = Some(result);
                    if self.counters.cmd_errs_cnt >= self.policy.max_cmd_errs_cnt {
                        warn!(command, "giving up after repeated command errors");
                        break;
                    }
                }
                ExecOutcome::TimedOut => {
                    self.counters.exceed_time_cnt += 1;
                    info!(
                        "{command}: total_retry_cnt {total_retry_cnt}/{max_total}: exceed_time_cnt {}/{} exceeded timeout",
                        self.counters.exceed_time_cnt, self.policy.max_exceed_time_cnt
                    );
                    if self.counters.exceed_time_cnt >= self.policy.max_exceed_time_cnt {
                        warn!(command, "giving up after repeated timeouts");
                        break;
                    }
                }
            }

            self.pause().await;
        }

        Ok(last)
    }
}
