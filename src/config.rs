use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GridError, Result};
use crate::poller::Thresholds;
use crate::runner::RetryPolicy;

pub const DEFAULT_CMD_EXEC_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_TERM_COLS: u16 = 512;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_TOTAL_RETRY_CNT: u32 = 60;
pub const DEFAULT_MAX_CMD_ERRS_CNT: u32 = 2;
pub const DEFAULT_MAX_EXCEED_TIME_CNT: u32 = 2;
pub const DEFAULT_MAX_NO_IDS_CNT: u32 = 3;
pub const DEFAULT_MAX_NO_MATCH_CNT: u32 = 0;
pub const DEFAULT_MAX_SOME_MATCH_CNT: u32 = 3;
pub const DEFAULT_MIN_ALL_MATCH_CNT: u32 = 1;

/// Everything one polling session needs, fixed before the first attempt.
///
/// A `max_*` state threshold of 0 means "never give up on that state".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub cwd: PathBuf,
    pub cmd_exec_timeout: Duration,
    pub max_term_cols: u16,
    pub poll_interval: Duration,
    pub max_total_retry_cnt: u32,
    pub max_cmd_errs_cnt: u32,
    pub max_exceed_time_cnt: u32,
    pub max_no_ids_cnt: u32,
    pub max_no_match_cnt: u32,
    pub max_some_match_cnt: u32,
    pub min_all_match_cnt: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            cwd: PathBuf::from("."),
            cmd_exec_timeout: DEFAULT_CMD_EXEC_TIMEOUT,
            max_term_cols: DEFAULT_MAX_TERM_COLS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_total_retry_cnt: DEFAULT_MAX_TOTAL_RETRY_CNT,
            max_cmd_errs_cnt: DEFAULT_MAX_CMD_ERRS_CNT,
            max_exceed_time_cnt: DEFAULT_MAX_EXCEED_TIME_CNT,
            max_no_ids_cnt: DEFAULT_MAX_NO_IDS_CNT,
            max_no_match_cnt: DEFAULT_MAX_NO_MATCH_CNT,
            max_some_match_cnt: DEFAULT_MAX_SOME_MATCH_CNT,
            min_all_match_cnt: DEFAULT_MIN_ALL_MATCH_CNT,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        self.thresholds().validate()?;
        if self.cmd_exec_timeout.is_zero() {
            return Err(GridError::InvalidConfig(
                "cmd_exec_timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_term_cols == 0 {
            return Err(GridError::InvalidConfig(
                "max_term_cols must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_total_retry_cnt: self.max_total_retry_cnt,
            max_cmd_errs_cnt: self.max_cmd_errs_cnt,
            max_exceed_time_cnt: self.max_exceed_time_cnt,
            poll_interval: self.poll_interval,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            max_no_ids_cnt: self.max_no_ids_cnt,
            max_no_match_cnt: self.max_no_match_cnt,
            max_some_match_cnt: self.max_some_match_cnt,
            min_all_match_cnt: self.min_all_match_cnt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PollConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_min_all_match_is_rejected() {
        let config = PollConfig {
            min_all_match_cnt: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("min_all_match_cnt"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = PollConfig {
            cmd_exec_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GridError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_term_cols_is_rejected() {
        let config = PollConfig {
            max_term_cols: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_policy_carries_budgets() {
        let config = PollConfig {
            max_total_retry_cnt: 7,
            max_cmd_errs_cnt: 4,
            max_exceed_time_cnt: 5,
            poll_interval: Duration::from_secs(3),
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_total_retry_cnt, 7);
        assert_eq!(policy.max_cmd_errs_cnt, 4);
        assert_eq!(policy.max_exceed_time_cnt, 5);
        assert_eq!(policy.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn thresholds_carry_state_limits() {
        let thresholds = PollConfig::default().thresholds();
        assert_eq!(thresholds.max_no_ids_cnt, 3);
        assert_eq!(thresholds.max_no_match_cnt, 0);
        assert_eq!(thresholds.max_some_match_cnt, 3);
        assert_eq!(thresholds.min_all_match_cnt, 1);
    }
}
