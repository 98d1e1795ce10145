//! Entry points for each kind of grid object we can wait on.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use tracing::info;

use crate::config::PollConfig;
use crate::matcher::MatcherRegistry;
use crate::poller::{ConvergencePoller, PollOutcome};
use crate::runner::{CommandExecutor, CommandRunner};
use crate::schema::ObjectType;
use crate::summary::SessionSummary;

/// Objects with a status entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Run,
    Session,
    Datastore,
    Clusters,
}

impl WatchKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            WatchKind::Run => ObjectType::Run,
            WatchKind::Session => ObjectType::Session,
            WatchKind::Datastore => ObjectType::Datastore,
            WatchKind::Clusters => ObjectType::Clusters,
        }
    }

    /// Listing command that reports `object_id`.
    pub fn command(&self, object_id: &str) -> String {
        match self {
            WatchKind::Run => format!("grid status {object_id}"),
            WatchKind::Session => "grid session".to_string(),
            WatchKind::Datastore => "grid datastore".to_string(),
            WatchKind::Clusters => "grid clusters".to_string(),
        }
    }

    /// Statuses that count as "settled" unless overridden.
    pub fn default_status_expr(&self) -> &'static str {
        match self {
            WatchKind::Run => "succeeded|cancelled|failed|stopped",
            WatchKind::Session => "running|failed|stopped|paused",
            WatchKind::Datastore => "Succeeded",
            WatchKind::Clusters => "running|failed",
        }
    }

    pub fn default_id_column(&self) -> &'static str {
        match self {
            WatchKind::Run => "run",
            WatchKind::Session => "session",
            WatchKind::Datastore => "name",
            WatchKind::Clusters => "id",
        }
    }

    pub fn default_status_column(&self) -> &'static str {
        "status"
    }

    /// Anchored identifier expression for a literal id. A run is listed by
    /// its experiments, `<run>-exp<N>`.
    pub fn id_expr(&self, object_id: &str) -> String {
        let id = regex::escape(object_id);
        match self {
            WatchKind::Run => format!("^{id}-exp[0-9]+$"),
            _ => format!("^{id}$"),
        }
    }
}

impl fmt::Display for WatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.object_type())
    }
}

/// A fully resolved request to wait on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub object_type: ObjectType,
    pub object_id: String,
    pub command: String,
    pub id_column: String,
    pub status_column: String,
    pub id_expr: String,
    pub status_expr: String,
}

impl WatchRequest {
    /// Request with every default for `kind`.
    pub fn new(kind: WatchKind, object_id: &str) -> Self {
        Self {
            object_type: kind.object_type(),
            object_id: object_id.to_string(),
            command: kind.command(object_id),
            id_column: kind.default_id_column().to_string(),
            status_column: kind.default_status_column().to_string(),
            id_expr: kind.id_expr(object_id),
            status_expr: kind.default_status_expr().to_string(),
        }
    }

    /// Request against any schema-known object type, with the listing
    /// command and columns supplied by the caller. `object_type` accepts the
    /// same names as [`ObjectType::from_str`].
    pub fn search(
        object_type: &str,
        object_id: &str,
        command: &str,
        id_column: &str,
        status_column: &str,
        status_expr: &str,
    ) -> crate::error::Result<Self> {
        let object_type = ObjectType::from_str(object_type)?;
        Ok(Self {
            object_type,
            object_id: object_id.to_string(),
            command: command.to_string(),
            id_column: id_column.to_string(),
            status_column: status_column.to_string(),
            id_expr: format!("^{}$", regex::escape(object_id)),
            status_expr: status_expr.to_string(),
        })
    }

    pub fn registry(&self) -> crate::error::Result<MatcherRegistry> {
        MatcherRegistry::for_status(
            self.object_type,
            &self.id_column,
            &self.status_column,
            self.id_expr.as_str(),
            self.status_expr.as_str(),
        )
    }
}

/// Poll until `request` converges and summarise the verdict.
pub async fn watch<E: CommandExecutor>(
    request: &WatchRequest,
    config: &PollConfig,
    executor: E,
) -> Result<(SessionSummary, PollOutcome)> {
    config.validate()?;
    let registry = request.registry()?;
    let runner = CommandRunner::new(executor, config.retry_policy());
    let mut poller = ConvergencePoller::new(runner, registry, config.thresholds())?;

    info!(
        object_type = %request.object_type,
        object_id = %request.object_id,
        command = %request.command,
        "waiting for status"
    );
    let outcome = poller.converge(&request.command).await?;
    let summary = SessionSummary::from_outcome(request.object_type, &request.object_id, &outcome);
    Ok((summary, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::test_support::{completed, session_listing, ScriptedExecutor};
    use std::time::Duration;

    fn fast_config() -> PollConfig {
        PollConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_per_kind() {
        let run = WatchRequest::new(WatchKind::Run, "r1");
        assert_eq!(run.command, "grid status r1");
        assert_eq!(run.id_expr, "^r1-exp[0-9]+$");
        assert_eq!(run.id_column, "run");
        assert_eq!(run.status_expr, "succeeded|cancelled|failed|stopped");

        let session = WatchRequest::new(WatchKind::Session, "abc");
        assert_eq!(session.command, "grid session");
        assert_eq!(session.id_expr, "^abc$");

        let datastore = WatchRequest::new(WatchKind::Datastore, "ds");
        assert_eq!(datastore.command, "grid datastore");
        assert_eq!(datastore.id_column, "name");
        assert_eq!(datastore.status_expr, "Succeeded");

        let clusters = WatchRequest::new(WatchKind::Clusters, "c1");
        assert_eq!(clusters.command, "grid clusters");
        assert_eq!(clusters.id_column, "id");
        assert_eq!(clusters.status_expr, "running|failed");
    }

    #[test]
    fn literal_ids_are_escaped() {
        assert_eq!(WatchKind::Session.id_expr("a.b"), r"^a\.b$");
    }

    #[test]
    fn every_kind_builds_a_registry() {
        for kind in [
            WatchKind::Run,
            WatchKind::Session,
            WatchKind::Datastore,
            WatchKind::Clusters,
        ] {
            let registry = WatchRequest::new(kind, "x").registry().unwrap();
            assert_eq!(registry.len(), 2, "{kind}");
        }
    }

    #[test]
    fn run_id_matches_experiment_rows() {
        let registry = WatchRequest::new(WatchKind::Run, "my-run").registry().unwrap();
        let id = registry.identifier().unwrap();
        assert!(id.is_match("my-run-exp0"));
        assert!(id.is_match("my-run-exp12"));
        assert!(!id.is_match("my-run"));
    }

    #[test]
    fn bad_column_override_is_schema_error() {
        let mut request = WatchRequest::new(WatchKind::Clusters, "c1");
        request.id_column = "session".to_string();
        assert!(matches!(
            request.registry(),
            Err(GridError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn search_resolves_object_type_names() {
        let request = WatchRequest::search(
            "datastores",
            "imagenet",
            "grid datastore --global",
            "name",
            "status",
            "Succeeded|Failed",
        )
        .unwrap();
        assert_eq!(request.object_type, ObjectType::Datastore);
        assert_eq!(request.id_expr, "^imagenet$");
        assert_eq!(request.registry().unwrap().len(), 2);

        let history =
            WatchRequest::search("history", "r1", "grid history", "run", "failed", "0").unwrap();
        assert_eq!(history.object_type, ObjectType::History);
        assert!(history.registry().is_ok());
    }

    #[test]
    fn search_rejects_unknown_object_type() {
        let err = WatchRequest::search("volume", "v", "true", "id", "status", "ok").unwrap_err();
        assert!(matches!(err, GridError::UnknownObjectType(ref name) if name == "volume"));
    }

    #[tokio::test]
    async fn watch_session_reports_success() {
        let executor = ScriptedExecutor::new(vec![completed(&session_listing(&[
            ("abc123", "running"),
            ("def456", "paused"),
        ]))]);
        let request = WatchRequest::new(WatchKind::Session, "abc123");

        let (summary, outcome) = watch(&request, &fast_config(), executor).await.unwrap();

        assert!(outcome.succeeded());
        assert_eq!(summary.exit_code, 0);
        assert_eq!(summary.object_type, "session");
        assert_eq!(summary.object_id, "abc123");
        assert_eq!(summary.summary, "running");
        assert_eq!(summary.status, "running");
    }

    #[tokio::test]
    async fn overridden_command_is_what_gets_polled() {
        let executor = ScriptedExecutor::new(vec![completed(&session_listing(&[(
            "abc123", "running",
        )]))]);
        let mut request = WatchRequest::new(WatchKind::Session, "abc123");
        request.command = "grid session --global".to_string();

        let config = fast_config();
        let registry = request.registry().unwrap();
        let runner = CommandRunner::new(executor, config.retry_policy());
        let mut poller =
            ConvergencePoller::new(runner, registry, config.thresholds()).unwrap();
        poller.converge(&request.command).await.unwrap();

        assert_eq!(
            poller.runner().executor().commands(),
            vec!["grid session --global".to_string()]
        );
    }

    #[tokio::test]
    async fn watch_rejects_invalid_config_before_polling() {
        let executor = ScriptedExecutor::new(vec![]);
        let config = PollConfig {
            min_all_match_cnt: 0,
            ..fast_config()
        };
        let request = WatchRequest::new(WatchKind::Session, "abc123");

        let err = watch(&request, &config, executor).await.unwrap_err();

        assert!(err.to_string().contains("min_all_match_cnt"));
    }
}
