use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gridwait::config::{self, PollConfig};
use gridwait::objects::{watch, WatchKind, WatchRequest};
use gridwait::runner::{CommandRunner, ShellExecutor};
use gridwait::{summary, table};

#[derive(Parser)]
#[command(
    name = "gridwait",
    version,
    about = "Wait for grid.ai runs, sessions, datastores and clusters to settle"
)]
struct Cli {
    #[command(flatten)]
    poll: PollArgs,

    /// Output format [default: github for status commands, json for capture]
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// GitHub Actions step outputs
    Github,
    Json,
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Working directory for the status command [default: current directory]
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Seconds before a single invocation is killed
    #[arg(long, global = true, default_value_t = config::DEFAULT_CMD_EXEC_TIMEOUT.as_secs())]
    cmd_exec_timeout: u64,

    /// Terminal width forced through COLUMNS
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_TERM_COLS)]
    max_term_cols: u16,

    /// Seconds to sleep between attempts
    #[arg(long, global = true, default_value_t = config::DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval_sec: u64,

    /// Ceiling on attempts for the whole session
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_TOTAL_RETRY_CNT)]
    max_total_retry_cnt: u32,

    /// Non-zero exits tolerated per session
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_CMD_ERRS_CNT)]
    max_cmd_errs_cnt: u32,

    /// Timeouts tolerated per session
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_EXCEED_TIME_CNT)]
    max_exceed_time_cnt: u32,

    /// Polls without the id before giving up (0 = never)
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_NO_IDS_CNT)]
    max_no_ids_cnt: u32,

    /// Polls without any status match before giving up (0 = never)
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_NO_MATCH_CNT)]
    max_no_match_cnt: u32,

    /// Polls with partial status matches before giving up (0 = never)
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_SOME_MATCH_CNT)]
    max_some_match_cnt: u32,

    /// Full-match polls required for success (at least 1)
    #[arg(long, global = true, default_value_t = config::DEFAULT_MIN_ALL_MATCH_CNT)]
    min_all_match_cnt: u32,
}

impl PollArgs {
    fn into_config(self) -> Result<PollConfig> {
        let cwd = match self.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let config = PollConfig {
            cwd,
            cmd_exec_timeout: Duration::from_secs(self.cmd_exec_timeout),
            max_term_cols: self.max_term_cols,
            poll_interval: Duration::from_secs(self.poll_interval_sec),
            max_total_retry_cnt: self.max_total_retry_cnt,
            max_cmd_errs_cnt: self.max_cmd_errs_cnt,
            max_exceed_time_cnt: self.max_exceed_time_cnt,
            max_no_ids_cnt: self.max_no_ids_cnt,
            max_no_match_cnt: self.max_no_match_cnt,
            max_some_match_cnt: self.max_some_match_cnt,
            min_all_match_cnt: self.min_all_match_cnt,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wait for every experiment of a run to finish
    Run(WatchArgs),
    /// Wait for a session to settle
    Session(WatchArgs),
    /// Wait for a datastore to finish building
    Datastore(WatchArgs),
    /// Wait for a cluster to come up or fail
    Clusters(WatchArgs),
    /// Wait on any known object type with a caller-supplied listing command
    Search(SearchArgs),
    /// Run a command once and print its parsed output
    Capture(CaptureArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Object id
    id: String,

    /// Status regex that counts as settled
    #[arg(long)]
    status_expr: Option<String>,

    /// Use ID as the identifier regex verbatim
    #[arg(long)]
    id_is_expr: bool,

    /// Column holding the identifier
    #[arg(long)]
    id_col: Option<String>,

    /// Column holding the status
    #[arg(long)]
    status_col: Option<String>,

    /// Status command to poll instead of the grid default
    #[arg(long)]
    command: Option<String>,
}

impl WatchArgs {
    fn into_request(self, kind: WatchKind) -> WatchRequest {
        let mut request = WatchRequest::new(kind, &self.id);
        if self.id_is_expr {
            request.id_expr = self.id;
        }
        if let Some(expr) = self.status_expr {
            request.status_expr = expr;
        }
        if let Some(col) = self.id_col {
            request.id_column = col;
        }
        if let Some(col) = self.status_col {
            request.status_column = col;
        }
        if let Some(command) = self.command {
            request.command = command;
        }
        request
    }
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Object type whose column layout to use (run, session, datastore, clusters, history)
    object_type: String,

    /// Object id, matched literally
    id: String,

    /// Listing command to poll
    #[arg(long)]
    command: String,

    /// Column holding the identifier
    #[arg(long)]
    id_col: String,

    /// Column holding the status
    #[arg(long, default_value = "status")]
    status_col: String,

    /// Status regex that counts as settled
    #[arg(long)]
    status_expr: String,
}

impl SearchArgs {
    fn into_request(self) -> Result<WatchRequest> {
        Ok(WatchRequest::search(
            &self.object_type,
            &self.id,
            &self.command,
            &self.id_col,
            &self.status_col,
            &self.status_expr,
        )?)
    }
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Shell command to run
    cmd: String,

    /// Parse `label: value` lines
    #[arg(long)]
    kv: bool,

    /// Separator for --kv
    #[arg(long, default_value_t = table::KV_DELIMITER)]
    delimiter: char,

    /// Parse box-drawn tables
    #[arg(long)]
    tables: bool,

    /// Stop after this many rows of a table
    #[arg(long)]
    head: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries the step outputs.
fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.poll.into_config()?;
    let executor = ShellExecutor::from_config(&config);

    match cli.command {
        Commands::Run(args) => {
            cmd_watch(args.into_request(WatchKind::Run), &config, executor, cli.format).await
        }
        Commands::Session(args) => {
            cmd_watch(args.into_request(WatchKind::Session), &config, executor, cli.format).await
        }
        Commands::Datastore(args) => {
            cmd_watch(args.into_request(WatchKind::Datastore), &config, executor, cli.format).await
        }
        Commands::Clusters(args) => {
            cmd_watch(args.into_request(WatchKind::Clusters), &config, executor, cli.format).await
        }
        Commands::Search(args) => {
            cmd_watch(args.into_request()?, &config, executor, cli.format).await
        }
        Commands::Capture(args) => cmd_capture(args, &config, executor, cli.format).await,
    }
}

async fn cmd_watch(
    request: WatchRequest,
    config: &PollConfig,
    executor: ShellExecutor,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let (summary, outcome) = watch(&request, config, executor).await?;

    match format.unwrap_or(OutputFormat::Github) {
        OutputFormat::Github => summary::emit_github(&summary.output_pairs()?)?,
        OutputFormat::Json => println!("{}", summary::poll_json(&outcome)?),
    }
    Ok(exit_code(summary.exit_code))
}

async fn cmd_capture(
    args: CaptureArgs,
    config: &PollConfig,
    executor: ShellExecutor,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let mut runner = CommandRunner::new(executor, config.retry_policy());
    let Some(result) = runner.run(&args.cmd).await? else {
        tracing::warn!(command = %args.cmd, "no result from command");
        return Ok(ExitCode::FAILURE);
    };

    let records = if args.kv {
        table::parse_key_values(&result.stdout, args.delimiter)
    } else {
        Vec::new()
    };
    let tables = if args.tables {
        table::parse_tables_with(&result.stdout, table::TABLE_DELIMITERS, args.head)
    } else {
        Vec::new()
    };

    if !args.kv && !args.tables {
        print!("{}", summary::raw_output(&result));
    } else {
        match format.unwrap_or(OutputFormat::Json) {
            OutputFormat::Github => summary::emit_github(&summary::record_pairs(&records))?,
            OutputFormat::Json => println!("{}", summary::capture_json(&records, &tables)?),
        }
    }
    Ok(exit_code(result.exit_code))
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    // ── CLI parsing tests ────────────────────────────────────────────

    #[test]
    fn test_cli_parsing_session_defaults() {
        let cli = Cli::parse_from(["gridwait", "session", "abc123"]);
        assert_eq!(cli.poll.poll_interval_sec, 60);
        assert_eq!(cli.poll.max_no_ids_cnt, 3);
        assert!(cli.format.is_none());
        match cli.command {
            Commands::Session(args) => {
                let request = args.into_request(WatchKind::Session);
                assert_eq!(request.command, "grid session");
                assert_eq!(request.id_expr, "^abc123$");
                assert_eq!(request.status_expr, "running|failed|stopped|paused");
            }
            other => panic!("expected Session, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parsing_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "gridwait",
            "run",
            "r1",
            "--poll-interval-sec",
            "5",
            "--min-all-match-cnt",
            "2",
            "--format",
            "json",
        ]);
        assert_eq!(cli.poll.poll_interval_sec, 5);
        assert_eq!(cli.poll.min_all_match_cnt, 2);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parsing_watch_overrides() {
        let cli = Cli::parse_from([
            "gridwait",
            "clusters",
            "^c-[0-9]+$",
            "--id-is-expr",
            "--status-expr",
            "running",
            "--id-col",
            "name",
            "--command",
            "grid clusters --global",
        ]);
        match cli.command {
            Commands::Clusters(args) => {
                let request = args.into_request(WatchKind::Clusters);
                assert_eq!(request.id_expr, "^c-[0-9]+$");
                assert_eq!(request.status_expr, "running");
                assert_eq!(request.id_column, "name");
                assert_eq!(request.command, "grid clusters --global");
            }
            other => panic!("expected Clusters, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parsing_capture() {
        let cli = Cli::parse_from(["gridwait", "capture", "grid user", "--kv", "--head", "3"]);
        match cli.command {
            Commands::Capture(args) => {
                assert_eq!(args.cmd, "grid user");
                assert!(args.kv);
                assert!(!args.tables);
                assert_eq!(args.delimiter, ':');
                assert_eq!(args.head, Some(3));
            }
            other => panic!("expected Capture, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parsing_search() {
        let cli = Cli::parse_from([
            "gridwait",
            "search",
            "datastores",
            "imagenet",
            "--command",
            "grid datastore --global",
            "--id-col",
            "name",
            "--status-expr",
            "Succeeded",
        ]);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.status_col, "status");
                let request = args.into_request().unwrap();
                assert_eq!(request.object_type, gridwait::schema::ObjectType::Datastore);
                assert_eq!(request.id_expr, "^imagenet$");
                assert_eq!(request.command, "grid datastore --global");
            }
            other => panic!("expected Search, got {other:?}"),
        }
    }

    #[test]
    fn test_into_config_rejects_zero_min_all_match() {
        let cli = Cli::parse_from(["gridwait", "session", "x", "--min-all-match-cnt", "0"]);
        assert!(cli.poll.into_config().is_err());
    }

    #[test]
    fn test_into_config_uses_current_dir() {
        let cli = Cli::parse_from(["gridwait", "session", "x"]);
        let config = cli.poll.into_config().unwrap();
        assert_eq!(config.cwd, std::env::current_dir().unwrap());
        assert_eq!(config.cmd_exec_timeout, Duration::from_secs(120));
    }
}
