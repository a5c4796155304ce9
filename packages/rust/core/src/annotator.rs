//! End-to-end annotation: success ledger → robots.txt decision per row → widened ledger.
//!
//! Every input row produces exactly one output row, in input order, carrying one
//! extra field at the configured insertion index. Undecodable artifacts are
//! recorded as diagnostics and never stop the run; every other failure does.

use std::path::Path;
use std::str::Utf8Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use robotscheck_robots::{Artifact, ArtifactStore, RobotsMatcher};
use robotscheck_shared::{AnnotateConfig, Decision, LedgerLayout, Result, RobotsCheckError};

use crate::ledger::{LedgerReader, LedgerRow, LedgerWriter};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A row whose robots.txt artifact exists but is not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("robots.txt with id {id} is not UTF-8 encoded: {error}")]
pub struct DecodeFailure {
    /// Row identifier.
    pub id: String,
    /// Underlying decode error.
    pub error: Utf8Error,
}

/// Per-row result consumed by the annotation loop.
pub type RowOutcome = std::result::Result<Decision, DecodeFailure>;

/// Summary of a completed annotation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotateSummary {
    /// Data rows written (header excluded).
    pub rows: u64,
    /// Rows the policy permits.
    pub allowed: u64,
    /// Rows the policy forbids.
    pub disallowed: u64,
    /// Rows without an artifact.
    pub no_policy: u64,
    /// Rows whose artifact failed to decode.
    pub decode_errors: u64,
    /// One human-readable entry per decode failure, in row order.
    pub diagnostics: Vec<String>,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl AnnotateSummary {
    /// Number of decode failures reported in `diagnostics`.
    pub fn decode_error_count(&self) -> usize {
        self.diagnostics.len()
    }

    fn record(&mut self, decision: Decision) {
        self.rows += 1;
        match decision {
            Decision::Allowed(true) => self.allowed += 1,
            Decision::Allowed(false) => self.disallowed += 1,
            Decision::NoPolicy => self.no_policy += 1,
            Decision::DecodeError => self.decode_errors += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting annotation status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the ledgers are open.
    fn started(&self, input: &Path, output: &Path);
    /// Called after each data row is written.
    fn row_annotated(&self, id: &str, decision: Decision, current: u64);
    /// Called when the run completes or is cancelled.
    fn done(&self, summary: &AnnotateSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _input: &Path, _output: &Path) {}
    fn row_annotated(&self, _id: &str, _decision: Decision, _current: u64) {}
    fn done(&self, _summary: &AnnotateSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A data row with its lookup keys already extracted.
struct PendingRow {
    row: LedgerRow,
    id: String,
    url: String,
}

/// Annotate the ledger described by `config`.
///
/// 1. Open the input ledger (fatal if missing or empty), then the output ledger
/// 2. Write the header widened with the configured label
/// 3. For each batch of up to `concurrency` rows, decide every row, then write
///    the widened rows in input order
/// 4. Stop between batches if `cancel` fires
#[instrument(skip_all, fields(
    input = %config.input_path.display(),
    output = %config.output_path.display(),
    matcher = matcher.name(),
))]
pub async fn annotate(
    config: &AnnotateConfig,
    matcher: Arc<dyn RobotsMatcher>,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<AnnotateSummary> {
    config.validate()?;
    let start = Instant::now();

    let mut reader = LedgerReader::open(&config.input_path)?;
    let mut writer = LedgerWriter::open(&config.output_path, config.output_mode)?;
    let store = Arc::new(ArtifactStore::new(
        &config.robots_dir,
        &config.artifact_extension,
    ));
    let user_agents: Arc<[String]> = config.user_agents.clone().into();
    let layout = config.layout;

    info!("checking robots.txt of URLs from {}", reader.path().display());
    info!("saving to {}", writer.path().display());
    debug!(robots_dir = %store.dir().display(), "reading robots.txt artifacts");
    progress.started(reader.path(), writer.path());

    let header = reader
        .header()
        .clone()
        .widen(layout.insertion_index, config.header_label.as_str());
    writer.write_row(&header)?;

    let mut summary = AnnotateSummary::default();
    loop {
        if cancel.is_cancelled() {
            warn!(rows = summary.rows, "annotation cancelled");
            summary.cancelled = true;
            break;
        }

        let batch = read_batch(&mut reader, &layout, config.concurrency)?;
        if batch.is_empty() {
            break;
        }

        let outcomes = evaluate_batch(&batch, &store, &matcher, &user_agents).await?;

        for (pending, outcome) in batch.into_iter().zip(outcomes) {
            let decision = match outcome {
                Ok(decision) => decision,
                Err(failure) => {
                    warn!(id = %failure.id, error = %failure.error, "robots.txt is not UTF-8");
                    summary.diagnostics.push(failure.to_string());
                    Decision::DecodeError
                }
            };
            summary.record(decision);

            let label = decision.label(&config.labels);
            writer.write_row(&pending.row.widen(layout.insertion_index, label))?;
            progress.row_annotated(&pending.id, decision, summary.rows);
        }
    }

    writer.flush()?;
    summary.elapsed = start.elapsed();

    info!(
        rows = summary.rows,
        allowed = summary.allowed,
        disallowed = summary.disallowed,
        no_policy = summary.no_policy,
        decode_errors = summary.decode_errors,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "annotation complete"
    );
    progress.done(&summary);

    Ok(summary)
}

/// Decide a single row: look up its artifact and, if decodable, ask the matcher.
pub async fn decide(
    store: &ArtifactStore,
    matcher: &dyn RobotsMatcher,
    user_agents: &[String],
    id: &str,
    url: &str,
) -> Result<RowOutcome> {
    match store.load(id).await? {
        Artifact::Missing => Ok(Ok(Decision::NoPolicy)),
        Artifact::Undecodable(error) => Ok(Err(DecodeFailure {
            id: id.to_string(),
            error,
        })),
        Artifact::Text(robots_txt) => {
            let allowed = matcher
                .is_allowed(&robots_txt, user_agents, url)
                .map_err(|e| RobotsCheckError::matcher(id, e.message))?;
            debug!(id, url, allowed, "evaluated robots.txt");
            Ok(Ok(Decision::Allowed(allowed)))
        }
    }
}

/// Read up to `limit` data rows, extracting id and URL from each.
fn read_batch(
    reader: &mut LedgerReader,
    layout: &LedgerLayout,
    limit: usize,
) -> Result<Vec<PendingRow>> {
    let mut batch = Vec::with_capacity(limit);
    while batch.len() < limit {
        let Some((line, row)) = reader.next_row()? else {
            break;
        };
        let (Some(id), Some(url)) = (row.id(layout), row.url(layout)) else {
            let needed = layout.id_index.max(layout.url_index) + 1;
            return Err(RobotsCheckError::ledger(
                line,
                format!("row has {} fields, expected at least {needed}", row.len()),
            ));
        };
        let (id, url) = (id.to_string(), url.to_string());
        batch.push(PendingRow { row, id, url });
    }
    Ok(batch)
}

/// Decide every row of a batch. Results come back in batch order.
async fn evaluate_batch(
    batch: &[PendingRow],
    store: &Arc<ArtifactStore>,
    matcher: &Arc<dyn RobotsMatcher>,
    user_agents: &Arc<[String]>,
) -> Result<Vec<RowOutcome>> {
    if let [only] = batch {
        let outcome = decide(store, matcher.as_ref(), user_agents, &only.id, &only.url).await?;
        return Ok(vec![outcome]);
    }

    let handles: Vec<_> = batch
        .iter()
        .map(|pending| {
            let store = Arc::clone(store);
            let matcher = Arc::clone(matcher);
            let user_agents = Arc::clone(user_agents);
            let id = pending.id.clone();
            let url = pending.url.clone();
            tokio::spawn(async move {
                decide(&store, matcher.as_ref(), &user_agents, &id, &url).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| RobotsCheckError::Task(e.to_string()))??;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use robotscheck_robots::{MatchError, TextingRobotsMatcher};
    use robotscheck_shared::{AppConfig, OutputMode};

    use super::*;

    const HEADER: &str = "Id,Original URL,Request URL,End URL,Status";

    /// A run directory laid out the way the crawler leaves it.
    struct RunDir {
        root: PathBuf,
    }

    impl RunDir {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!("rc-{name}-{}", uuid::Uuid::now_v7()));
            std::fs::create_dir_all(root.join("robots")).unwrap();
            Self { root }
        }

        fn ledger(&self, lines: &[&str]) {
            let mut content = lines.join("\n");
            content.push('\n');
            std::fs::write(self.root.join("success.csv"), content).unwrap();
        }

        fn artifact(&self, id: &str, bytes: &[u8]) {
            std::fs::write(self.root.join("robots").join(format!("{id}.rob")), bytes).unwrap();
        }

        fn config(&self) -> AnnotateConfig {
            let mut config = AnnotateConfig::for_run_dir(&AppConfig::default(), &self.root);
            config.user_agents = vec!["Bot".into()];
            config.output_mode = OutputMode::Truncate;
            config
        }

        fn output(&self) -> String {
            std::fs::read_to_string(self.root.join("success_robots.csv")).unwrap()
        }
    }

    impl Drop for RunDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    async fn run(config: &AnnotateConfig) -> Result<AnnotateSummary> {
        annotate(
            config,
            Arc::new(TextingRobotsMatcher),
            &SilentProgress,
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn annotates_reference_examples() {
        let dir = RunDir::new("annotate-examples");
        dir.ledger(&[
            HEADER,
            "42,ok,200,https://example.com/x,200",
            "7,ok,200,https://example.com/y,200",
            "99,ok,200,https://example.com/z,200",
        ]);
        dir.artifact("42", b"User-agent: *\nDisallow: /x");
        dir.artifact("99", &[0x55, 0x73, 0x65, 0xff, 0x0a]);

        let summary = run(&dir.config()).await.unwrap();

        assert_eq!(
            dir.output(),
            "Id,Original URL,Request URL,End URL,Status,Robots.txt OK\n\
             42,ok,200,https://example.com/x,200,False\n\
             7,ok,200,https://example.com/y,200,None\n\
             99,ok,200,https://example.com/z,200,Error\n"
        );
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.disallowed, 1);
        assert_eq!(summary.no_policy, 1);
        assert_eq!(summary.decode_errors, 1);
        assert_eq!(summary.decode_error_count(), 1);
        assert!(summary.diagnostics[0].contains("99"));
        assert!(summary.diagnostics[0].contains("not UTF-8"));
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn inserts_between_fields_and_keeps_the_rest() {
        let dir = RunDir::new("annotate-insert");
        dir.ledger(&[
            "Id,Original URL,Request URL,End URL,Status,Redirects",
            "5,a,b,https://example.com/open,200,0",
        ]);
        dir.artifact("5", b"User-agent: *\nDisallow: /x");

        let summary = run(&dir.config()).await.unwrap();

        assert_eq!(
            dir.output(),
            "Id,Original URL,Request URL,End URL,Status,Robots.txt OK,Redirects\n\
             5,a,b,https://example.com/open,200,True,0\n"
        );
        assert_eq!(summary.allowed, 1);
    }

    #[tokio::test]
    async fn custom_labels_and_layout() {
        let dir = RunDir::new("annotate-labels");
        dir.ledger(&["Id,End URL", "1,https://example.com/a", "2,https://example.com/b"]);
        dir.artifact("2", &[0xc3, 0x28]);

        let mut config = dir.config();
        config.layout.url_index = 1;
        config.layout.insertion_index = 1;
        config.labels.decode_error = "N/A".into();
        config.labels.no_policy = "-".into();
        config.header_label = "Robots".into();

        run(&config).await.unwrap();

        assert_eq!(
            dir.output(),
            "Id,Robots,End URL\n1,-,https://example.com/a\n2,N/A,https://example.com/b\n"
        );
    }

    #[tokio::test]
    async fn concurrent_run_preserves_input_order() {
        let dir = RunDir::new("annotate-concurrent");
        let mut lines = vec![HEADER.to_string()];
        for id in 0..23 {
            let path = if id % 3 == 0 { "private" } else { "public" };
            lines.push(format!("{id},o,r,https://example.com/{path}/{id},200"));
            match id % 4 {
                0 => dir.artifact(&id.to_string(), b"User-agent: *\nDisallow: /private/"),
                1 => dir.artifact(&id.to_string(), &[0xff]),
                2 => dir.artifact(&id.to_string(), b"User-agent: Bot\nDisallow: /"),
                _ => {}
            }
        }
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        dir.ledger(&refs);

        let sequential = run(&dir.config()).await.unwrap();
        let expected = dir.output();

        let mut config = dir.config();
        config.concurrency = 4;
        let concurrent = run(&config).await.unwrap();

        assert_eq!(dir.output(), expected);
        assert_eq!(concurrent.rows, 23);
        assert_eq!(concurrent.diagnostics, sequential.diagnostics);
        assert_eq!(concurrent.allowed, sequential.allowed);
        assert_eq!(concurrent.no_policy, sequential.no_policy);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let dir = RunDir::new("annotate-idempotent");
        dir.ledger(&[
            HEADER,
            "1,o,r,https://example.com/x,200",
            "2,o,r,https://example.com/y,200",
        ]);
        dir.artifact("1", b"User-agent: *\nDisallow: /x");

        run(&dir.config()).await.unwrap();
        let first = dir.output();
        run(&dir.config()).await.unwrap();
        assert_eq!(dir.output(), first);
    }

    #[tokio::test]
    async fn append_mode_accumulates() {
        let dir = RunDir::new("annotate-append");
        dir.ledger(&[HEADER, "1,o,r,https://example.com/x,200"]);

        let mut config = dir.config();
        config.output_mode = OutputMode::Append;
        run(&config).await.unwrap();
        let once = dir.output();
        run(&config).await.unwrap();

        assert_eq!(dir.output(), format!("{once}{once}"));
    }

    #[tokio::test]
    async fn header_only_ledger_writes_header() {
        let dir = RunDir::new("annotate-header-only");
        dir.ledger(&[HEADER]);

        let summary = run(&dir.config()).await.unwrap();

        assert_eq!(summary.rows, 0);
        assert_eq!(
            dir.output(),
            "Id,Original URL,Request URL,End URL,Status,Robots.txt OK\n"
        );
    }

    #[tokio::test]
    async fn short_row_is_fatal() {
        let dir = RunDir::new("annotate-short");
        dir.ledger(&[HEADER, "1,o,r,https://example.com/x,200", "2,o"]);

        let err = run(&dir.config()).await.unwrap_err();
        match err {
            RobotsCheckError::Ledger { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("2 fields"));
            }
            other => panic!("expected ledger error, got {other}"),
        }
    }

    #[tokio::test]
    async fn missing_input_writes_nothing() {
        let dir = RunDir::new("annotate-missing-input");
        let config = dir.config();

        let err = run(&config).await.unwrap_err();

        assert!(matches!(err, RobotsCheckError::Io { .. }));
        assert!(!config.output_path.exists());
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_rows() {
        let dir = RunDir::new("annotate-cancel");
        dir.ledger(&[HEADER, "1,o,r,https://example.com/x,200"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = annotate(
            &dir.config(),
            Arc::new(TextingRobotsMatcher),
            &SilentProgress,
            &cancel,
        )
        .await
        .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.rows, 0);
        assert_eq!(
            dir.output(),
            "Id,Original URL,Request URL,End URL,Status,Robots.txt OK\n"
        );
    }

    /// Records what the pipeline asks and allows only URLs ending in `/ok`.
    #[derive(Default)]
    struct RecordingMatcher {
        calls: Mutex<Vec<(String, Vec<String>, String)>>,
    }

    impl RobotsMatcher for RecordingMatcher {
        fn is_allowed(
            &self,
            robots_txt: &str,
            user_agents: &[String],
            url: &str,
        ) -> std::result::Result<bool, MatchError> {
            self.calls.lock().unwrap().push((
                robots_txt.to_string(),
                user_agents.to_vec(),
                url.to_string(),
            ));
            Ok(url.ends_with("/ok"))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn matcher_receives_policy_tokens_and_end_url() {
        let dir = RunDir::new("annotate-matcher");
        dir.ledger(&[
            HEADER,
            "1,o,r,https://example.com/ok,200",
            "2,o,r,https://example.com/no,200",
            "3,o,r,https://example.com/ok,200",
        ]);
        dir.artifact("1", b"policy-1");
        dir.artifact("2", b"policy-2");

        let mut config = dir.config();
        config.user_agents = vec!["FirstBot".into(), "SecondBot".into()];
        let matcher = Arc::new(RecordingMatcher::default());

        let summary = annotate(
            &config,
            matcher.clone(),
            &SilentProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let calls = matcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "policy-1");
        assert_eq!(calls[0].1, vec!["FirstBot".to_string(), "SecondBot".to_string()]);
        assert_eq!(calls[0].2, "https://example.com/ok");
        assert_eq!(calls[1].2, "https://example.com/no");
        assert_eq!(summary.allowed, 1);
        assert_eq!(summary.disallowed, 1);
        assert_eq!(summary.no_policy, 1);
    }

    /// Fails every evaluation.
    struct BrokenMatcher;

    impl RobotsMatcher for BrokenMatcher {
        fn is_allowed(
            &self,
            _robots_txt: &str,
            _user_agents: &[String],
            _url: &str,
        ) -> std::result::Result<bool, MatchError> {
            Err(MatchError {
                message: "unparseable".into(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn matcher_failure_is_fatal_and_names_the_row() {
        let dir = RunDir::new("annotate-matcher-error");
        dir.ledger(&[HEADER, "8,o,r,https://example.com/x,200"]);
        dir.artifact("8", b"User-agent: *");

        let err = annotate(
            &dir.config(),
            Arc::new(BrokenMatcher),
            &SilentProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "matcher error for id 8: unparseable");
    }
}
