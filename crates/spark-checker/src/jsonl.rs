//! JSON-lines collaborators for the dispute queue
//!
//! Disputes come in as one `{"id", "cid", "minerId", "raiser"?}` object per
//! line and results go out the same way, so the checker can sit in a shell
//! pipeline in place of the on-chain event source and reporter.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use spark_disputes::{DisputeQueueHandle, DisputeReporter, PendingDisputes};
use spark_error::ReportError;
use spark_types::{DisputeOutcome, RetrievalTask, Stats};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

//-----------------------------------------------------------------------------
// Event source
//-----------------------------------------------------------------------------

/// Parse one input line. Blank lines yield `None`.
pub fn parse_dispute(line: &str) -> Result<Option<RetrievalTask>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let task = serde_json::from_str(line).context("Invalid dispute")?;
    Ok(Some(task))
}

/// Enqueue every dispute read from `reader` until EOF. Malformed lines are
/// logged and skipped. Returns the number of disputes queued.
pub async fn feed_disputes<R>(reader: R, queue: &DisputeQueueHandle) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut queued = 0;
    while let Some(line) = lines.next_line().await.context("Cannot read disputes")? {
        match parse_dispute(&line) {
            Ok(Some(task)) => {
                debug!(dispute_id = %task.id, "Received new dispute event");
                queue.enqueue(task)?;
                queued += 1;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %format!("{:#}", err), line = %line, "Skipping malformed dispute"),
        }
    }
    Ok(queued)
}

/// Pending disputes kept as a JSON array in a file, re-read on every poll
pub struct FileDisputes {
    path: PathBuf,
}

impl FileDisputes {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PendingDisputes for FileDisputes {
    async fn pending_disputes(&self) -> Result<Vec<RetrievalTask>> {
        let source = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Cannot read pending disputes from {}", self.path.display()))?;
        serde_json::from_str(&source)
            .with_context(|| format!("Invalid pending disputes in {}", self.path.display()))
    }
}

//-----------------------------------------------------------------------------
// Reporter
//-----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisputeResult<'a> {
    dispute_id: &'a str,
    outcome: DisputeOutcome,
    stats: &'a Stats,
}

/// Writes one result object per line
pub struct JsonLinesReporter<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLinesReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, result: &DisputeResult<'_>) -> std::io::Result<()> {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        serde_json::to_writer(&mut *out, result)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

#[async_trait]
impl<W: Write + Send + 'static> DisputeReporter for JsonLinesReporter<W> {
    async fn submit_result(&self, task: &RetrievalTask, stats: &Stats) -> Result<(), ReportError> {
        let result = DisputeResult {
            dispute_id: &task.id,
            outcome: DisputeOutcome::from(stats),
            stats,
        };
        self.write_line(&result)
            .map_err(|err| ReportError::new(&task.id, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_parse_dispute() {
        let task = parse_dispute(r#"{"id":"42","cid":"bafk","minerId":"f01234","raiser":"0xabc"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(task, RetrievalTask::new("42", "bafk", "f01234").with_raiser("0xabc"));

        assert_eq!(parse_dispute("   ").unwrap(), None);
        assert!(parse_dispute(r#"{"id":"42"}"#).is_err());
    }

    #[tokio::test]
    async fn test_reporter_writes_one_line_per_result() {
        let reporter = JsonLinesReporter::new(Vec::new());

        let mut ok = Stats::new();
        ok.status_code = Some(200);
        let mut failed = Stats::new();
        failed.status_code = Some(902);

        reporter
            .submit_result(&RetrievalTask::new("1", "bafk1", "f01"), &ok)
            .await
            .unwrap();
        reporter
            .submit_result(&RetrievalTask::new("2", "bafk2", "f02"), &failed)
            .await
            .unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["disputeId"], "1");
        assert_eq!(lines[0]["outcome"], "resolved");
        assert_eq!(lines[0]["stats"]["statusCode"], 200);
        assert_eq!(lines[1]["outcome"], "failed");
    }
}
