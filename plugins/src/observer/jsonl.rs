use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cadence_core::api::{EventsOutConfig, ExecutionEvent, ExecutionObserver};

/// Path value that selects stdout instead of a file
pub const STDOUT_TARGET: &str = "stdout:";

type LineWriter = Box<dyn AsyncWrite + Unpin + Send>;

enum LineTx {
    Bounded(mpsc::Sender<String>),
    Unbounded(mpsc::UnboundedSender<String>),
}

impl LineTx {
    /// False when the line was not queued (buffer full or writer gone).
    fn send(&self, line: String) -> bool {
        match self {
            Self::Bounded(tx) => tx.try_send(line).is_ok(),
            Self::Unbounded(tx) => tx.send(line).is_ok(),
        }
    }
}

enum LineRx {
    Bounded(mpsc::Receiver<String>),
    Unbounded(mpsc::UnboundedReceiver<String>),
}

impl LineRx {
    async fn recv(&mut self) -> Option<String> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<String> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// Writes one JSON object per event:
/// `{"v":1,"event_type":...,"ts":...,"plan_id":...,"task_id":...,"metadata":{...}}`.
/// `task_id` is omitted for plan-level events.
///
/// `on_event` only renders the line and queues it; a spawned task owns the writer.
/// With `drop_when_full` the queue is bounded by `channel_capacity` and overflowing
/// lines are counted in [`dropped_count`](Self::dropped_count). Otherwise the queue is
/// unbounded. Constructors must run inside a Tokio runtime.
pub struct JsonlObserver {
    tx: Mutex<Option<LineTx>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicU64>,
}

impl JsonlObserver {
    pub fn stdout(cfg: &EventsOutConfig) -> Self {
        Self::from_writer(tokio::io::stdout(), cfg)
    }

    /// Append to `cfg.path` (created with its parent directories), or stdout for
    /// [`STDOUT_TARGET`].
    pub async fn open(cfg: &EventsOutConfig) -> Result<Self> {
        if cfg.path == STDOUT_TARGET {
            return Ok(Self::stdout(cfg));
        }
        let path = Path::new(&cfg.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        Ok(Self::from_writer(file, cfg))
    }

    pub fn from_writer<W>(writer: W, cfg: &EventsOutConfig) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = if cfg.drop_when_full {
            let (tx, rx) = mpsc::channel(cfg.channel_capacity.max(1));
            (LineTx::Bounded(tx), LineRx::Bounded(rx))
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            (LineTx::Unbounded(tx), LineRx::Unbounded(rx))
        };
        let handle = tokio::spawn(write_lines(Box::new(writer), rx));
        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(handle)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Lines that were not queued because the buffer was full or the writer stopped.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue and wait until every queued line has been written.
    /// Events arriving afterwards are ignored.
    pub async fn finish(&self) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(tx);
        let handle = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "events writer task failed");
            }
        }
        let dropped = self.dropped_count();
        if dropped > 0 {
            tracing::warn!(dropped, "event lines were dropped");
        }
    }

    fn event_to_json(&self, event: &ExecutionEvent) -> Value {
        let metadata = match event {
            ExecutionEvent::PlanStart {
                objective_id,
                total_tasks,
                ..
            } => json!({
                "objective_id": objective_id,
                "total_tasks": total_tasks,
            }),
            ExecutionEvent::PlanOrder { order, stages, .. } => json!({
                "order": order,
                "stages": stages,
            }),
            ExecutionEvent::TaskStart { attempt, .. } => json!({
                "attempt": attempt,
            }),
            ExecutionEvent::TaskRetry {
                attempt,
                delay_ms,
                error,
                ..
            } => json!({
                "attempt": attempt,
                "delay_ms": delay_ms,
                "error": error,
            }),
            ExecutionEvent::TaskComplete { result, .. } => json!({
                "status": result.status,
                "attempts": result.attempts,
                "duration_ms": result.duration_ms,
                "tokens_used": result.tokens_used,
                "confidence": result.confidence,
                "error": result.error,
            }),
            ExecutionEvent::PlanEnd { result, .. } => json!({
                "status": result.status,
                "successful_tasks": result.successful_tasks,
                "failed_tasks": result.failed_tasks,
                "total_tokens": result.total_tokens,
                "duration_ms": result.duration_ms,
                "quality_rating": result.feedback.quality_rating,
                "error": result.error,
            }),
            ExecutionEvent::Warning { message, .. } => json!({
                "message": message,
            }),
        };

        let mut line = Map::new();
        line.insert("v".into(), json!(1));
        line.insert("event_type".into(), json!(event.event_type()));
        line.insert("ts".into(), json!(Local::now().to_rfc3339()));
        line.insert("plan_id".into(), json!(event.plan_id()));
        if let Some(task_id) = event.task_id() {
            line.insert("task_id".into(), json!(task_id));
        }
        line.insert("metadata".into(), metadata);
        Value::Object(line)
    }
}

impl ExecutionObserver for JsonlObserver {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        let mut line = serde_json::to_string(&self.event_to_json(event)).unwrap_or_else(|_| "{}".into());
        line.push('\n');
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            if !tx.send(line) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

async fn write_lines(mut writer: LineWriter, mut rx: LineRx) {
    if let Err(err) = drain(&mut writer, &mut rx).await {
        tracing::warn!(error = %err, "failed to write event line, events writer stopped");
    }
}

/// Write whatever is queued, flushing once the queue is momentarily empty.
async fn drain(writer: &mut LineWriter, rx: &mut LineRx) -> std::io::Result<()> {
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        while let Some(line) = rx.try_recv() {
            writer.write_all(line.as_bytes()).await?;
        }
        writer.flush().await?;
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use cadence_core::api::{TaskResult, TaskStatus};

    use super::*;

    fn events_cfg(capacity: usize, drop_when_full: bool) -> EventsOutConfig {
        EventsOutConfig {
            channel_capacity: capacity,
            drop_when_full,
            ..EventsOutConfig::default()
        }
    }

    fn parse_lines(content: &str) -> Vec<Value> {
        content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Observer writing into one end of an in-memory pipe, and the other end.
    fn piped(cfg: &EventsOutConfig) -> (JsonlObserver, tokio::io::DuplexStream) {
        let (writer, reader) = tokio::io::duplex(64 * 1024);
        (JsonlObserver::from_writer(writer, cfg), reader)
    }

    async fn read_all(mut reader: tokio::io::DuplexStream) -> String {
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        content
    }

    #[tokio::test]
    async fn task_end_carries_task_id_and_status() {
        let (observer, reader) = piped(&EventsOutConfig::default());
        let mut result = TaskResult::pending("fetch");
        result.status = TaskStatus::Completed;
        result.attempts = 2;

        observer.on_event(&ExecutionEvent::TaskComplete {
            plan_id: "p".into(),
            result,
        });
        observer.finish().await;

        let lines = parse_lines(&read_all(reader).await);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["v"], 1);
        assert_eq!(lines[0]["event_type"], "task.end");
        assert_eq!(lines[0]["plan_id"], "p");
        assert_eq!(lines[0]["task_id"], "fetch");
        assert_eq!(lines[0]["metadata"]["status"], "completed");
        assert_eq!(lines[0]["metadata"]["attempts"], 2);
    }

    #[tokio::test]
    async fn plan_events_omit_task_id() {
        let (observer, reader) = piped(&EventsOutConfig::default());
        observer.on_event(&ExecutionEvent::PlanStart {
            plan_id: "p".into(),
            objective_id: "o".into(),
            total_tasks: 3,
        });
        observer.on_event(&ExecutionEvent::warning(None, None, "store down"));
        observer.finish().await;

        let lines = parse_lines(&read_all(reader).await);
        assert!(lines[0].get("task_id").is_none());
        assert_eq!(lines[0]["metadata"]["total_tasks"], 3);
        assert_eq!(lines[1]["event_type"], "warning");
        assert!(lines[1]["plan_id"].is_null());
    }

    #[tokio::test]
    async fn full_buffer_drops_and_counts_lines() {
        // a 1-byte pipe nobody reads keeps the writer stuck after the first line
        let (writer, _reader) = tokio::io::duplex(1);
        let observer = JsonlObserver::from_writer(writer, &events_cfg(1, true));

        for _ in 0..5 {
            observer.on_event(&ExecutionEvent::warning(Some("p"), None, "hi"));
        }

        assert_eq!(observer.dropped_count(), 4);
    }

    #[tokio::test]
    async fn unbounded_queue_keeps_every_line() {
        let (observer, reader) = piped(&events_cfg(1, false));
        for i in 0..5 {
            observer.on_event(&ExecutionEvent::warning(Some("p"), None, format!("n{i}")));
        }
        observer.finish().await;

        let lines = parse_lines(&read_all(reader).await);
        assert_eq!(observer.dropped_count(), 0);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4]["metadata"]["message"], "n4");
    }

    #[tokio::test]
    async fn events_after_finish_are_ignored() {
        let (observer, reader) = piped(&EventsOutConfig::default());
        observer.on_event(&ExecutionEvent::warning(Some("p"), None, "kept"));
        observer.finish().await;
        observer.on_event(&ExecutionEvent::warning(Some("p"), None, "late"));

        let lines = parse_lines(&read_all(reader).await);
        assert_eq!(lines.len(), 1);
        assert_eq!(observer.dropped_count(), 0);
    }

    #[tokio::test]
    async fn open_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/events.jsonl");
        let cfg = EventsOutConfig {
            enabled: true,
            path: path.display().to_string(),
            ..EventsOutConfig::default()
        };

        for _ in 0..2 {
            let observer = JsonlObserver::open(&cfg).await.unwrap();
            observer.on_event(&ExecutionEvent::warning(Some("p"), None, "hi"));
            observer.finish().await;
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
