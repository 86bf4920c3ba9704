//! Span reporting.
//!
//! # Data Flow
//! ```text
//! Tracer::report(FinishedSpan)
//!     → Reporter (bounded queue, try_send, never blocks)
//!     → flush task (batches by size or interval)
//!     → SpanSink::export(&[FinishedSpan])
//! ```
//!
//! # Design Decisions
//! - Unsampled spans are dropped before they reach the queue
//! - A full or closed queue drops the span; callers never see the error
//! - Shutdown drains the queue and flushes within a bounded wait

use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{LogFormat, ReporterConfig};
use crate::observability::metrics;
use crate::tracer::span::FinishedSpan;

/// Failure to hand a span to the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("span queue is full")]
    QueueFull,
    #[error("span sink unavailable")]
    SinkUnavailable,
}

/// Failure reported by a sink.
#[derive(Debug, Clone, Error)]
#[error("sink error: {0}")]
pub struct SinkError(pub String);

/// Destination of finished spans.
///
/// Implementations must be thread-safe; batching and retries beyond what the
/// reporter does are their own business.
pub trait SpanSink: Send + Sync {
    fn export(&self, batch: &[FinishedSpan]) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Emits every span as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink {
    format: LogFormat,
}

impl LoggingSink {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }
}

impl SpanSink for LoggingSink {
    fn export(&self, batch: &[FinishedSpan]) -> Result<(), SinkError> {
        for span in batch {
            let parent = span
                .identity
                .parent_span_id
                .map(|p| p.to_hex())
                .unwrap_or_else(|| "none".to_string());
            match self.format {
                LogFormat::Json => {
                    let tags = serde_json::to_string(&span.tags)
                        .map_err(|e| SinkError(e.to_string()))?;
                    tracing::info!(
                        service = %span.service_name,
                        trace_id = %span.identity.trace_id,
                        span_id = %span.identity.span_id,
                        parent_span_id = %parent,
                        operation = %span.operation_name,
                        kind = %span.kind,
                        duration_us = span.duration().as_micros() as u64,
                        tags = %tags,
                        "Reporting span"
                    );
                }
                LogFormat::Text => {
                    let tags = span
                        .tags
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    tracing::info!(
                        "Reporting span {} {} [{}] {:?} {}",
                        span.identity,
                        span.operation_name,
                        span.kind,
                        span.duration(),
                        tags
                    );
                }
            }
        }
        Ok(())
    }
}

/// Collects spans in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything exported so far.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().map(|spans| spans.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpanSink for MemorySink {
    fn export(&self, batch: &[FinishedSpan]) -> Result<(), SinkError> {
        let mut spans = self
            .spans
            .lock()
            .map_err(|_| SinkError("memory sink poisoned".to_string()))?;
        spans.extend_from_slice(batch);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SpanSink for NullSink {
    fn export(&self, _batch: &[FinishedSpan]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Front half of the reporting pipeline, owned by the tracer.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: mpsc::Sender<FinishedSpan>,
}

impl Reporter {
    /// Start the flush task. Must be called from within a tokio runtime.
    pub fn spawn(config: &ReporterConfig, sink: Arc<dyn SpanSink>) -> (Self, ReporterCloser) {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(flush_loop(
            rx,
            stop_rx,
            sink,
            config.batch_size.max(1),
            Duration::from_millis(config.flush_interval_ms.max(1)),
        ));

        let closer = ReporterCloser {
            stop: Some(stop_tx),
            task,
            timeout: Duration::from_millis(config.shutdown_timeout_ms),
        };
        (Self { tx }, closer)
    }

    /// Queue a span for export without blocking.
    pub fn report(&self, span: FinishedSpan) -> Result<(), ReportError> {
        if !span.identity.sampled {
            metrics::record_span_dropped("unsampled");
            return Ok(());
        }
        match self.tx.try_send(span) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_span_dropped("queue_full");
                Err(ReportError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_span_dropped("sink_unavailable");
                Err(ReportError::SinkUnavailable)
            }
        }
    }
}

/// Stops the flush task and waits, bounded, for the final flush.
#[derive(Debug)]
pub struct ReporterCloser {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    timeout: Duration,
}

impl ReporterCloser {
    pub async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match tokio::time::timeout(self.timeout, &mut self.task).await {
            Ok(Ok(())) => tracing::debug!("Span reporter flushed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Span reporter task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Span reporter did not flush in time, abandoning buffered spans"
                );
                self.task.abort();
            }
        }
    }
}

async fn flush_loop(
    mut rx: mpsc::Receiver<FinishedSpan>,
    mut stop: oneshot::Receiver<()>,
    sink: Arc<dyn SpanSink>,
    batch_size: usize,
    interval: Duration,
) {
    let mut batch: Vec<FinishedSpan> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(span) => {
                    batch.push(span);
                    if batch.len() >= batch_size {
                        export(sink.as_ref(), &mut batch);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                export(sink.as_ref(), &mut batch);
            }
            _ = &mut stop => break,
        }
    }

    // Drain whatever is still queued.
    rx.close();
    while let Ok(span) = rx.try_recv() {
        batch.push(span);
    }
    export(sink.as_ref(), &mut batch);
    if let Err(e) = sink.flush() {
        metrics::record_sink_error();
        tracing::warn!(error = %e, "Span sink flush failed");
    }
}

fn export(sink: &dyn SpanSink, batch: &mut Vec<FinishedSpan>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    match sink.export(batch) {
        Ok(()) => metrics::record_spans_reported(count),
        Err(e) => {
            metrics::record_sink_error();
            metrics::record_span_dropped_n("sink_error", count);
            tracing::warn!(error = %e, spans = count, "Span export failed, dropping batch");
        }
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::identity::TraceIdentity;
    use crate::tracer::span::{Span, SpanKind};
    use std::time::SystemTime;

    fn finished(sampled: bool) -> FinishedSpan {
        Span::start(
            "svc",
            TraceIdentity::new_root(sampled),
            "op",
            SpanKind::Server,
            SystemTime::now(),
            64,
        )
        .finish(SystemTime::now())
        .unwrap()
    }

    fn config(queue_size: usize, batch_size: usize) -> ReporterConfig {
        ReporterConfig {
            queue_size,
            batch_size,
            flush_interval_ms: 60_000,
            shutdown_timeout_ms: 1_000,
            ..ReporterConfig::default()
        }
    }

    #[tokio::test]
    async fn close_flushes_buffered_spans() {
        let sink = MemorySink::new();
        let (reporter, closer) = Reporter::spawn(&config(16, 100), Arc::new(sink.clone()));

        for _ in 0..3 {
            reporter.report(finished(true)).unwrap();
        }
        closer.close().await;

        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn unsampled_spans_are_dropped() {
        let sink = MemorySink::new();
        let (reporter, closer) = Reporter::spawn(&config(16, 100), Arc::new(sink.clone()));

        reporter.report(finished(false)).unwrap();
        reporter.report(finished(true)).unwrap();
        closer.close().await;

        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn report_after_close_is_sink_unavailable() {
        let sink = MemorySink::new();
        let (reporter, closer) = Reporter::spawn(&config(16, 100), Arc::new(sink.clone()));
        closer.close().await;

        assert_eq!(
            reporter.report(finished(true)),
            Err(ReportError::SinkUnavailable)
        );
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn full_batch_is_exported_without_waiting_for_interval() {
        let sink = MemorySink::new();
        let (reporter, closer) = Reporter::spawn(&config(16, 2), Arc::new(sink.clone()));

        reporter.report(finished(true)).unwrap();
        reporter.report(finished(true)).unwrap();

        for _ in 0..50 {
            if sink.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.len(), 2);
        closer.close().await;
    }
}
