//! Terminal rendering of the event log.

use std::io::{self, Write};

use chrono::Local;
use console_core::{
    DecryptionOutcome, EventLog, LogEntry, SessionState, Severity, ACCESS_DENIED_TEXT,
};
use futures::StreamExt;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Success => " OK ",
        Severity::Warning => "WAIT",
        Severity::Error => "FAIL",
    }
}

pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "[{}] {} {}",
        entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        severity_tag(entry.severity),
        entry.message
    )
}

/// Background task printing log entries as they are appended.
pub struct LogRenderer {
    task: JoinHandle<()>,
    printed: watch::Receiver<u64>,
}

impl LogRenderer {
    pub fn spawn(log: &EventLog) -> Self {
        Self::spawn_with(log, io::stdout())
    }

    /// Renders into `out` until the log is dropped.
    pub fn spawn_with<W: Write + Send + 'static>(log: &EventLog, mut out: W) -> Self {
        let mut entries = BroadcastStream::new(log.subscribe());
        // Entries appended before subscribing are never delivered here.
        let (printed_tx, printed) = watch::channel(log.len() as u64);
        let task = tokio::spawn(async move {
            while let Some(next) = entries.next().await {
                match next {
                    Ok(entry) => {
                        let _ = writeln!(out, "{}", format_entry(&entry));
                        let _ = out.flush();
                        printed_tx.send_modify(|printed| {
                            *printed = (*printed).max(entry.sequence + 1);
                        });
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "log renderer fell behind");
                        let _ = writeln!(
                            out,
                            "... {skipped} log entries not shown; use 'log' to see all"
                        );
                    }
                }
            }
        });
        Self { task, printed }
    }

    pub fn progress(&self) -> RenderProgress {
        RenderProgress(self.printed.clone())
    }

    pub async fn finish(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// How many log entries a [`LogRenderer`] has written so far.
#[derive(Debug, Clone)]
pub struct RenderProgress(watch::Receiver<u64>);

impl RenderProgress {
    /// Waits until the first `count` entries are out, or the renderer has stopped.
    pub async fn wait_for(&self, count: usize) {
        let mut printed = self.0.clone();
        let _ = printed.wait_for(|printed| *printed >= count as u64).await;
    }
}

pub fn format_status(session: &SessionState) -> String {
    let record = match session.current_ciphertext() {
        Some(ciphertext) => ciphertext.preview(),
        None => "(none)".to_string(),
    };
    let result = match session.decryption_outcome() {
        DecryptionOutcome::Hidden => "(hidden)".to_string(),
        DecryptionOutcome::Revealed(message) => format!("GRANTED: {message}"),
        DecryptionOutcome::Denied => ACCESS_DENIED_TEXT.to_string(),
    };
    let user = session
        .current_user_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "(none)".to_string());
    format!("stored record: {record}\ncurrent user:  {user}\nresult:        {result}")
}
