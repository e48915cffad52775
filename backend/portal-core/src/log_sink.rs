//! Injected log sink for protocol events.
//!
//! The authenticator and keep-alive report every request, response and step
//! through a [`LogSink`] handed to them at construction. What happens to the
//! lines (terminal, file, in-memory buffer for a UI) is the sink's business.
//!
//! Two sinks ship with the crate:
//! - [`LogCrateSink`] forwards to the `log` facade
//! - [`BufferedLogSink`] keeps the last N timestamped lines in memory and also
//!   forwards to `log`

use crate::BODY_PREVIEW_LIMIT;

use common::HttpStatusCode;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use humantime::format_rfc3339_millis;
use log::Level;

/// Maximum lines retained by [`BufferedLogSink::new`].
pub const MAX_LOG_LINES: usize = 1000;

const LOG_TARGET: &str = "portal";
const LOG_CLEARED_MESSAGE: &str = "=== Log Cleared ===";

/// Receiver of structured log lines.
///
/// Only [`record`](LogSink::record) is required; the helpers format the line
/// prefixes (`[INFO]`, `[HTTP]`, `[Step n]`, ...) consistently.
pub trait LogSink: Send + Sync {
    fn record(&self, level: Level, line: &str);

    fn log(&self, line: &str) {
        self.record(Level::Info, line);
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, &format!("[INFO] {message}"));
    }

    fn success(&self, message: &str) {
        self.record(Level::Info, &format!("[SUCCESS] {message}"));
    }

    fn warning(&self, message: &str) {
        self.record(Level::Warn, &format!("[WARNING] {message}"));
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, &format!("[ERROR] {message}"));
    }

    fn step(&self, step: u8, message: &str) {
        self.record(Level::Info, &format!("[Step {step}] {message}"));
    }

    /// `parameters` must already have secrets masked.
    fn http_request(&self, method: &str, url: &str, parameters: Option<&str>) {
        self.record(Level::Debug, &format!("[HTTP] {method} {url}"));
        if let Some(parameters) = parameters.filter(|p| !p.is_empty()) {
            self.record(Level::Debug, &format!("[HTTP] Parameters: {parameters}"));
        }
    }

    /// `content_preview` is truncated to [`BODY_PREVIEW_LIMIT`] characters.
    fn http_response(
        &self,
        status: HttpStatusCode,
        content_length: usize,
        content_preview: Option<&str>,
    ) {
        self.record(
            Level::Debug,
            &format!("[HTTP] Response: {status} ({content_length} bytes)"),
        );
        if let Some(content) = content_preview.filter(|c| !c.is_empty()) {
            self.record(Level::Debug, &format!("[HTTP] Content: {}", preview(content)));
        }
    }
}

/// Single-line, length-capped copy of a response body for logging.
pub fn preview(body: &str) -> String {
    body.chars()
        .take(BODY_PREVIEW_LIMIT)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Sink that forwards every line to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn record(&self, level: Level, line: &str) {
        log::log!(target: LOG_TARGET, level, "{line}");
    }
}

/// Bounded in-memory sink.
///
/// Lines are stored as `[HH:MM:SS.mmm] line` (UTC). When the buffer is full the
/// oldest line is dropped.
#[derive(Debug)]
pub struct BufferedLogSink {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    forward: bool,
}

impl BufferedLogSink {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_LOG_LINES))),
            capacity: capacity.max(1),
            forward: true,
        }
    }

    /// Stop forwarding lines to the `log` facade.
    pub fn silent(mut self) -> Self {
        self.forward = false;
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All retained lines joined with newlines.
    pub fn export(&self) -> String {
        self.lines().join("\n")
    }

    pub fn clear(&self) {
        self.buffer().clear();
        self.log(LOG_CLEARED_MESSAGE);
    }

    /// A panic while holding the lock leaves the buffer intact; keep using it.
    fn buffer(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _lines = self.lines.lock();
                    panic!("panicked while holding the log buffer");
                })
                .join()
        });
    }
}

impl Default for BufferedLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for BufferedLogSink {
    fn record(&self, level: Level, line: &str) {
        if line.is_empty() {
            return;
        }

        let stamp = format_rfc3339_millis(SystemTime::now()).to_string();
        // "YYYY-MM-DDTHH:MM:SS.mmmZ" -> "HH:MM:SS.mmm"
        let time = stamp.get(11..23).unwrap_or(&stamp);
        let entry = format!("[{time}] {line}");

        {
            let mut lines = self.buffer();
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(entry);
        }

        if self.forward {
            log::log!(target: LOG_TARGET, level, "{line}");
        }
    }
}
