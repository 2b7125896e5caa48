// src/log/service.rs

//! The installer log: one append point, bounded history, severity filtering
//! and live fan-out.
//!
//! Writes take a single mutex that covers the durable sink and the history,
//! so a reader holding the same lock never sees one without the other.
//! Delivery to subscribers is handed to a dedicated dispatcher thread through
//! an unbounded queue; a slow subscriber therefore never stalls a writer.
//!
//! The dispatch queue is fed while the write lock is held, which fixes the
//! per-subscriber order to history order and lets [`LogService::subscribe`]
//! hand out a backlog with no gaps and no duplicates.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, mpsc as std_mpsc};
use std::thread::JoinHandle;

use time::{OffsetDateTime, UtcOffset};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::history::{DEFAULT_HISTORY_CAPACITY, LogHistory};
use super::sink::{LogSink, NullSink, default_log_dir, open_log_file};
use super::{LogLevel, LogMessage};
use crate::errors::Result;

/// Tag used for messages the log service writes about itself.
const SERVICE_TAG: &str = "log";

static GLOBAL: OnceLock<Arc<LogService>> = OnceLock::new();

/// Construction parameters for a file-backed [`LogService`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Display threshold.
    pub level: LogLevel,
    pub history_capacity: usize,
    pub log_dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_dir: default_log_dir(),
        }
    }
}

/// Identifies a live subscription for [`LogService::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a log subscription.
///
/// The backlog present at subscription time arrives first, followed by live
/// messages. Dropping the subscription detaches it.
#[derive(Debug)]
pub struct LogSubscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<LogMessage>,
}

impl LogSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next message; `None` once the service has shut down and the queue is drained.
    pub async fn recv(&mut self) -> Option<LogMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogMessage> {
        self.rx.try_recv().ok()
    }

    /// Blocking variant for consumers outside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<LogMessage> {
        self.rx.blocking_recv()
    }
}

enum Dispatch {
    Message(LogMessage),
    Subscribe(SubscriptionId, mpsc::UnboundedSender<LogMessage>),
    Unsubscribe(SubscriptionId),
}

struct Inner {
    sink: Box<dyn LogSink>,
    sink_failure_reported: bool,
    history: LogHistory,
    level: LogLevel,
    next_seq: u64,
    dispatch: Option<std_mpsc::Sender<Dispatch>>,
}

impl Inner {
    fn next_message(&mut self, timestamp: OffsetDateTime, level: LogLevel, tag: String, text: String) -> LogMessage {
        let seq = self.next_seq;
        self.next_seq += 1;
        LogMessage {
            seq,
            timestamp,
            level,
            tag,
            text,
        }
    }

    /// Sink, history and dispatch queue, in that order. Returns the sink error
    /// the first time the sink fails.
    fn append(&mut self, message: LogMessage, to_sink: bool) -> Option<std::io::Error> {
        let mut failure = None;
        if to_sink {
            if let Err(err) = self.sink.write_line(&message.format_line()) {
                if !self.sink_failure_reported {
                    self.sink_failure_reported = true;
                    failure = Some(err);
                }
            }
        }

        if let Some(dispatch) = &self.dispatch {
            if dispatch.send(Dispatch::Message(message.clone())).is_err() {
                self.dispatch = None;
            }
        }
        self.history.push(message);
        failure
    }
}

pub struct LogService {
    inner: Mutex<Inner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    offset: UtcOffset,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("LogService")
            .field("level", &inner.level)
            .field("history_len", &inner.history.len())
            .field("sink", &inner.sink)
            .finish_non_exhaustive()
    }
}

impl LogService {
    /// Create a service that writes to a timestamped file in `config.log_dir`.
    pub fn new(config: &LogConfig) -> Result<Self> {
        let offset = local_offset();
        let now = OffsetDateTime::now_utc().to_offset(offset);
        let (sink, fallback) = open_log_file(&config.log_dir, now)?;
        let service = Self::from_parts(Box::new(sink), config.level, config.history_capacity, offset);
        if let Some(reason) = fallback {
            service.warn(SERVICE_TAG, reason);
        }
        service.announce("configured");
        Ok(service)
    }

    /// Create a service around an arbitrary sink.
    pub fn with_sink(sink: Box<dyn LogSink>, level: LogLevel, history_capacity: usize) -> Self {
        Self::from_parts(sink, level, history_capacity, local_offset())
    }

    /// Process-wide instance.
    ///
    /// The first call bootstraps a default instance (default directory,
    /// `Info` threshold) so that logging works before any configuration has
    /// been loaded. [`LogService::init_global`] later reconfigures that same
    /// instance rather than replacing it.
    pub fn global() -> Arc<LogService> {
        GLOBAL.get_or_init(|| Arc::new(Self::bootstrap())).clone()
    }

    /// Install `config` as the process-wide configuration.
    ///
    /// If the global instance already exists its threshold and history
    /// capacity are updated and its log file is kept.
    pub fn init_global(config: &LogConfig) -> Result<Arc<LogService>> {
        if let Some(existing) = GLOBAL.get() {
            existing.reconfigure(config);
            return Ok(existing.clone());
        }

        let service = Arc::new(Self::new(config)?);
        match GLOBAL.set(service.clone()) {
            Ok(()) => Ok(service),
            Err(_) => {
                let existing = Self::global();
                existing.reconfigure(config);
                Ok(existing)
            }
        }
    }

    fn bootstrap() -> Self {
        let config = LogConfig::default();
        match Self::new(&config) {
            Ok(service) => service,
            Err(err) => {
                warn!(error = %err, "no log file available; installer log is memory-only");
                let service = Self::with_sink(Box::new(NullSink), config.level, config.history_capacity);
                service.warn(SERVICE_TAG, format!("No log file available: {err}"));
                service
            }
        }
    }

    fn from_parts(sink: Box<dyn LogSink>, level: LogLevel, history_capacity: usize, offset: UtcOffset) -> Self {
        let (dispatch_tx, dispatch_rx) = std_mpsc::channel();
        let (dispatch, dispatcher) = match std::thread::Builder::new()
            .name("log-dispatch".to_string())
            .spawn(move || run_dispatcher(dispatch_rx))
        {
            Ok(handle) => (Some(dispatch_tx), Some(handle)),
            Err(err) => {
                warn!(error = %err, "failed to start log dispatcher; subscribers disabled");
                (None, None)
            }
        };

        Self {
            inner: Mutex::new(Inner {
                sink,
                sink_failure_reported: false,
                history: LogHistory::new(history_capacity),
                level,
                next_seq: 0,
                dispatch,
            }),
            dispatcher: Mutex::new(dispatcher),
            offset,
            next_subscription: AtomicU64::new(0),
        }
    }

    fn announce(&self, kind: &str) {
        let (file, level) = {
            let inner = self.lock();
            (inner.sink.path().map(Path::to_path_buf), inner.level)
        };
        self.verbose(SERVICE_TAG, format!("LogService {kind} instance created."));
        match file {
            Some(file) => self.info(SERVICE_TAG, format!("Log file: {} (Level: {level})", file.display())),
            None => self.info(SERVICE_TAG, format!("No log file (Level: {level})")),
        }
    }

    fn reconfigure(&self, config: &LogConfig) {
        {
            let mut inner = self.lock();
            inner.level = config.level;
            inner.history.set_capacity(config.history_capacity);
        }
        self.info(
            SERVICE_TAG,
            format!("Logging configured (Level: {}); keeping existing log file.", config.level),
        );
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    /// Append a message to the sink and history and queue it for subscribers.
    ///
    /// Never fails: a sink error is reported once and then swallowed.
    pub fn write(&self, tag: impl Into<String>, level: LogLevel, text: impl Into<String>) {
        let timestamp = self.now();
        let failure = {
            let mut inner = self.lock();
            let message = inner.next_message(timestamp, level, tag.into(), text.into());
            inner.append(message, true)
        };

        if let Some(err) = failure {
            self.report_sink_failure(err);
        }
    }

    fn report_sink_failure(&self, err: std::io::Error) {
        error!(error = %err, "installer log sink write failed; further sink errors are suppressed");
        let timestamp = self.now();
        let mut inner = self.lock();
        let text = format!("Log file write failed: {err}. Further log file errors are suppressed.");
        let message = inner.next_message(timestamp, LogLevel::Error, SERVICE_TAG.to_string(), text);
        inner.append(message, false);
    }

    pub fn verbose(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Verbose, text);
    }

    pub fn info(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Info, text);
    }

    pub fn ok(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Ok, text);
    }

    pub fn warn(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Warning, text);
    }

    pub fn error(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Error, text);
    }

    pub fn success(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.write(tag, LogLevel::Success, text);
    }

    /// Change the display threshold. History and the log file are untouched.
    pub fn set_level(&self, level: LogLevel) {
        self.lock().level = level;
    }

    pub fn level(&self) -> LogLevel {
        self.lock().level
    }

    /// History entries at or above the current threshold, oldest first.
    pub fn filter_log_level(&self) -> Vec<LogMessage> {
        let inner = self.lock();
        inner.history.filter(inner.level)
    }

    /// Export of [`filter_log_level`](Self::filter_log_level) as sink lines.
    pub fn filtered_text(&self) -> String {
        let mut out = String::new();
        for message in self.filter_log_level() {
            out.push_str(&message.format_line());
            out.push('\n');
        }
        out
    }

    /// Full, unfiltered history snapshot.
    pub fn history(&self) -> Vec<LogMessage> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.lock().history.capacity()
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.lock().sink.path().map(Path::to_path_buf)
    }

    /// Attach a live consumer.
    ///
    /// Every message currently in history is queued to the new subscription
    /// first, in order; every later message follows. Consumers apply the
    /// display threshold themselves with [`LogMessage::is_visible_at`].
    pub fn subscribe(&self) -> LogSubscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        for message in inner.history.iter() {
            let _ = tx.send(message.clone());
        }
        if let Some(dispatch) = &inner.dispatch {
            if dispatch.send(Dispatch::Subscribe(id, tx)).is_err() {
                inner.dispatch = None;
            }
        }
        debug!(subscription = id.0, "log subscriber attached");

        LogSubscription { id, rx }
    }

    /// Detach a subscription. Messages already queued to it stay readable.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let inner = self.lock();
        if let Some(dispatch) = &inner.dispatch {
            let _ = dispatch.send(Dispatch::Unsubscribe(id));
        }
        debug!(subscription = id.0, "log subscriber detached");
    }

    /// Flush the sink and stop live delivery.
    ///
    /// Subscribers receive everything written before the call, then their
    /// channels close. Later writes still reach the sink and history.
    pub fn shutdown(&self) {
        {
            let mut inner = self.lock();
            inner.dispatch = None;
            if let Err(err) = inner.sink.flush() {
                warn!(error = %err, "failed to flush installer log");
            }
        }

        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("log dispatcher thread panicked");
            }
        }
    }
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

fn run_dispatcher(rx: std_mpsc::Receiver<Dispatch>) {
    let mut subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<LogMessage>)> = Vec::new();

    while let Ok(dispatch) = rx.recv() {
        match dispatch {
            Dispatch::Message(message) => {
                subscribers.retain(|(_, tx)| tx.send(message.clone()).is_ok());
            }
            Dispatch::Subscribe(id, tx) => subscribers.push((id, tx)),
            Dispatch::Unsubscribe(id) => subscribers.retain(|(sid, _)| *sid != id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_service(capacity: usize) -> LogService {
        LogService::with_sink(Box::new(NullSink), LogLevel::Info, capacity)
    }

    #[test]
    fn sequence_numbers_follow_write_order() {
        let log = memory_service(10);
        log.info("a", "one");
        log.error("b", "two");
        let seqs: Vec<u64> = log.history().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn set_level_only_changes_filter() {
        let log = memory_service(10);
        log.verbose("t", "hidden");
        log.warn("t", "shown");
        assert_eq!(log.filter_log_level().len(), 1);

        log.set_level(LogLevel::Verbose);
        assert_eq!(log.level(), LogLevel::Verbose);
        assert_eq!(log.filter_log_level().len(), 2);
        assert_eq!(log.history_len(), 2);
    }

    #[test]
    fn filtered_text_matches_filter() {
        let log = memory_service(10);
        log.verbose("t", "hidden");
        log.ok("t", "done");
        let text = log.filtered_text();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("[OK] [t] done"));
    }

    #[test]
    fn writes_after_shutdown_still_reach_history() {
        let log = memory_service(10);
        log.shutdown();
        log.info("t", "late");
        assert_eq!(log.history_len(), 1);
    }
}
