//! Session handle and output feeds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::dialect::{self, Dialect};
use super::id::SessionId;
use super::state::{CloseReason, SessionState};
use crate::error::SessionError;
use crate::inventory::DeviceRecord;
use crate::output::OutputSanitizer;

/// Output chunks buffered per feed before a slow reader starts lagging.
const FEED_CAPACITY: usize = 1024;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded tail of everything a session printed.
#[derive(Debug)]
pub(crate) struct Transcript {
    text: String,
    limit: usize,
}

impl Transcript {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// State shared between handles and the pump thread.
pub(crate) struct Shared {
    pub id: SessionId,
    pub device: DeviceRecord,
    state: Mutex<SessionState>,
    close_reason: Mutex<Option<CloseReason>>,
    transcript: Mutex<Transcript>,
    output: broadcast::Sender<String>,
    closed: watch::Sender<bool>,
    input: mpsc::UnboundedSender<Vec<u8>>,
}

impl Shared {
    pub fn new(
        device: DeviceRecord,
        transcript_limit: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (input, input_rx) = mpsc::unbounded_channel();
        let (output, _) = broadcast::channel(FEED_CAPACITY);
        let (closed, _) = watch::channel(false);
        let shared = Arc::new(Self {
            id: SessionId::next(),
            device,
            state: Mutex::new(SessionState::Connecting),
            close_reason: Mutex::new(None),
            transcript: Mutex::new(Transcript::new(transcript_limit)),
            output,
            closed,
            input,
        });
        (shared, input_rx)
    }

    pub fn mark_open(&self) {
        lock(&self.state).advance(SessionState::Open);
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).is_closed()
    }

    /// Record output and fan it out to every live feed.
    pub fn publish(&self, text: String) {
        let mut transcript = lock(&self.transcript);
        transcript.push(&text);
        // No receivers is fine; the transcript keeps the text.
        let _ = self.output.send(text);
    }

    /// Move to Closed with `reason`. Only the first call has any effect.
    pub fn finish(&self, reason: CloseReason) -> bool {
        let mut state = lock(&self.state);
        if !state.advance(SessionState::Closed) {
            return false;
        }
        *lock(&self.close_reason) = Some(reason.clone());
        drop(state);
        self.closed.send_replace(true);
        info!(session = %self.id, device = %self.device.id, %reason, "session closed");
        true
    }
}

/// Handle to an open (or formerly open) device session.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    dialect: Dialect,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("device", &self.shared.device.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let dialect = Dialect::for_device_type(&shared.device.device_type);
        Self { shared, dialect }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// The device this session was opened against.
    pub fn device(&self) -> &DeviceRecord {
        &self.shared.device
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Set once the session is closed.
    pub fn close_reason(&self) -> Option<CloseReason> {
        lock(&self.shared.close_reason).clone()
    }

    /// Queue a command line for the device. Does not wait for output.
    pub fn send(&self, command: &str) -> Result<(), SessionError> {
        let mut line = command.as_bytes().to_vec();
        line.push(b'\n');
        self.send_raw(line)
    }

    /// Queue raw bytes for the device, with no line ending appended.
    pub fn send_raw(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SessionError> {
        if self.shared.is_closed() {
            return Err(SessionError::Closed(self.shared.device.id.clone()));
        }
        self.shared
            .input
            .send(bytes.into())
            .map_err(|_| SessionError::Closed(self.shared.device.id.clone()))
    }

    /// Subscribe to output produced from now on.
    pub fn output(&self) -> OutputFeed {
        self.output_with_backlog().1
    }

    /// Snapshot the transcript and subscribe in one step, so no chunk is
    /// missed or seen twice.
    pub fn output_with_backlog(&self) -> (String, OutputFeed) {
        let transcript = lock(&self.shared.transcript);
        let feed = OutputFeed {
            rx: self.shared.output.subscribe(),
            closed: self.shared.closed.subscribe(),
        };
        (transcript.as_str().to_string(), feed)
    }

    /// Tail of everything the device printed.
    pub fn transcript(&self) -> String {
        lock(&self.shared.transcript).as_str().to_string()
    }

    /// Close the session. Safe to call any number of times.
    pub fn close(&self) {
        self.close_with(CloseReason::Local);
    }

    pub(crate) fn close_with(&self, reason: CloseReason) {
        if self.shared.finish(reason) {
            debug!(session = %self.shared.id, "close requested");
        }
    }

    /// Run one command and return its output without echo or prompt.
    pub async fn send_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        let mut feed = self.output();
        self.send(command)?;
        let raw = feed.read_response(command, timeout).await.map_err(|e| match e {
            SessionError::Closed(_) => SessionError::Closed(self.shared.device.id.clone()),
            other => other,
        })?;
        Ok(dialect::clean_command_output(&raw, command))
    }

    /// Apply configuration lines, entering and leaving config mode as the
    /// dialect requires. Returns the combined device output.
    pub async fn send_config_set<I, S>(
        &self,
        lines: I,
        timeout: Duration,
    ) -> Result<String, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut commands: Vec<String> = Vec::new();
        commands.extend(self.dialect.config_enter.map(str::to_string));
        commands.extend(
            lines
                .into_iter()
                .map(|l| l.as_ref().trim_end().to_string())
                .filter(|l| !l.trim().is_empty()),
        );
        commands.extend(self.dialect.config_exit.map(str::to_string));

        let mut combined = String::new();
        for command in &commands {
            let out = self.send_command(command, timeout).await?;
            if !out.is_empty() {
                combined.push_str(&out);
                combined.push('\n');
            }
        }
        Ok(combined)
    }
}

/// Live stream of session output.
///
/// Yields chunks produced after the feed was created. Returns `None` once
/// the session is closed and everything already delivered has been read.
pub struct OutputFeed {
    rx: broadcast::Receiver<String>,
    closed: watch::Receiver<bool>,
}

impl OutputFeed {
    /// Next output chunk, or `None` when the session has closed.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            if *self.closed.borrow() {
                return self.drain_one();
            }
            tokio::select! {
                biased;
                chunk = self.rx.recv() => match chunk {
                    Ok(text) => return Some(text),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "output feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                changed = self.closed.changed() => {
                    if changed.is_err() {
                        return self.drain_one();
                    }
                }
            }
        }
    }

    fn drain_one(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv() {
                Ok(text) => return Some(text),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Collect output until the prompt reappears after `echo`.
    ///
    /// Output before the echoed command is part of the result but cannot
    /// end it, so a stale prompt from earlier traffic is not mistaken for
    /// the end of this response. An empty `echo` accepts any prompt.
    pub async fn read_response(
        &mut self,
        echo: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        let echo = echo.trim();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut raw = String::new();
        loop {
            match tokio::time::timeout_at(deadline, self.next()).await {
                Err(_) => return Err(SessionError::CommandTimeout(timeout)),
                Ok(None) if raw.is_empty() => return Err(SessionError::Closed(String::new())),
                Ok(None) => return Ok(OutputSanitizer::clean(&raw)),
                Ok(Some(chunk)) => {
                    raw.push_str(&chunk);
                    let clean = OutputSanitizer::clean(&raw);
                    let tail = if echo.is_empty() {
                        Some(clean.as_str())
                    } else {
                        clean.find(echo).map(|at| &clean[at + echo.len()..])
                    };
                    if tail.is_some_and(dialect::ends_with_prompt) {
                        return Ok(clean);
                    }
                }
            }
        }
    }

    /// Adapt the feed into a `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = String> {
        stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|chunk| (chunk, feed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn open_pair() -> (Session, Arc<Shared>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (shared, rx) = Shared::new(DeviceRecord::new("10.0.0.1"), 64);
        shared.mark_open();
        (Session::new(shared.clone()), shared, rx)
    }

    #[test]
    fn test_transcript_keeps_tail_on_char_boundary() {
        let mut transcript = Transcript::new(4);
        transcript.push("abc");
        transcript.push("dé");
        assert_eq!(transcript.as_str(), "cdé");
    }

    #[test]
    fn test_send_appends_newline() {
        let (session, _shared, mut rx) = open_pair();
        session.send("show version").unwrap();
        assert_eq!(rx.try_recv().unwrap(), b"show version\n");
    }

    #[test]
    fn test_send_after_close_fails() {
        let (session, _shared, _rx) = open_pair();
        session.close();
        assert!(matches!(session.send("x"), Err(SessionError::Closed(id)) if id == "10.0.0.1"));
    }

    #[test]
    fn test_close_is_idempotent_and_keeps_first_reason() {
        let (session, shared, _rx) = open_pair();
        session.close_with(CloseReason::DeviceRemoved);
        session.close();
        assert!(!shared.finish(CloseReason::RemoteEof));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.close_reason(), Some(CloseReason::DeviceRemoved));
    }

    #[tokio::test]
    async fn test_feed_delivers_then_ends_on_close() {
        let (session, shared, _rx) = open_pair();
        let mut feed = session.output();
        shared.publish("core-sw#".into());
        session.close();
        assert_eq!(feed.next().await.as_deref(), Some("core-sw#"));
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_feed() {
        let (session, _shared, _rx) = open_pair();
        let mut feed = session.output();
        let waiter = tokio::spawn(async move { feed.next().await });
        tokio::task::yield_now().await;
        session.close();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert_eq!(result.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_new_feed_starts_fresh_with_backlog() {
        let (session, shared, _rx) = open_pair();
        shared.publish("banner\r\n".into());
        let (backlog, mut feed) = session.output_with_backlog();
        assert_eq!(backlog, "banner\r\n");
        shared.publish("core-sw#".into());
        assert_eq!(feed.next().await.as_deref(), Some("core-sw#"));
    }

    #[tokio::test]
    async fn test_read_response_ignores_prompt_before_echo() {
        let (session, shared, _rx) = open_pair();
        let mut feed = session.output();
        shared.publish("\r\ncore-sw#".into());
        shared.publish("show clock\r\n10:00 UTC\r\n".into());
        shared.publish("core-sw#".into());
        let out = feed
            .read_response("show clock", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            dialect::clean_command_output(&out, "show clock"),
            "10:00 UTC"
        );
    }

    #[tokio::test]
    async fn test_read_response_times_out() {
        let (session, shared, _rx) = open_pair();
        let mut feed = session.output();
        shared.publish("partial output".into());
        let err = feed
            .read_response("", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::CommandTimeout(_)));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let (session, shared, _rx) = open_pair();
        let stream = session.output().into_stream();
        shared.publish("a".into());
        shared.publish("b".into());
        session.close();
        let chunks: Vec<String> = stream.collect().await;
        assert_eq!(chunks, vec!["a".to_string(), "b".to_string()]);
    }
}
