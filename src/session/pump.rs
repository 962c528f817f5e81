//! Blocking I/O pump between a transport and its session.
//!
//! One dedicated thread per session owns the transport. It forwards queued
//! input, publishes decoded output, and watches for a close request, so
//! device I/O never blocks the async runtime.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace, warn};

use super::handle::Shared;
use super::state::CloseReason;
use super::transport::{is_idle, Transport, Utf8Decoder};

const READ_BUFFER: usize = 4096;

pub(crate) struct SessionPump {
    transport: Box<dyn Transport>,
    shared: Arc<Shared>,
    input: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer_size: usize,
}

impl SessionPump {
    pub fn new(
        transport: Box<dyn Transport>,
        shared: Arc<Shared>,
        input: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            transport,
            shared,
            input,
            buffer_size: READ_BUFFER,
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        let name = format!("netdeck-{}", self.shared.id);
        thread::Builder::new().name(name).spawn(move || self.run())
    }

    fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_size];
        let mut decoder = Utf8Decoder::default();

        let reason = 'pump: loop {
            if self.shared.is_closed() {
                break None;
            }

            loop {
                match self.input.try_recv() {
                    Ok(data) => {
                        trace!(session = %self.shared.id, bytes = data.len(), "write");
                        if let Err(e) = self.transport.write_all(&data) {
                            break 'pump Some(CloseReason::TransportError(e.to_string()));
                        }
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            match self.transport.read(&mut buf) {
                Ok(0) => {
                    debug!(session = %self.shared.id, "device closed the stream");
                    break Some(CloseReason::RemoteEof);
                }
                Ok(n) => {
                    trace!(session = %self.shared.id, bytes = n, "read");
                    let text = decoder.decode(&buf[..n]);
                    if !text.is_empty() {
                        self.shared.publish(text);
                    }
                }
                Err(e) if is_idle(&e) => {}
                Err(e) => {
                    warn!(session = %self.shared.id, error = %e, "transport failed");
                    break Some(CloseReason::TransportError(e.to_string()));
                }
            }
        };

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.shared.publish(tail);
        }
        self.transport.shutdown();
        if let Some(reason) = reason {
            self.shared.finish(reason);
        }
        debug!(session = %self.shared.id, "pump stopped");
    }
}
