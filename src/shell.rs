//! Interactive shell view.
//!
//! Relays operator input lines to a session and session output to a
//! writer until either side ends.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::output::AnsiStripper;
use crate::session::{CloseReason, Session};

/// Input line that closes the session locally.
pub const ESCAPE_LINE: &str = "~.";

/// Terminal panel bound to one session.
pub struct ShellView<W> {
    session: Session,
    writer: W,
    stripper: Option<AnsiStripper>,
    replay_backlog: bool,
}

impl<W: AsyncWrite + Unpin> ShellView<W> {
    pub fn new(session: Session, writer: W) -> Self {
        Self {
            session,
            writer,
            stripper: None,
            replay_backlog: true,
        }
    }

    /// Remove terminal escape sequences before writing output.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.stripper = strip.then(AnsiStripper::new);
        self
    }

    /// Write what the session printed before the view attached.
    pub fn replay_backlog(mut self, replay: bool) -> Self {
        self.replay_backlog = replay;
        self
    }

    fn render(&mut self, chunk: &str) -> String {
        match &mut self.stripper {
            Some(stripper) => stripper.push(chunk.as_bytes()),
            None => chunk.to_string(),
        }
    }

    async fn write(&mut self, chunk: &str) -> std::io::Result<()> {
        let text = self.render(chunk);
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Run until the session closes. End of input closes the session.
    ///
    /// Returns why the session ended.
    pub async fn run<R>(mut self, input: R) -> std::io::Result<CloseReason>
    where
        R: AsyncBufRead + Unpin,
    {
        let (backlog, mut feed) = self.session.output_with_backlog();
        if self.replay_backlog && !backlog.is_empty() {
            self.write(&backlog).await?;
        }

        let mut lines = input.lines();
        let mut input_open = true;
        loop {
            tokio::select! {
                chunk = feed.next() => match chunk {
                    Some(text) => self.write(&text).await?,
                    None => break,
                },
                line = lines.next_line(), if input_open => match line? {
                    Some(line) if line.trim() == ESCAPE_LINE => {
                        debug!(session = %self.session.id(), "escape requested");
                        self.session.close();
                    }
                    Some(line) => {
                        if let Err(e) = self.session.send(&line) {
                            debug!(error = %e, "input dropped");
                        }
                    }
                    None => {
                        input_open = false;
                        self.session.close();
                    }
                },
            }
        }

        self.writer.flush().await?;
        Ok(self.session.close_reason().unwrap_or(CloseReason::Local))
    }
}
