//! Newline-delimited JSON framing.
//!
//! [`FrameReader`] turns a byte stream into [`Inbound`] items, one per
//! non-blank line. [`FrameWriter`] serializes [`StreamFrame`]s and writes
//! each as a single line under a lock, so concurrent producers never
//! interleave partial lines.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use monie_types::{ErrorResponse, LogEvent, LogLevel, SessionPayload, StreamFrame, StreamMessage};

use crate::error::{Result, RuntimeError};

// ── Reader ──────────────────────────────────────────────────────────────

/// One inbound line.
#[derive(Debug)]
pub enum Inbound {
    Message(StreamMessage),
    /// The line was not a valid envelope. Local to this line.
    Malformed {
        line: String,
        error: serde_json::Error,
    },
}

/// Reads [`Inbound`] items from newline-delimited JSON.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next non-blank line. `Ok(None)` at EOF.
    pub async fn next_frame(&mut self) -> Result<Option<Inbound>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(match serde_json::from_slice::<StreamMessage>(line) {
                Ok(message) => Inbound::Message(message),
                Err(error) => Inbound::Malformed {
                    line: String::from_utf8_lossy(line).into_owned(),
                    error,
                },
            }));
        }
    }
}

// ── Writer ──────────────────────────────────────────────────────────────

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Clonable, line-atomic frame writer.
#[derive(Clone)]
pub struct FrameWriter {
    inner: Arc<Mutex<Option<BoxWriter>>>,
}

impl FrameWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(writer)))),
        }
    }

    /// Write one frame followed by `\n` and flush.
    ///
    /// A failed write may leave a partial line on the stream, so the first
    /// I/O error drops the writer and every later call fails with
    /// [`RuntimeError::WriterClosed`].
    pub async fn put(&self, frame: &StreamFrame) -> Result<()> {
        let line = frame.to_line()?;
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(RuntimeError::WriterClosed)?;
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(error) = written {
            guard.take();
            warn!(%error, "frame write failed, writer closed");
            return Err(error.into());
        }
        Ok(())
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        self.put(&StreamFrame::log(&LogEvent::now(level, message))?)
            .await
    }

    pub async fn heartbeat(&self) -> Result<()> {
        self.put(&StreamFrame::heartbeat()).await
    }

    pub async fn session(&self, session_id: &str, payload: &SessionPayload) -> Result<()> {
        self.put(&StreamFrame::session(session_id, payload)?).await
    }

    /// Terminal error frame for `session_id`.
    pub async fn error(&self, session_id: &str, error: ErrorResponse) -> Result<()> {
        self.session(session_id, &SessionPayload::Error { error })
            .await
    }

    /// Flush and shut down the underlying stream. Waits for any frame in
    /// progress; later writes fail with [`RuntimeError::WriterClosed`].
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.flush().await?;
            writer.shutdown().await?;
            debug!("frame writer closed");
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}
