//! Heartbeat service.
//!
//! Writes `{"event":"heartbeat"}` at a fixed interval so the host can tell a
//! slow plugin from a hung one. Runs on the async runtime, independent of
//! sessions and of the worker pool.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::FrameWriter;
use crate::error::Result;

/// A service that emits heartbeat frames at a regular interval.
pub struct HeartbeatService {
    interval: Duration,
    writer: FrameWriter,
}

impl HeartbeatService {
    pub fn new(interval: Duration, writer: FrameWriter) -> Self {
        Self { interval, writer }
    }

    /// Start the heartbeat loop.
    ///
    /// Exits gracefully when the cancellation token is triggered. A write
    /// failure (including a closed writer) ends the loop with that error.
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "heartbeat service started"
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick fires immediately; skip it so the first heartbeat
        // happens after one full interval.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("heartbeat service shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    self.writer.heartbeat().await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn heartbeat_writes_frames() {
        let (client, mut server) = tokio::io::duplex(4096);
        let writer = FrameWriter::new(client);
        let svc = HeartbeatService::new(Duration::from_millis(50), writer.clone());

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { svc.start(cancel_clone).await });

        // Wait for at least one heartbeat.
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
        writer.close().await.unwrap();

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert!(out.lines().count() >= 1);
        assert!(out.lines().all(|l| l == r#"{"event":"heartbeat"}"#));
    }

    #[tokio::test]
    async fn graceful_shutdown_on_cancel() {
        let (client, _server) = tokio::io::duplex(64);
        let svc = HeartbeatService::new(Duration::from_secs(3600), FrameWriter::new(client));

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move { svc.start(cancel_clone).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn closed_writer_returns_error() {
        let (client, _server) = tokio::io::duplex(64);
        let writer = FrameWriter::new(client);
        writer.close().await.unwrap();
        let svc = HeartbeatService::new(Duration::from_millis(10), writer);

        let result = svc.start(CancellationToken::new()).await;
        assert!(matches!(result, Err(RuntimeError::WriterClosed)));
    }
}
