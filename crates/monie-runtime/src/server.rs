//! The plugin-side I/O server.
//!
//! [`IoServer`] performs the declaration handshake, then reads request lines
//! and dispatches each one as an independent task. The read loop never
//! waits for a dispatch. Requests the CPU predicate selects run on the
//! [`WorkerPool`]; everything else runs on the async runtime and streams
//! its chunks as they are produced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use monie_plugin::{PluginRegistry, SessionHandle};
use monie_types::error::kind;
use monie_types::{ErrorResponse, InboundEvent, LogLevel, SessionPayload, StreamMessage};

use crate::codec::{FrameReader, FrameWriter, Inbound};
use crate::config::RuntimeConfig;
use crate::declaration::Handshake;
use crate::error::{Result, RuntimeError};
use crate::executor::PluginExecutor;
use crate::heartbeat::HeartbeatService;
use crate::pool::{PoolInfo, WorkerPool};
use crate::router::{RouteOutcome, RouteOutput, Router};
use crate::session::Session;

/// Decides whether a request is CPU-bound.
pub type CpuPredicate = Arc<dyn Fn(&StreamMessage) -> bool + Send + Sync>;

/// Runtime statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// `None` when the worker pool is disabled.
    pub pool: Option<PoolInfo>,
    pub in_flight: usize,
    pub routes: usize,
}

// ── Builder ─────────────────────────────────────────────────────────────

/// Configures an [`IoServer`]. Standard routes are registered first.
pub struct IoServerBuilder {
    config: RuntimeConfig,
    registry: Arc<PluginRegistry>,
    router: Router,
    cpu_predicate: CpuPredicate,
    heartbeat_interval: Duration,
}

impl IoServerBuilder {
    /// Register extra routes after the standard ones.
    pub fn routes<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut Router),
    {
        register(&mut self.router);
        self
    }

    /// Classify requests as CPU-bound. Default: nothing is.
    pub fn cpu_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StreamMessage) -> bool + Send + Sync + 'static,
    {
        self.cpu_predicate = Arc::new(predicate);
        self
    }

    /// Override the configured heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn build<W>(self, writer: W) -> Result<IoServer>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pool = if self.config.worker_enabled() {
            Some(WorkerPool::new(self.config.max_workers)?)
        } else {
            debug!("worker pool disabled");
            None
        };

        Ok(IoServer {
            inner: Arc::new(Inner {
                config: self.config,
                registry: self.registry,
                router: Arc::new(self.router),
                writer: FrameWriter::new(writer),
                pool,
                cpu_predicate: self.cpu_predicate,
                heartbeat_interval: self.heartbeat_interval,
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                loop_exited: CancellationToken::new(),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
            }),
        })
    }
}

// ── Server ──────────────────────────────────────────────────────────────

/// Clonable handle to a running plugin server.
#[derive(Clone)]
pub struct IoServer {
    inner: Arc<Inner>,
}

struct Inner {
    config: RuntimeConfig,
    registry: Arc<PluginRegistry>,
    router: Arc<Router>,
    writer: FrameWriter,
    pool: Option<WorkerPool>,
    cpu_predicate: CpuPredicate,
    heartbeat_interval: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
    /// Cancelled once the read loop has returned.
    loop_exited: CancellationToken,
    started: AtomicBool,
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl IoServer {
    pub fn builder(config: RuntimeConfig, registry: PluginRegistry) -> IoServerBuilder {
        let registry = Arc::new(registry);
        let mut router = Router::new();
        PluginExecutor::new(Arc::clone(&registry)).register_routes(&mut router);

        IoServerBuilder {
            heartbeat_interval: config.heartbeat_interval(),
            config,
            registry,
            router,
            cpu_predicate: Arc::new(|_| false),
        }
    }

    /// Run the server until `reader` reaches EOF, a read fails or
    /// [`stop`](Self::stop) is called. Always finishes with an orderly stop.
    pub async fn start<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyStarted);
        }

        let exited = self.inner.loop_exited.clone().drop_guard();
        let result = self.run(reader).await;
        drop(exited);
        self.stop().await?;
        result
    }

    async fn run<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin,
    {
        let inner = &self.inner;
        Handshake::new(&inner.registry, inner.config.asset_chunk_size)
            .send(&inner.writer)
            .await?;

        let heartbeat = HeartbeatService::new(inner.heartbeat_interval, inner.writer.clone());
        let cancel = inner.cancel.clone();
        inner.tracker.spawn(async move {
            if let Err(e) = heartbeat.start(cancel).await {
                debug!(error = %e, "heartbeat stopped");
            }
        });

        if let Some(interval) = inner.config.parent_check_interval() {
            inner
                .tracker
                .spawn(watch_parent(interval, inner.cancel.clone()));
        }

        info!(
            workers = inner.pool.as_ref().map(|p| p.info().workers).unwrap_or(0),
            routes = inner.router.len(),
            "plugin server ready"
        );

        let mut frames = FrameReader::new(BufReader::new(reader));
        loop {
            let next = tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return Ok(()),
                next = frames.next_frame() => next,
            };

            match next {
                Ok(Some(Inbound::Message(message))) => self.accept(message),
                Ok(Some(Inbound::Malformed { line, error })) => {
                    warn!(error = %error, bytes = line.len(), "dropping malformed line");
                    if let Err(e) = inner
                        .writer
                        .log(LogLevel::Error, format!("malformed message: {error}"))
                        .await
                    {
                        warn!(error = %e, "failed to report malformed line");
                    }
                }
                Ok(None) => {
                    info!("input closed");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "failed to read from host");
                    return Err(e);
                }
            }
        }
    }

    /// Spawn a dispatch task for one inbound message.
    fn accept(&self, message: StreamMessage) {
        if self.inner.cancel.is_cancelled() {
            debug!("stopping, request not dispatched");
            return;
        }

        match message.event {
            InboundEvent::Request => {}
            InboundEvent::Heartbeat | InboundEvent::Log => {
                debug!(event = ?message.event, "system event");
                return;
            }
            InboundEvent::Unknown => {
                warn!("ignoring unknown event");
                return;
            }
        }

        let Some(session) = Session::from_message(&message, self.inner.writer.clone()) else {
            warn!("dropping request without sessionId");
            return;
        };

        let inner = Arc::clone(&self.inner);
        self.inner
            .tracker
            .spawn(async move { inner.dispatch(session, message).await });
    }

    /// Cancel the read loop and background tasks, wait for the loop to
    /// return and for every in-flight dispatch, then close the writer. Safe
    /// to call more than once.
    pub async fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        inner.cancel.cancel();
        if inner.started.load(Ordering::SeqCst) {
            inner.loop_exited.cancelled().await;
        }
        inner.tracker.close();
        inner.tracker.wait().await;

        if !inner.closed.swap(true, Ordering::SeqCst) {
            inner.writer.close().await?;
            info!("plugin server stopped");
        }
        Ok(())
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            pool: self.inner.pool.as_ref().map(WorkerPool::info),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
            routes: self.inner.router.len(),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.inner.registry
    }

    /// Token cancelled when the server begins stopping.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }
}

impl std::fmt::Debug for IoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoServer")
            .field("info", &self.server_info())
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn dispatch(self: Arc<Self>, session: Session, message: StreamMessage) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let route = describe(&message);
        debug!(session_id = %session.id(), %route, "dispatching");

        let result = match &self.pool {
            Some(pool) if (self.cpu_predicate)(&message) => {
                self.dispatch_cpu(pool, &session, message.data, route).await
            }
            _ => self.dispatch_io(&session, message.data, &route).await,
        };
        if let Err(e) = result {
            warn!(session_id = %session.id(), error = %e, "failed to write session frames");
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn dispatch_io(&self, session: &Session, data: Value, route: &str) -> Result<()> {
        let handle: SessionHandle = Arc::new(session.clone());
        let outcome = self.router.dispatch(handle, data).await;
        deliver(outcome, route, &mut FrameSink::Session(session)).await
    }

    /// Run dispatch and stream draining on a worker thread; write the
    /// collected frames afterwards.
    async fn dispatch_cpu(
        &self,
        pool: &WorkerPool,
        session: &Session,
        data: Value,
        route: String,
    ) -> Result<()> {
        let router = Arc::clone(&self.router);
        let handle: SessionHandle = Arc::new(session.clone());
        let runtime = Handle::current();

        let job = move || {
            runtime.block_on(async move {
                let outcome = router.dispatch(handle, data).await;
                let mut sink = FrameSink::Buffer(Vec::new());
                deliver(outcome, &route, &mut sink).await?;
                Ok::<_, RuntimeError>(sink.into_buffer())
            })
        };

        match pool.run(job).await.and_then(|r| r) {
            Ok(payloads) => {
                for payload in &payloads {
                    session.write(payload).await?;
                }
                Ok(())
            }
            Err(e) => {
                error!(session_id = %session.id(), error = %e, "cpu task failed");
                session
                    .fail(ErrorResponse::new(kind::WORKER_ERROR, e.to_string()))
                    .await
            }
        }
    }
}

// ── Frame delivery ──────────────────────────────────────────────────────

/// Where session payloads go: straight to the host, or into a buffer for
/// later.
enum FrameSink<'a> {
    Session(&'a Session),
    Buffer(Vec<SessionPayload>),
}

impl FrameSink<'_> {
    async fn emit(&mut self, payload: SessionPayload) -> Result<()> {
        match self {
            Self::Session(session) => session.write(&payload).await,
            Self::Buffer(buf) => {
                buf.push(payload);
                Ok(())
            }
        }
    }

    fn into_buffer(self) -> Vec<SessionPayload> {
        match self {
            Self::Session(_) => Vec::new(),
            Self::Buffer(buf) => buf,
        }
    }
}

/// Turn a route outcome into session frames, ending with exactly one
/// terminal frame.
async fn deliver(outcome: RouteOutcome, route: &str, sink: &mut FrameSink<'_>) -> Result<()> {
    match outcome {
        RouteOutcome::NoMatch => {
            let error = ErrorResponse::new(kind::ROUTE_NOT_FOUND, format!("no route for {route}"));
            sink.emit(SessionPayload::Error { error }).await
        }
        RouteOutcome::Failed(error) => sink.emit(SessionPayload::Error { error }).await,
        RouteOutcome::Output(RouteOutput::Value(result)) => {
            sink.emit(SessionPayload::End {
                result: Some(result),
            })
            .await
        }
        RouteOutcome::Output(RouteOutput::Stream(mut chunks)) => {
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(result) => sink.emit(SessionPayload::Stream { result }).await?,
                    Err(error) => return sink.emit(SessionPayload::Error { error }).await,
                }
            }
            sink.emit(SessionPayload::End { result: None }).await
        }
    }
}

/// `type/action` of a request, for logs and route-not-found messages.
fn describe(message: &StreamMessage) -> String {
    format!(
        "{}/{}",
        message.invoke_type().unwrap_or("?"),
        message.action().unwrap_or("?")
    )
}

/// Cancel `cancel` once this process is re-parented to init, meaning the
/// host is gone.
#[cfg(unix)]
async fn watch_parent(interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if std::os::unix::process::parent_id() == 1 {
                    warn!("host process exited, stopping");
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn watch_parent(_interval: Duration, cancel: CancellationToken) {
    cancel.cancelled().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use monie_plugin::{InvokeOutput, PluginDefinition, PluginManifest, StaticModuleResolver};
    use serde_json::json;

    fn registry() -> PluginRegistry {
        let definition = PluginDefinition::new(PluginManifest {
            name: "server-test".into(),
            version: "0.1.0".into(),
            author: String::new(),
            label: Default::default(),
            description: Default::default(),
            icon: None,
            tags: vec![],
        });
        PluginRegistry::load(definition, &StaticModuleResolver::new()).unwrap()
    }

    #[test]
    fn describe_request() {
        let m = StreamMessage::request("s", json!({"type": "tool", "action": "invoke_tool"}));
        assert_eq!(describe(&m), "tool/invoke_tool");
        let m = StreamMessage::request("s", json!({}));
        assert_eq!(describe(&m), "?/?");
    }

    #[tokio::test]
    async fn deliver_stream_then_end() {
        let outcome = RouteOutcome::Output(RouteOutput::Stream(
            futures_util::stream::iter(vec![Ok(json!(1)), Ok(json!(2))]).boxed(),
        ));
        let mut sink = FrameSink::Buffer(Vec::new());
        deliver(outcome, "x/y", &mut sink).await.unwrap();
        let frames = sink.into_buffer();
        assert_eq!(frames.len(), 3);
        assert!(!frames[0].is_terminal());
        assert_eq!(frames[2], SessionPayload::End { result: None });
    }

    #[tokio::test]
    async fn deliver_stops_at_first_error() {
        let outcome = RouteOutcome::Output(RouteOutput::Stream(
            futures_util::stream::iter(vec![
                Ok(json!(1)),
                Err(ErrorResponse::new("ExecutionFailed", "boom")),
                Ok(json!(3)),
            ])
            .boxed(),
        ));
        let mut sink = FrameSink::Buffer(Vec::new());
        deliver(outcome, "x/y", &mut sink).await.unwrap();
        let frames = sink.into_buffer();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_terminal());
        assert!(matches!(&frames[1], SessionPayload::Error { error } if error.message == "boom"));
    }

    #[tokio::test]
    async fn deliver_no_match_is_route_not_found() {
        let mut sink = FrameSink::Buffer(Vec::new());
        deliver(RouteOutcome::NoMatch, "tool/nope", &mut sink)
            .await
            .unwrap();
        match &sink.into_buffer()[..] {
            [SessionPayload::Error { error }] => {
                assert_eq!(error.error_type, "RouteNotFound");
                assert!(error.message.contains("tool/nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn builder_registers_standard_and_extra_routes() {
        let (client, _host) = tokio::io::duplex(1024);
        let config = RuntimeConfig {
            max_workers: 2,
            ..Default::default()
        };
        let server = IoServer::builder(config, registry())
            .routes(|router| {
                router.register_route(
                    |data: &Value| data["type"] == "ping",
                    |data: Value| Ok(data),
                    |_session, _data: Value| async { InvokeOutput::value("pong") },
                );
            })
            .build(client)
            .unwrap();

        let info = server.server_info();
        assert_eq!(info.routes, 18);
        assert_eq!(info.in_flight, 0);
        assert_eq!(info.pool.unwrap().workers, 2);
    }

    #[tokio::test]
    async fn disabled_worker_has_no_pool() {
        let (client, _host) = tokio::io::duplex(1024);
        let config = RuntimeConfig {
            disable_worker: true,
            ..Default::default()
        };
        let server = IoServer::builder(config, registry())
            .build(client)
            .unwrap();
        assert!(server.server_info().pool.is_none());
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_start_once() {
        let (client, _host) = tokio::io::duplex(1024);
        let server = IoServer::builder(RuntimeConfig::default(), registry())
            .build(client)
            .unwrap();
        server.stop().await.unwrap();
        server.stop().await.unwrap();

        let (_tx, rx) = tokio::io::duplex(64);
        // The first start sees a cancelled token and stops straight away;
        // the handshake write fails because the writer is closed.
        assert!(server.start(rx).await.is_err());
        let (_tx, rx) = tokio::io::duplex(64);
        assert!(matches!(
            server.start(rx).await,
            Err(RuntimeError::AlreadyStarted)
        ));
    }
}
