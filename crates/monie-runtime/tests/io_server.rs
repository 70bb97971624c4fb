//! End-to-end tests for `IoServer`.
//!
//! Each test drives a server over in-memory duplex pipes: the test plays the
//! host, writing request lines and reading the frames the plugin emits.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

use monie_plugin::{
    ClassDef, Constructor, Contract, Credentials, InvokeOutput, ModuleBinding, PluginAsset,
    PluginDefinition, PluginError, PluginManifest, PluginModule, PluginRegistry,
    StaticModuleResolver, Tool, ToolDeclaration, ToolProvider, ToolProviderDeclaration,
};
use monie_runtime::{IoServer, IoServerBuilder, RuntimeConfig};

// ── Test plugin ─────────────────────────────────────────────────────────

fn ms(parameters: &Map<String, Value>) -> u64 {
    parameters.get("ms").and_then(Value::as_u64).unwrap_or(0)
}

/// Sleeps asynchronously, then answers.
struct Nap;

#[async_trait]
impl Tool for Nap {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        let ms = ms(&parameters);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        InvokeOutput::value(json!({ "slept": ms }))
    }
}

/// Blocks its thread, standing in for CPU-bound work.
struct Spin;

#[async_trait]
impl Tool for Spin {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        std::thread::sleep(Duration::from_millis(ms(&parameters)));
        InvokeOutput::value(json!({ "thread": std::thread::current().name() }))
    }
}

/// Streams `n` chunks.
struct Count;

#[async_trait]
impl Tool for Count {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        let n = parameters.get("n").and_then(Value::as_u64).unwrap_or(0);
        Ok(InvokeOutput::stream(stream::iter(0..n).map(|i| Ok(json!(i)))))
    }
}

struct Crash;

#[async_trait]
impl Tool for Crash {
    async fn invoke(&self, _parameters: Map<String, Value>) -> Result<InvokeOutput, PluginError> {
        panic!("tool crashed");
    }
}

struct Provider;

#[async_trait]
impl ToolProvider for Provider {
    async fn validate_credentials(&self, _credentials: &Credentials) -> Result<(), PluginError> {
        Ok(())
    }
}

fn tool_decl(name: &str) -> ToolDeclaration {
    ToolDeclaration {
        name: name.into(),
        label: Default::default(),
        description: Default::default(),
        parameters: vec![],
        binding: ModuleBinding::new(format!("tools/{name}")),
    }
}

fn registry() -> PluginRegistry {
    let resolver = StaticModuleResolver::new()
        .module(
            "providers/test",
            PluginModule::new().export_default(
                ClassDef::new("TestProvider", Constructor::tool_provider(|| Provider))
                    .extends(Contract::ToolProvider),
            ),
        )
        .module(
            "tools/nap",
            PluginModule::new().export_default(
                ClassDef::new("Nap", Constructor::tool(|_, _| Nap)).extends(Contract::Tool),
            ),
        )
        .module(
            "tools/spin",
            PluginModule::new().export_default(
                ClassDef::new("Spin", Constructor::tool(|_, _| Spin)).extends(Contract::Tool),
            ),
        )
        .module(
            "tools/count",
            PluginModule::new().export_default(
                ClassDef::new("Count", Constructor::tool(|_, _| Count)).extends(Contract::Tool),
            ),
        )
        .module(
            "tools/crash",
            PluginModule::new().export_default(
                ClassDef::new("Crash", Constructor::tool(|_, _| Crash)).extends(Contract::Tool),
            ),
        );

    let mut definition = PluginDefinition::new(PluginManifest {
        name: "io-test".into(),
        version: "1.0.0".into(),
        author: "monie".into(),
        label: Default::default(),
        description: Default::default(),
        icon: None,
        tags: vec![],
    });
    definition.tool_providers.push(ToolProviderDeclaration {
        name: "test".into(),
        label: Default::default(),
        description: Default::default(),
        credentials_for_provider: vec![],
        binding: ModuleBinding::new("providers/test"),
        tools: ["nap", "spin", "count", "crash"]
            .into_iter()
            .map(tool_decl)
            .collect(),
    });

    PluginRegistry::load(definition, &resolver)
        .unwrap()
        .with_assets(vec![PluginAsset::new("icon.svg", b"<svg/>".to_vec())])
}

// ── Host harness ────────────────────────────────────────────────────────

struct Host {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    server: IoServer,
    task: JoinHandle<monie_runtime::Result<()>>,
}

impl Host {
    fn spawn(builder: IoServerBuilder) -> Self {
        let (input, plugin_in) = tokio::io::duplex(1 << 16);
        let (plugin_out, output) = tokio::io::duplex(1 << 20);
        let server = builder.build(plugin_out).unwrap();
        let runner = server.clone();
        let task = tokio::spawn(async move { runner.start(plugin_in).await });
        Self {
            input: Some(input),
            output: BufReader::new(output).lines(),
            server,
            task,
        }
    }

    fn with_defaults() -> Self {
        Self::spawn(IoServer::builder(config(), registry()))
    }

    async fn send_line(&mut self, line: &str) {
        let input = self.input.as_mut().unwrap();
        input.write_all(line.as_bytes()).await.unwrap();
        input.write_all(b"\n").await.unwrap();
    }

    async fn send(&mut self, session: &str, data: Value) {
        let line = json!({"sessionId": session, "event": "request", "data": data}).to_string();
        self.send_line(&line).await;
    }

    /// Close the host side of stdin.
    fn close_input(&mut self) {
        self.input.take();
    }

    async fn next(&mut self) -> Option<Value> {
        let line = tokio::time::timeout(Duration::from_secs(10), self.output.next_line())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()?;
        Some(serde_json::from_str(&line).unwrap())
    }

    /// Read frames up to and including `end`.
    async fn handshake(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        loop {
            let frame = self.next().await.expect("eof during handshake");
            let done = frame["event"] == "end";
            frames.push(frame);
            if done {
                return frames;
            }
        }
    }

    /// Next session frame, skipping heartbeats and logs.
    async fn next_session(&mut self) -> Value {
        loop {
            let frame = self.next().await.expect("eof waiting for session frame");
            if frame["event"] == "session" {
                return frame;
            }
        }
    }

    /// Next terminal session frame.
    async fn next_terminal(&mut self) -> Value {
        loop {
            let frame = self.next_session().await;
            if is_terminal(&frame) {
                return frame;
            }
        }
    }

    /// Every remaining frame until the server closes its output.
    async fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next().await {
            frames.push(frame);
        }
        frames
    }
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        max_workers: 2,
        asset_chunk_size: 4,
        ..Default::default()
    }
}

fn invoke(tool: &str, parameters: Value) -> Value {
    json!({
        "type": "tool",
        "action": "invoke_tool",
        "provider": "test",
        "tool": tool,
        "toolParameters": parameters,
    })
}

fn is_terminal(frame: &Value) -> bool {
    matches!(frame["data"]["type"].as_str(), Some("end") | Some("error"))
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_precedes_sessions_and_ends_with_end() {
    let mut host = Host::with_defaults();
    let frames = host.handshake().await;

    let events: Vec<&str> = frames.iter().map(|f| f["event"].as_str().unwrap()).collect();
    assert_eq!(
        events,
        vec![
            "manifest_declaration",
            "tool_declaration",
            "asset_chunk",
            "asset_chunk",
            "end"
        ]
    );
    assert_eq!(frames[0]["data"]["name"], "io-test");
    assert_eq!(frames[1]["data"]["tools"].as_array().unwrap().len(), 4);
    assert_eq!(frames[3]["data"]["end"], true);

    host.send("s1", invoke("nap", json!({}))).await;
    let frame = host.next_session().await;
    assert_eq!(frame["sessionId"], "s1");
    assert_eq!(frame["data"], json!({"type": "end", "result": {"slept": 0}}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_request_does_not_block_fast_ones() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    let started = Instant::now();
    host.send("slow", invoke("nap", json!({"ms": 1000}))).await;
    for i in 0..5 {
        host.send(&format!("fast-{i}"), invoke("nap", json!({}))).await;
    }

    let mut order = Vec::new();
    for _ in 0..5 {
        let frame = host.next_terminal().await;
        order.push(frame["sessionId"].as_str().unwrap().to_string());
    }
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(order.iter().all(|s| s.starts_with("fast-")));

    let last = host.next_terminal().await;
    assert_eq!(last["sessionId"], "slow");
}

#[tokio::test]
async fn every_session_gets_exactly_one_terminal_frame() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    host.send("stream", invoke("count", json!({"n": 3}))).await;
    host.send("value", invoke("nap", json!({}))).await;
    host.send("panic", invoke("crash", json!({}))).await;
    host.send("missing", invoke("nope", json!({}))).await;
    host.send("no-route", json!({"type": "tool", "action": "dance"})).await;
    host.send("bad-shape", json!({"type": "tool", "action": "invoke_tool"})).await;
    host.close_input();

    let frames = host.drain().await;
    let mut terminals: HashMap<String, Vec<Value>> = HashMap::new();
    let mut streamed = 0;
    for frame in frames.iter().filter(|f| f["event"] == "session") {
        let session = frame["sessionId"].as_str().unwrap().to_string();
        if is_terminal(frame) {
            terminals.entry(session).or_default().push(frame["data"].clone());
        } else {
            assert_eq!(session, "stream");
            streamed += 1;
        }
    }

    assert_eq!(streamed, 3);
    assert_eq!(terminals.len(), 6);
    assert!(terminals.values().all(|t| t.len() == 1));

    let error_type = |s: &str| terminals[s][0]["error"]["errorType"].clone();
    assert_eq!(terminals["stream"][0], json!({"type": "end"}));
    assert_eq!(terminals["value"][0]["type"], "end");
    assert_eq!(error_type("panic"), "PanicError");
    assert_eq!(terminals["panic"][0]["error"]["message"], "tool crashed");
    assert_eq!(error_type("missing"), "NotFound");
    assert_eq!(error_type("no-route"), "RouteNotFound");
    assert_eq!(error_type("bad-shape"), "DecodeError");

    assert!(host.task.await.unwrap().is_ok());
}

#[tokio::test]
async fn malformed_line_is_logged_and_loop_continues() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    host.send_line("{not json").await;
    host.send_line(r#"{"event":"request","data":{}}"#).await;
    host.send("after", invoke("nap", json!({}))).await;

    let log = loop {
        let frame = host.next().await.unwrap();
        if frame["event"] == "log" {
            break frame;
        }
    };
    assert_eq!(log["data"]["level"], "error");
    assert!(log["data"]["message"].as_str().unwrap().contains("malformed"));

    // The request without a sessionId produces nothing; the next one is
    // answered normally.
    let frame = host.next_session().await;
    assert_eq!(frame["sessionId"], "after");
    assert_eq!(frame["data"]["type"], "end");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn heartbeats_flow_while_pool_is_saturated() {
    let builder = IoServer::builder(
        RuntimeConfig {
            max_workers: 1,
            ..config()
        },
        registry(),
    )
    .heartbeat_interval(Duration::from_millis(50))
    .cpu_predicate(|message| message.data["tool"] == "spin");
    let mut host = Host::spawn(builder);
    host.handshake().await;

    host.send("cpu-1", invoke("spin", json!({"ms": 300}))).await;
    host.send("cpu-2", invoke("spin", json!({"ms": 300}))).await;

    let mut heartbeats = 0;
    let mut done = Vec::new();
    while done.len() < 2 {
        let frame = host.next().await.unwrap();
        match frame["event"].as_str() {
            Some("heartbeat") => heartbeats += 1,
            Some("session") if is_terminal(&frame) => {
                let thread = frame["data"]["result"]["thread"].as_str().unwrap_or("");
                assert!(thread.starts_with("monie-worker-"), "ran on {thread}");
                done.push(frame["sessionId"].as_str().unwrap().to_string());
            }
            _ => {}
        }
    }

    // Two 300 ms jobs on one worker take ~600 ms; 50 ms heartbeats keep
    // coming the whole time.
    assert!(heartbeats >= 5, "only {heartbeats} heartbeats");
    assert_eq!(host.server.server_info().pool.unwrap().completed, 2);
}

#[tokio::test]
async fn cpu_stream_is_collected_and_replayed() {
    let builder = IoServer::builder(config(), registry())
        .cpu_predicate(|message| message.data["tool"] == "count");
    let mut host = Host::spawn(builder);
    host.handshake().await;

    host.send("s", invoke("count", json!({"n": 2}))).await;
    let frames = [
        host.next_session().await,
        host.next_session().await,
        host.next_session().await,
    ];
    assert_eq!(frames[0]["data"], json!({"type": "stream", "result": 0}));
    assert_eq!(frames[1]["data"], json!({"type": "stream", "result": 1}));
    assert_eq!(frames[2]["data"], json!({"type": "end"}));
}

#[tokio::test]
async fn eof_drains_in_flight_sessions() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    host.send("late", invoke("nap", json!({"ms": 200}))).await;
    host.close_input();

    let frames = host.drain().await;
    let terminal = frames
        .iter()
        .find(|f| f["event"] == "session")
        .expect("in-flight session was dropped");
    assert_eq!(terminal["sessionId"], "late");
    assert_eq!(terminal["data"]["result"]["slept"], 200);

    assert!(host.task.await.unwrap().is_ok());
    assert_eq!(host.server.server_info().in_flight, 0);
}

#[tokio::test]
async fn external_stop_ends_start() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    host.server.stop().await.unwrap();
    assert!(host.drain().await.is_empty());
    assert!(host.task.await.unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_during_request_burst_leaves_no_orphans() {
    let mut host = Host::with_defaults();
    host.handshake().await;

    let mut input = host.input.take().unwrap();
    let sender = tokio::spawn(async move {
        for i in 0..200 {
            let line = json!({
                "sessionId": format!("s{i}"),
                "event": "request",
                "data": invoke("nap", json!({"ms": 20})),
            });
            if input.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }
    });

    // Let part of the burst through, then stop mid-stream.
    let first = host.next_terminal().await;
    assert_eq!(first["data"]["type"], "end");
    host.server.stop().await.unwrap();
    assert_eq!(host.server.server_info().in_flight, 0);

    let mut sessions: HashMap<String, Vec<Value>> = HashMap::new();
    sessions
        .entry(first["sessionId"].as_str().unwrap().to_string())
        .or_default()
        .push(first);
    for frame in host.drain().await.into_iter().filter(|f| f["event"] == "session") {
        let id = frame["sessionId"].as_str().unwrap().to_string();
        sessions.entry(id).or_default().push(frame);
    }
    for (id, frames) in &sessions {
        assert_eq!(frames.len(), 1, "{id} got {frames:?}");
        assert!(is_terminal(&frames[0]), "{id} ended without a terminal frame");
    }

    sender.await.unwrap();
    assert!(host.task.await.unwrap().is_ok());
}
