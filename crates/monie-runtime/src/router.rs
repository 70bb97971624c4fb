//! Request router.
//!
//! A [`Router`] holds `(filter, decoder, handler)` routes in registration
//! order. [`Router::dispatch`] runs the first route whose filter accepts the
//! request's `data`. Decode errors, handler errors and panics (in the
//! decoder, the handler future or a result stream) all come back as
//! [`ErrorResponse`]s; nothing escapes to the caller.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use monie_plugin::{InvokeOutput, PluginError, SessionHandle};
use monie_types::error::kind;
use monie_types::{ErrorResponse, RequestKey};

/// Result chunks as seen by the server. A panic ends the stream with an
/// error item.
pub type ResponseStream = BoxStream<'static, Result<Value, ErrorResponse>>;

/// Handler output after panic isolation.
pub enum RouteOutput {
    Value(Value),
    Stream(ResponseStream),
}

impl std::fmt::Debug for RouteOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// What [`Router::dispatch`] produced.
#[derive(Debug)]
pub enum RouteOutcome {
    /// No filter accepted the request.
    NoMatch,
    Failed(ErrorResponse),
    Output(RouteOutput),
}

type Filter = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type Invoke = Box<
    dyn Fn(SessionHandle, Value) -> BoxFuture<'static, Result<RouteOutput, ErrorResponse>>
        + Send
        + Sync,
>;

struct Route {
    filter: Filter,
    invoke: Invoke,
}

/// Ordered route table. Written during startup, read-only afterwards.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Routes are tried in registration order.
    pub fn register_route<T, F, D, H, Fut>(&mut self, filter: F, decoder: D, handler: H)
    where
        T: Send + 'static,
        F: Fn(&Value) -> bool + Send + Sync + 'static,
        D: Fn(Value) -> Result<T, ErrorResponse> + Send + Sync + 'static,
        H: Fn(SessionHandle, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InvokeOutput, PluginError>> + Send + 'static,
    {
        let invoke: Invoke = Box::new(move |session, data| {
            let request = match std::panic::catch_unwind(AssertUnwindSafe(|| decoder(data))) {
                Ok(Ok(request)) => request,
                Ok(Err(e)) => return future::ready(Err(e)).boxed(),
                Err(payload) => return future::ready(Err(panic_response(payload))).boxed(),
            };
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(session, request)))
            {
                Ok(fut) => fut,
                Err(payload) => return future::ready(Err(panic_response(payload))).boxed(),
            };
            async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(output)) => Ok(isolate(output)),
                    Ok(Err(e)) => Err(e.to_response()),
                    Err(payload) => Err(panic_response(payload)),
                }
            }
            .boxed()
        });

        self.routes.push(Route {
            filter: Box::new(filter),
            invoke,
        });
    }

    /// Route matching `key` whose decoder is `serde_json::from_value::<T>`.
    pub fn register_typed<T, H, Fut>(&mut self, key: RequestKey, handler: H)
    where
        T: DeserializeOwned + Send + 'static,
        H: Fn(SessionHandle, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InvokeOutput, PluginError>> + Send + 'static,
    {
        self.register_route(
            move |data: &Value| key.matches(data),
            move |data: Value| {
                serde_json::from_value::<T>(data).map_err(|e| {
                    ErrorResponse::new(kind::DECODE_ERROR, format!("{key}: {e}"))
                })
            },
            handler,
        );
    }

    /// Run the first route whose filter accepts `data`.
    pub async fn dispatch(&self, session: SessionHandle, data: Value) -> RouteOutcome {
        let Some(route) = self.routes.iter().find(|r| (r.filter)(&data)) else {
            return RouteOutcome::NoMatch;
        };
        match (route.invoke)(session, data).await {
            Ok(output) => RouteOutcome::Output(output),
            Err(e) => RouteOutcome::Failed(e),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .finish()
    }
}

/// Wrap a handler stream so a panic while polling becomes a final error
/// item.
fn isolate(output: InvokeOutput) -> RouteOutput {
    match output {
        InvokeOutput::Value(v) => RouteOutput::Value(v),
        InvokeOutput::Stream(stream) => RouteOutput::Stream(
            AssertUnwindSafe(stream)
                .catch_unwind()
                .map(|item| match item {
                    Ok(Ok(v)) => Ok(v),
                    Ok(Err(e)) => Err(e.to_response()),
                    Err(payload) => Err(panic_response(payload)),
                })
                .boxed(),
        ),
    }
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

fn panic_response(payload: Box<dyn Any + Send>) -> ErrorResponse {
    ErrorResponse::new(kind::PANIC_ERROR, panic_message(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::codec::FrameWriter;
    use crate::session::Session;
    use futures_util::stream;
    use monie_types::StreamMessage;
    use monie_types::request::keys;
    use serde::Deserialize;
    use serde_json::json;

    fn session() -> SessionHandle {
        let (client, _server) = tokio::io::duplex(64);
        Arc::new(
            Session::from_message(
                &StreamMessage::request("s1", json!({})),
                FrameWriter::new(client),
            )
            .unwrap(),
        )
    }

    #[derive(Deserialize)]
    struct Echo {
        text: String,
    }

    fn echo_router() -> Router {
        let mut router = Router::new();
        router.register_route(
            |data: &Value| data["type"] == "echo",
            |data: Value| {
                serde_json::from_value::<Echo>(data)
                    .map_err(|e| ErrorResponse::new(kind::DECODE_ERROR, e.to_string()))
            },
            |_session, req: Echo| async move { InvokeOutput::value(json!({"text": req.text})) },
        );
        router
    }

    #[tokio::test]
    async fn dispatch_first_matching_route() {
        let mut router = echo_router();
        router.register_route(
            |_: &Value| true,
            |data: Value| Ok(data),
            |_session, _data: Value| async { InvokeOutput::value("fallback") },
        );

        match router
            .dispatch(session(), json!({"type": "echo", "text": "hi"}))
            .await
        {
            RouteOutcome::Output(RouteOutput::Value(v)) => assert_eq!(v, json!({"text": "hi"})),
            other => panic!("unexpected {other:?}"),
        }
        match router.dispatch(session(), json!({"type": "other"})).await {
            RouteOutcome::Output(RouteOutput::Value(v)) => assert_eq!(v, json!("fallback")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_match() {
        let router = echo_router();
        assert!(matches!(
            router.dispatch(session(), json!({"type": "nope"})).await,
            RouteOutcome::NoMatch
        ));
    }

    #[tokio::test]
    async fn decode_error_is_reported() {
        let router = echo_router();
        match router.dispatch(session(), json!({"type": "echo"})).await {
            RouteOutcome::Failed(e) => assert_eq!(e.error_type, "DecodeError"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn typed_route_decodes_request() {
        let mut router = Router::new();
        router.register_typed(
            keys::INVOKE_TOOL,
            |session: SessionHandle, req: monie_types::request::ToolInvokeRequest| async move {
                InvokeOutput::value(json!({"tool": req.tool, "session": session.session_id()}))
            },
        );

        let data = json!({"type": "tool", "action": "invoke_tool", "provider": "p", "tool": "t"});
        match router.dispatch(session(), data).await {
            RouteOutcome::Output(RouteOutput::Value(v)) => {
                assert_eq!(v, json!({"tool": "t", "session": "s1"}))
            }
            other => panic!("unexpected {other:?}"),
        }

        let missing = json!({"type": "tool", "action": "invoke_tool"});
        match router.dispatch(session(), missing).await {
            RouteOutcome::Failed(e) => {
                assert_eq!(e.error_type, "DecodeError");
                assert!(e.message.starts_with("tool/invoke_tool"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_error_keeps_plugin_kind() {
        let mut router = Router::new();
        router.register_route(
            |_: &Value| true,
            |data: Value| Ok(data),
            |_session, _data: Value| async {
                Err::<InvokeOutput, _>(PluginError::NotFound("provider x".into()))
            },
        );
        match router.dispatch(session(), json!({})).await {
            RouteOutcome::Failed(e) => {
                assert_eq!(e.error_type, "NotFound");
                assert!(e.message.contains("provider x"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn panics_are_caught() {
        let mut router = Router::new();
        router.register_route(
            |data: &Value| data["where"] == "decoder",
            |_data: Value| -> Result<Value, ErrorResponse> { panic!("bad decoder") },
            |_session, _data: Value| async { InvokeOutput::value(1) },
        );
        router.register_route(
            |data: &Value| data["where"] == "handler",
            |data: Value| Ok(data),
            |_session, _data: Value| async {
                if true {
                    panic!("bad handler");
                }
                InvokeOutput::value(1)
            },
        );

        for (place, msg) in [("decoder", "bad decoder"), ("handler", "bad handler")] {
            match router.dispatch(session(), json!({"where": place})).await {
                RouteOutcome::Failed(e) => {
                    assert_eq!(e.error_type, "PanicError");
                    assert_eq!(e.message, msg);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn stream_panic_ends_with_error_item() {
        let mut router = Router::new();
        router.register_route(
            |_: &Value| true,
            |data: Value| Ok(data),
            |_session, _data: Value| async {
                let items = stream::iter(0..3).map(|i| {
                    if i == 1 {
                        panic!("chunk {i}");
                    }
                    Ok(json!(i))
                });
                Ok(InvokeOutput::stream(items))
            },
        );

        let RouteOutcome::Output(RouteOutput::Stream(s)) = router.dispatch(session(), json!({})).await
        else {
            panic!("expected stream");
        };
        let items: Vec<_> = s.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok(json!(0)));
        let err = items[1].clone().unwrap_err();
        assert_eq!(err.error_type, "PanicError");
        assert_eq!(err.message, "chunk 1");
    }

    #[test]
    fn panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42)), "non-string panic payload");
    }
}
