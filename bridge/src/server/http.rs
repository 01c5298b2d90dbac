//! HTTP bridge server.
//!
//! Exposes the engine over a small HTTP API: `/ready` for liveness,
//! `/talk` to synthesize and stream audio, `/stop` to cancel, `/params`
//! for the parameter/cast snapshot (and `/debug` in debug builds). Every
//! request is translated into a queued message; `503` means the engine
//! cannot accept the request right now.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::message::{Message, TalkServer};
use super::ServerError;
use crate::talk::params::is_param_name;
use crate::talk::{json, TalkParams};
use crate::utils::encoding;

/// Build the bridge router over a shared [`TalkServer`].
pub fn router(server: Arc<TalkServer>) -> Router {
    let max_threads = server.settings().max_threads;

    let router = Router::new()
        .route("/ready", get(get_ready))
        .route("/talk", get(get_talk))
        .route("/stop", get(get_stop))
        .route("/params", get(get_params));

    #[cfg(debug_assertions)]
    let router = router.route("/debug", get(get_debug));

    router
        .layer(ConcurrencyLimitLayer::new(max_threads))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Serve on an already-bound listener until the task is dropped.
pub async fn serve(server: Arc<TalkServer>, listener: TcpListener) -> std::io::Result<()> {
    let app = router(server);
    axum::serve(listener, app).await
}

/// A background HTTP server with its own runtime thread.
///
/// This is the shape the injected hook uses: the host process has no async
/// runtime of its own, so the bridge brings one and keeps it off the
/// engine thread.
pub struct HttpServerHandle {
    addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl HttpServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Shut the server down and join its runtime thread.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HttpServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind the configured port and serve in the background.
///
/// A failed bind propagates and leaves the server stopped.
pub fn start(server: Arc<TalkServer>) -> Result<HttpServerHandle, ServerError> {
    let port = server.settings().port;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let listener = runtime.block_on(TcpListener::bind(("127.0.0.1", port)))?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let app = router(server);

    let thread = std::thread::Builder::new()
        .name("talkbridge-http".into())
        .spawn(move || {
            runtime.block_on(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "HTTP server terminated");
                }
            });
        })?;

    info!(%addr, "bridge server listening");
    Ok(HttpServerHandle {
        addr,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

async fn get_ready(State(server): State<Arc<TalkServer>>) -> Response {
    text(
        StatusCode::OK,
        if server.engine_ready() { "1" } else { "0" },
    )
}

async fn get_talk(
    State(server): State<Arc<TalkServer>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut params = TalkParams::new();
    let mut text_arg: Option<&str> = None;

    for (key, value) in &query {
        if key == "text" {
            text_arg = Some(value.as_str());
            continue;
        }
        match value.parse::<f32>() {
            Ok(v) => {
                // set_by_name ignores unrecognized keys.
                params.set_by_name(key, v);
            }
            Err(_) if is_param_name(key) => {
                return text(StatusCode::BAD_REQUEST, "malformed parameter value");
            }
            Err(_) => {}
        }
    }

    let Some(utterance) = text_arg.filter(|t| !t.is_empty()) else {
        return text(StatusCode::BAD_REQUEST, "missing text");
    };

    let (message, frames) = Message::talk(params, encoding::utf8_to_ansi(utterance));
    if server.add_message(message.clone()).is_err() {
        return text(StatusCode::SERVICE_UNAVAILABLE, "queue full");
    }
    if !message.wait().await {
        return text(StatusCode::SERVICE_UNAVAILABLE, "engine did not accept the talk");
    }

    let stream = UnboundedReceiverStream::new(frames).map(Ok::<_, Infallible>);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "response build failed"))
}

async fn get_stop(State(server): State<Arc<TalkServer>>) -> Response {
    let message = Message::stop();
    if server.add_message(message.clone()).is_err() {
        return text(StatusCode::SERVICE_UNAVAILABLE, "queue full");
    }
    if !message.wait().await {
        return text(StatusCode::SERVICE_UNAVAILABLE, "engine did not answer");
    }
    text(StatusCode::OK, "ok")
}

async fn get_params(State(server): State<Arc<TalkServer>>) -> Response {
    let message = Message::get_params();
    if server.add_message(message.clone()).is_err() {
        return text(StatusCode::SERVICE_UNAVAILABLE, "queue full");
    }
    if !message.wait().await {
        return text(StatusCode::SERVICE_UNAVAILABLE, "engine did not answer");
    }
    let Some(reply) = message.take_params_reply() else {
        return text(StatusCode::INTERNAL_SERVER_ERROR, "no parameter snapshot");
    };

    let doc = json::params_reply_to_json(&reply.params, &reply.casts);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        doc.to_string(),
    )
        .into_response()
}

#[cfg(debug_assertions)]
async fn get_debug(State(server): State<Arc<TalkServer>>) -> Response {
    let message = Message::debug();
    if server.add_message(message.clone()).is_err() {
        return text(StatusCode::SERVICE_UNAVAILABLE, "queue full");
    }
    if !message.wait().await {
        return text(StatusCode::SERVICE_UNAVAILABLE, "engine did not answer");
    }
    text(StatusCode::OK, "ok")
}
