//! Viewer-facing websocket server.
//!
//! Serves the static viewer page on `/` and upgrades `/ws` connections.
//! Each connection registers a viewer sink with the broadcast hub, runs the
//! initial-connection flow (switch to the default expiry, then `config` /
//! `index` / `future` frames to that viewer only), and loops on inbound
//! messages until the peer disconnects.
//!
//! The per-viewer sink is a bounded outbound channel drained by the
//! socket's writer half: a stalled client backs up its own channel and
//! trips the hub's delivery timeout instead of blocking anyone else.

mod messages;

pub use messages::{ClientMessage, Frame};

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::app::EngineState;
use crate::error::{Error, Result};
use crate::hub::{BroadcastHub, ViewerSink};
use crate::rebalance::RebalanceHandle;

/// Outbound frames buffered per viewer before its deliveries start timing
/// out.
const OUTBOUND_BUFFER: usize = 64;

/// Everything the handlers need.
pub struct ServerContext {
    pub state: Arc<EngineState>,
    pub hub: Arc<BroadcastHub>,
    pub rebalance: RebalanceHandle,
    pub static_page: PathBuf,
    /// Flips to `true` when shutdown begins; open connections must release
    /// promptly rather than wait for the peer to hang up.
    pub shutdown: watch::Receiver<bool>,
}

/// Build the viewer-facing router.
pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/ws", get(ws_upgrade))
        .with_state(ctx)
}

/// Bind and serve until the context's shutdown flag flips.
pub async fn serve(ctx: Arc<ServerContext>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "viewer server listening");
    let mut shutdown = ctx.shutdown.clone();
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

async fn index_page(State(ctx): State<Arc<ServerContext>>) -> impl IntoResponse {
    match tokio::fs::read_to_string(&ctx.static_page).await {
        Ok(page) => Html(page),
        Err(e) => {
            warn!(path = ?ctx.static_page, error = %e, "failed to read viewer page");
            Html("<h1>spreadcast</h1><p>viewer page not found</p>".to_string())
        }
    }
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<ServerContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Viewer sink backed by the connection's bounded outbound channel.
struct ChannelViewer {
    tx: mpsc::Sender<String>,
}

#[async_trait::async_trait]
impl ViewerSink for ChannelViewer {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.tx
            .send(text.to_string())
            .await
            .map_err(|_| Error::Connection("viewer outbound channel closed".into()))
    }
}

async fn handle_socket(socket: WebSocket, ctx: Arc<ServerContext>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let sink = Arc::new(ChannelViewer { tx: out_tx });
    let viewer = ctx.hub.register(sink.clone());
    info!(viewer = %viewer, viewers = ctx.hub.viewer_count(), "viewer connected");

    // Initial-connection flow: default-expiry switch, then this viewer's
    // config and snapshot frames.
    send_viewer_state(&ctx, sink.as_ref(), None).await;

    let mut shutdown = ctx.shutdown.clone();
    loop {
        let received = tokio::select! {
            received = ws_rx.next() => match received {
                Some(received) => received,
                None => break,
            },
            _ = shutdown.wait_for(|stop| *stop) => break,
        };
        let message = match received {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&message) {
            Ok(ClientMessage::ChangeDate { date }) => {
                let target = if date.is_empty() {
                    None
                } else {
                    match date.parse() {
                        Ok(parsed) => Some(parsed),
                        Err(e) => {
                            warn!(viewer = %viewer, date = %date, error = %e, "ignoring unparseable change_date");
                            continue;
                        }
                    }
                };
                info!(viewer = %viewer, date = %date, "viewer requested expiry switch");
                send_viewer_state(&ctx, sink.as_ref(), target).await;
            }
            Ok(ClientMessage::Unknown) => debug!(viewer = %viewer, "ignoring unknown client message"),
            Err(e) => warn!(viewer = %viewer, error = %e, "ignoring malformed client message"),
        }
    }

    ctx.hub.unregister(viewer);
    drop(sink);
    let _ = writer.await;
    info!(viewer = %viewer, viewers = ctx.hub.viewer_count(), "viewer disconnected");
}

/// Run a switch for `target` and send the resulting `config` plus the
/// current index/future snapshot to this viewer only.
///
/// A failed switch still sends the last-known-good state so the viewer is
/// not left blank; the failure is logged and the viewer may retry.
async fn send_viewer_state(
    ctx: &ServerContext,
    sink: &dyn ViewerSink,
    target: Option<crate::domain::ExpiryDate>,
) {
    if let Err(e) = ctx.rebalance.switch(target).await {
        warn!(error = %e, "switch failed; sending last published state");
    }

    let subscription = ctx.state.subscription();
    let snapshot = ctx.state.snapshot();
    let frames = [
        Frame::config(&subscription),
        Frame::index(&snapshot.index),
        Frame::future(&snapshot.future),
    ];
    for frame in &frames {
        match serde_json::to_string(frame) {
            Ok(text) => {
                if sink.send_text(&text).await.is_err() {
                    // Connection already going away; the receive loop will
                    // notice and unregister.
                    return;
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize viewer frame"),
        }
    }
}
