//! WebSocket transport for the price stream.
//!
//! Each accepted socket gets a bounded outbound queue registered with the
//! gateway, a writer task draining that queue, and a reader task watching for
//! the client closing. The connection ends when either task finishes or the
//! server shuts down.

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ChannelSink, SharedGateway};

/// Query parameters accepted on the stream endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated symbol allow-list.
    pub symbols: Option<String>,
}

/// State shared by stream connections.
#[derive(Clone)]
pub struct GatewayState {
    gateway: SharedGateway,
    client_buffer: usize,
    cancel: CancellationToken,
}

/// Build the router serving the price stream at `path`.
pub fn router(
    gateway: SharedGateway,
    path: &str,
    client_buffer: usize,
    cancel: CancellationToken,
) -> Router {
    let state = GatewayState {
        gateway,
        client_buffer: client_buffer.max(1),
        cancel,
    };
    Router::new()
        .route(path, get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

async fn handle_socket(socket: WebSocket, query: StreamQuery, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(state.client_buffer);

    let id = state
        .gateway
        .handle_connection(Arc::new(ChannelSink::new(tx)), query.symbols.as_deref());

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(String::from(&*payload).into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                // Inbound text is ignored; pings are answered by axum.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        () = state.cancel.cancelled() => {
            send_task.abort();
            recv_task.abort();
        }
    }

    state.gateway.handle_disconnect(id);
}
