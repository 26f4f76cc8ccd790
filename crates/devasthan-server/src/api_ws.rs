//! Live event WebSocket endpoint.
//!
//! Every connection becomes one hub observer. Inbound frames are read only
//! to notice the close; their content is ignored. When the hub drops the
//! observer the read side stops too, releasing the socket.

use crate::hub::{DeliveryError, ObserverId, ObserverSink};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        ConnectInfo, Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};

impl ObserverSink for SplitSink<WebSocket, AxumMessage> {
    async fn deliver(&mut self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.send(AxumMessage::Text(payload.to_string().into()))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.send(AxumMessage::Close(None)).await;
    }
}

/// Handler for `GET /ws/live`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let id = state.hub.reserve().await;
    tracing::debug!(observer_id = %id, remote_addr = %addr, "websocket upgrade requested");

    let failed_hub = state.hub.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(observer_id = %id, remote_addr = %addr, "websocket upgrade failed: {}", e);
        tokio::spawn(async move {
            failed_hub.disconnect(id).await;
        });
    })
    .on_upgrade(move |socket| handle_socket(socket, state, id, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, id: ObserverId, addr: SocketAddr) {
    let (sender, mut receiver) = socket.split();

    let Some(notice) = state.hub.attach(id, sender).await else {
        return;
    };
    tracing::info!(observer_id = %id, remote_addr = %addr, "live observer attached");

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(AxumMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(observer_id = %id, "websocket read error: {}", e);
                    break;
                }
            },
            () = notice.removed() => {
                tracing::debug!(observer_id = %id, "hub dropped observer, closing read side");
                break;
            }
        }
    }

    state.hub.disconnect(id).await;
    tracing::info!(observer_id = %id, remote_addr = %addr, "live observer left");
}
