//! WebSocket viewer endpoint
//!
//! Each viewer connection becomes one registry consumer. Frames go out as
//! binary messages; inbound messages are only watched for disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::time;

use crate::capture::FrameSource;
use crate::delivery::Transport;
use crate::error::TransportError;
use crate::media::Transcoder;
use crate::registry::{CameraKey, SessionRegistry, SourceDescriptor};

/// Body of `GET /`
pub const SERVICE_MESSAGE: &str = "Camera relay WebSocket API";

/// Query parameters of `GET /ws`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ViewerParams {
    /// Camera key frames are relayed for
    pub camera_index: String,
    /// Upstream locator, used if the camera has no session yet
    pub rtsp: String,
}

/// Shared handler state
pub(super) struct AppState<S: FrameSource, T: Transcoder> {
    pub(super) registry: Arc<SessionRegistry<S, T>>,
    pub(super) session_timeout: Option<Duration>,
}

impl<S: FrameSource, T: Transcoder> Clone for AppState<S, T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            session_timeout: self.session_timeout,
        }
    }
}

/// Outbound half of a viewer socket
pub struct WsTransport {
    sink: SplitSink<WebSocket, Message>,
}

impl WsTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

impl Transport for WsTransport {
    async fn send_frame(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.sink
            .send(Message::Binary(payload))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        // The peer may already be gone
        let _ = self.sink.close().await;
    }
}

pub(super) async fn index() -> impl IntoResponse {
    Json(json!({ "message": SERVICE_MESSAGE }))
}

pub(super) async fn viewer<S: FrameSource, T: Transcoder>(
    ws: WebSocketUpgrade,
    Query(params): Query<ViewerParams>,
    State(state): State<AppState<S, T>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_viewer(socket, params, state))
}

async fn serve_viewer<S: FrameSource, T: Transcoder>(
    socket: WebSocket,
    params: ViewerParams,
    state: AppState<S, T>,
) {
    let (sink, inbound) = socket.split();
    let key = CameraKey::new(params.camera_index);
    let descriptor = SourceDescriptor::new(params.rtsp);

    let id = match state
        .registry
        .attach_consumer(key.clone(), descriptor, WsTransport::new(sink))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(camera = %key, error = %e, "Viewer rejected");
            return;
        }
    };

    match state.session_timeout {
        Some(limit) => {
            if time::timeout(limit, disconnected(inbound)).await.is_err() {
                tracing::info!(camera = %key, consumer = %id, "Viewer session timed out");
            }
        }
        None => disconnected(inbound).await,
    }

    // Closes the outbound half too
    state.registry.detach_consumer(&key, id).await;
}

/// Resolve once the viewer closes or breaks the socket
async fn disconnected(mut inbound: SplitStream<WebSocket>) {
    while let Some(message) = inbound.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
