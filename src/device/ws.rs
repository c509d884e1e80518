//! Device WebSocket channel.
//!
//! Every text or binary frame is echoed back unchanged. The text frame
//! `Trigger async` is the exception: instead of an echo, an out-of-band
//! `Async data` message is queued and delivered through the session's
//! outbound queue, the same path any server-initiated push takes.

use crate::logging::ws_session_span;
use crate::metrics::METRICS;
use crate::state::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

pub const WS_PATH: &str = "/ws";
pub const TRIGGER_ASYNC: &str = "Trigger async";
pub const ASYNC_DATA: &str = "Async data";

const OUTBOUND_QUEUE: usize = 32;

/// What to do with an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAction {
    Echo(Message),
    QueueAsync,
    Close,
    /// Control frames the transport already answered.
    Ignore,
}

pub fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
    }
}

pub fn classify(message: Message) -> FrameAction {
    match message {
        Message::Text(text) if text.as_str() == TRIGGER_ASYNC => FrameAction::QueueAsync,
        Message::Text(_) | Message::Binary(_) => FrameAction::Echo(message),
        Message::Close(_) => FrameAction::Close,
        Message::Ping(_) | Message::Pong(_) => FrameAction::Ignore,
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| {
        let session = Uuid::new_v4();
        handle_socket(socket, state).instrument(ws_session_span(&session.to_string()))
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let _connection = state.coordinator().connection_guard();
    METRICS.ws_sessions_active.inc();
    info!("handshake done, the new connection was opened");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(
        async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    debug!("send failed, closing writer: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        }
        .in_current_span(),
    );

    let shutdown = state.coordinator().token();
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("server shutting down, closing session");
                break;
            }
            frame = stream.next() => frame,
        };

        let message = match frame {
            None => break,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                crate::error::DiagnosticsError::from(e).track();
                warn!("receive failed, closing session");
                break;
            }
        };

        let kind = frame_kind(&message);
        METRICS.record_frame(kind);
        if let Message::Text(text) = &message {
            info!(len = text.len(), message = %text.as_str(), "got packet");
        } else {
            debug!(kind, "got frame");
        }

        match classify(message) {
            FrameAction::Echo(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            FrameAction::QueueAsync => {
                METRICS.ws_async_sends_total.inc();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Message::Text(ASYNC_DATA.into())).await;
                });
            }
            FrameAction::Close => break,
            FrameAction::Ignore => {}
        }
    }

    drop(tx);
    let _ = writer.await;
    METRICS.ws_sessions_active.dec();
    info!("connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_text_queues_async_send() {
        assert_eq!(
            classify(Message::Text(TRIGGER_ASYNC.into())),
            FrameAction::QueueAsync
        );
    }

    #[test]
    fn other_text_is_echoed() {
        let message = Message::Text("Trigger async ".into());
        assert_eq!(classify(message.clone()), FrameAction::Echo(message));
    }

    #[test]
    fn binary_is_echoed() {
        let message = Message::Binary(vec![1u8, 2, 3].into());
        assert_eq!(classify(message.clone()), FrameAction::Echo(message));
    }

    #[test]
    fn control_frames() {
        assert_eq!(classify(Message::Close(None)), FrameAction::Close);
        assert_eq!(classify(Message::Ping(Vec::<u8>::new().into())), FrameAction::Ignore);
        assert_eq!(frame_kind(&Message::Pong(Vec::<u8>::new().into())), "pong");
    }
}
