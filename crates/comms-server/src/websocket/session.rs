//! One accepted socket, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::service::CommsService;

/// Capacity of the per-socket writer channel.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// How long the writer gets to drain after the read side ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run a comms session for an upgraded socket.
///
/// 1. Opens a connection through the service
/// 2. Forwards writer-channel frames to the socket until the connection
///    closes, then drains and sends a Close frame
/// 3. Routes inbound text (and UTF-8 binary) frames to the service
/// 4. Closes the connection through the service when the socket ends
#[instrument(skip_all)]
pub async fn run_ws_session(ws: WebSocket, service: Arc<CommsService>) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let connection = service.open_connection(send_tx);
    let session = connection.session_id().clone();
    info!(%session, "comms client connected");

    let writer_conn = Arc::clone(&connection);
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                () = writer_conn.closed() => {
                    while let Ok(text) = send_rx.try_recv() {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = service.handle_frame(&connection, text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            let _ = service.handle_frame(&connection, text);
                        } else {
                            debug!(%session, len = data.len(), "ignoring non-UTF8 binary frame");
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(error)) => {
                        warn!(%session, %error, "comms.error");
                        break;
                    }
                }
            }
            () = connection.closed() => break,
        }
    }

    service.close_connection(&connection);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    info!(%session, "comms client disconnected");
}
