// WebSocket handlers: metric streams and terminal relay

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, future, stream};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::error::GatewayError;
use crate::monitor::Subscription;
use crate::worker::ConnectionKind;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_container_stats(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let _guard = state.connections.track(ConnectionKind::Stats);
        tracing::info!(container_id = %id, "Client connected to container stats stream");
        let subscription = state.gateway.subscribe_container(&id);
        if let Err(e) = stream_metrics(socket, subscription).await {
            tracing::info!(container_id = %id, "Container stats stream error: {}", e);
        }
    })
}

pub(super) async fn ws_system_stats(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let _guard = state.connections.track(ConnectionKind::Stats);
        tracing::info!("Client connected to system stats stream");
        let subscription = state.gateway.subscribe_system();
        if let Err(e) = stream_metrics(socket, subscription).await {
            tracing::info!("System stats stream error: {}", e);
        }
    })
}

/// Send a text frame; false when the peer is gone or too slow.
async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(text.into()))).await;
    matches!(r, Ok(Ok(())))
}

fn error_frame(e: &GatewayError) -> anyhow::Result<String> {
    let frame = serde_json::json!({
        "type": "error",
        "kind": e.kind(),
        "message": e.to_string(),
    });
    Ok(serde_json::to_string(&frame)?)
}

/// Forward a subscription to the socket until either ends. Dropping the
/// subscription on return is what unsubscribes it.
async fn stream_metrics(
    mut socket: WebSocket,
    mut subscription: Subscription,
) -> anyhow::Result<()> {
    let first_ping = tokio::time::Instant::now() + WS_PING_INTERVAL;
    let mut ping_interval = tokio::time::interval_at(first_ping, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            event = subscription.recv() => {
                match event {
                    Some(Ok(metrics)) => {
                        let frame = serde_json::json!({ "type": "stats", "data": metrics });
                        if !send_text(&mut socket, serde_json::to_string(&frame)?).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::info!(
                            target_entity = %subscription.target(),
                            error = %e,
                            "stats stream ended with error"
                        );
                        let _ = send_text(&mut socket, error_frame(&e)?).await;
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    None => {
                        // Unsubscribed elsewhere; the stream ended without a cause.
                        let _ = send_text(&mut socket, error_frame(&GatewayError::Closed)?).await;
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    tracing::info!(target_entity = %subscription.target(), "Client disconnected from stats stream");
    Ok(())
}

pub(super) async fn ws_terminal(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let _guard = state.connections.track(ConnectionKind::Terminal);
        if let Err(e) = relay_terminal(socket, state, id.clone()).await {
            tracing::info!(container_id = %id, "Terminal error: {}", e);
        }
    })
}

async fn relay_terminal(mut socket: WebSocket, state: AppState, id: String) -> anyhow::Result<()> {
    let pending = match state.gateway.open_terminal(&id).await {
        Ok(p) => p,
        Err(e) => {
            let _ = send_text(&mut socket, error_frame(&e)?).await;
            let _ = socket.send(Message::Close(None)).await;
            return Err(e.into());
        }
    };

    let (sink, frames) = socket.split();
    // Binary and text frames are shell input; a close frame ends the input side.
    let client_rx = Box::pin(stream::unfold(frames, |mut frames| async move {
        loop {
            match frames.next().await {
                Some(Ok(Message::Binary(b))) => return Some((Ok(b), frames)),
                Some(Ok(Message::Text(t))) => {
                    return Some((Ok(Bytes::copy_from_slice(t.as_str().as_bytes())), frames));
                }
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some((Err(e), frames)),
            }
        }
    }));
    let client_tx =
        sink.with(|chunk: Bytes| future::ready(Ok::<_, axum::Error>(Message::Binary(chunk))));

    let session = pending
        .with_send_timeout(WS_SEND_TIMEOUT)
        .bind(client_rx, client_tx);
    tracing::info!(container_id = %id, session = session.id(), "Client attached to terminal");
    session.wait().await?;
    Ok(())
}
