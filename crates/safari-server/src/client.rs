use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use safari_core::ids::ObserverId;

/// Missed heartbeats tolerated before the connection is dropped.
const MISSED_PONGS: u64 = 3;

/// Seconds since the last pong from the peer.
struct Liveness {
    last_pong: AtomicU64,
}

impl Liveness {
    fn new() -> Self {
        Self {
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs().max(1)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Pump one observer socket until either side goes away.
///
/// `rx` carries serialized events for this observer; text frames from the
/// peer go to `on_message` in arrival order.
pub async fn handle_ws_connection(
    socket: WebSocket,
    observer_id: ObserverId,
    mut rx: mpsc::Receiver<String>,
    heartbeat: Duration,
    on_message: mpsc::Sender<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let liveness = Arc::new(Liveness::new());

    let writer_id = observer_id.clone();
    let writer_liveness = Arc::clone(&liveness);
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !writer_liveness.is_alive(heartbeat * MISSED_PONGS as u32) {
                        tracing::info!(observer_id = %writer_id, "observer stopped answering pings");
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(observer_id = %writer_id, "sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_liveness = Arc::clone(&liveness);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if on_message.send(text.to_string()).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => reader_liveness.record_pong(),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    tracing::debug!(observer_id = %observer_id, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_alive() {
        let liveness = Liveness::new();
        assert!(liveness.is_alive(Duration::from_secs(90)));
    }

    #[test]
    fn stale_pong_is_dead() {
        let liveness = Liveness::new();
        liveness.last_pong.store(0, Ordering::Relaxed);
        assert!(!liveness.is_alive(Duration::from_secs(90)));
        liveness.record_pong();
        assert!(liveness.is_alive(Duration::from_secs(90)));
    }
}
