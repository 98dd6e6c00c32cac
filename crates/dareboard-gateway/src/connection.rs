use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dareboard_core::Social;
use dareboard_types::api::Claims;
use dareboard_types::events::{ChangeNotice, GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// Live query over a WebSocket: Identify, then a full snapshot now and after
/// every change that touches this user.
pub async fn handle_connection(
    socket: WebSocket,
    social: Social,
    dispatcher: Dispatcher,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} connected to gateway", user_id);

    if send_event(&mut sender, &GatewayEvent::Ready { user_id }).await.is_err() {
        return;
    }
    // Subscribe before the first snapshot so no commit falls in between.
    let changes = dispatcher.subscribe();
    if push_snapshot(&mut sender, &social, user_id).await.is_err() {
        return;
    }

    run_connection_loop(sender, receiver, social, changes, user_id).await;

    info!("{} disconnected from gateway", user_id);
}

async fn run_connection_loop(
    mut sender: WsSender,
    mut receiver: WsReceiver,
    social: Social,
    mut changes: broadcast::Receiver<ChangeNotice>,
    user_id: Uuid,
) {
    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<()>();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward snapshots -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = changes.recv() => {
                    match result {
                        Ok(notice) if notice.touches(user_id) => {}
                        Ok(_) => continue,
                        // Missed notices may have touched us; resync.
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Change receiver for {} lagged by {} notices", user_id, n);
                        }
                        Err(_) => break,
                    }
                    if push_snapshot(&mut sender, &social, user_id).await.is_err() {
                        break;
                    }
                }
                request = refresh_rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                    if push_snapshot(&mut sender, &social, user_id).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Refresh) => {
                        if refresh_tx.send(()).is_err() {
                            break;
                        }
                    }
                    Ok(GatewayCommand::Identify { .. }) => {} // Already handled
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(receiver: &mut WsReceiver, jwt_secret: &str) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return decode_identity(&token, jwt_secret);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

/// Profile id carried by a valid token.
pub fn decode_identity(token: &str, jwt_secret: &str) -> Option<Uuid> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

/// Recompute the user's snapshot off the async runtime and send it.
async fn push_snapshot(sender: &mut WsSender, social: &Social, user_id: Uuid) -> Result<(), ()> {
    let social = social.clone();
    let snapshot = tokio::task::spawn_blocking(move || social.snapshot(user_id))
        .await
        .map_err(|e| error!("spawn_blocking join error: {}", e))?
        .map_err(|e| error!("Snapshot for {} failed: {}", user_id, e))?;

    debug!(
        "Snapshot for {}: {} friends, {} incoming challenges",
        user_id,
        snapshot.friends.len(),
        snapshot.incoming_challenges.len()
    );
    send_event(sender, &GatewayEvent::Snapshot(snapshot)).await
}

async fn send_event(sender: &mut WsSender, event: &GatewayEvent) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| error!("Event encode failed: {}", e))?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: Uuid, exp: i64) -> String {
        let claims = Claims {
            sub,
            exp: exp as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn identity_requires_matching_secret_and_fresh_token() {
        let user = Uuid::new_v4();
        let later = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let earlier = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp();

        assert_eq!(decode_identity(&token("s3cret", user, later), "s3cret"), Some(user));
        assert_eq!(decode_identity(&token("other", user, later), "s3cret"), None);
        assert_eq!(decode_identity(&token("s3cret", user, earlier), "s3cret"), None);
        assert_eq!(decode_identity("not-a-jwt", "s3cret"), None);
    }
}
