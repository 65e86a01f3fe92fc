//! One desktop WebSocket connection: handshake, read loop, heartbeat.

use crate::auth::AuthUser;
use crate::http::state::AppState;
use crate::realtime::heartbeat::{Heartbeat, HeartbeatAction};
use crate::realtime::hub::{Outbound, RealtimeHub};
use crate::realtime::messages::{ClientMessage, ServerMessage, parse_client};
use crate::realtime::reconnect::AUTH_REJECTED_CLOSE_CODE;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, warn};

const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// What the session does in response to one client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Reply(ServerMessage),
    /// Bind the connection to a user and confirm.
    Identify(i64),
    Subscribe(Vec<String>),
    /// Liveness answer; nothing to send.
    Alive,
    Reject { code: u16, reason: &'static str },
}

/// `principal` is the authenticated user id, `None` when auth is off.
pub fn decide(text: &str, principal: Option<i64>) -> Decision {
    match parse_client(text) {
        Err(message) => Decision::Reply(ServerMessage::Error { message }),
        Ok(ClientMessage::Ping) => Decision::Reply(ServerMessage::Pong),
        Ok(ClientMessage::Pong) => Decision::Alive,
        Ok(ClientMessage::Identify { user_id }) => match principal {
            Some(p) if p != user_id => Decision::Reject {
                code: AUTH_REJECTED_CLOSE_CODE,
                reason: "identity mismatch",
            },
            _ => Decision::Identify(user_id),
        },
        Ok(ClientMessage::Subscribe { topics }) => Decision::Subscribe(topics),
    }
}

/// `GET /ws/desktop`. Authentication runs as an extractor, so a missing or
/// invalid credential is answered with 401 before any upgrade.
pub async fn desktop_ws(
    State(state): State<AppState>,
    user: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let principal = (!user.anonymous).then_some(user.user_id);
    let hub = Arc::clone(&state.hub);
    let interval = state.config.heartbeat_interval();
    ws.on_upgrade(move |socket| run_session(socket, hub, principal, interval))
}

fn to_message(frame: Outbound) -> Message {
    match frame {
        Outbound::Text(text) => Message::Text(text.into()),
        Outbound::Ping => Message::Ping(Bytes::new()),
        Outbound::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

pub async fn run_session(
    socket: WebSocket,
    hub: Arc<RealtimeHub>,
    principal: Option<i64>,
    heartbeat_every: Duration,
) {
    let (conn_id, mut outbound) = hub.register();
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let closing = matches!(frame, Outbound::Close { .. });
            if sink.send(to_message(frame)).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    hub.send_to(
        &conn_id,
        Outbound::Text(
            ServerMessage::Connected {
                connection_id: conn_id.clone(),
            }
            .to_json(),
        ),
    );
    info!(connection = %conn_id, user = ?principal, "desktop client connected");

    let mut heartbeat = Heartbeat::new();
    let mut ticker = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut terminated = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => match heartbeat.on_tick() {
                HeartbeatAction::SendPing => {
                    hub.send_to(&conn_id, Outbound::Ping);
                }
                HeartbeatAction::Terminate => {
                    warn!(connection = %conn_id, "heartbeat unanswered, terminating");
                    terminated = true;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(Message::Pong(_))) => heartbeat.on_pong(),
                Some(Ok(Message::Text(text))) => {
                    match decide(text.as_str(), principal) {
                        Decision::Reply(msg) => {
                            hub.send_to(&conn_id, Outbound::Text(msg.to_json()));
                        }
                        Decision::Identify(user_id) => {
                            hub.set_identity(&conn_id, user_id);
                            hub.send_to(
                                &conn_id,
                                Outbound::Text(ServerMessage::Identified { user_id }.to_json()),
                            );
                        }
                        Decision::Subscribe(topics) => {
                            hub.set_topics(&conn_id, topics.clone());
                            hub.send_to(
                                &conn_id,
                                Outbound::Text(ServerMessage::Subscribed { topics }.to_json()),
                            );
                        }
                        Decision::Alive => heartbeat.on_pong(),
                        Decision::Reject { code, reason } => {
                            warn!(connection = %conn_id, code, reason, "closing desktop client");
                            hub.send_to(
                                &conn_id,
                                Outbound::Close {
                                    code,
                                    reason: reason.to_string(),
                                },
                            );
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }

    // Dropping the registry entry closes the writer's queue.
    hub.unregister(&conn_id);
    if terminated {
        writer.abort();
    } else if timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!(connection = %conn_id, "writer did not drain in time");
    }
    info!(connection = %conn_id, "desktop client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_identity_is_rejected_with_4403() {
        assert_eq!(
            decide(r#"{"type":"identify","userId":2}"#, Some(1)),
            Decision::Reject {
                code: 4403,
                reason: "identity mismatch"
            }
        );
        assert_eq!(
            decide(r#"{"type":"identify","userId":1}"#, Some(1)),
            Decision::Identify(1)
        );
    }

    #[test]
    fn without_auth_any_identity_binds() {
        assert_eq!(
            decide(r#"{"type":"identify","userId":42}"#, None),
            Decision::Identify(42)
        );
    }

    #[test]
    fn ping_pong_and_garbage() {
        assert_eq!(
            decide(r#"{"type":"ping"}"#, None),
            Decision::Reply(ServerMessage::Pong)
        );
        assert_eq!(decide(r#"{"type":"pong"}"#, None), Decision::Alive);
        assert!(matches!(
            decide("{", None),
            Decision::Reply(ServerMessage::Error { .. })
        ));
    }
}
