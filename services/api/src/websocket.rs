use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

use civisure_auth::{Identity, MaybeUser};

use crate::broadcast::AlertEvent;
use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 64;

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinAdmin,
    LeaveAdmin,
}

/// Control frames sent by the server. Alert events use [`AlertEvent`]'s own encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerFrame {
    Joined,
    Left,
    Error { message: String },
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, identity, state))
}

fn encode<T: Serialize>(frame: &T) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!("Failed to encode websocket frame: {}", e);
            None
        }
    }
}

fn send_control(outbound: &mpsc::Sender<Message>, frame: ServerFrame) {
    if let Some(message) = encode(&frame) {
        if outbound.try_send(message).is_err() {
            tracing::debug!("Dropped control frame for a saturated connection");
        }
    }
}

// Relays hub events to one connection. A full outbound buffer drops the event for that connection only.
fn spawn_forwarder(
    connection_id: String,
    events: broadcast::Receiver<AlertEvent>,
    outbound: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = BroadcastStream::new(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let Some(message) = encode(&event) else { continue };
                    match outbound.try_send(message) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!("Observer {} is not keeping up; alert event dropped", connection_id);
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("Observer {} lagged behind by {} alert events", connection_id, skipped);
                }
            }
        }
    })
}

async fn handle_websocket(socket: WebSocket, identity: Option<Identity>, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    tracing::debug!("WebSocket connection {} opened", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut forwarder: Option<JoinHandle<()>> = None;

    // Pings are answered by the protocol layer while we read.
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::JoinAdmin) => match identity.as_ref() {
                    Some(user) if user.is_admin() => {
                        if forwarder.is_none() {
                            let events = state.hub.join(&connection_id, user.user_id, &user.email);
                            forwarder = Some(spawn_forwarder(
                                connection_id.clone(),
                                events,
                                outbound.clone(),
                            ));
                        }
                        send_control(&outbound, ServerFrame::Joined);
                    }
                    _ => send_control(
                        &outbound,
                        ServerFrame::Error {
                            message: "Admin access required".to_string(),
                        },
                    ),
                },
                Ok(ClientFrame::LeaveAdmin) => {
                    if let Some(task) = forwarder.take() {
                        task.abort();
                        state.hub.leave(&connection_id);
                    }
                    send_control(&outbound, ServerFrame::Left);
                }
                Err(e) => {
                    tracing::debug!("Unrecognised websocket frame on {}: {}", connection_id, e);
                    send_control(
                        &outbound,
                        ServerFrame::Error {
                            message: "Unrecognised message".to_string(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    if let Some(task) = forwarder.take() {
        task.abort();
    }
    state.hub.leave(&connection_id);
    drop(outbound);
    let _ = writer.await;

    tracing::debug!("WebSocket connection {} closed", connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frames_are_kebab_case() {
        let frame: ClientFrame = serde_json::from_value(json!({"type": "join-admin"})).unwrap();
        assert_eq!(frame, ClientFrame::JoinAdmin);

        let frame: ClientFrame = serde_json::from_value(json!({"type": "leave-admin"})).unwrap();
        assert_eq!(frame, ClientFrame::LeaveAdmin);

        assert!(serde_json::from_value::<ClientFrame>(json!({"type": "shout"})).is_err());
    }

    #[test]
    fn control_frames_share_the_event_envelope() {
        assert_eq!(serde_json::to_value(ServerFrame::Joined).unwrap(), json!({"event": "joined"}));
        assert_eq!(
            serde_json::to_value(ServerFrame::Error {
                message: "Admin access required".into()
            })
            .unwrap(),
            json!({"event": "error", "data": {"message": "Admin access required"}})
        );
    }

    #[tokio::test]
    async fn forwarder_relays_hub_events() {
        use crate::broadcast::{AlertPublisher, AlertStatusPayload, BroadcastHub};
        use civisure_common::SosStatus;

        let hub = BroadcastHub::new(8);
        let (outbound, mut outbound_rx) = mpsc::channel(4);
        let task = spawn_forwarder("conn-1".into(), hub.join("conn-1", 1, "admin@civisure.com"), outbound);

        hub.publish(AlertEvent::StatusChanged(AlertStatusPayload {
            id: 7,
            status: SosStatus::Responded,
            resolved_at: None,
        }));

        let Some(Message::Text(text)) = outbound_rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "sos-updated");
        assert_eq!(value["data"]["id"], 7);
        assert_eq!(value["data"]["status"], "responded");

        task.abort();
    }
}
