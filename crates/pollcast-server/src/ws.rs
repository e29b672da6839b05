//! Realtime channel: viewers join poll rooms and receive `voteUpdated`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use pollcast_core::PollId;
use pollcast_store::StateStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::broadcast::{Broadcaster, ServerEvent};
use crate::rooms::ConnectionId;
use crate::AppState;

/// Frame sent by a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Start receiving updates for a poll.
    JoinPoll {
        /// Poll to watch.
        #[serde(rename = "pollId")]
        poll_id: String,
    },
    /// Stop receiving updates for a poll.
    LeavePoll {
        /// Poll to stop watching.
        #[serde(rename = "pollId")]
        poll_id: String,
    },
}

pub async fn ws_handler<S: StateStore + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    let hub = Arc::clone(&state.broadcaster);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Broadcaster>) {
    let (conn, mut events) = hub.connect();
    let (mut sink, mut stream) = socket.split();
    let (control_tx, mut control_rx) = mpsc::channel::<Message>(16);

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(event) = events.recv() => match serde_json::to_string(&event) {
                    Ok(text) => Message::Text(text),
                    Err(_) => continue,
                },
                Some(msg) = control_rx.recv() => msg,
                else => break,
            };
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let reader_hub = Arc::clone(&hub);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            let reply = match msg {
                Message::Text(text) => apply_client_frame(&reader_hub, conn, &text)
                    .and_then(|event| serde_json::to_string(&event).ok())
                    .map(Message::Text),
                Message::Binary(_) => serde_json::to_string(&error_event(
                    "Binary frames are not supported.",
                ))
                .ok()
                .map(Message::Text),
                // The transport answers pings on its own.
                Message::Ping(_) | Message::Pong(_) => None,
                Message::Close(_) => break,
            };

            if let Some(reply) = reply {
                if control_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(conn);
    debug!(conn = %conn, "socket closed");
}

/// Apply one text frame from `conn`. Returns an error event to send back
/// when the frame cannot be acted on.
pub(crate) fn apply_client_frame(
    hub: &Broadcaster,
    conn: ConnectionId,
    text: &str,
) -> Option<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(_) => return Some(error_event("Unrecognized message.")),
    };

    let (poll_id, join) = match &event {
        ClientEvent::JoinPoll { poll_id } => (poll_id, true),
        ClientEvent::LeavePoll { poll_id } => (poll_id, false),
    };
    let poll = match poll_id.parse::<PollId>() {
        Ok(poll) => poll,
        Err(e) => return Some(error_event(&e.to_string())),
    };

    if join {
        hub.rooms().join(poll, conn);
        debug!(conn = %conn, %poll, "joined room");
    } else {
        hub.rooms().leave(poll, conn);
        debug!(conn = %conn, %poll, "left room");
    }
    None
}

fn error_event(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_frames() {
        let hub = Broadcaster::new(4);
        let (conn, _rx) = hub.connect();
        let poll = PollId::generate();

        let join = format!(r#"{{"type":"joinPoll","pollId":"{poll}"}}"#);
        assert_eq!(apply_client_frame(&hub, conn, &join), None);
        assert_eq!(hub.rooms().members_of(poll), vec![conn]);

        let leave = format!(r#"{{"type":"leavePoll","pollId":"{poll}"}}"#);
        assert_eq!(apply_client_frame(&hub, conn, &leave), None);
        assert_eq!(hub.rooms().member_count(poll), 0);
    }

    #[test]
    fn malformed_poll_id_is_reported() {
        let hub = Broadcaster::new(4);
        let (conn, _rx) = hub.connect();

        let reply = apply_client_frame(&hub, conn, r#"{"type":"joinPoll","pollId":"nope"}"#);
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "Invalid poll ID.".into()
            })
        );
        assert_eq!(hub.rooms().room_count(), 0);
    }

    #[test]
    fn unknown_frames_are_reported() {
        let hub = Broadcaster::new(4);
        let (conn, _rx) = hub.connect();

        for frame in ["not json", r#"{"type":"vote","optionIndex":0}"#, r#"{"pollId":"x"}"#] {
            assert!(matches!(
                apply_client_frame(&hub, conn, frame),
                Some(ServerEvent::Error { .. })
            ));
        }
    }

    #[test]
    fn client_frames_parse() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"leavePoll","pollId":"abc"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::LeavePoll {
                poll_id: "abc".into()
            }
        );
    }
}
