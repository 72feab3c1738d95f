//! Live job lifecycle stream over WebSocket.
//!
//! The client's first frame selects what it wants to see:
//! `{"subscribe": {"queues": ["snmp-polling"], "job_id": "..."}}`
//! (both fields optional; an empty subscription means everything). After
//! that the server pushes QueueEvent envelopes as JSON text frames.

use std::sync::Arc;

use axum::{
    extract::{
        Extension, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use netops_events::SubscriptionFilter;

use crate::app::services::AppServices;

#[derive(Debug, Default, Deserialize)]
struct SubscribeFrame {
    #[serde(default)]
    subscribe: SubscribeBody,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeBody {
    queues: Option<Vec<String>>,
    job_id: Option<String>,
}

impl SubscribeBody {
    fn filter(self) -> SubscriptionFilter {
        let mut filter = match self.queues {
            Some(queues) => SubscriptionFilter::for_queues(queues),
            None => SubscriptionFilter::all(),
        };
        filter.job_id = self.job_id;
        filter
    }
}

pub async fn queue_events_ws(
    ws: WebSocketUpgrade,
    Extension(services): Extension<Arc<AppServices>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, services))
}

async fn stream_events(mut socket: WebSocket, services: Arc<AppServices>) {
    // First frame picks the subscription; a close or garbage ends it here.
    let filter = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<SubscribeFrame>(&text) {
                    Ok(frame) => break frame.subscribe.filter(),
                    Err(_) => {
                        let _ = socket.close().await;
                        return;
                    }
                }
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => return,
        }
    };

    let mut events = services.bridge.subscribe(filter);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => {
                // Nothing further is expected from the client except close.
                match frame {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => continue,
                }
            }
        }
    }
    debug!("queue event stream ended");
}
