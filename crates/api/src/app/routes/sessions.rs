//! Session endpoints: ticket creation, WebSocket attach, transcript readback.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Extension, Path, Query, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use netops_core::SessionId;
use netops_session::{ClientFrame, SessionTransport};

use crate::app::errors::session_error_to_response;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    device_id: netops_core::DeviceId,
}

/// POST /sessions
pub async fn create_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateSessionRequest>,
) -> axum::response::Response {
    match services
        .broker
        .create_session(body.device_id, principal.principal())
        .await
    {
        Ok(ticket) => (StatusCode::CREATED, Json(ticket)).into_response(),
        Err(err) => session_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct AttachQuery {
    key: String,
}

/// GET /ws/sessions/:id?key=...
pub async fn attach_ws(
    ws: WebSocketUpgrade,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SessionId>,
    Query(query): Query<AttachQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| attach(socket, services, principal, id, query.key))
}

async fn attach(
    socket: WebSocket,
    services: Arc<AppServices>,
    principal: PrincipalContext,
    session_id: SessionId,
    key: String,
) {
    let (transport, client_tx, mut server_rx) = SessionTransport::pair(64);

    let broker = Arc::clone(&services.broker);
    let session = tokio::spawn(async move {
        broker
            .attach(session_id, &key, transport, principal.principal())
            .await
    });

    let (mut sink, mut source) = {
        use futures::StreamExt;
        socket.split()
    };

    let reader = tokio::spawn(async move {
        use futures::StreamExt;
        while let Some(Ok(message)) = source.next().await {
            match message {
                Message::Text(text) => {
                    // Unparseable frames are dropped, matching the lenient
                    // terminal clients in the wild.
                    let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                        continue;
                    };
                    if client_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        // Dropping the sender tells the broker the client hung up.
    });

    {
        use futures::SinkExt;
        while let Some(frame) = server_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    }

    reader.abort();
    match session.await {
        Ok(Ok(())) => debug!(session = %session_id, "session detached cleanly"),
        Ok(Err(err)) => debug!(session = %session_id, error = %err, "session ended with error"),
        Err(_) => debug!(session = %session_id, "session task aborted"),
    }
}

/// GET /sessions/:id/log
pub async fn session_log(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SessionId>,
) -> axum::response::Response {
    match services.broker.session_log(id, principal.principal()) {
        Ok((session, log)) => Json(serde_json::json!({
            "session": session,
            "log": log,
        }))
        .into_response(),
        Err(err) => session_error_to_response(err),
    }
}
