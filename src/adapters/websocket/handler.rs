//! Axum WebSocket upgrade handler and stats endpoint.
//!
//! Handles the HTTP → WebSocket upgrade and drives one connection:
//! 1. Authenticate the handshake token (401 before any upgrade)
//! 2. Upgrade and register with the gateway
//! 3. Start the socket writer, then replay queued notifications
//! 4. Pump the outbound queue and inbound frames until either side stops
//! 5. Wait for both pumps to stop, then tear down through the gateway

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::foundation::{AuthenticatedUser, ConnectionId};

use super::connection::Outbound;
use super::gateway::{ConnectionGateway, GatewayError, GatewayStats};

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=<jwt>`, or the token as `Authorization: Bearer`.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(gateway): State<Arc<ConnectionGateway>>,
) -> Response {
    if gateway.is_shutting_down() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Gateway is shutting down");
    }

    let token = params.token.or_else(|| bearer_token(&headers));
    let user = match gateway.authenticate(token.as_deref()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::info!(error = %e, "WebSocket handshake rejected");
            return error_response(StatusCode::UNAUTHORIZED, &e.to_string());
        }
    };

    let Some(ws) = ws else {
        return error_response(StatusCode::BAD_REQUEST, "Expected a WebSocket upgrade");
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user, gateway))
}

/// Gateway counters as JSON.
///
/// Route: `GET /realtime/stats`
pub async fn stats_handler(State(gateway): State<Arc<ConnectionGateway>>) -> Json<GatewayStats> {
    Json(gateway.get_stats().await)
}

/// Run an established connection until either direction stops.
async fn handle_socket(socket: WebSocket, user: AuthenticatedUser, gateway: Arc<ConnectionGateway>) {
    let (connection_id, outbound) = match gateway.connect(user).await {
        Ok(opened) => opened,
        Err(GatewayError::ShuttingDown) => {
            tracing::debug!("Connection refused during shutdown");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register connection");
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let mut send_task = tokio::spawn(write_outbound(sender, outbound, connection_id));

    let recv_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        if let Err(e) = recv_gateway.replay_queued(connection_id).await {
            tracing::debug!(connection_id = %connection_id, error = %e, "Replay skipped");
        }

        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => recv_gateway.on_frame(connection_id, &text).await,
                Ok(Message::Binary(_)) => {
                    tracing::warn!(connection_id = %connection_id, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    let writer_done = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if writer_done {
        stop(recv_task).await;
    } else {
        stop(send_task).await;
    }

    gateway.on_disconnect(connection_id).await;
}

/// Abort a pump and wait until it has stopped, so no event it was handling
/// can touch gateway state after teardown.
async fn stop(task: JoinHandle<()>) {
    task.abort();
    if let Err(e) = task.await {
        if e.is_panic() {
            tracing::error!(error = %e, "Socket task panicked");
        }
    }
}

async fn write_outbound(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    connection_id: ConnectionId,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(msg) => {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(connection_id = %connection_id, event = msg.event_name(), error = %e, "Failed to serialize frame");
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(json)).await {
                    tracing::debug!(connection_id = %connection_id, "Send error, closing connection: {}", e);
                    break;
                }
            }
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Routes for the realtime gateway.
///
/// # Example
///
/// ```ignore
/// let app = gateway_router(gateway.clone()).layer(TraceLayer::new_for_http());
/// ```
pub fn gateway_router(gateway: Arc<ConnectionGateway>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/realtime/stats", get(stats_handler))
        .with_state(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::{InMemoryUserDirectory, MockAccessTokenVerifier};
    use crate::adapters::notification_store::InMemoryNotificationStore;
    use crate::adapters::rate_limiter::InMemoryRateLimiter;
    use crate::adapters::websocket::GatewayConfig;
    use crate::application::NotificationQueue;
    use crate::domain::foundation::{Role, UserId};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn gateway() -> Arc<ConnectionGateway> {
        let alice = AuthenticatedUser::new(UserId::new("alice").unwrap(), "alice", Role::User);
        Arc::new(ConnectionGateway::new(
            Arc::new(MockAccessTokenVerifier::new().with_user("alice-token", &alice)),
            Arc::new(InMemoryUserDirectory::new().with_user(alice)),
            Arc::new(InMemoryRateLimiter::with_defaults()),
            NotificationQueue::with_defaults(Arc::new(InMemoryNotificationStore::new())),
            GatewayConfig::default(),
        ))
    }

    async fn get_status(router: Router, request: Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn stop_waits_until_the_task_is_gone() {
        struct SetOnDrop(Arc<std::sync::atomic::AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let guard = SetOnDrop(dropped.clone());
        let task = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });

        stop(task).await;
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc".to_string()));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_upgrade() {
        let request = Request::get("/ws").body(Body::empty()).unwrap();
        assert_eq!(get_status(gateway_router(gateway()), request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_before_upgrade() {
        let request = Request::get("/ws?token=nope").body(Body::empty()).unwrap();
        assert_eq!(get_status(gateway_router(gateway()), request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_without_upgrade_is_bad_request() {
        let request = Request::get("/ws")
            .header(header::AUTHORIZATION, "Bearer alice-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_status(gateway_router(gateway()), request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn shutting_down_gateway_refuses_handshake() {
        let gw = gateway();
        gw.shutdown().await;
        let request = Request::get("/ws?token=alice-token").body(Body::empty()).unwrap();
        assert_eq!(
            get_status(gateway_router(gw), request).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn stats_endpoint_returns_counters() {
        let response = gateway_router(gateway())
            .oneshot(Request::get("/realtime/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["totalConnections"], 0);
        assert_eq!(value["distinctUsers"], 0);
        assert_eq!(value["activeRoomCount"], 0);
    }
}
