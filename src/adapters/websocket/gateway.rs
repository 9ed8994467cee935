//! Connection gateway - lifecycle, dispatch and fan-out for every socket.
//!
//! ```text
//!  token ──► authenticate ──► connect ──► on_event* ──► on_disconnect
//!                               │            │
//!                               │            ├─ EventValidator
//!                               │            ├─ RateLimiter
//!                               │            ├─ RoomAuthorizer (+ audit)
//!                               │            └─ handler
//!                               ├─ presence, rooms
//!                               └─ replay_queued (writer running)
//! ```
//!
//! The gateway owns three registries: open connections, presence and room
//! membership. Global operations snapshot recipients under a read lock and
//! send after releasing it; sends never await, so a slow client cannot hold
//! a lock or stall a fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::application::NotificationQueue;
use crate::domain::foundation::{AuthError, AuthenticatedUser, ConnectionId, Timestamp, UserId};
use crate::domain::realtime::{
    sanitize_str, DataSubscribe, EventValidationError, EventValidator, InboundEvent, JoinOptions,
    MessageSend, Notification, RoomAuthorizer, RoomId, RoomJoin, RoomLeave, UserTyping,
};
use crate::ports::{
    AccessTokenVerifier, RateLimitResult, RateLimiter, StoreError, UserDirectory,
};

use super::connection::{ConnectionHandle, Outbound};
use super::messages::{ChatMessage, ClientFrame, ServerMessage, TypingMessage};
use super::presence::PresenceRegistry;
use super::rooms::RoomManager;

/// Longest event name echoed back in a `validation:error`.
const ECHOED_EVENT_MAX: usize = 64;

// =============================================================================
// Errors
// =============================================================================

/// Failures surfaced by gateway operations.
///
/// Everything except `Authentication` and `ShuttingDown` is scoped to a
/// single event; the connection stays open.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Handshake rejected; nothing was registered.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// Event payload rejected; `validation:error` was sent.
    #[error(transparent)]
    Validation(#[from] EventValidationError),

    /// Join or broadcast denied; `error` was sent with the reason.
    #[error("Access to {room} denied: {reason}")]
    Authorization { room: String, reason: String },

    /// Event dropped without a reply.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// Queue store failure. Logged by the queue and never returned from
    /// event dispatch.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Gateway is shutting down")]
    ShuttingDown,
}

impl GatewayError {
    fn denied(room: &RoomId, reason: impl Into<String>) -> Self {
        GatewayError::Authorization {
            room: room.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Configuration and results
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
        }
    }
}

/// Snapshot returned by [`ConnectionGateway::get_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub total_connections: usize,
    pub distinct_users: usize,
    pub active_room_count: usize,
}

/// How [`ConnectionGateway::send_notification_to_user`] handled a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to this many live connections.
    Live(usize),
    /// User offline; stored for replay.
    Queued,
    /// User offline and the queue store failed.
    Dropped,
}

// =============================================================================
// Gateway
// =============================================================================

/// Owns every live connection and the registries derived from them.
pub struct ConnectionGateway {
    verifier: Arc<dyn AccessTokenVerifier>,
    directory: Arc<dyn UserDirectory>,
    rate_limiter: Arc<dyn RateLimiter>,
    queue: NotificationQueue,
    authorizer: RoomAuthorizer,
    validator: EventValidator,
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    presence: RwLock<PresenceRegistry>,
    rooms: RoomManager,
    shutting_down: AtomicBool,
    config: GatewayConfig,
}

impl ConnectionGateway {
    pub fn new(
        verifier: Arc<dyn AccessTokenVerifier>,
        directory: Arc<dyn UserDirectory>,
        rate_limiter: Arc<dyn RateLimiter>,
        queue: NotificationQueue,
        config: GatewayConfig,
    ) -> Self {
        Self {
            verifier,
            directory,
            rate_limiter,
            queue,
            authorizer: RoomAuthorizer::new(),
            validator: EventValidator::new(),
            connections: RwLock::new(HashMap::new()),
            presence: RwLock::new(PresenceRegistry::new()),
            rooms: RoomManager::new(),
            shutting_down: AtomicBool::new(false),
            config,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Resolve a handshake token to a live user. Touches no registry.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedUser, GatewayError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.verifier.verify_access_token(token).await?;
        let user = self
            .directory
            .find_user_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.role != claims.role {
            tracing::debug!(
                user_id = %user.id,
                token_role = %claims.role,
                directory_role = %user.role,
                "Token role differs from directory, using directory role"
            );
        }
        Ok(user)
    }

    /// Open a connection for an authenticated user.
    ///
    /// Returns the connection id and the receiver the socket writer drains.
    pub async fn connect(
        &self,
        user: AuthenticatedUser,
    ) -> Result<(ConnectionId, mpsc::Receiver<Outbound>), GatewayError> {
        let (handle, rx) =
            ConnectionHandle::channel(ConnectionId::new(), user, self.config.outbound_buffer);
        let id = handle.id();
        self.on_connect(handle).await?;
        Ok((id, rx))
    }

    /// Register a connection, announce presence and greet.
    ///
    /// Queued notifications are not replayed here; the socket writer must be
    /// draining first, see [`replay_queued`](Self::replay_queued).
    pub async fn on_connect(&self, handle: ConnectionHandle) -> Result<(), GatewayError> {
        if self.is_shutting_down() {
            return Err(GatewayError::ShuttingDown);
        }

        let id = handle.id();
        let user_id = handle.user().id.clone();

        self.connections.write().await.insert(id, handle.clone());
        self.rooms.register(id).await;
        let came_online = self.presence.write().await.add(&user_id, id);

        if self.is_shutting_down() {
            self.on_disconnect(id).await;
            return Err(GatewayError::ShuttingDown);
        }

        tracing::info!(connection_id = %id, user_id = %user_id, "Connection opened");

        if came_online {
            self.broadcast_all(ServerMessage::user_online(&user_id)).await;
        }

        handle.send(ServerMessage::connected(id, &user_id));

        Ok(())
    }

    /// Replay the user's queued notifications to one connection.
    ///
    /// Waits for outbound buffer space per entry, so it must run while the
    /// connection's writer is draining. Returns the number replayed.
    pub async fn replay_queued(&self, connection_id: ConnectionId) -> Result<usize, GatewayError> {
        let handle = self
            .handle(connection_id)
            .await
            .ok_or(GatewayError::UnknownConnection(connection_id))?;

        let replayed = self
            .queue
            .replay(&handle.user().id, |queued| {
                let handle = handle.clone();
                async move {
                    handle
                        .deliver(ServerMessage::replayed_notification(queued))
                        .await
                }
            })
            .await;
        Ok(replayed)
    }

    /// Handle one raw text frame from a client.
    pub async fn on_frame(&self, connection_id: ConnectionId, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Malformed frame");
                if let Some(handle) = self.handle(connection_id).await {
                    handle.send(ServerMessage::error(
                        "Malformed message: expected {\"event\", \"data\"}",
                    ));
                }
                return;
            }
        };

        if let Err(e) = self.on_event(connection_id, &frame.event, &frame.data).await {
            tracing::debug!(connection_id = %connection_id, event = %frame.event, error = %e, "Event not handled");
        }
    }

    /// Validate, rate-limit, authorize and dispatch one event.
    pub async fn on_event(
        &self,
        connection_id: ConnectionId,
        event_name: &str,
        payload: &Value,
    ) -> Result<(), GatewayError> {
        let handle = self
            .handle(connection_id)
            .await
            .ok_or(GatewayError::UnknownConnection(connection_id))?;

        let event = match self.validator.validate(event_name, payload) {
            Ok(event) => event,
            Err(e) => {
                let echoed: String = sanitize_str(event_name)
                    .chars()
                    .take(ECHOED_EVENT_MAX)
                    .collect();
                tracing::warn!(
                    connection_id = %connection_id,
                    event = %echoed,
                    errors = e.error_count(),
                    "Event failed validation"
                );
                handle.send(ServerMessage::validation_error(echoed, e.to_client_message()));
                return Err(e.into());
            }
        };

        match self.rate_limiter.check(connection_id).await {
            Ok(RateLimitResult::Allowed(_)) => {}
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    event = event_name,
                    "Event dropped by rate limiter"
                );
                return Err(GatewayError::RateLimited {
                    retry_after_secs: denied.retry_after_secs,
                });
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Rate limiter unavailable, allowing event");
            }
        }

        // A disconnect that raced the check has already reset the limiter;
        // drop the window this check recreated.
        if !self.connections.read().await.contains_key(&connection_id) {
            if let Err(e) = self.rate_limiter.reset(connection_id).await {
                tracing::warn!(connection_id = %connection_id, error = %e, "Failed to clear rate limit window");
            }
            return Err(GatewayError::UnknownConnection(connection_id));
        }

        self.dispatch(&handle, event).await
    }

    /// Tear down a connection. Unknown ids are ignored.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) {
        let Some(handle) = self.connections.write().await.remove(&connection_id) else {
            return;
        };
        let user_id = handle.user().id.clone();

        self.rooms.remove_connection(connection_id).await;
        let went_offline = self
            .presence
            .write()
            .await
            .remove(&user_id, connection_id);
        if let Err(e) = self.rate_limiter.reset(connection_id).await {
            tracing::warn!(connection_id = %connection_id, error = %e, "Failed to clear rate limit window");
        }

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "Connection closed");

        if went_offline {
            self.broadcast_all(ServerMessage::user_offline(&user_id)).await;
        }
    }

    /// Close every connection and clear all registries. Idempotent; new
    /// connections are refused afterwards.
    pub async fn shutdown(&self) {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);

        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            handle.close();
            if let Err(e) = self.rate_limiter.reset(handle.id()).await {
                tracing::warn!(connection_id = %handle.id(), error = %e, "Failed to clear rate limit window");
            }
        }
        self.presence.write().await.clear();
        self.rooms.clear().await;

        if first {
            tracing::info!(closed = handles.len(), "Gateway shut down");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Trusted server-side API
    // -------------------------------------------------------------------------

    /// Push an entity change to every matching data room subscriber.
    ///
    /// No authorization: callers are server-side code. Returns the number of
    /// connections the update was queued for.
    pub async fn broadcast_to_room(&self, entity: &str, data: Value) -> usize {
        let recipients = self.rooms.data_subscribers(entity, &data).await;
        let handles = self.handles_for(recipients).await;
        let message = ServerMessage::data_updated(entity, data);

        let delivered = handles
            .iter()
            .filter(|handle| handle.send(message.clone()))
            .count();
        tracing::debug!(entity, recipients = delivered, "Data update broadcast");
        delivered
    }

    /// Deliver to every live connection of the user, or queue for later.
    pub async fn send_notification_to_user(
        &self,
        user_id: &UserId,
        notification: Notification,
    ) -> Delivery {
        let connection_ids = self.presence.read().await.connections_of(user_id);
        let handles = self.handles_for(connection_ids).await;

        let delivered = handles
            .iter()
            .filter(|handle| handle.send(ServerMessage::notification(notification.clone())))
            .count();
        if delivered > 0 {
            return Delivery::Live(delivered);
        }

        if self.queue.enqueue(user_id, notification).await {
            Delivery::Queued
        } else {
            Delivery::Dropped
        }
    }

    pub async fn get_stats(&self) -> GatewayStats {
        let total_connections = self.connections.read().await.len();
        let distinct_users = self.presence.read().await.online_users();
        let active_room_count = self.rooms.active_room_count().await;
        GatewayStats {
            total_connections,
            distinct_users,
            active_room_count,
        }
    }

    /// Whether the user has at least one open connection.
    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.presence.read().await.is_online(user_id)
    }

    /// Snapshot of the rooms a connection has joined, in canonical form.
    pub async fn rooms_of(&self, connection_id: ConnectionId) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .rooms
            .rooms_of(connection_id)
            .await
            .iter()
            .map(|room| room.to_string())
            .collect();
        rooms.sort();
        rooms
    }

    // -------------------------------------------------------------------------
    // Event handlers
    // -------------------------------------------------------------------------

    async fn dispatch(
        &self,
        handle: &ConnectionHandle,
        event: InboundEvent,
    ) -> Result<(), GatewayError> {
        match event {
            InboundEvent::DataSubscribe(sub) => self.handle_data_subscribe(handle, sub).await,
            InboundEvent::RoomJoin(join) => self.handle_room_join(handle, join).await,
            InboundEvent::RoomLeave(leave) => self.handle_room_leave(handle, leave).await,
            InboundEvent::UserTyping(typing) => self.handle_user_typing(handle, typing).await,
            InboundEvent::MessageSend(message) => self.handle_message_send(handle, message).await,
            InboundEvent::NotificationRead(read) => {
                tracing::debug!(
                    connection_id = %handle.id(),
                    user_id = %handle.user().id,
                    notification_id = %read.notification_id,
                    "Notification marked read"
                );
                Ok(())
            }
        }
    }

    async fn handle_data_subscribe(
        &self,
        handle: &ConnectionHandle,
        sub: DataSubscribe,
    ) -> Result<(), GatewayError> {
        let user = handle.user();
        let options = JoinOptions::default();

        for room in self
            .authorizer
            .list_authorized_rooms(user, &sub.entity, &sub.filters)
        {
            let decision = self.authorizer.can_join(Some(user), &room, &options);
            self.authorizer.audit_access(Some(user), &room, &decision);
            if decision.authorized {
                self.rooms.join(handle.id(), &room).await;
                handle.send(ServerMessage::room_joined(room.as_str()));
            }
        }
        Ok(())
    }

    async fn handle_room_join(
        &self,
        handle: &ConnectionHandle,
        join: RoomJoin,
    ) -> Result<(), GatewayError> {
        let user = handle.user();
        let room = RoomId::parse(&join.room_id).with_filters(&join.filters);

        let decision = self
            .authorizer
            .can_join(Some(user), &room, &JoinOptions::default());
        self.authorizer.audit_access(Some(user), &room, &decision);
        if !decision.authorized {
            handle.send(ServerMessage::error(decision.reason.clone()));
            return Err(GatewayError::denied(&room, decision.reason));
        }

        self.rooms.join(handle.id(), &room).await;
        handle.send(ServerMessage::room_joined(room.as_str()));
        Ok(())
    }

    async fn handle_room_leave(
        &self,
        handle: &ConnectionHandle,
        leave: RoomLeave,
    ) -> Result<(), GatewayError> {
        let user = handle.user();
        let room = RoomId::parse(&leave.room_id);

        let decision = self
            .authorizer
            .can_join(Some(user), &room, &JoinOptions::default());
        self.authorizer.audit_access(Some(user), &room, &decision);
        if !decision.authorized {
            handle.send(ServerMessage::error(decision.reason.clone()));
            return Err(GatewayError::denied(&room, decision.reason));
        }

        self.rooms.leave(handle.id(), &room).await;
        handle.send(ServerMessage::room_left(room.as_str()));
        Ok(())
    }

    async fn handle_user_typing(
        &self,
        handle: &ConnectionHandle,
        typing: UserTyping,
    ) -> Result<(), GatewayError> {
        let room = RoomId::parse(&typing.room_id);
        self.require_membership(handle, &room).await?;

        let message = ServerMessage::UserTyping(TypingMessage {
            user_id: handle.user().id.to_string(),
            room_id: room.to_string(),
            is_typing: typing.is_typing,
            timestamp: Timestamp::now().to_rfc3339(),
        });
        let others = self
            .rooms
            .members(&room)
            .await
            .into_iter()
            .filter(|id| *id != handle.id());
        for member in self.handles_for(others).await {
            member.send(message.clone());
        }
        Ok(())
    }

    async fn handle_message_send(
        &self,
        handle: &ConnectionHandle,
        send: MessageSend,
    ) -> Result<(), GatewayError> {
        let user = handle.user();
        let room = RoomId::parse(&send.room_id);

        let decision = self
            .authorizer
            .can_broadcast(Some(user), &room, &JoinOptions::default());
        self.authorizer.audit_access(Some(user), &room, &decision);
        if !decision.authorized {
            handle.send(ServerMessage::error(decision.reason.clone()));
            return Err(GatewayError::denied(&room, decision.reason));
        }
        self.require_membership(handle, &room).await?;

        let message = ServerMessage::MessageNew(ChatMessage {
            room_id: room.to_string(),
            user_id: user.id.to_string(),
            username: user.username.clone(),
            message: send.message,
            metadata: send.metadata,
            timestamp: Timestamp::now().to_rfc3339(),
        });
        let members = self.rooms.members(&room).await;
        for member in self.handles_for(members).await {
            member.send(message.clone());
        }
        Ok(())
    }

    async fn require_membership(
        &self,
        handle: &ConnectionHandle,
        room: &RoomId,
    ) -> Result<(), GatewayError> {
        if self.rooms.is_member(handle.id(), room).await {
            return Ok(());
        }
        let reason = "Not a member of this room";
        handle.send(ServerMessage::error(reason));
        Err(GatewayError::denied(room, reason))
    }

    // -------------------------------------------------------------------------
    // Registry helpers
    // -------------------------------------------------------------------------

    async fn handle(&self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.read().await.get(&connection_id).cloned()
    }

    async fn handles_for(
        &self,
        ids: impl IntoIterator<Item = ConnectionId>,
    ) -> Vec<ConnectionHandle> {
        let connections = self.connections.read().await;
        ids.into_iter()
            .filter_map(|id| connections.get(&id).cloned())
            .collect()
    }

    async fn broadcast_all(&self, message: ServerMessage) {
        let handles: Vec<ConnectionHandle> =
            self.connections.read().await.values().cloned().collect();
        for handle in handles {
            handle.send(message.clone());
        }
    }
}
