//! Per-connection outbound channel.
//!
//! The socket task owns the receiving half; the gateway keeps a
//! [`ConnectionHandle`] and pushes into a bounded queue without awaiting, so
//! one slow client never stalls a fan-out.

use tokio::sync::mpsc;

use crate::domain::foundation::{AuthenticatedUser, ConnectionId};

use super::messages::ServerMessage;

/// Commands for a socket writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialize and send a frame.
    Message(ServerMessage),
    /// Close the socket.
    Close,
}

/// Gateway-side handle to one open connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user: AuthenticatedUser,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its socket task drains.
    pub fn channel(
        id: ConnectionId,
        user: AuthenticatedUser,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { id, user, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    /// Queue a frame. Returns false if it was dropped.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.try_send(Outbound::Message(message)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(Outbound::Message(dropped))) => {
                tracing::warn!(
                    connection_id = %self.id,
                    event = dropped.event_name(),
                    "Outbound buffer full, dropping frame"
                );
                false
            }
            Err(_) => false,
        }
    }

    /// Queue a frame, waiting for buffer space. Returns false once the socket
    /// task is gone.
    ///
    /// Only for per-connection work such as replay; fan-outs use [`send`](Self::send).
    pub async fn deliver(&self, message: ServerMessage) -> bool {
        self.tx.send(Outbound::Message(message)).await.is_ok()
    }

    /// Ask the socket task to close.
    pub fn close(&self) {
        if self.tx.try_send(Outbound::Close).is_err() {
            tracing::debug!(connection_id = %self.id, "Close not queued, socket already gone or saturated");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
