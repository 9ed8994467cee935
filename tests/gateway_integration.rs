//! Integration tests for the connection gateway.
//!
//! These tests drive the full event path through the public API:
//! 1. Handshake authentication against a token verifier and user directory
//! 2. Connection registration, presence and queued notification replay
//! 3. Validation, rate limiting and room authorization for inbound events
//! 4. Server-side fan-out of data updates and notifications
//!
//! Uses in-memory adapters so no Redis or network is needed.

use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::mpsc;

use realtime_gateway::adapters::auth::{
    GatewayClaims, InMemoryUserDirectory, JwtAccessTokenVerifier, JwtConfig,
    MockAccessTokenVerifier,
};
use realtime_gateway::adapters::notification_store::InMemoryNotificationStore;
use realtime_gateway::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
use realtime_gateway::adapters::websocket::{
    ConnectionGateway, Delivery, GatewayConfig, GatewayError, GatewayStats, Outbound,
    ServerMessage,
};
use realtime_gateway::application::NotificationQueue;
use realtime_gateway::domain::foundation::{AuthenticatedUser, ConnectionId, Role, UserId};
use realtime_gateway::domain::realtime::Notification;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Harness {
    gateway: ConnectionGateway,
    store: InMemoryNotificationStore,
    limiter: Arc<InMemoryRateLimiter>,
}

impl Harness {
    fn new() -> Self {
        let users = [
            user("alice", Role::User),
            user("bob", Role::User),
            user("root", Role::Admin),
        ];
        let mut verifier = MockAccessTokenVerifier::new();
        let mut directory = InMemoryUserDirectory::new();
        for u in &users {
            verifier = verifier.with_user(format!("{}-token", u.id), u);
            directory = directory.with_user(u.clone());
        }

        let store = InMemoryNotificationStore::new();
        let limiter = Arc::new(InMemoryRateLimiter::new(RateLimitConfig::new(100, 60)));
        let gateway = ConnectionGateway::new(
            Arc::new(verifier),
            Arc::new(directory),
            limiter.clone(),
            NotificationQueue::with_defaults(Arc::new(store.clone())),
            GatewayConfig::default(),
        );

        Self {
            gateway,
            store,
            limiter,
        }
    }

    /// Authenticate by token and open a connection, discarding the greeting.
    async fn connect(&self, name: &str) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let token = format!("{}-token", name);
        let user = self.gateway.authenticate(Some(&token)).await.unwrap();
        let (id, mut rx) = self.gateway.connect(user).await.unwrap();
        drain(&mut rx);
        (id, rx)
    }
}

fn user(id: &str, role: Role) -> AuthenticatedUser {
    AuthenticatedUser::new(UserId::new(id).unwrap(), id, role)
}

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let Outbound::Message(msg) = item {
            out.push(msg);
        }
    }
    out
}

fn of_kind<'a>(messages: &'a [ServerMessage], event: &str) -> Vec<&'a ServerMessage> {
    messages.iter().filter(|m| m.event_name() == event).collect()
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn live_notification_reaches_every_connection_and_is_not_queued() {
    let h = Harness::new();
    let (_c1, mut rx1) = h.connect("alice").await;
    let (_c2, mut rx2) = h.connect("alice").await;
    drain(&mut rx1);

    let delivery = h
        .gateway
        .send_notification_to_user(&uid("alice"), Notification::new("task.assigned", "New task"))
        .await;

    assert_eq!(delivery, Delivery::Live(2));
    for rx in [&mut rx1, &mut rx2] {
        let messages = drain(rx);
        assert_eq!(of_kind(&messages, "notification").len(), 1);
    }
    assert_eq!(h.store.queued_len(&uid("alice")).await, 0);
}

#[tokio::test]
async fn offline_notification_is_replayed_exactly_once() {
    let h = Harness::new();

    for i in 0..3 {
        let delivery = h
            .gateway
            .send_notification_to_user(&uid("bob"), Notification::new("n", format!("msg {}", i)))
            .await;
        assert_eq!(delivery, Delivery::Queued);
    }
    assert_eq!(h.store.queued_len(&uid("bob")).await, 3);

    let bob = h.gateway.authenticate(Some("bob-token")).await.unwrap();
    let (first, mut rx) = h.gateway.connect(bob.clone()).await.unwrap();
    assert!(of_kind(&drain(&mut rx), "notification").is_empty());
    assert_eq!(h.gateway.replay_queued(first).await.unwrap(), 3);
    let messages = drain(&mut rx);

    let replayed: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::Notification(n) => {
                assert!(n.queued_at.is_some());
                Some(n.notification.message.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(replayed, vec!["msg 0", "msg 1", "msg 2"]);
    assert_eq!(h.store.queued_len(&uid("bob")).await, 0);

    h.gateway.on_disconnect(first).await;
    let (second, mut rx) = h.gateway.connect(bob).await.unwrap();
    assert_eq!(h.gateway.replay_queued(second).await.unwrap(), 0);
    assert!(of_kind(&drain(&mut rx), "notification").is_empty());
}

#[tokio::test]
async fn replay_larger_than_outbound_buffer_loses_nothing() {
    let h = Harness::new();
    let queued = GatewayConfig::default().outbound_buffer + 44;

    for i in 0..queued {
        let delivery = h
            .gateway
            .send_notification_to_user(&uid("bob"), Notification::new("n", format!("msg {}", i)))
            .await;
        assert_eq!(delivery, Delivery::Queued);
    }

    let bob = h.gateway.authenticate(Some("bob-token")).await.unwrap();
    let (id, mut rx) = h.gateway.connect(bob).await.unwrap();

    let writer = async {
        let mut received = Vec::new();
        while received.len() < queued {
            match rx.recv().await {
                Some(Outbound::Message(ServerMessage::Notification(n))) => {
                    received.push(n.notification.message)
                }
                Some(_) => {}
                None => break,
            }
        }
        received
    };
    let (replayed, received) = tokio::join!(h.gateway.replay_queued(id), writer);

    assert_eq!(replayed.unwrap(), queued);
    assert_eq!(received.len(), queued);
    assert_eq!(received.first().map(String::as_str), Some("msg 0"));
    assert_eq!(received.last(), Some(&format!("msg {}", queued - 1)));
    assert_eq!(h.store.queued_len(&uid("bob")).await, 0);
}

#[tokio::test]
async fn replay_to_closed_connection_keeps_the_queue() {
    let h = Harness::new();
    h.gateway
        .send_notification_to_user(&uid("bob"), Notification::new("n", "kept"))
        .await;

    let bob = h.gateway.authenticate(Some("bob-token")).await.unwrap();
    let (id, rx) = h.gateway.connect(bob).await.unwrap();
    drop(rx);

    assert_eq!(h.gateway.replay_queued(id).await.unwrap(), 0);
    assert_eq!(h.store.queued_len(&uid("bob")).await, 1);
}

#[tokio::test]
async fn unavailable_store_drops_offline_notification_without_failing() {
    let h = Harness::new();
    h.store.set_failing(true);

    let delivery = h
        .gateway
        .send_notification_to_user(&uid("bob"), Notification::new("n", "lost"))
        .await;
    assert_eq!(delivery, Delivery::Dropped);

    let bob = h.gateway.authenticate(Some("bob-token")).await.unwrap();
    let (id, mut rx) = h.gateway.connect(bob).await.unwrap();
    assert_eq!(h.gateway.replay_queued(id).await.unwrap(), 0);
    assert_eq!(of_kind(&drain(&mut rx), "connected").len(), 1);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn connect_disconnect_cycles_leave_no_state_behind() {
    let h = Harness::new();

    for _ in 0..50 {
        let (id, _rx) = h.connect("alice").await;
        h.gateway
            .on_event(id, "roomJoin", &json!({"roomId": "chat:lobby"}))
            .await
            .unwrap();
        h.gateway.on_disconnect(id).await;
    }

    assert!(!h.gateway.is_online(&uid("alice")).await);
    assert_eq!(
        h.gateway.get_stats().await,
        GatewayStats {
            total_connections: 0,
            distinct_users: 0,
            active_room_count: 0,
        }
    );
    assert_eq!(h.limiter.tracked_connections().await, 0);
}

#[tokio::test]
async fn presence_changes_are_broadcast() {
    let h = Harness::new();
    let (_bob, mut bob_rx) = h.connect("bob").await;

    let (alice, _alice_rx) = h.connect("alice").await;
    let messages = drain(&mut bob_rx);
    assert_eq!(of_kind(&messages, "user:online").len(), 1);

    h.gateway.on_disconnect(alice).await;
    let messages = drain(&mut bob_rx);
    match of_kind(&messages, "user:offline").as_slice() {
        [ServerMessage::UserOffline(p)] => assert_eq!(p.user_id, "alice"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn rejected_handshake_registers_nothing() {
    let h = Harness::new();
    assert!(matches!(
        h.gateway.authenticate(Some("mallory-token")).await,
        Err(GatewayError::Authentication(_))
    ));
    assert_eq!(h.gateway.get_stats().await.total_connections, 0);
}

#[tokio::test]
async fn shutdown_closes_sockets_and_refuses_new_connections() {
    let h = Harness::new();
    let (_a, mut rx_a) = h.connect("alice").await;
    let (_b, mut rx_b) = h.connect("bob").await;
    drain(&mut rx_a);

    h.gateway.shutdown().await;

    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(rx.recv().await, Some(Outbound::Close));
        assert_eq!(rx.recv().await, None);
    }
    assert!(matches!(
        h.gateway.connect(user("alice", Role::User)).await,
        Err(GatewayError::ShuttingDown)
    ));

    h.gateway.shutdown().await;
    assert_eq!(h.gateway.get_stats().await.total_connections, 0);
}

// =============================================================================
// Inbound events
// =============================================================================

#[tokio::test]
async fn rate_limit_allows_exactly_one_hundred_events() {
    let h = Harness::new();
    let (id, mut rx) = h.connect("alice").await;
    let join = json!({"roomId": "chat:lobby"});

    for n in 1..=100 {
        assert!(
            h.gateway.on_event(id, "roomJoin", &join).await.is_ok(),
            "event {} should be allowed",
            n
        );
    }
    assert!(matches!(
        h.gateway.on_event(id, "roomJoin", &join).await,
        Err(GatewayError::RateLimited { .. })
    ));

    let messages = drain(&mut rx);
    assert_eq!(of_kind(&messages, "room:joined").len(), 100);
    assert!(of_kind(&messages, "error").is_empty());
}

#[tokio::test]
async fn invalid_events_do_not_consume_rate_budget() {
    let h = Harness::new();
    let (id, mut rx) = h.connect("alice").await;

    for _ in 0..150 {
        let _ = h
            .gateway
            .on_event(id, "notificationRead", &json!({"notificationId": "not-an-id"}))
            .await;
    }
    assert_eq!(of_kind(&drain(&mut rx), "validation:error").len(), 150);

    h.gateway
        .on_event(
            id,
            "notificationRead",
            &json!({"notificationId": "507f1f77bcf86cd799439011"}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn validation_errors_aggregate_every_violation() {
    let h = Harness::new();
    let (id, mut rx) = h.connect("alice").await;

    let _ = h
        .gateway
        .on_event(id, "messageSend", &json!({"message": ""}))
        .await;

    match drain(&mut rx).as_slice() {
        [ServerMessage::ValidationError(v)] => {
            assert_eq!(v.event, "messageSend");
            assert!(v.error.contains("roomId"));
            assert!(v.error.contains("message"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn role_rooms_follow_the_hierarchy() {
    let h = Harness::new();
    let (alice, mut alice_rx) = h.connect("alice").await;
    let (root, _root_rx) = h.connect("root").await;

    let denied = h
        .gateway
        .on_event(alice, "roomJoin", &json!({"roomId": "admin:tasks"}))
        .await;
    assert!(matches!(denied, Err(GatewayError::Authorization { .. })));
    assert_eq!(of_kind(&drain(&mut alice_rx), "error").len(), 1);

    h.gateway
        .on_event(root, "dataSubscribe", &json!({"entity": "tasks"}))
        .await
        .unwrap();
    assert_eq!(
        h.gateway.rooms_of(root).await,
        vec![
            "admin:tasks".to_string(),
            "data:tasks".to_string(),
            "messages:root".to_string(),
            "moderator:tasks".to_string(),
            "notifications:root".to_string(),
        ]
    );
}

#[tokio::test]
async fn private_message_room_is_owner_only_without_invitation() {
    let h = Harness::new();
    let (bob, mut rx) = h.connect("bob").await;

    let result = h
        .gateway
        .on_event(bob, "roomJoin", &json!({"roomId": "messages:alice"}))
        .await;
    assert!(matches!(result, Err(GatewayError::Authorization { .. })));
    assert_eq!(of_kind(&drain(&mut rx), "error").len(), 1);

    h.gateway
        .on_event(bob, "roomJoin", &json!({"roomId": "messages:bob"}))
        .await
        .unwrap();
}

// =============================================================================
// Data fan-out
// =============================================================================

#[tokio::test]
async fn broadcast_respects_filters_and_delivers_once() {
    let h = Harness::new();
    let (everything, mut all_rx) = h.connect("alice").await;
    let (open_only, mut open_rx) = h.connect("bob").await;

    h.gateway
        .on_event(everything, "dataSubscribe", &json!({"entity": "tasks"}))
        .await
        .unwrap();
    h.gateway
        .on_event(
            everything,
            "roomJoin",
            &json!({"roomId": "data:tasks", "filters": {"status": "open"}}),
        )
        .await
        .unwrap();
    h.gateway
        .on_event(
            open_only,
            "dataSubscribe",
            &json!({"entity": "tasks", "filters": {"status": "open"}}),
        )
        .await
        .unwrap();
    drain(&mut all_rx);
    drain(&mut open_rx);

    let reached = h
        .gateway
        .broadcast_to_room("tasks", json!({"id": 1, "status": "open"}))
        .await;
    assert_eq!(reached, 2);
    assert_eq!(of_kind(&drain(&mut all_rx), "data:updated").len(), 1);
    assert_eq!(of_kind(&drain(&mut open_rx), "data:updated").len(), 1);

    let reached = h
        .gateway
        .broadcast_to_room("tasks", json!({"id": 2, "status": "done"}))
        .await;
    assert_eq!(reached, 1);
    assert_eq!(of_kind(&drain(&mut all_rx), "data:updated").len(), 1);
    assert!(drain(&mut open_rx).is_empty());

    assert_eq!(h.gateway.broadcast_to_room("notes", json!({})).await, 0);
}

#[tokio::test]
async fn chat_messages_reach_room_members() {
    let h = Harness::new();
    let (alice, mut alice_rx) = h.connect("alice").await;
    let (bob, mut bob_rx) = h.connect("bob").await;
    let (_root, mut root_rx) = h.connect("root").await;
    for id in [alice, bob] {
        h.gateway
            .on_event(id, "roomJoin", &json!({"roomId": "chat:general"}))
            .await
            .unwrap();
    }
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    drain(&mut root_rx);

    h.gateway
        .on_event(
            alice,
            "messageSend",
            &json!({"roomId": "chat:general", "message": "  hello  ", "metadata": {"k": "v"}}),
        )
        .await
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        match drain(rx).as_slice() {
            [ServerMessage::MessageNew(m)] => {
                assert_eq!(m.message, "hello");
                assert_eq!(m.metadata, Some(json!({"k": "v"})));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(drain(&mut root_rx).is_empty());
}

// =============================================================================
// JWT handshake
// =============================================================================

#[tokio::test]
async fn signed_token_authenticates_against_directory() {
    const SECRET: &str = "integration-secret";

    let directory = InMemoryUserDirectory::new().with_test_user(uid("carol"), Role::Moderator);
    let gateway = ConnectionGateway::new(
        Arc::new(JwtAccessTokenVerifier::new(JwtConfig::new(SecretString::new(
            SECRET.to_string(),
        )))),
        Arc::new(directory),
        Arc::new(InMemoryRateLimiter::with_defaults()),
        NotificationQueue::with_defaults(Arc::new(InMemoryNotificationStore::new())),
        GatewayConfig::default(),
    );

    let claims = GatewayClaims {
        sub: "carol".to_string(),
        role: Some("moderator".to_string()),
        exp: chrono::Utc::now().timestamp() + 600,
        iss: None,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let carol = gateway.authenticate(Some(&token)).await.unwrap();
    assert_eq!(carol.id, uid("carol"));
    assert_eq!(carol.role, Role::Moderator);

    let stranger = GatewayClaims {
        sub: "dave".to_string(),
        ..claims
    };
    let token = encode(
        &Header::default(),
        &stranger,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    assert!(matches!(
        gateway.authenticate(Some(&token)).await,
        Err(GatewayError::Authentication(_))
    ));
}
