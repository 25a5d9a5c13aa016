//! Presence and fanout behavior across the registry, dispatcher and the
//! local connection transport.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipsync_api::{
    fanout::{ConnectionTransport, DeliveryError, FanoutDispatcher, FanoutQueue, MessageEvent},
    presence::{
        ConnectionHandle, ConnectionRegistry, MemoryRegistry, PresenceManager, RegistryError,
        RegistryResult, Removal,
    },
    websocket::{events::ServerEvent, Connection, ConnectionState, WebSocketState},
};
use clipsync_shared::{AccountId, Message, MessageId};
use tokio::sync::mpsc;

/// Transport that records every attempt and fails for selected handles
#[derive(Default)]
struct Recorder {
    attempts: Mutex<Vec<ConnectionHandle>>,
    failing: Mutex<HashSet<ConnectionHandle>>,
}

#[async_trait]
impl ConnectionTransport for Recorder {
    async fn send(&self, handle: ConnectionHandle, _event: &MessageEvent) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(handle);
        if self.failing.lock().unwrap().contains(&handle) {
            return Err(DeliveryError::Gone(handle));
        }
        Ok(())
    }
}

struct DownRegistry;

#[async_trait]
impl ConnectionRegistry for DownRegistry {
    async fn add(&self, _: AccountId, _: ConnectionHandle) -> RegistryResult<bool> {
        Err(RegistryError::Timeout)
    }
    async fn remove(&self, _: AccountId, _: ConnectionHandle) -> RegistryResult<Removal> {
        Err(RegistryError::Timeout)
    }
    async fn members(&self, _: AccountId) -> RegistryResult<HashSet<ConnectionHandle>> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }
    async fn ping(&self) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }
    fn backend_name(&self) -> &'static str {
        "down"
    }
}

fn created(account_id: AccountId) -> MessageEvent {
    MessageEvent::Created(Message::new(account_id, "clipboard"))
}

#[tokio::test]
async fn test_every_live_handle_gets_one_attempt() {
    let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
    let transport = Arc::new(Recorder::default());
    let dispatcher = FanoutDispatcher::new(presence.clone(), transport.clone());

    let u1 = AccountId::new();
    let (h1, h2) = (ConnectionHandle::new(), ConnectionHandle::new());
    presence.register(u1, h1).await.unwrap();
    presence.register(u1, h2).await.unwrap();

    let report = dispatcher.publish(u1, &created(u1)).await;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 2);

    let attempts: HashSet<_> = transport.attempts.lock().unwrap().iter().copied().collect();
    assert_eq!(attempts, HashSet::from([h1, h2]));
}

#[tokio::test]
async fn test_sole_handle_deregistered_leaves_nothing_to_fan_out() {
    let registry = MemoryRegistry::new();
    let presence = PresenceManager::new(Arc::new(registry.clone()));
    let transport = Arc::new(Recorder::default());
    let dispatcher = FanoutDispatcher::new(presence.clone(), transport.clone());

    let u2 = AccountId::new();
    let h3 = ConnectionHandle::new();
    presence.register(u2, h3).await.unwrap();
    assert_eq!(
        presence.deregister(u2, h3).await.unwrap(),
        Removal::EntryDeleted
    );
    assert!(!registry.has_entry(u2).await);

    let report = dispatcher.publish(u2, &MessageEvent::Deleted(MessageId::new())).await;
    assert_eq!(report.attempted, 0);
    assert!(transport.attempts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_one_failed_delivery_does_not_block_the_rest() {
    let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
    let transport = Arc::new(Recorder::default());
    let dispatcher = FanoutDispatcher::new(presence.clone(), transport.clone());

    let account = AccountId::new();
    let handles: Vec<_> = (0..3).map(|_| ConnectionHandle::new()).collect();
    for handle in &handles {
        presence.register(account, *handle).await.unwrap();
    }
    transport.failing.lock().unwrap().insert(handles[1]);

    let report = dispatcher.publish(account, &created(account)).await;
    assert_eq!(report.attempted, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_unavailable_registry_fails_open_for_fanout_and_loud_for_register() {
    let presence = PresenceManager::new(Arc::new(DownRegistry));
    let transport = Arc::new(Recorder::default());
    let dispatcher = FanoutDispatcher::new(presence.clone(), transport.clone());
    let account = AccountId::new();

    let report = dispatcher.publish(account, &created(account)).await;
    assert_eq!(report.attempted, 0);

    assert!(presence.register(account, ConnectionHandle::new()).await.is_err());
    assert!(presence.health().await.is_err());

    // A connection that cannot register stays unauthenticated
    let (tx, _rx) = mpsc::channel(16);
    let mut conn = Connection::new(tx);
    assert!(conn.register(account, &presence).await.is_err());
    assert_eq!(conn.state(), ConnectionState::Unauthenticated);
}

#[tokio::test]
async fn test_events_reach_attached_connections_in_order() {
    let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
    let ws_state = WebSocketState::new();
    let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(ws_state.clone()));
    let queue = FanoutQueue::spawn(dispatcher, 4);

    let account = AccountId::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut conn = Connection::new(tx.clone());
    ws_state.attach(conn.handle, tx).await;
    conn.register(account, &presence).await.unwrap();

    let first = Message::new(account, "first");
    let second = Message::new(account, "second");
    queue.enqueue(account, MessageEvent::Created(first.clone()));
    queue.enqueue(account, MessageEvent::Created(second.clone()));
    queue.enqueue(account, MessageEvent::Deleted(first.id));

    let mut received = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("fanout timed out")
            .expect("channel closed");
        match event {
            ServerEvent::Event(event) => received.push(event),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(
        received,
        vec![
            MessageEvent::Created(first.clone()),
            MessageEvent::Created(second),
            MessageEvent::Deleted(first.id),
        ]
    );
}

#[tokio::test]
async fn test_stale_handle_in_registry_is_skipped() {
    let registry = MemoryRegistry::new();
    let presence = PresenceManager::new(Arc::new(registry.clone()));
    let ws_state = WebSocketState::new();
    let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(ws_state.clone()));

    let account = AccountId::new();
    let (tx, mut rx) = mpsc::channel(16);
    let live = Connection::new(tx.clone());
    ws_state.attach(live.handle, tx).await;
    presence.register(account, live.handle).await.unwrap();

    // Registered but never attached locally, e.g. left over from a crashed process
    let stale = ConnectionHandle::new();
    presence.register(account, stale).await.unwrap();

    let report = dispatcher.publish(account, &created(account)).await;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert!(matches!(rx.try_recv(), Ok(ServerEvent::Event(_))));
}

#[tokio::test]
async fn test_closing_registered_connection_deregisters_once() {
    let registry = MemoryRegistry::new();
    let presence = PresenceManager::new(Arc::new(registry.clone()));
    let account = AccountId::new();

    let (tx, _rx) = mpsc::channel(16);
    let mut conn = Connection::new(tx);
    conn.register(account, &presence).await.unwrap();

    assert_eq!(conn.close(&presence).await, Some(Removal::EntryDeleted));
    assert_eq!(conn.close(&presence).await, None);
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!registry.has_entry(account).await);
}

#[tokio::test]
async fn test_deregistered_device_stops_receiving_while_still_attached() {
    let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
    let ws_state = WebSocketState::new();
    let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(ws_state.clone()));
    let account = AccountId::new();

    let (tx1, mut rx1) = mpsc::channel(16);
    let h1 = Connection::new(tx1.clone()).handle;
    ws_state.attach(h1, tx1).await;
    let (tx2, mut rx2) = mpsc::channel(16);
    let h2 = Connection::new(tx2.clone()).handle;
    ws_state.attach(h2, tx2).await;

    presence.register(account, h1).await.unwrap();
    presence.register(account, h2).await.unwrap();
    assert_eq!(
        presence.deregister(account, h1).await.unwrap(),
        Removal::Removed { remaining: 1 }
    );

    let deleted = MessageId::new();
    let report = dispatcher.publish(account, &MessageEvent::Deleted(deleted)).await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);

    match rx2.try_recv() {
        Ok(ServerEvent::Event(event)) => assert_eq!(event, MessageEvent::Deleted(deleted)),
        other => panic!("expected deleted event, got {other:?}"),
    }
    assert!(rx2.try_recv().is_err());
    assert!(rx1.try_recv().is_err());
}
