//! Sharded fanout workers
//!
//! Write handlers hand events to the queue and return immediately. Each
//! account hashes onto one shard, and a shard runs its publishes one at a
//! time in arrival order, so one account's events are delivered in the order
//! they were enqueued. Accounts on different shards proceed independently.
//!
//! Shard queues are bounded. When a shard is full the event is dropped and
//! logged; devices resync from the message list on their next load.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use clipsync_shared::AccountId;
use tokio::sync::mpsc;

use super::dispatcher::FanoutDispatcher;
use super::event::MessageEvent;

/// Jobs buffered per shard before new ones are dropped
pub const SHARD_CAPACITY: usize = 1024;

struct FanoutJob {
    account_id: AccountId,
    event: MessageEvent,
}

/// Handle for enqueueing events onto the shard workers
///
/// Workers stop once every clone of the queue has been dropped.
#[derive(Clone)]
pub struct FanoutQueue {
    shards: Arc<Vec<mpsc::Sender<FanoutJob>>>,
}

impl FanoutQueue {
    /// Spawn `shard_count` workers (at least one) on the current runtime
    pub fn spawn(dispatcher: FanoutDispatcher, shard_count: usize) -> Self {
        Self::spawn_with_capacity(dispatcher, shard_count, SHARD_CAPACITY)
    }

    pub fn spawn_with_capacity(
        dispatcher: FanoutDispatcher,
        shard_count: usize,
        capacity: usize,
    ) -> Self {
        let shard_count = shard_count.max(1);
        let capacity = capacity.max(1);
        let mut shards = Vec::with_capacity(shard_count);

        for shard in 0..shard_count {
            let (tx, mut rx) = mpsc::channel::<FanoutJob>(capacity);
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    dispatcher.publish(job.account_id, &job.event).await;
                }
                tracing::debug!(shard, "Fanout worker stopped");
            });
            shards.push(tx);
        }

        tracing::info!(shards = shard_count, capacity, "Fanout workers started");

        Self {
            shards: Arc::new(shards),
        }
    }

    /// Hand an event to the account's shard without waiting for delivery
    ///
    /// Returns false if the event was dropped because the shard is full or
    /// its worker is gone.
    pub fn enqueue(&self, account_id: AccountId, event: MessageEvent) -> bool {
        let shard = self.shard_for(account_id);
        let kind = event.kind();
        match self.shards[shard].try_send(FanoutJob { account_id, event }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    account_id = %account_id,
                    shard,
                    kind,
                    "Fanout shard full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    account_id = %account_id,
                    shard,
                    kind,
                    "Fanout worker gone, dropping event"
                );
                false
            }
        }
    }

    fn shard_for(&self, account_id: AccountId) -> usize {
        let mut hasher = DefaultHasher::new();
        account_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{ConnectionTransport, DeliveryError};
    use crate::presence::{ConnectionHandle, MemoryRegistry, PresenceManager};
    use async_trait::async_trait;
    use clipsync_shared::{Message, MessageId};
    use std::time::Duration;

    /// Forwards every delivered event into a channel the test can await
    struct ChannelTransport(mpsc::UnboundedSender<(ConnectionHandle, MessageEvent)>);

    #[async_trait]
    impl ConnectionTransport for ChannelTransport {
        async fn send(
            &self,
            handle: ConnectionHandle,
            event: &MessageEvent,
        ) -> Result<(), DeliveryError> {
            self.0
                .send((handle, event.clone()))
                .map_err(|_| DeliveryError::Closed(handle))
        }
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<(ConnectionHandle, MessageEvent)>,
    ) -> (ConnectionHandle, MessageEvent) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for fanout")
            .expect("transport channel closed")
    }

    #[tokio::test]
    async fn test_events_for_one_account_keep_enqueue_order() {
        let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(ChannelTransport(tx)));
        let queue = FanoutQueue::spawn(dispatcher, 4);

        let account = AccountId::new();
        let handle = ConnectionHandle::new();
        presence.register(account, handle).await.unwrap();

        let message = Message::new(account, "x");
        let mut expected = vec![MessageEvent::Created(message.clone())];
        for _ in 0..20 {
            expected.push(MessageEvent::Deleted(MessageId::new()));
        }
        expected.push(MessageEvent::Deleted(message.id));

        for event in &expected {
            queue.enqueue(account, event.clone());
        }

        for want in expected {
            let (got_handle, got) = recv(&mut rx).await;
            assert_eq!(got_handle, handle);
            assert_eq!(got, want);
        }
    }

    #[tokio::test]
    async fn test_same_account_always_maps_to_same_shard() {
        let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = FanoutDispatcher::new(presence, Arc::new(ChannelTransport(tx)));
        let queue = FanoutQueue::spawn(dispatcher, 8);

        let account = AccountId::new();
        let shard = queue.shard_for(account);
        for _ in 0..10 {
            assert_eq!(queue.shard_for(account), shard);
        }
        assert!(shard < queue.shard_count());
    }

    /// Never completes a delivery, so the shard worker stays busy
    struct StalledTransport;

    #[async_trait]
    impl ConnectionTransport for StalledTransport {
        async fn send(&self, _: ConnectionHandle, _: &MessageEvent) -> Result<(), DeliveryError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_full_shard_drops_instead_of_growing() {
        let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
        let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(StalledTransport));
        let queue = FanoutQueue::spawn_with_capacity(dispatcher, 1, 2);

        let account = AccountId::new();
        presence.register(account, ConnectionHandle::new()).await.unwrap();

        // At most one job in flight plus two buffered
        let accepted: Vec<bool> = (0..4)
            .map(|_| queue.enqueue(account, MessageEvent::Deleted(MessageId::new())))
            .collect();
        assert!(accepted[0]);
        assert!(accepted[1]);
        assert!(!accepted[3]);
    }

    #[tokio::test]
    async fn test_zero_shards_is_clamped_to_one() {
        let presence = PresenceManager::new(Arc::new(MemoryRegistry::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = FanoutDispatcher::new(presence, Arc::new(ChannelTransport(tx)));
        assert_eq!(FanoutQueue::spawn(dispatcher, 0).shard_count(), 1);
    }
}
