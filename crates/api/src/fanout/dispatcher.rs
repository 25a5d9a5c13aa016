//! Fanout dispatcher
//!
//! Resolves the live handles of an account and delivers one event to each of
//! them. The presence snapshot is not atomic with delivery: a handle may
//! close in between, in which case its delivery fails and is dropped.

use std::sync::Arc;

use clipsync_shared::AccountId;
use futures::future::join_all;

use super::event::MessageEvent;
use super::transport::ConnectionTransport;
use crate::presence::PresenceManager;

/// Per-publish delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Handles in the presence snapshot, one attempt each
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Best-effort delivery of events to every live connection of an account
#[derive(Clone)]
pub struct FanoutDispatcher {
    presence: PresenceManager,
    transport: Arc<dyn ConnectionTransport>,
}

impl FanoutDispatcher {
    pub fn new(presence: PresenceManager, transport: Arc<dyn ConnectionTransport>) -> Self {
        Self {
            presence,
            transport,
        }
    }

    /// Deliver `event` to each live handle of `account_id`
    ///
    /// Deliveries are independent: one failing handle never prevents the
    /// others, and failures are never returned to the caller. No retry.
    pub async fn publish(&self, account_id: AccountId, event: &MessageEvent) -> FanoutReport {
        let handles = self.presence.live_handles(account_id).await;
        if handles.is_empty() {
            tracing::debug!(
                account_id = %account_id,
                kind = event.kind(),
                "No live connections for account"
            );
            return FanoutReport::default();
        }

        let transport = &self.transport;
        let deliveries = handles.iter().map(|&handle| async move {
            let result = transport.send(handle, event).await;
            if let Err(e) = &result {
                tracing::debug!(
                    error = %e,
                    account_id = %account_id,
                    handle = %handle,
                    "Dropped event for connection"
                );
            }
            result.is_ok()
        });

        let outcomes = join_all(deliveries).await;
        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = FanoutReport {
            attempted: outcomes.len(),
            delivered,
            failed: outcomes.len() - delivered,
        };

        tracing::debug!(
            account_id = %account_id,
            kind = event.kind(),
            recipients = report.delivered,
            failed = report.failed,
            "Fanned out event"
        );

        report
    }
}
