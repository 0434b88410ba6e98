// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling worker that leases due queue entries and feeds the consumer.

use std::time::Duration;

use gatehouse_config::model::QueueConfig;
use gatehouse_core::GatehouseError;
use gatehouse_storage::queries::queue;
use gatehouse_storage::QueueEntry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::consumer;
use crate::context::AdmissionContext;
use crate::metrics;

/// Drives delayed queue delivery.
///
/// Each poll leases up to `batch_size` due entries, hands them to
/// [`consumer::handle`] one by one, and acks or fails each. A worker that
/// dies mid-batch leaves its leases to expire, after which another poll
/// redelivers them.
pub struct QueueWorker {
    ctx: AdmissionContext,
    poll_interval: Duration,
    batch_size: usize,
    lease_secs: u64,
    retry_backoff_secs: u64,
}

impl QueueWorker {
    pub fn new(ctx: AdmissionContext, config: &QueueConfig) -> Self {
        Self {
            ctx,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            batch_size: config.batch_size as usize,
            lease_secs: config.lease_secs,
            retry_backoff_secs: config.retry_backoff_secs,
        }
    }

    /// Polls until `cancel` fires. The batch in flight is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "queue worker started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(0) => {}
                        Ok(n) => debug!(delivered = n, "queue batch processed"),
                        Err(e) => error!(error = %e, "queue poll failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("queue worker shutting down");
                    break;
                }
            }
        }
    }

    /// Processes one batch of due entries. Returns how many were leased.
    pub async fn run_once(&self) -> Result<usize, GatehouseError> {
        let due = queue::lease_due(&self.ctx.db, self.ctx.now(), self.lease_secs, self.batch_size).await?;
        let leased = due.len();
        for entry in due {
            self.deliver(entry).await?;
        }
        Ok(leased)
    }

    async fn deliver(&self, entry: QueueEntry) -> Result<(), GatehouseError> {
        let kind = delivery_kind(&entry.kind);
        let result = match entry.action() {
            Ok(action) => consumer::handle(&self.ctx, &action).await,
            Err(e) => {
                // A payload that cannot be decoded will never succeed.
                error!(id = entry.id, kind = %entry.kind, error = %e, "parking malformed queue entry");
                Err(e)
            }
        };

        match result {
            Ok(()) => {
                queue::ack(&self.ctx.db, entry.id, self.ctx.now()).await?;
                metrics::record_delivery(kind, "completed");
            }
            Err(e) => {
                let parked = queue::fail(
                    &self.ctx.db,
                    entry.id,
                    &e.to_string(),
                    self.ctx.now(),
                    self.retry_backoff_secs,
                )
                .await?;
                if parked {
                    metrics::record_delivery(kind, "parked");
                    error!(id = entry.id, kind = %entry.kind, attempts = entry.attempts + 1, error = %e, "queue entry parked");
                } else {
                    metrics::record_delivery(kind, "retry");
                    warn!(id = entry.id, kind = %entry.kind, attempts = entry.attempts + 1, error = %e, "queue delivery failed, will retry");
                }
            }
        }
        Ok(())
    }
}

fn delivery_kind(kind: &str) -> &'static str {
    match kind {
        "welcome-timeout" => "welcome-timeout",
        "notification-expired" => "notification-expired",
        _ => "unknown",
    }
}
