//! Quota service: check-and-consume, peek, and refund over a ledger.
//!
//! The service owns the clock and the reset policy. Resets are lazy; the
//! optional sweeper only normalizes stale entries in the background and is
//! never relied on for correctness.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use parley_types::quota::{QuotaDecision, UsageSnapshot};

use super::clock::{Clock, SystemClock};
use super::ledger::QuotaLedger;

/// Daily usage quota keyed by client identity.
pub struct QuotaService<C: Clock = SystemClock> {
    ledger: QuotaLedger,
    clock: C,
}

impl QuotaService<SystemClock> {
    /// A service on the host's local clock.
    pub fn with_limit(limit: u32) -> Self {
        Self::new(limit, SystemClock)
    }
}

impl<C: Clock> QuotaService<C> {
    pub fn new(limit: u32, clock: C) -> Self {
        Self {
            ledger: QuotaLedger::new(limit),
            clock,
        }
    }

    pub fn limit(&self) -> u32 {
        self.ledger.limit()
    }

    /// Consume one turn for `client_id` if the balance allows it.
    pub fn try_consume(&self, client_id: &str) -> QuotaDecision {
        let decision = self.ledger.try_consume(client_id, self.clock.now());
        if decision.allowed {
            debug!(client_id, remaining = decision.remaining, "Quota consumed");
        } else {
            info!(client_id, limit = decision.limit, "Quota exceeded");
        }
        decision
    }

    /// Current balance. Never mutates the ledger.
    pub fn peek(&self, client_id: &str) -> UsageSnapshot {
        UsageSnapshot {
            remaining_count: self.ledger.remaining(client_id, &self.clock.now()),
            total_count: self.ledger.limit(),
        }
    }

    /// Return one unit to `client_id` after a turn failed downstream.
    pub fn refund(&self, client_id: &str) -> bool {
        let refunded = self.ledger.refund(client_id, &self.clock.now());
        if refunded {
            debug!(client_id, "Quota unit refunded");
        }
        refunded
    }

    /// Whole hours until the next calendar-day reset, rounded up (at least 1).
    pub fn hours_until_reset(&self) -> u32 {
        hours_until_next_day(&self.clock.now())
    }

    /// Reset all stale windows now. Returns the number of entries reset.
    pub fn normalize(&self) -> usize {
        self.ledger.normalize(&self.clock.now())
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }
}

impl<C: Clock + 'static> QuotaService<C> {
    /// Periodically normalize stale windows until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Quota sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reset = service.normalize();
                        if reset > 0 {
                            info!(reset, "Quota sweep reset stale windows");
                        }
                    }
                }
            }
        })
    }
}

fn hours_until_next_day(now: &DateTime<FixedOffset>) -> u32 {
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| dt.and_local_timezone(*now.offset()).single());

    let Some(next_midnight) = next_midnight else {
        return 24;
    };

    let left: TimeDelta = next_midnight - *now;
    let secs = left.num_seconds().max(0) as u64;
    secs.div_ceil(3600).max(1) as u32
}
