//! Process-wide usage ledger keyed by client identity.
//!
//! Each entry holds a turn counter and the start of its calendar-day window.
//! Windows reset lazily: the first consume or peek observed on a new day sees
//! a fresh balance. All mutation happens under the map's per-entry write
//! lock, so a check-then-increment can never overrun the limit.

use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;

use parley_types::quota::{QuotaDecision, QuotaRecord};

/// Concurrent per-client turn counters with a fixed daily allowance.
///
/// Entries are created on first consume and never removed for the life of
/// the process. The raw map is never exposed.
pub struct QuotaLedger {
    limit: u32,
    entries: DashMap<String, QuotaRecord>,
}

impl QuotaLedger {
    /// Create a ledger with the given daily limit (minimum 1).
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            entries: DashMap::new(),
        }
    }

    /// The daily allowance per client.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Atomically check the balance and consume one unit if available.
    ///
    /// A denied call leaves `count` untouched.
    pub fn try_consume(&self, client_id: &str, now: DateTime<FixedOffset>) -> QuotaDecision {
        let mut entry = self
            .entries
            .entry(client_id.to_string())
            .or_insert_with(|| QuotaRecord::fresh(now));

        let record = entry.value_mut();

        if record.is_stale(&now) {
            *record = QuotaRecord::fresh(now);
        }

        if record.count >= self.limit {
            return QuotaDecision {
                allowed: false,
                remaining: 0,
                limit: self.limit,
            };
        }

        record.count += 1;
        QuotaDecision {
            allowed: true,
            remaining: self.limit - record.count,
            limit: self.limit,
        }
    }

    /// Remaining balance without mutating anything.
    ///
    /// Unknown clients and clients whose window is from an earlier day get
    /// the full limit.
    pub fn remaining(&self, client_id: &str, now: &DateTime<FixedOffset>) -> u32 {
        match self.entries.get(client_id) {
            Some(record) if !record.is_stale(now) => {
                self.limit.saturating_sub(record.count)
            }
            _ => self.limit,
        }
    }

    /// Give back one unit consumed in the current window.
    ///
    /// Returns true if a unit was returned. Stale or unknown entries are left alone.
    pub fn refund(&self, client_id: &str, now: &DateTime<FixedOffset>) -> bool {
        match self.entries.get_mut(client_id) {
            Some(mut record) if !record.is_stale(now) && record.count > 0 => {
                record.count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Reset every entry whose window is from an earlier day.
    ///
    /// Visits entries under the same per-entry locks as `try_consume`.
    /// Returns how many entries were reset.
    pub fn normalize(&self, now: &DateTime<FixedOffset>) -> usize {
        let mut reset = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.is_stale(now) {
                *entry.value_mut() = QuotaRecord::fresh(*now);
                reset += 1;
            }
        }
        reset
    }

    /// Cloned copy of a client's record, if one exists.
    pub fn record(&self, client_id: &str) -> Option<QuotaRecord> {
        self.entries.get(client_id).map(|r| r.value().clone())
    }

    /// Number of client identities seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for QuotaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaLedger")
            .field("limit", &self.limit)
            .field("clients", &self.entries.len())
            .finish()
    }
}
