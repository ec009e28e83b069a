//! Usage quota types for Parley.
//!
//! A client identity (network address or equivalent token) gets a fixed
//! number of chat turns per calendar day. These types model the ledger
//! record, the outcome of a consume attempt, and the JSON bodies exchanged
//! over `/api/check-usage` and `/api/usage-info`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Default number of turns a client may initiate per calendar day.
pub const DEFAULT_DAILY_LIMIT: u32 = 10;

/// Ledger entry for a single client identity.
///
/// Invariant: `0 <= count <= limit` for the ledger that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Turns consumed in the current window.
    pub count: u32,
    /// When the window was last reset.
    pub window_start: DateTime<FixedOffset>,
}

impl QuotaRecord {
    /// A fresh record with nothing consumed, windowed at `now`.
    pub fn fresh(now: DateTime<FixedOffset>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Whether `now` falls on a different calendar day than `window_start`.
    ///
    /// Both sides are compared in `now`'s offset so a clock that changes
    /// offset (DST) still compares wall-clock days.
    pub fn is_stale(&self, now: &DateTime<FixedOffset>) -> bool {
        self.window_start.with_timezone(now.offset()).date_naive() != now.date_naive()
    }
}

/// Outcome of a check-and-consume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
}

/// Read-only balance, as returned by peek and by a successful consume.
///
/// Serialized in the camelCase shape the web client expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub remaining_count: u32,
    pub total_count: u32,
}

impl From<QuotaDecision> for UsageSnapshot {
    fn from(d: QuotaDecision) -> Self {
        Self {
            remaining_count: d.remaining,
            total_count: d.limit,
        }
    }
}

/// Body of the HTTP 429 response when a client has exhausted its allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaExceededBody {
    pub error: String,
    /// Whole hours until the next calendar-day reset.
    pub remaining_time: u32,
}
