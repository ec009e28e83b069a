//! Per-client daily usage quota.
//!
//! - `ledger`: the concurrent map of client identity -> `QuotaRecord`
//! - `service`: check-and-consume / peek / refund over a ledger plus a clock
//! - `gate`: the `QuotaGate` port the turn engine consumes
//! - `clock`: injectable wall clock used for calendar-day windows

pub mod clock;
pub mod gate;
pub mod ledger;
pub mod service;
