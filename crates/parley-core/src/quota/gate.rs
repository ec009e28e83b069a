//! QuotaGate trait definition.
//!
//! The turn engine consults a gate before every turn. The in-process
//! `QuotaService` is one gate; `parley-infra` provides an HTTP client gate
//! that talks to a running `parley serve`.

use std::future::Future;
use std::sync::Arc;

use parley_types::error::QuotaError;
use parley_types::quota::UsageSnapshot;

use super::clock::Clock;
use super::service::QuotaService;

/// Check-and-consume access to a usage quota.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait QuotaGate: Send + Sync {
    /// Consume one turn. `Err(QuotaError::Exceeded)` when the allowance is spent.
    fn try_consume(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<UsageSnapshot, QuotaError>> + Send;

    /// Read the balance without consuming.
    fn peek(&self, client_id: &str)
    -> impl Future<Output = Result<UsageSnapshot, QuotaError>> + Send;

    /// Give back a unit consumed by a turn that failed before anything was appended.
    fn refund(&self, client_id: &str) -> impl Future<Output = Result<(), QuotaError>> + Send;
}

impl<C: Clock> QuotaGate for QuotaService<C> {
    async fn try_consume(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        let decision = QuotaService::try_consume(self, client_id);
        if decision.allowed {
            Ok(decision.into())
        } else {
            Err(QuotaError::Exceeded {
                retry_after_hours: self.hours_until_reset(),
            })
        }
    }

    async fn peek(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        Ok(QuotaService::peek(self, client_id))
    }

    async fn refund(&self, client_id: &str) -> Result<(), QuotaError> {
        QuotaService::refund(self, client_id);
        Ok(())
    }
}

impl<G: QuotaGate + ?Sized> QuotaGate for Arc<G> {
    fn try_consume(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<UsageSnapshot, QuotaError>> + Send {
        (**self).try_consume(client_id)
    }

    fn peek(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<UsageSnapshot, QuotaError>> + Send {
        (**self).peek(client_id)
    }

    fn refund(&self, client_id: &str) -> impl Future<Output = Result<(), QuotaError>> + Send {
        (**self).refund(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn service_gate_reports_exceeded_as_error() {
        let svc = QuotaService::with_limit(1);
        let first = QuotaGate::try_consume(&svc, "A").await.unwrap();
        assert_eq!(first.remaining_count, 0);
        assert_eq!(first.total_count, 1);

        let err = QuotaGate::try_consume(&svc, "A").await.unwrap_err();
        assert!(matches!(err, QuotaError::Exceeded { retry_after_hours } if retry_after_hours >= 1));
    }

    #[tokio::test]
    async fn arc_gate_delegates() {
        let svc = Arc::new(QuotaService::with_limit(3));
        QuotaGate::try_consume(&svc, "A").await.unwrap();
        QuotaGate::refund(&svc, "A").await.unwrap();
        let snap = QuotaGate::peek(&svc, "A").await.unwrap();
        assert_eq!(snap.remaining_count, 3);
    }
}
