//! Usage quota handlers: check-and-consume and read-only balance.

use axum::Json;
use axum::extract::State;

use parley_types::quota::UsageSnapshot;

use crate::http::error::AppError;
use crate::http::extractors::client::ClientIdentity;
use crate::state::AppState;

/// POST /api/check-usage - Consume one turn for the calling client.
///
/// 200 with the new balance, or 429 with hours until reset.
pub async fn check_usage(
    State(state): State<AppState>,
    ClientIdentity(client_id): ClientIdentity,
) -> Result<Json<UsageSnapshot>, AppError> {
    let decision = state.quota.try_consume(&client_id);
    if decision.allowed {
        Ok(Json(decision.into()))
    } else {
        Err(AppError::QuotaExceeded {
            remaining_time: state.quota.hours_until_reset(),
        })
    }
}

/// GET /api/usage-info - Current balance for the calling client. Never consumes.
pub async fn usage_info(
    State(state): State<AppState>,
    ClientIdentity(client_id): ClientIdentity,
) -> Json<UsageSnapshot> {
    Json(state.quota.peek(&client_id))
}
