use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};

use crate::auth::Identity;
use crate::errors::AppError;
use crate::services::occupancy::{self, LedgerDiscrepancy};
use crate::state::AppState;

// GET /api/ledger/audit
pub async fn audit(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<LedgerDiscrepancy>>, AppError> {
    identity.require_admin()?;

    let discrepancies = state.db.run(|conn| occupancy::audit(conn)).await?;
    if !discrepancies.is_empty() {
        tracing::warn!(count = discrepancies.len(), "ledger discrepancies found");
    }
    Ok(Json(discrepancies))
}
