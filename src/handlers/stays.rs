use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::GuestDetails;
use crate::services::occupancy::{self, Cancellation};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CheckInRequest {
    pub bed_id: i64,
    pub full_name: String,
    pub mobile_number: String,
    pub check_in: DateTime<Utc>,
    /// Planned departure; informational only.
    #[serde(default)]
    pub check_out: Option<DateTime<Utc>>,
    pub amount_paid: f64,
    pub payment_mode: String,
}

#[derive(Deserialize)]
pub struct CheckOutRequest {
    pub customer_id: i64,
}

// POST /api/customers
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let bed_id = req.bed_id;
    let guest = GuestDetails {
        full_name: req.full_name.trim().to_string(),
        mobile_number: req.mobile_number.trim().to_string(),
        check_in: req.check_in.naive_utc(),
        planned_check_out: req.check_out.map(|dt| dt.naive_utc()),
        amount_paid: req.amount_paid,
        payment_mode: req.payment_mode.trim().to_string(),
    };
    guest.validate().map_err(AppError::BadRequest)?;

    let cancel = Cancellation::new();
    let guard = cancel.drop_guard();
    let result = state
        .db
        .run(move |conn| occupancy::open_stay(conn, bed_id, &guest, &cancel))
        .await;
    guard.disarm();
    let stay_id = result?;

    tracing::info!(staff = %identity.username, bed_id, stay_id, "guest checked in");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": stay_id }))))
}

// POST /api/customers/checkout
pub async fn check_out(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CheckOutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stay_id = req.customer_id;

    let cancel = Cancellation::new();
    let guard = cancel.drop_guard();
    let result = state
        .db
        .run(move |conn| occupancy::close_stay(conn, stay_id, &cancel))
        .await;
    guard.disarm();
    let closed = result?;

    tracing::info!(staff = %identity.username, bed_id = closed.bed_id, stay_id, "guest checked out");
    Ok(Json(serde_json::json!({
        "message": "Customer checked out successfully",
        "bed_id": closed.bed_id,
        "check_out": closed.check_out,
    })))
}
