use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BedWithStay, Hotel};
use crate::state::AppState;

// GET /api/hotels
pub async fn list_hotels(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Hotel>>, AppError> {
    let hotels = state.db.run(|conn| queries::list_hotels(conn)).await?;
    Ok(Json(hotels))
}

// GET /api/hotels/:hotel_id/beds
pub async fn list_beds(
    State(state): State<Arc<AppState>>,
    Path(hotel_id): Path<i64>,
) -> Result<Json<Vec<BedWithStay>>, AppError> {
    let beds = state
        .db
        .run(move |conn| -> anyhow::Result<Option<Vec<BedWithStay>>> {
            if queries::get_hotel(conn, hotel_id)?.is_none() {
                return Ok(None);
            }
            queries::list_beds_with_active_stay(conn, hotel_id).map(Some)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("hotel {hotel_id} not found")))?;

    Ok(Json(beds))
}
