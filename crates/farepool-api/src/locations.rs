use axum::{Json, extract::{Path, State}, http::StatusCode, response::IntoResponse};

use farepool_db::{models::LocationRow, parse_db_time};
use farepool_types::api::{CreateLocationRequest, LocationResponse};

use crate::auth::AppState;
use crate::{ApiError, blocking};

fn location_response(row: LocationRow) -> LocationResponse {
    LocationResponse {
        location_id: row.id,
        latitude: row.latitude,
        longitude: row.longitude,
        user_id: row.user_id,
        post_id: row.post_id,
        created_at: parse_db_time(&row.created_at),
    }
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(req): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return Err(ApiError::Validation("coordinates out of range".into()));
    }
    let row = blocking(move || {
        state
            .db
            .create_location(req.latitude, req.longitude, req.user_id, req.post_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(location_response(row))))
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = blocking(move || state.db.get_location(location_id)).await?;
    Ok(Json(location_response(row)))
}
