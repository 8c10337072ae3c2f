use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use farepool_db::{models::UserRow, parse_db_time};
use farepool_types::api::{
    UpdateUserRequest, UpdateWeightsRequest, UserResponse, UsernameAvailability,
};

use crate::auth::AppState;
use crate::{ApiError, blocking};

pub(crate) fn user_response(user: UserRow) -> UserResponse {
    UserResponse {
        user_id: user.id,
        username: user.username,
        trust_score: user.trust_score,
        penalty_count: user.penalty_count,
        praise_count: user.praise_count,
        money_weight: user.money_weight,
        distance_weight: user.distance_weight,
        trust_weight: user.trust_weight,
        created_at: parse_db_time(&user.created_at),
    }
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(move || state.db.get_user(user_id)).await?;
    Ok(Json(user_response(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.username
        && (name.len() < 3 || name.len() > 50)
    {
        return Err(ApiError::Validation(
            "username must be 3-50 characters".into(),
        ));
    }
    let user = blocking(move || {
        state.db.update_user(
            user_id,
            req.username.as_deref(),
            req.trust_score,
            req.penalty_count,
            req.praise_count,
        )
    })
    .await?;
    Ok(Json(user_response(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.db.delete_user(user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_weights(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateWeightsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    for w in [req.money_weight, req.distance_weight, req.trust_weight]
        .into_iter()
        .flatten()
    {
        if !(0.0..=1.0).contains(&w) {
            return Err(ApiError::Validation("weights must be within 0.0-1.0".into()));
        }
    }
    let user = blocking(move || {
        state
            .db
            .update_user_weights(user_id, req.money_weight, req.distance_weight, req.trust_weight)
    })
    .await?;
    Ok(Json(user_response(user)))
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = query.username.clone();
    let available = blocking(move || state.db.username_available(&query.username)).await?;
    Ok(Json(UsernameAvailability {
        username,
        available,
    }))
}
