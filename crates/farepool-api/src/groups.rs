use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use farepool_db::{models::GroupRow, parse_db_time};
use farepool_types::api::{Claims, CreateGroupRequest, GroupResponse};
use farepool_types::models::GroupStatus;

use crate::auth::AppState;
use crate::{ApiError, blocking};

pub(crate) fn group_response(row: GroupRow) -> GroupResponse {
    GroupResponse {
        group_id: row.id,
        post_id: row.post_id,
        max_member_count: row.max_member_count,
        current_member_count: row.current_member_count,
        status: GroupStatus::parse(&row.status).unwrap_or(GroupStatus::Completed),
        created_at: parse_db_time(&row.created_at),
    }
}

/// Direct group creation for an existing post. The normal path seeds the group
/// during post creation; this endpoint exists for clients that manage groups
/// themselves.
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.max_member_count < 1 {
        return Err(ApiError::Validation(
            "max_member_count must be at least 1".into(),
        ));
    }
    if req.current_member_count < 0 || req.current_member_count > req.max_member_count {
        return Err(ApiError::Validation(
            "current_member_count must be within 0 and max_member_count".into(),
        ));
    }
    let status = req.status.unwrap_or(GroupStatus::Waiting);
    let group = blocking(move || {
        state.db.create_group(
            req.post_id,
            req.max_member_count,
            req.current_member_count,
            status.as_str(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(group_response(group))))
}

pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let groups = blocking(move || state.db.list_groups()).await?;
    let out: Vec<GroupResponse> = groups.into_iter().map(group_response).collect();
    Ok(Json(out))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let group = blocking(move || state.db.get_group(group_id)).await?;
    Ok(Json(group_response(group)))
}

pub async fn group_by_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let group = blocking(move || state.db.group_by_post(post_id)).await?;
    Ok(Json(group_response(group)))
}

pub async fn my_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let groups = blocking(move || state.db.groups_for_user(user_id)).await?;
    let out: Vec<GroupResponse> = groups.into_iter().map(group_response).collect();
    Ok(Json(out))
}
