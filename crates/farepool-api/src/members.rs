use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use farepool_db::{models::GroupChange, models::GroupMemberRow, parse_db_time};
use farepool_types::api::{
    Claims, GroupChangeResponse, GroupMemberResponse, HostCheckResponse, JoinGroupRequest,
};
use farepool_types::models::PaymentStatus;

use crate::auth::AppState;
use crate::{ApiError, blocking};

fn member_response(row: GroupMemberRow) -> GroupMemberResponse {
    GroupMemberResponse {
        group_id: row.group_id,
        user_id: row.user_id,
        is_host: row.is_host,
        payment_status: PaymentStatus::parse(&row.payment_status).unwrap_or(PaymentStatus::Wait),
        joined_at: parse_db_time(&row.joined_at),
    }
}

fn change_response(change: &GroupChange) -> GroupChangeResponse {
    GroupChangeResponse {
        group_id: change.group_id,
        user_id: change.user_id,
        current_member_count: change.current_member_count,
        max_member_count: change.max_member_count,
        estimate_price_per_member: change.estimate_price_per_member,
    }
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let change = {
        let state = state.clone();
        blocking(move || state.db.join_group(req.group_id, user_id)).await?
    };

    let resp = change_response(&change);
    tokio::spawn(async move {
        state.chat.add_member(change.post_id, change.user_id).await;
    });
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn leave_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let change = {
        let state = state.clone();
        blocking(move || state.db.leave_group(group_id, user_id)).await?
    };

    let resp = change_response(&change);
    tokio::spawn(async move {
        state
            .chat
            .remove_member(change.post_id, change.user_id)
            .await;
    });
    Ok(Json(resp))
}

/// Removes `user_id` from the group. Members may remove themselves; removing
/// anyone else is a kick and only the host may do it.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let caller_id = claims.sub;
    let kicked = user_id != caller_id;
    if kicked {
        let state = state.clone();
        let is_host = blocking(move || state.db.is_group_host(group_id, caller_id)).await?;
        if !is_host {
            return Err(ApiError::Forbidden);
        }
    }

    let change = {
        let state = state.clone();
        blocking(move || state.db.leave_group(group_id, user_id)).await?
    };

    let resp = change_response(&change);
    tokio::spawn(async move {
        if kicked {
            state
                .chat
                .kick_member(change.post_id, caller_id, change.user_id)
                .await;
        } else {
            state
                .chat
                .remove_member(change.post_id, change.user_id)
                .await;
        }
    });
    Ok(Json(resp))
}

pub async fn members_of_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let members = blocking(move || state.db.members_of_group(group_id)).await?;
    let out: Vec<GroupMemberResponse> = members.into_iter().map(member_response).collect();
    Ok(Json(out))
}

pub async fn my_memberships(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let members = blocking(move || state.db.memberships_of_user(user_id)).await?;
    let out: Vec<GroupMemberResponse> = members.into_iter().map(member_response).collect();
    Ok(Json(out))
}

pub async fn is_host(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let is_host = blocking(move || state.db.is_group_host(group_id, user_id)).await?;
    Ok(Json(HostCheckResponse {
        group_id,
        user_id,
        is_host,
    }))
}

pub async fn get_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let member = blocking(move || state.db.get_member(group_id, user_id)).await?;
    Ok(Json(member_response(member)))
}
