use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use farepool_db::{fmt_db_time, models::NewPost, models::PostDetailRow, parse_db_time};
use farepool_types::api::{
    Claims, CreatePostRequest, GeoPoint, PostResponse, PostsByIdsRequest,
};
use farepool_types::models::PostStatus;

use crate::auth::AppState;
use crate::{ApiError, blocking};

pub(crate) fn post_response(row: PostDetailRow) -> PostResponse {
    PostResponse {
        post_id: row.id,
        host_id: row.host_id,
        host_username: row.host_username,
        start: GeoPoint {
            latitude: row.start_latitude,
            longitude: row.start_longitude,
        },
        end: GeoPoint {
            latitude: row.end_latitude,
            longitude: row.end_longitude,
        },
        start_address: row.start_address,
        end_address: row.end_address,
        desired_members: row.desired_members,
        estimated_price: row.estimated_price,
        estimate_price_per_member: row.estimate_price_per_member,
        departure_time: parse_db_time(&row.departure_time),
        duration_minutes: row.duration_minutes,
        status: PostStatus::parse(&row.status).unwrap_or(PostStatus::Closed),
        created_at: parse_db_time(&row.created_at),
        group_id: row.group_id,
        current_members: row.current_member_count,
        max_members: row.max_member_count,
    }
}

fn validate_coords(lat: f64, lng: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::Validation("latitude must be within -90 and 90".into()));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::Validation(
            "longitude must be within -180 and 180".into(),
        ));
    }
    Ok(())
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_coords(req.start_latitude, req.start_longitude)?;
    validate_coords(req.end_latitude, req.end_longitude)?;
    if req.desired_members < 1 {
        return Err(ApiError::Validation("desired_members must be at least 1".into()));
    }
    if let Some(price) = req.estimated_price
        && price < 0
    {
        return Err(ApiError::Validation("estimated_price must not be negative".into()));
    }

    let host_id = claims.sub;
    let (post_id, _group_id) = {
        let state = state.clone();
        blocking(move || {
            state.db.create_post_with_group(NewPost {
                host_id,
                start_latitude: req.start_latitude,
                start_longitude: req.start_longitude,
                end_latitude: req.end_latitude,
                end_longitude: req.end_longitude,
                start_address: req.start_address,
                end_address: req.end_address,
                desired_members: req.desired_members,
                estimated_price: req.estimated_price,
                departure_time: fmt_db_time(req.departure_time),
                duration_minutes: req.duration_minutes,
            })
        })
        .await?
    };

    // Chat room creation is mirrored out of band; the post exists either way.
    {
        let state = state.clone();
        tokio::spawn(async move {
            state.chat.create_room(post_id, host_id).await;
        });
    }

    let detail = blocking(move || state.db.get_post_detail(post_id)).await?;
    Ok((StatusCode::CREATED, Json(post_response(detail))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = blocking(move || state.db.get_post_detail(post_id)).await?;
    Ok(Json(post_response(detail)))
}

/// Open posts the caller could still join: not departed, group not full.
pub async fn available_posts(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let now = fmt_db_time(chrono::Utc::now());
    let rows = blocking(move || state.db.available_posts(&now)).await?;
    let posts: Vec<PostResponse> = rows.into_iter().map(post_response).collect();
    Ok(Json(posts))
}

/// Batch fetch in the caller's id order. Unknown ids are silently dropped,
/// which is what the ranked-result consumer wants. With
/// `include_host_in_estimate` the per-member estimate is recomputed as if the
/// caller had already taken a seat.
pub async fn posts_by_ids(
    State(state): State<AppState>,
    Json(req): Json<PostsByIdsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.post_ids.len() > 100 {
        return Err(ApiError::Validation("at most 100 post ids per request".into()));
    }

    let ids = req.post_ids.clone();
    let rows = blocking(move || state.db.posts_by_ids(&ids)).await?;

    let mut by_id: std::collections::HashMap<i64, PostResponse> = rows
        .into_iter()
        .map(|row| (row.id, post_response(row)))
        .collect();

    let mut posts = Vec::with_capacity(req.post_ids.len());
    for id in &req.post_ids {
        if let Some(mut post) = by_id.remove(id) {
            if req.include_host_in_estimate {
                post.estimate_price_per_member = prospective_share(
                    post.estimated_price,
                    post.current_members,
                );
            }
            posts.push(post);
        }
    }
    Ok(Json(posts))
}

/// Share if one more rider joined the group now.
fn prospective_share(estimated_price: Option<i64>, current_members: Option<i64>) -> Option<i64> {
    let price = estimated_price?;
    let count = current_members.unwrap_or(0) + 1;
    Some(price / count)
}

#[cfg(test)]
mod tests {
    use super::prospective_share;

    #[test]
    fn prospective_share_counts_the_caller() {
        assert_eq!(prospective_share(Some(9000), Some(2)), Some(3000));
        assert_eq!(prospective_share(Some(10000), Some(2)), Some(3333));
        assert_eq!(prospective_share(Some(9000), None), Some(9000));
        assert_eq!(prospective_share(None, Some(2)), None);
    }
}
