use std::collections::HashSet;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use farepool_db::{fmt_db_time, models::CandidatePostRow};
use farepool_types::api::{Claims, RecommendStatsResponse, RouteRecommendRequest};

use crate::auth::AppState;
use crate::{ApiError, blocking};

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_DEGREE_LAT: f64 = 111_000.0;
const MAX_RADIUS_M: f64 = 50_000.0;
const MAX_TOP_N: usize = 100;

// -- External ranker client --

#[derive(Debug, Serialize)]
pub struct RankRequest {
    pub user_id: i64,
    pub money_weight: f64,
    pub distance_weight: f64,
    pub trust_weight: f64,
    pub candidates: Vec<RankCandidate>,
    pub top_n: usize,
}

#[derive(Debug, Serialize)]
pub struct RankCandidate {
    #[serde(rename = "postId")]
    pub post_id: i64,
    pub price: i64,
    pub distance: f64,
    pub trust: f64,
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    ranked_post_ids: Vec<i64>,
}

/// HTTP client for the external ranking service. The service owns the scoring
/// model; this side only assembles candidates and weights.
#[derive(Clone)]
pub struct RankClient {
    http: reqwest::Client,
    base_url: String,
}

impl RankClient {
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub async fn rank(&self, req: &RankRequest) -> anyhow::Result<Vec<i64>> {
        let resp: RankResponse = self
            .http
            .post(format!("{}/rank", self.base_url))
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.ranked_post_ids)
    }
}

// -- Geometry --

/// Great-circle distance in meters.
fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// (min_lat, max_lat, min_lng, max_lng) box around a point. The longitude
/// delta widens with latitude; the exact cut happens later with the Haversine
/// distance, so the box only needs to be a superset.
fn bounding_box(lat: f64, lng: f64, radius_m: f64) -> (f64, f64, f64, f64) {
    let lat_delta = radius_m / METERS_PER_DEGREE_LAT;
    let lng_delta = radius_m / (METERS_PER_DEGREE_LAT * lat.to_radians().cos());
    (lat - lat_delta, lat + lat_delta, lng - lng_delta, lng + lng_delta)
}

fn validate_point(lat: f64, lng: f64, radius_m: f64, top_n: usize) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::Validation("latitude must be within -90 and 90".into()));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::Validation(
            "longitude must be within -180 and 180".into(),
        ));
    }
    if radius_m <= 0.0 || radius_m > MAX_RADIUS_M {
        return Err(ApiError::Validation(format!(
            "radius must be within (0, {MAX_RADIUS_M}] meters"
        )));
    }
    if top_n == 0 || top_n > MAX_TOP_N {
        return Err(ApiError::Validation(format!(
            "top_n must be within 1 and {MAX_TOP_N}"
        )));
    }
    Ok(())
}

/// The ranker's answer is untrusted: keep only ids we actually offered, drop
/// duplicates, cut at top_n.
fn filter_ranked(ranked: Vec<i64>, offered: &HashSet<i64>, top_n: usize) -> Vec<i64> {
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|id| offered.contains(id) && seen.insert(*id))
        .take(top_n)
        .collect()
}

fn to_candidate(row: &CandidatePostRow, distance_m: f64) -> RankCandidate {
    RankCandidate {
        post_id: row.post_id,
        price: row.estimated_price.unwrap_or(0),
        distance: distance_m,
        // Empty groups fall back to the host's own score.
        trust: row.member_trust.unwrap_or(row.host_trust),
    }
}

// -- Handlers --

#[derive(Deserialize)]
pub struct RecommendQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius: f64,
    pub top_n: usize,
}

#[derive(Serialize)]
pub struct RecommendResponse {
    pub ranked_post_ids: Vec<i64>,
}

/// Point recommendation. Bad query parameters are the caller's problem and
/// fail with 400; anything that breaks after that degrades to an empty list
/// so recommendation can never take a caller flow down with it.
pub async fn recommend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<RecommendQuery>,
) -> Result<impl IntoResponse, ApiError> {
    validate_point(q.lat, q.lng, q.radius, q.top_n)?;

    let ranked = point_pipeline(&state, claims.sub, &q).await.unwrap_or_else(|e| {
        error!("Recommendation pipeline failed for user {}: {:#}", claims.sub, e);
        Vec::new()
    });
    Ok(Json(RecommendResponse {
        ranked_post_ids: ranked,
    }))
}

async fn point_pipeline(
    state: &AppState,
    user_id: i64,
    q: &RecommendQuery,
) -> anyhow::Result<Vec<i64>> {
    let user = {
        let state = state.clone();
        blocking(move || state.db.get_user(user_id)).await?
    };

    let now = fmt_db_time(chrono::Utc::now());
    let (min_lat, max_lat, min_lng, max_lng) = bounding_box(q.lat, q.lng, q.radius);
    let rows = {
        let state = state.clone();
        blocking(move || {
            state
                .db
                .nearby_open_candidates(user_id, &now, min_lat, max_lat, min_lng, max_lng)
        })
        .await?
    };

    // Exact radius cut on the start point.
    let candidates: Vec<RankCandidate> = rows
        .iter()
        .filter_map(|row| {
            let d = haversine_m(q.lat, q.lng, row.start_latitude, row.start_longitude);
            (d <= q.radius).then(|| to_candidate(row, d))
        })
        .collect();

    rank_candidates(state, &user, candidates, q.top_n).await
}

pub async fn recommend_route(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RouteRecommendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_point(
        req.departure_latitude,
        req.departure_longitude,
        req.radius_m,
        req.top_n,
    )?;
    validate_point(
        req.destination_latitude,
        req.destination_longitude,
        req.radius_m,
        req.top_n,
    )?;

    let ranked = route_pipeline(&state, claims.sub, &req)
        .await
        .unwrap_or_else(|e| {
            error!(
                "Route recommendation pipeline failed for user {}: {:#}",
                claims.sub, e
            );
            Vec::new()
        });
    Ok(Json(RecommendResponse {
        ranked_post_ids: ranked,
    }))
}

async fn route_pipeline(
    state: &AppState,
    user_id: i64,
    req: &RouteRecommendRequest,
) -> anyhow::Result<Vec<i64>> {
    let user = {
        let state = state.clone();
        blocking(move || state.db.get_user(user_id)).await?
    };

    let now = fmt_db_time(chrono::Utc::now());
    let dep_box = bounding_box(req.departure_latitude, req.departure_longitude, req.radius_m);
    let dest_box = bounding_box(
        req.destination_latitude,
        req.destination_longitude,
        req.radius_m,
    );
    let rows = {
        let state = state.clone();
        blocking(move || state.db.route_open_candidates(user_id, &now, dep_box, dest_box)).await?
    };

    // Distance is the mean of the two endpoint gaps, both inside the radius.
    let candidates: Vec<RankCandidate> = rows
        .iter()
        .filter_map(|row| {
            let d_start = haversine_m(
                req.departure_latitude,
                req.departure_longitude,
                row.start_latitude,
                row.start_longitude,
            );
            let d_end = haversine_m(
                req.destination_latitude,
                req.destination_longitude,
                row.end_latitude,
                row.end_longitude,
            );
            (d_start <= req.radius_m && d_end <= req.radius_m)
                .then(|| to_candidate(row, (d_start + d_end) / 2.0))
        })
        .collect();

    rank_candidates(state, &user, candidates, req.top_n).await
}

async fn rank_candidates(
    state: &AppState,
    user: &farepool_db::models::UserRow,
    candidates: Vec<RankCandidate>,
    top_n: usize,
) -> anyhow::Result<Vec<i64>> {
    if candidates.is_empty() {
        debug!("No recommendation candidates for user {}", user.id);
        return Ok(Vec::new());
    }
    let top_n = top_n.min(candidates.len());
    let offered: HashSet<i64> = candidates.iter().map(|c| c.post_id).collect();

    let ranked = state
        .ranker
        .rank(&RankRequest {
            user_id: user.id,
            money_weight: user.money_weight,
            distance_weight: user.distance_weight,
            trust_weight: user.trust_weight,
            candidates,
            top_n,
        })
        .await?;

    Ok(filter_ranked(ranked, &offered, top_n))
}

pub async fn recommend_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let user = {
        let state = state.clone();
        blocking(move || state.db.get_user(user_id)).await?
    };
    let (total, active) = blocking(move || state.db.participation_counts(user_id)).await?;

    Ok(Json(RecommendStatsResponse {
        user_id: user.id,
        username: user.username,
        trust_score: user.trust_score,
        total_participations: total,
        active_participations: active,
        money_weight: user.money_weight,
        distance_weight: user.distance_weight,
        trust_weight: user.trust_weight,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distances() {
        assert_eq!(haversine_m(37.5, 127.0, 37.5, 127.0), 0.0);
        // One degree of latitude is about 111.2 km.
        let d = haversine_m(37.0, 127.0, 38.0, 127.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn bounding_box_is_a_superset_of_the_radius() {
        let (min_lat, max_lat, min_lng, max_lng) = bounding_box(37.5, 127.0, 5000.0);
        assert!(max_lat - min_lat >= 2.0 * 5000.0 / METERS_PER_DEGREE_LAT - 1e-9);
        // Longitude degrees shrink away from the equator, so the delta grows.
        assert!(max_lng - min_lng > max_lat - min_lat);
        // Points on the radius stay inside the box.
        let edge_lat = 37.5 + 5000.0 / METERS_PER_DEGREE_LAT;
        assert!(edge_lat <= max_lat + 1e-9);
    }

    #[test]
    fn validation_rejects_out_of_range_input() {
        assert!(validate_point(37.5, 127.0, 3000.0, 10).is_ok());
        assert!(validate_point(91.0, 127.0, 3000.0, 10).is_err());
        assert!(validate_point(37.5, 181.0, 3000.0, 10).is_err());
        assert!(validate_point(37.5, 127.0, -5.0, 10).is_err());
        assert!(validate_point(37.5, 127.0, 0.0, 10).is_err());
        assert!(validate_point(37.5, 127.0, 50_001.0, 10).is_err());
        assert!(validate_point(37.5, 127.0, 3000.0, 0).is_err());
        assert!(validate_point(37.5, 127.0, 3000.0, 101).is_err());
    }

    #[test]
    fn ranker_output_is_filtered_to_offered_ids() {
        let offered: HashSet<i64> = [1, 2, 3].into_iter().collect();
        // Unknown id, duplicate, then truncation to top_n.
        let out = filter_ranked(vec![9, 2, 2, 1, 3], &offered, 2);
        assert_eq!(out, vec![2, 1]);
    }

    #[test]
    fn empty_group_trust_falls_back_to_host() {
        let row = CandidatePostRow {
            post_id: 7,
            estimated_price: None,
            start_latitude: 37.5,
            start_longitude: 127.0,
            end_latitude: 37.4,
            end_longitude: 126.7,
            host_trust: 42.0,
            member_trust: None,
        };
        let c = to_candidate(&row, 120.0);
        assert_eq!(c.trust, 42.0);
        assert_eq!(c.price, 0);
    }
}
