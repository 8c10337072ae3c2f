use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BillStatus, GroupStatus, PaymentStatus, PostStatus};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the auth handlers.
/// `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth / users --

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub trust_score: Option<f64>,
    pub money_weight: Option<f64>,
    pub distance_weight: Option<f64>,
    pub trust_weight: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub username: String,
    pub trust_score: f64,
    pub penalty_count: i64,
    pub praise_count: i64,
    pub money_weight: f64,
    pub distance_weight: f64,
    pub trust_weight: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub trust_score: Option<f64>,
    pub penalty_count: Option<i64>,
    pub praise_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWeightsRequest {
    pub money_weight: Option<f64>,
    pub distance_weight: Option<f64>,
    pub trust_weight: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct UsernameAvailability {
    pub username: String,
    pub available: bool,
}

// -- Posts --

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub desired_members: i64,
    pub estimated_price: Option<i64>,
    pub departure_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post_id: i64,
    pub host_id: i64,
    pub host_username: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub desired_members: i64,
    pub estimated_price: Option<i64>,
    pub estimate_price_per_member: Option<i64>,
    pub departure_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub group_id: Option<i64>,
    pub current_members: Option<i64>,
    pub max_members: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PostsByIdsRequest {
    pub post_ids: Vec<i64>,
    #[serde(default)]
    pub include_host_in_estimate: bool,
}

// -- Groups --

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub post_id: i64,
    pub max_member_count: i64,
    #[serde(default)]
    pub current_member_count: i64,
    pub status: Option<GroupStatus>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub group_id: i64,
    pub post_id: i64,
    pub max_member_count: i64,
    pub current_member_count: i64,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

// -- Group membership --

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GroupMemberResponse {
    pub group_id: i64,
    pub user_id: i64,
    pub is_host: bool,
    pub payment_status: PaymentStatus,
    pub joined_at: DateTime<Utc>,
}

/// Returned after a join/leave so the client can refresh counts and the
/// per-member price without a second round trip.
#[derive(Debug, Serialize)]
pub struct GroupChangeResponse {
    pub group_id: i64,
    pub user_id: i64,
    pub current_member_count: i64,
    pub max_member_count: i64,
    pub estimate_price_per_member: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HostCheckResponse {
    pub group_id: i64,
    pub user_id: i64,
    pub is_host: bool,
}

// -- Bills --

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub group_id: i64,
    pub user_id: i64,
    pub amount: i64,
}

/// `amount` here is the per-member share, not the stored total.
#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub bill_id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBillRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBillStatusRequest {
    pub status: BillStatus,
}

// -- Locations --

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<i64>,
    pub post_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub location_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<i64>,
    pub post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// -- Reports --

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub reported_id: i64,
    #[serde(rename = "type")]
    pub report_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report_id: i64,
    pub reporter_id: i64,
    pub reported_id: i64,
    #[serde(rename = "type")]
    pub report_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Recommendation --

#[derive(Debug, Deserialize)]
pub struct RouteRecommendRequest {
    pub departure_latitude: f64,
    pub departure_longitude: f64,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub radius_m: f64,
    pub top_n: usize,
}

#[derive(Debug, Serialize)]
pub struct RecommendStatsResponse {
    pub user_id: i64,
    pub username: String,
    pub trust_score: f64,
    pub total_participations: usize,
    pub active_participations: usize,
    pub money_weight: f64,
    pub distance_weight: f64,
    pub trust_weight: f64,
}
