//! Database row types that map directly to SQLite rows, kept separate from
//! the farepool-types API models so the DB layer stays independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub trust_score: f64,
    pub penalty_count: i64,
    pub praise_count: i64,
    pub money_weight: f64,
    pub distance_weight: f64,
    pub trust_weight: f64,
    pub created_at: String,
}

pub struct LocationRow {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<i64>,
    pub post_id: Option<i64>,
    pub created_at: String,
}

pub struct GroupRow {
    pub id: i64,
    pub post_id: i64,
    pub max_member_count: i64,
    pub current_member_count: i64,
    pub status: String,
    pub created_at: String,
}

pub struct GroupMemberRow {
    pub group_id: i64,
    pub user_id: i64,
    pub is_host: bool,
    pub payment_status: String,
    pub joined_at: String,
}

pub struct BillRow {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub member_count_at_creation: i64,
    pub status: String,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: i64,
    pub reporter_id: i64,
    pub reported_id: i64,
    pub report_type: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// A post joined with its host, both locations and its (first) group.
pub struct PostDetailRow {
    pub id: i64,
    pub host_id: i64,
    pub host_username: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub desired_members: i64,
    pub estimated_price: Option<i64>,
    pub estimate_price_per_member: Option<i64>,
    pub departure_time: String,
    pub duration_minutes: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub group_id: Option<i64>,
    pub current_member_count: Option<i64>,
    pub max_member_count: Option<i64>,
}

/// Input for the post-creation transaction.
pub struct NewPost {
    pub host_id: i64,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub desired_members: i64,
    pub estimated_price: Option<i64>,
    /// DB-format timestamp, see `fmt_db_time`.
    pub departure_time: String,
    pub duration_minutes: Option<i64>,
}

/// Result of a join/leave transaction, fed back to the caller and used to
/// drive the chat-mirror side effects.
pub struct GroupChange {
    pub group_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub current_member_count: i64,
    pub max_member_count: i64,
    pub estimate_price_per_member: Option<i64>,
}

/// Candidate row for the recommendation pipeline: an open, not-yet-full post
/// the user has not joined, with the group's mean member trust (NULL when the
/// group has no members).
pub struct CandidatePostRow {
    pub post_id: i64,
    pub estimated_price: Option<i64>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub host_trust: f64,
    pub member_trust: Option<f64>,
}
