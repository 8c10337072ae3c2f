use axum::{Extension, Json, extract::{Path, State}, http::StatusCode, response::IntoResponse};

use farepool_db::{models::ReportRow, parse_db_time};
use farepool_types::api::{Claims, CreateReportRequest, ReportResponse};

use crate::auth::AppState;
use crate::{ApiError, blocking};

fn report_response(row: ReportRow) -> ReportResponse {
    ReportResponse {
        report_id: row.id,
        reporter_id: row.reporter_id,
        reported_id: row.reported_id,
        report_type: row.report_type,
        description: row.description,
        created_at: parse_db_time(&row.created_at),
    }
}

pub async fn create_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.report_type.is_empty() || req.report_type.len() > 64 {
        return Err(ApiError::Validation("type must be 1-64 characters".into()));
    }
    if req.reported_id == claims.sub {
        return Err(ApiError::Validation("cannot report yourself".into()));
    }
    let reporter_id = claims.sub;
    let row = blocking(move || {
        state.db.create_report(
            reporter_id,
            req.reported_id,
            &req.report_type,
            req.description.as_deref(),
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(report_response(row))))
}

pub async fn reports_against_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(move || state.db.reports_against_user(user_id)).await?;
    let out: Vec<ReportResponse> = rows.into_iter().map(report_response).collect();
    Ok(Json(out))
}
