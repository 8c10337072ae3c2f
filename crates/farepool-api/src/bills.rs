use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use farepool_db::{DbError, models::BillRow, parse_db_time};
use farepool_types::api::{
    BillResponse, CreateBillRequest, UpdateBillRequest, UpdateBillStatusRequest,
};
use farepool_types::models::{BillShareBasis, BillStatus};

use crate::auth::AppState;
use crate::{ApiError, blocking};

/// The stored amount is the full bill; callers only ever see the per-member
/// share. Which member count divides it depends on the configured basis.
fn share(amount: i64, basis: BillShareBasis, live_count: i64, frozen_count: i64) -> Result<i64, ApiError> {
    let divisor = match basis {
        BillShareBasis::Live => live_count,
        BillShareBasis::Frozen => frozen_count,
    };
    if divisor <= 0 {
        return Err(ApiError::Domain(DbError::MemberCountInvalid));
    }
    Ok(amount / divisor)
}

fn bill_response(
    bill: BillRow,
    basis: BillShareBasis,
    live_count: i64,
) -> Result<BillResponse, ApiError> {
    let amount = share(bill.amount, basis, live_count, bill.member_count_at_creation)?;
    Ok(BillResponse {
        bill_id: bill.id,
        group_id: bill.group_id,
        user_id: bill.user_id,
        amount,
        status: BillStatus::parse(&bill.status).unwrap_or(BillStatus::Pending),
        created_at: parse_db_time(&bill.created_at),
    })
}

pub async fn create_bill(
    State(state): State<AppState>,
    Json(req): Json<CreateBillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (bill, live_count) = {
        let state = state.clone();
        blocking(move || state.db.create_bill(req.group_id, req.user_id, req.amount)).await?
    };
    let resp = bill_response(bill, state.bill_share, live_count)?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (bill, live_count) = {
        let state = state.clone();
        blocking(move || state.db.get_bill(bill_id)).await?
    };
    Ok(Json(bill_response(bill, state.bill_share, live_count)?))
}

#[derive(Deserialize)]
pub struct BillListQuery {
    pub group_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<BillStatus>,
    #[serde(default)]
    pub page: i64,
    pub size: Option<i64>,
}

pub async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<BillListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let size = query.size.unwrap_or(20);
    let offset = page_offset(query.page, size)?;

    let rows = {
        let state = state.clone();
        blocking(move || {
            state.db.list_bills(
                query.group_id,
                query.user_id,
                query.status.map(|s| s.as_str()),
                size,
                offset,
            )
        })
        .await?
    };

    let bills = rows
        .into_iter()
        .map(|(bill, live_count)| bill_response(bill, state.bill_share, live_count))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(bills))
}

fn page_offset(page: i64, size: i64) -> Result<i64, ApiError> {
    if page < 0 || !(1..=100).contains(&size) {
        return Err(ApiError::Validation(
            "page must be >= 0 and size within 1-100".into(),
        ));
    }
    page.checked_mul(size)
        .ok_or_else(|| ApiError::Validation("page is out of range".into()))
}

pub async fn update_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
    Json(req): Json<UpdateBillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = req
        .amount
        .ok_or_else(|| ApiError::Validation("amount is required".into()))?;
    let (bill, live_count) = {
        let state = state.clone();
        blocking(move || state.db.update_bill_amount(bill_id, amount)).await?
    };
    Ok(Json(bill_response(bill, state.bill_share, live_count)?))
}

pub async fn update_bill_status(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
    Json(req): Json<UpdateBillStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (bill, live_count) = {
        let state = state.clone();
        blocking(move || state.db.update_bill_status(bill_id, req.status.as_str())).await?
    };
    Ok(Json(bill_response(bill, state.bill_share, live_count)?))
}

pub async fn delete_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.db.delete_bill(bill_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_follows_the_configured_basis() {
        // Bill created with 2 members, group has since grown to 4.
        assert_eq!(share(10000, BillShareBasis::Live, 4, 2).unwrap(), 2500);
        assert_eq!(share(10000, BillShareBasis::Frozen, 4, 2).unwrap(), 5000);
        // Floor division leaves the remainder undistributed.
        assert_eq!(share(10000, BillShareBasis::Live, 3, 3).unwrap(), 3333);
    }

    #[test]
    fn pagination_rejects_out_of_range_input() {
        assert_eq!(page_offset(0, 20).unwrap(), 0);
        assert_eq!(page_offset(2, 20).unwrap(), 40);
        assert!(page_offset(-1, 20).is_err());
        assert!(page_offset(0, 0).is_err());
        assert!(page_offset(0, 101).is_err());
        // A huge page must not overflow the offset computation.
        assert!(page_offset(i64::MAX, 100).is_err());
    }

    #[test]
    fn empty_group_share_is_a_data_error() {
        let err = share(10000, BillShareBasis::Live, 0, 2).unwrap_err();
        assert_eq!(err.code(), "GROUP_MEMBER_COUNT_INVALID");
        let err = share(10000, BillShareBasis::Frozen, 4, 0).unwrap_err();
        assert_eq!(err.code(), "GROUP_MEMBER_COUNT_INVALID");
    }
}
