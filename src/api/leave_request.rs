use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::leave_request::LeaveRequest,
    utils::{
        db_utils::{SqlArg, bind_query_as, bind_scalar},
        response::{self, Pagination},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::{Display, EnumString};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

/// Fixed annual allotments; unpaid leave is not budgeted.
const PAID_LEAVE_ALLOTMENT: i64 = 20;
const SICK_LEAVE_ALLOTMENT: i64 = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Paid,
    Sick,
    Unpaid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// The two terminal review outcomes; `pending` is not a legal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLeaveRequest {
    #[serde(rename = "type")]
    #[schema(example = "paid")]
    pub leave_type: LeaveType,

    #[schema(value_type = String, format = "date", example = "2026-01-10")]
    pub start_date: NaiveDate,

    #[schema(value_type = String, format = "date", example = "2026-01-12")]
    pub end_date: NaiveDate,

    #[validate(length(min = 10, max = 1000, message = "Reason must be 10-1000 characters"))]
    pub reason: String,
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeaveStatusRequest {
    pub status: ReviewDecision,

    #[validate(length(max = 500, message = "Comment must be less than 500 characters"))]
    pub admin_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQuery {
    pub status: Option<LeaveStatus>,
    #[serde(rename = "type")]
    pub leave_type: Option<LeaveType>,
    /// Admin only; non-admins always see their own requests
    pub user_id: Option<u64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: LeaveRequest,
    #[schema(example = "John Doe", nullable = true)]
    pub employee_name: Option<String>,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub total: i64,
    pub used: i64,
    pub remaining: i64,
}

impl BalanceEntry {
    fn new(total: i64, used: i64) -> Self {
        Self {
            total,
            used,
            remaining: total - used,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub paid_leave: BalanceEntry,
    pub sick_leave: BalanceEntry,
}

const LEAVE_DETAIL_SELECT: &str = r#"
    SELECT lr.id, lr.user_id, lr.user_name, lr.`type` AS leave_type,
           lr.start_date, lr.end_date, lr.reason, lr.status,
           lr.admin_comment, lr.reviewed_by, lr.reviewed_at, lr.created_at,
           COALESCE(NULLIF(CONCAT_WS(' ', ep.first_name, ep.last_name), ''), lr.user_name) AS employee_name,
           ep.department
    FROM leave_requests lr
    LEFT JOIN employee_profiles ep ON ep.user_id = lr.user_id
"#;

async fn fetch_leave(pool: &MySqlPool, id: u64) -> Result<LeaveDetail, ApiError> {
    let sql = format!("{LEAVE_DETAIL_SELECT} WHERE lr.id = ?");

    sqlx::query_as::<_, LeaveDetail>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

#[utoipa::path(
    post,
    path = "/leave",
    request_body = ApplyLeaveRequest,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveDetail),
        (status = 400, description = "Invalid range or overlapping request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeaveRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    if payload.end_date < payload.start_date {
        return Err(ApiError::validation_field(
            "endDate",
            "End date must be after or equal to start date",
        ));
    }

    // Overlap check and insert share one transaction.
    let mut tx = pool.begin().await?;

    let user_name = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT NULLIF(CONCAT_WS(' ', first_name, last_name), '')
        FROM employee_profiles
        WHERE user_id = ?
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .flatten()
    .unwrap_or_else(|| "Unknown".to_string());

    // Three-way interval overlap against every non-rejected request:
    // start inside, end inside, or fully containing an existing range.
    let overlaps = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leave_requests
            WHERE user_id = ?
              AND status != 'rejected'
              AND (
                  (start_date <= ? AND end_date >= ?) OR
                  (start_date <= ? AND end_date >= ?) OR
                  (start_date >= ? AND end_date <= ?)
              )
        )
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.start_date)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.end_date)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(&mut *tx)
    .await?;

    if overlaps {
        return Err(ApiError::conflict(
            "You already have a leave request for these dates",
        ));
    }

    let leave_id = sqlx::query(
        r#"
        INSERT INTO leave_requests (user_id, user_name, `type`, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(&user_name)
    .bind(payload.leave_type.to_string())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&payload.reason)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    tx.commit().await?;

    info!(user_id = auth.user_id, leave_id, "Leave request created");

    let leave = fetch_leave(pool.get_ref(), leave_id).await?;
    Ok(response::created(leave, "Leave request submitted successfully"))
}

#[utoipa::path(
    get,
    path = "/leave",
    params(
        ("status" = Option<String>, Query, description = "pending | approved | rejected"),
        ("type" = Option<String>, Query, description = "paid | sick | unpaid"),
        ("userId" = Option<u64>, Query, description = "Admin only"),
        ("startDate" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("endDate" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Paginated leave list")),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let user_filter = if auth.is_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<SqlArg> = Vec::new();

    if let Some(user_id) = user_filter {
        where_sql.push_str(" AND lr.user_id = ?");
        args.push(SqlArg::U64(user_id));
    }
    if let Some(status) = query.status {
        where_sql.push_str(" AND lr.status = ?");
        args.push(SqlArg::Str(status.to_string()));
    }
    if let Some(leave_type) = query.leave_type {
        where_sql.push_str(" AND lr.`type` = ?");
        args.push(SqlArg::Str(leave_type.to_string()));
    }
    if let Some(start) = query.start_date {
        where_sql.push_str(" AND lr.start_date >= ?");
        args.push(SqlArg::Date(start));
    }
    if let Some(end) = query.end_date {
        where_sql.push_str(" AND lr.end_date <= ?");
        args.push(SqlArg::Date(end));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests lr{where_sql}");
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql =
        format!("{LEAVE_DETAIL_SELECT}{where_sql} ORDER BY lr.created_at DESC LIMIT ? OFFSET ?");
    let requests = bind_query_as(sqlx::query_as::<_, LeaveDetail>(&data_sql), &args)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(response::paginated(
        requests,
        Pagination::new(page, limit, total),
        "Success",
    ))
}

#[utoipa::path(
    get,
    path = "/leave/balance",
    responses((status = 200, description = "Remaining allotments", body = LeaveBalance)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    // Counted per approved request, by the year the leave starts in.
    let (used_paid, used_sick) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            COUNT(CASE WHEN `type` = 'paid' AND status = 'approved' THEN 1 END),
            COUNT(CASE WHEN `type` = 'sick' AND status = 'approved' THEN 1 END)
        FROM leave_requests
        WHERE user_id = ?
          AND YEAR(start_date) = YEAR(CURDATE())
        "#,
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let balance = LeaveBalance {
        paid_leave: BalanceEntry::new(PAID_LEAVE_ALLOTMENT, used_paid),
        sick_leave: BalanceEntry::new(SICK_LEAVE_ALLOTMENT, used_sick),
    };

    Ok(response::ok(balance, "Success"))
}

#[utoipa::path(
    get,
    path = "/leave/pending-count",
    responses((status = 200, description = "Count of pending requests")),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_count(pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'",
    )
    .fetch_one(pool.get_ref())
    .await?;

    Ok(response::ok(serde_json::json!({ "count": count }), "Success"))
}

#[utoipa::path(
    get,
    path = "/leave/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveDetail),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    Ok(response::ok(leave, "Success"))
}

#[utoipa::path(
    put,
    path = "/leave/{id}/status",
    params(("id" = u64, Path, description = "Leave request ID")),
    request_body = UpdateLeaveStatusRequest,
    responses(
        (status = 200, description = "Request reviewed", body = LeaveDetail),
        (status = 400, description = "Request is not pending"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeaveStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM leave_requests WHERE id = ? FOR UPDATE",
    )
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    if status != "pending" {
        return Err(ApiError::conflict("Can only update pending requests"));
    }

    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, admin_comment = ?, reviewed_by = ?, reviewed_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(payload.status.to_string())
    .bind(&payload.admin_comment)
    .bind(auth.user_id)
    .bind(leave_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(leave_id, decision = %payload.status, reviewer = auth.user_id, "Leave reviewed");

    let leave = fetch_leave(pool.get_ref(), leave_id).await?;
    let message = format!("Leave request {}", payload.status);
    Ok(response::ok(leave, &message))
}

/// Cancellation is a physical delete, not a status change.
#[utoipa::path(
    delete,
    path = "/leave/{id}",
    params(("id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Request cancelled"),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (u64, String)>(
        "SELECT user_id, status FROM leave_requests WHERE id = ? FOR UPDATE",
    )
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    if row.0 != auth.user_id {
        return Err(ApiError::forbidden("Not authorized to cancel this request"));
    }
    if row.1 != "pending" {
        return Err(ApiError::conflict("Can only cancel pending requests"));
    }

    sqlx::query("DELETE FROM leave_requests WHERE id = ?")
        .bind(leave_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(leave_id, user_id = auth.user_id, "Leave request cancelled");

    Ok(response::ok(serde_json::Value::Null, "Leave request cancelled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn reason_length_enforced() {
        let p = ApplyLeaveRequest {
            leave_type: LeaveType::Paid,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            reason: "too short".to_string(),
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn leave_type_round_trip() {
        assert_eq!(LeaveType::from_str("unpaid").unwrap(), LeaveType::Unpaid);
        assert_eq!(LeaveType::Sick.to_string(), "sick");
        assert_eq!(
            serde_json::from_str::<LeaveType>("\"paid\"").unwrap(),
            LeaveType::Paid
        );
    }

    #[test]
    fn review_decision_excludes_pending() {
        assert!(serde_json::from_str::<ReviewDecision>("\"pending\"").is_err());
        assert_eq!(
            serde_json::from_str::<ReviewDecision>("\"approved\"").unwrap(),
            ReviewDecision::Approved
        );
    }

    #[test]
    fn balance_remaining_math() {
        let entry = BalanceEntry::new(20, 3);
        assert_eq!(entry.remaining, 17);

        let exhausted = BalanceEntry::new(10, 10);
        assert_eq!(exhausted.remaining, 0);
    }
}
