use crate::{
    auth::auth::AuthUser,
    error::{ApiError, is_unique_violation},
    model::attendance::AttendanceRecord,
    utils::{
        db_utils::{SqlArg, bind_query_as, bind_scalar},
        response::{self, Pagination},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

/// Check-ins strictly after this local time are late.
fn late_threshold() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

/// Below this many worked hours the day counts as a half-day.
const HALF_DAY_HOURS: f64 = 4.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    Weekend,
    Holiday,
}

fn derive_check_in_status(check_in: NaiveTime) -> AttendanceStatus {
    if check_in > late_threshold() {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Fractional hours between check-in and check-out, rounded to 2 decimals.
fn work_hours(check_in: NaiveTime, check_out: NaiveTime) -> f64 {
    let hours = (check_out - check_in).num_seconds() as f64 / 3600.0;
    (hours * 100.0).round() / 100.0
}

/// A short day overrides whatever the morning determined, late included.
fn resolve_check_out_status(morning: AttendanceStatus, hours: f64) -> AttendanceStatus {
    if hours < HALF_DAY_HOURS {
        AttendanceStatus::HalfDay
    } else {
        morning
    }
}

async fn fetch_record(pool: &MySqlPool, id: u64) -> Result<AttendanceRecord, ApiError> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, user_id, date, check_in, check_out, status, work_hours, notes, created_at
        FROM attendance
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Attendance record not found"))
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct CheckInRequest {
    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Admin only; non-admins always see their own history
    pub user_id: Option<u64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceRequest {
    pub status: Option<AttendanceStatus>,
    #[schema(value_type = String, example = "09:15:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = String, example = "17:45:00")]
    pub check_out: Option<NaiveTime>,
    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceHistoryRow {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: AttendanceRecord,
    #[schema(example = "John Doe", nullable = true)]
    pub user_name: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub present_days: i64,
    pub late_days: i64,
    pub absent_days: i64,
    pub half_days: i64,
    pub total_hours: f64,
}

#[utoipa::path(
    post,
    path = "/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CheckInRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let now = Local::now();
    let today = now.date_naive();
    let check_in_time = now.time();
    let status = derive_check_in_status(check_in_time);

    // The (user_id, date) unique key is the duplicate-check-in guard;
    // a lost race surfaces here as a constraint violation.
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in, status, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(today)
    .bind(check_in_time)
    .bind(status.to_string())
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Already checked in today")
        } else {
            e.into()
        }
    })?;

    info!(user_id = auth.user_id, %status, "Checked in");

    let record = fetch_record(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::ok(record, "Checked in successfully"))
}

#[derive(sqlx::FromRow)]
struct OpenDay {
    id: u64,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    status: String,
}

#[utoipa::path(
    post,
    path = "/attendance/check-out",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 400, description = "Not checked in, or already checked out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CheckInRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let now = Local::now();
    let today = now.date_naive();
    let check_out_time = now.time();

    // Row-locked read-then-write: a concurrent second check-out blocks
    // here and then fails the already-checked-out guard.
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, OpenDay>(
        r#"
        SELECT id, check_in, check_out, status
        FROM attendance
        WHERE user_id = ? AND date = ?
        FOR UPDATE
        "#,
    )
    .bind(auth.user_id)
    .bind(today)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Err(ApiError::conflict("Must check in before checking out"));
    };
    let Some(check_in_time) = row.check_in else {
        return Err(ApiError::conflict("Must check in before checking out"));
    };
    if row.check_out.is_some() {
        return Err(ApiError::conflict("Already checked out today"));
    }

    let hours = work_hours(check_in_time, check_out_time);
    let morning = AttendanceStatus::from_str(&row.status).unwrap_or(AttendanceStatus::Present);
    let status = resolve_check_out_status(morning, hours);

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, work_hours = ?, status = ?, notes = COALESCE(?, notes), updated_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(check_out_time)
    .bind(hours)
    .bind(status.to_string())
    .bind(&payload.notes)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(user_id = auth.user_id, hours, %status, "Checked out");

    let record = fetch_record(pool.get_ref(), row.id).await?;
    Ok(response::ok(record, "Checked out successfully"))
}

#[utoipa::path(
    get,
    path = "/attendance/today",
    responses((status = 200, description = "Today's own record, or null data")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, user_id, date, check_in, check_out, status, work_hours, notes, created_at
        FROM attendance
        WHERE user_id = ? AND date = ?
        "#,
    )
    .bind(auth.user_id)
    .bind(Local::now().date_naive())
    .fetch_optional(pool.get_ref())
    .await?;

    Ok(response::ok(record, "Success"))
}

#[utoipa::path(
    get,
    path = "/attendance/history",
    params(
        ("userId" = Option<u64>, Query, description = "Admin only"),
        ("startDate" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("endDate" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("status" = Option<String>, Query, description = "Attendance status filter"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Paginated attendance history")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    // Non-admins only ever see their own rows.
    let user_filter = if auth.is_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<SqlArg> = Vec::new();

    if let Some(user_id) = user_filter {
        where_sql.push_str(" AND a.user_id = ?");
        args.push(SqlArg::U64(user_id));
    }
    if let Some(start) = query.start_date {
        where_sql.push_str(" AND a.date >= ?");
        args.push(SqlArg::Date(start));
    }
    if let Some(end) = query.end_date {
        where_sql.push_str(" AND a.date <= ?");
        args.push(SqlArg::Date(end));
    }
    if let Some(status) = query.status {
        where_sql.push_str(" AND a.status = ?");
        args.push(SqlArg::Str(status.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM attendance a{where_sql}");
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        r#"
        SELECT a.id, a.user_id, a.date, a.check_in, a.check_out, a.status,
               a.work_hours, a.notes, a.created_at,
               COALESCE(NULLIF(CONCAT_WS(' ', ep.first_name, ep.last_name), ''), u.employee_code) AS user_name
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        LEFT JOIN employee_profiles ep ON ep.user_id = a.user_id
        {where_sql}
        ORDER BY a.date DESC, a.check_in DESC
        LIMIT ? OFFSET ?
        "#
    );
    let records = bind_query_as(sqlx::query_as::<_, AttendanceHistoryRow>(&data_sql), &args)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(response::paginated(
        records,
        Pagination::new(page, limit, total),
        "Success",
    ))
}

/// Admin correction: only the supplied fields change.
#[utoipa::path(
    put,
    path = "/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendanceRequest,
    responses(
        (status = 200, description = "Record updated", body = AttendanceRecord),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendanceRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let attendance_id = path.into_inner();

    // Surface 404 before the COALESCE write.
    fetch_record(pool.get_ref(), attendance_id).await?;

    sqlx::query(
        r#"
        UPDATE attendance
        SET status    = COALESCE(?, status),
            check_in  = COALESCE(?, check_in),
            check_out = COALESCE(?, check_out),
            notes     = COALESCE(?, notes),
            updated_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(payload.status.map(|s| s.to_string()))
    .bind(payload.check_in)
    .bind(payload.check_out)
    .bind(&payload.notes)
    .bind(attendance_id)
    .execute(pool.get_ref())
    .await?;

    info!(attendance_id, "Attendance updated by admin");

    let record = fetch_record(pool.get_ref(), attendance_id).await?;
    Ok(response::ok(record, "Attendance updated successfully"))
}

async fn weekly_summary_for(pool: &MySqlPool, user_id: u64) -> Result<WeeklySummary, ApiError> {
    // Fixed trailing window of 7 calendar days including today; weekends
    // are counted like any other day.
    let summary = sqlx::query_as::<_, WeeklySummary>(
        r#"
        SELECT
            COUNT(CASE WHEN status = 'present' THEN 1 END)  AS present_days,
            COUNT(CASE WHEN status = 'late' THEN 1 END)     AS late_days,
            COUNT(CASE WHEN status = 'absent' THEN 1 END)   AS absent_days,
            COUNT(CASE WHEN status = 'half-day' THEN 1 END) AS half_days,
            COALESCE(SUM(work_hours), 0)                    AS total_hours
        FROM attendance
        WHERE user_id = ?
          AND date >= CURDATE() - INTERVAL 6 DAY
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

#[utoipa::path(
    get,
    path = "/attendance/weekly-summary",
    responses((status = 200, description = "Own weekly summary", body = WeeklySummary)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn weekly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let summary = weekly_summary_for(pool.get_ref(), auth.user_id).await?;
    Ok(response::ok(summary, "Success"))
}

#[utoipa::path(
    get,
    path = "/attendance/weekly-summary/{userId}",
    params(("userId" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Weekly summary for any user", body = WeeklySummary),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn weekly_summary_user(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let summary = weekly_summary_for(pool.get_ref(), path.into_inner()).await?;
    Ok(response::ok(summary, "Success"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn on_time_at_the_threshold() {
        assert_eq!(derive_check_in_status(t(9, 30)), AttendanceStatus::Present);
        assert_eq!(derive_check_in_status(t(8, 0)), AttendanceStatus::Present);
    }

    #[test]
    fn late_strictly_after_threshold() {
        assert_eq!(
            derive_check_in_status(NaiveTime::from_hms_opt(9, 30, 1).unwrap()),
            AttendanceStatus::Late
        );
        assert_eq!(derive_check_in_status(t(9, 45)), AttendanceStatus::Late);
    }

    #[test]
    fn work_hours_rounds_to_two_decimals() {
        assert_eq!(work_hours(t(9, 45), t(12, 30)), 2.75);
        assert_eq!(work_hours(t(9, 0), t(17, 0)), 8.0);
        // 7h50m = 7.8333... -> 7.83
        assert_eq!(work_hours(t(9, 10), t(17, 0)), 7.83);
    }

    #[test]
    fn short_day_overrides_late_morning() {
        // Check in 09:45 (late), out 12:30 -> 2.75h -> half-day.
        let hours = work_hours(t(9, 45), t(12, 30));
        assert_eq!(
            resolve_check_out_status(AttendanceStatus::Late, hours),
            AttendanceStatus::HalfDay
        );
    }

    #[test]
    fn full_day_keeps_morning_status() {
        assert_eq!(
            resolve_check_out_status(AttendanceStatus::Late, 8.0),
            AttendanceStatus::Late
        );
        assert_eq!(
            resolve_check_out_status(AttendanceStatus::Present, 4.0),
            AttendanceStatus::Present
        );
    }

    #[test]
    fn boundary_exactly_four_hours_is_not_half_day() {
        assert_eq!(
            resolve_check_out_status(AttendanceStatus::Present, HALF_DAY_HOURS),
            AttendanceStatus::Present
        );
        assert_eq!(
            resolve_check_out_status(AttendanceStatus::Present, 3.99),
            AttendanceStatus::HalfDay
        );
    }

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        assert_eq!(AttendanceStatus::HalfDay.to_string(), "half-day");
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::HalfDay).unwrap(),
            "\"half-day\""
        );
        assert_eq!(
            AttendanceStatus::from_str("half-day").unwrap(),
            AttendanceStatus::HalfDay
        );
    }
}
