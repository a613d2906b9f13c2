use crate::{
    auth::auth::AuthUser,
    error::{ApiError, is_unique_violation},
    model::payroll::PayrollRecord,
    utils::{
        db_utils::{SqlArg, bind_query_as, bind_scalar},
        response::{self, Pagination},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::{Display, EnumString};
use tracing::info;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    Pending,
    Paid,
}

/// Net salary is always derived, never stored independently.
fn net_salary(basic: f64, allowances: f64, deductions: f64) -> f64 {
    basic + allowances - deductions
}

/// Merge a partial amount update over the stored triple and recompute.
fn merge_amounts(
    current: (f64, f64, f64),
    basic: Option<f64>,
    allowances: Option<f64>,
    deductions: Option<f64>,
) -> (f64, f64, f64, f64) {
    let basic = basic.unwrap_or(current.0);
    let allowances = allowances.unwrap_or(current.1);
    let deductions = deductions.unwrap_or(current.2);
    (
        basic,
        allowances,
        deductions,
        net_salary(basic, allowances, deductions),
    )
}

/// "YYYY-MM" with a real month number.
fn validate_month(month: &str) -> Result<(), ValidationError> {
    if parse_month_year(month).is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("month_format");
        err.message = Some("Month must be in YYYY-MM format".into());
        Err(err)
    }
}

fn parse_month_year(month: &str) -> Option<i32> {
    let (year, month_num) = month.split_once('-')?;
    if year.len() != 4 || month_num.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month_num: u32 = month_num.parse().ok()?;
    if !(1..=12).contains(&month_num) || !(2000..=2100).contains(&year) {
        return None;
    }
    Some(year)
}

fn default_zero() -> f64 {
    0.0
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayrollRequest {
    pub user_id: u64,

    #[schema(example = "2026-01")]
    #[validate(custom(function = validate_month))]
    pub month: String,

    #[schema(example = 6000.0)]
    #[validate(range(min = 0.01, message = "Basic salary must be positive"))]
    pub basic_salary: f64,

    #[schema(example = 500.0)]
    #[serde(default = "default_zero")]
    #[validate(range(min = 0.0, message = "Allowances cannot be negative"))]
    pub allowances: f64,

    #[schema(example = 200.0)]
    #[serde(default = "default_zero")]
    #[validate(range(min = 0.0, message = "Deductions cannot be negative"))]
    pub deductions: f64,

    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayrollRequest {
    #[validate(range(min = 0.01, message = "Basic salary must be positive"))]
    pub basic_salary: Option<f64>,

    #[validate(range(min = 0.0, message = "Allowances cannot be negative"))]
    pub allowances: Option<f64>,

    #[validate(range(min = 0.0, message = "Deductions cannot be negative"))]
    pub deductions: Option<f64>,

    pub status: Option<PayrollStatus>,

    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct GenerateMonthlyRequest {
    #[schema(example = "2026-01")]
    #[validate(custom(function = validate_month))]
    pub month: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollQuery {
    /// Admin only; non-admins always see their own records
    pub user_id: Option<u64>,
    pub month: Option<String>,
    pub year: Option<i32>,
    pub status: Option<PayrollStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: PayrollRecord,
    #[schema(example = "John Doe", nullable = true)]
    pub employee_name: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    pub total_earned: f64,
    pub pending: f64,
    pub paid_months: i64,
    pub last_salary: f64,
}

const PAYROLL_DETAIL_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.month, p.year, p.basic_salary, p.allowances,
           p.deductions, p.net_salary, p.status, p.notes, p.paid_at, p.created_at,
           COALESCE(NULLIF(CONCAT_WS(' ', ep.first_name, ep.last_name), ''), u.employee_code) AS employee_name
    FROM payroll p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN employee_profiles ep ON ep.user_id = p.user_id
"#;

async fn fetch_payroll(pool: &MySqlPool, id: u64) -> Result<PayrollDetail, ApiError> {
    let sql = format!("{PAYROLL_DETAIL_SELECT} WHERE p.id = ?");

    sqlx::query_as::<_, PayrollDetail>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))
}

#[utoipa::path(
    get,
    path = "/payroll",
    params(
        ("userId" = Option<u64>, Query, description = "Admin only"),
        ("month" = Option<String>, Query, description = "YYYY-MM"),
        ("year" = Option<i32>, Query, description = "Calendar year"),
        ("status" = Option<String>, Query, description = "pending | paid"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses((status = 200, description = "Paginated payroll list")),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
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
        where_sql.push_str(" AND p.user_id = ?");
        args.push(SqlArg::U64(user_id));
    }
    if let Some(month) = query.month.as_deref().filter(|m| !m.is_empty()) {
        where_sql.push_str(" AND p.month = ?");
        args.push(SqlArg::Str(month.to_string()));
    }
    if let Some(year) = query.year {
        where_sql.push_str(" AND p.year = ?");
        args.push(SqlArg::I32(year));
    }
    if let Some(status) = query.status {
        where_sql.push_str(" AND p.status = ?");
        args.push(SqlArg::Str(status.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM payroll p{where_sql}");
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "{PAYROLL_DETAIL_SELECT}{where_sql} ORDER BY p.year DESC, p.month DESC LIMIT ? OFFSET ?"
    );
    let records = bind_query_as(sqlx::query_as::<_, PayrollDetail>(&data_sql), &args)
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

async fn summary_for(pool: &MySqlPool, user_id: u64) -> Result<PayrollSummary, ApiError> {
    let summary = sqlx::query_as::<_, PayrollSummary>(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status = 'paid' THEN net_salary END), 0)    AS total_earned,
            COALESCE(SUM(CASE WHEN status = 'pending' THEN net_salary END), 0) AS pending,
            COUNT(CASE WHEN status = 'paid' THEN 1 END)                        AS paid_months,
            COALESCE(MAX(net_salary), 0)                                       AS last_salary
        FROM payroll
        WHERE user_id = ?
          AND year = YEAR(CURDATE())
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

#[utoipa::path(
    get,
    path = "/payroll/summary",
    responses((status = 200, description = "Own current-year summary", body = PayrollSummary)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let summary = summary_for(pool.get_ref(), auth.user_id).await?;
    Ok(response::ok(summary, "Success"))
}

#[utoipa::path(
    get,
    path = "/payroll/summary/{userId}",
    params(("userId" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Summary for any user", body = PayrollSummary),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_summary_user(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let summary = summary_for(pool.get_ref(), path.into_inner()).await?;
    Ok(response::ok(summary, "Success"))
}

#[utoipa::path(
    get,
    path = "/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll record ID")),
    responses(
        (status = 200, description = "Payroll record", body = PayrollDetail),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let record = fetch_payroll(pool.get_ref(), path.into_inner()).await?;
    Ok(response::ok(record, "Success"))
}

#[utoipa::path(
    post,
    path = "/payroll",
    request_body = CreatePayrollRequest,
    responses(
        (status = 201, description = "Payroll created", body = PayrollDetail),
        (status = 400, description = "Record already exists for this month"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayrollRequest>,
) -> Result<HttpResponse, ApiError> {
    // GET and POST share this resource; only the write is admin-only.
    auth.require_admin()?;
    payload.validate()?;

    let user_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ? LIMIT 1)")
            .bind(payload.user_id)
            .fetch_one(pool.get_ref())
            .await?;

    if !user_exists {
        return Err(ApiError::not_found("User not found"));
    }

    let year = parse_month_year(&payload.month).ok_or_else(|| {
        ApiError::validation_field("month", "Month must be in YYYY-MM format")
    })?;
    let net = net_salary(payload.basic_salary, payload.allowances, payload.deductions);

    // One record per (user, month); the unique key absorbs races.
    let result = sqlx::query(
        r#"
        INSERT INTO payroll
            (user_id, month, year, basic_salary, allowances, deductions, net_salary, status, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(&payload.month)
    .bind(year)
    .bind(payload.basic_salary)
    .bind(payload.allowances)
    .bind(payload.deductions)
    .bind(net)
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Payroll already exists for this month")
        } else {
            e.into()
        }
    })?;

    info!(user_id = payload.user_id, month = %payload.month, "Payroll created");

    let record = fetch_payroll(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(record, "Payroll record created"))
}

#[derive(sqlx::FromRow)]
struct StoredAmounts {
    basic_salary: f64,
    allowances: f64,
    deductions: f64,
}

#[utoipa::path(
    put,
    path = "/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll record ID")),
    request_body = UpdatePayrollRequest,
    responses(
        (status = 200, description = "Payroll updated", body = PayrollDetail),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayrollRequest>,
) -> Result<HttpResponse, ApiError> {
    // GET /{id} is open to the record owner; only PUT is admin-only.
    auth.require_admin()?;
    payload.validate()?;

    let payroll_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, StoredAmounts>(
        r#"
        SELECT basic_salary, allowances, deductions
        FROM payroll
        WHERE id = ?
        FOR UPDATE
        "#,
    )
    .bind(payroll_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Payroll record not found"))?;

    let (basic, allowances, deductions, net) = merge_amounts(
        (
            current.basic_salary,
            current.allowances,
            current.deductions,
        ),
        payload.basic_salary,
        payload.allowances,
        payload.deductions,
    );

    sqlx::query(
        r#"
        UPDATE payroll
        SET basic_salary = ?,
            allowances   = ?,
            deductions   = ?,
            net_salary   = ?,
            status       = COALESCE(?, status),
            notes        = COALESCE(?, notes),
            updated_at   = NOW()
        WHERE id = ?
        "#,
    )
    .bind(basic)
    .bind(allowances)
    .bind(deductions)
    .bind(net)
    .bind(payload.status.map(|s| s.to_string()))
    .bind(&payload.notes)
    .bind(payroll_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(payroll_id, "Payroll updated");

    let record = fetch_payroll(pool.get_ref(), payroll_id).await?;
    Ok(response::ok(record, "Payroll updated successfully"))
}

/// `pending -> paid` exactly once; not-found and already-paid collapse
/// into the same error.
#[utoipa::path(
    post,
    path = "/payroll/{id}/process",
    params(("id" = u64, Path, description = "Payroll record ID")),
    responses(
        (status = 200, description = "Marked as paid", body = PayrollDetail),
        (status = 400, description = "Payroll not found or already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn process_payroll(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let payroll_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE payroll
        SET status = 'paid', paid_at = NOW(), updated_at = NOW()
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Payroll not found or already paid"));
    }

    info!(payroll_id, "Payroll processed");

    let record = fetch_payroll(pool.get_ref(), payroll_id).await?;
    Ok(response::ok(record, "Payroll processed successfully"))
}

#[utoipa::path(
    post,
    path = "/payroll/generate",
    request_body = GenerateMonthlyRequest,
    responses((status = 200, description = "Records created for employees lacking one")),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_monthly(
    pool: web::Data<MySqlPool>,
    payload: web::Json<GenerateMonthlyRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let year = parse_month_year(&payload.month).ok_or_else(|| {
        ApiError::validation_field("month", "Month must be in YYYY-MM format")
    })?;

    // Active salaried employees without a record for the target month.
    let employees = sqlx::query_as::<_, (u64, f64)>(
        r#"
        SELECT u.id, ep.salary
        FROM users u
        JOIN employee_profiles ep ON ep.user_id = u.id
        WHERE u.status = 'active'
          AND ep.salary > 0
          AND NOT EXISTS (SELECT 1 FROM payroll p WHERE p.user_id = u.id AND p.month = ?)
        "#,
    )
    .bind(&payload.month)
    .fetch_all(pool.get_ref())
    .await?;

    let mut created_ids = Vec::with_capacity(employees.len());

    for (user_id, salary) in employees {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll
                (user_id, month, year, basic_salary, allowances, deductions, net_salary, status)
            VALUES (?, ?, ?, ?, 0, 0, ?, 'pending')
            "#,
        )
        .bind(user_id)
        .bind(&payload.month)
        .bind(year)
        .bind(salary)
        .bind(salary)
        .execute(pool.get_ref())
        .await;

        match result {
            Ok(r) => created_ids.push(r.last_insert_id()),
            // Another generation run got there first; the month is
            // covered either way.
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let mut records = Vec::with_capacity(created_ids.len());
    for id in created_ids {
        records.push(fetch_payroll(pool.get_ref(), id).await?);
    }

    info!(month = %payload.month, generated = records.len(), "Monthly payroll generated");

    let message = format!("Generated payroll for {} employees", records.len());
    Ok(response::ok(
        serde_json::json!({
            "generated": records.len(),
            "records": records,
        }),
        &message,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_salary_identity() {
        assert_eq!(net_salary(6000.0, 500.0, 200.0), 6300.0);
        assert_eq!(net_salary(6000.0, 0.0, 0.0), 6000.0);
    }

    #[test]
    fn partial_update_recomputes_from_merged_triple() {
        // Created 6000/500/200 => 6300; deductions -> 300 => 6200.
        let (basic, allowances, deductions, net) =
            merge_amounts((6000.0, 500.0, 200.0), None, None, Some(300.0));
        assert_eq!((basic, allowances, deductions), (6000.0, 500.0, 300.0));
        assert_eq!(net, 6200.0);

        // No amounts supplied: net unchanged.
        let (.., net) = merge_amounts((6000.0, 500.0, 200.0), None, None, None);
        assert_eq!(net, 6300.0);
    }

    #[test]
    fn month_format_rules() {
        assert!(validate_month("2026-01").is_ok());
        assert!(validate_month("2026-12").is_ok());
        assert!(validate_month("2026-13").is_err());
        assert!(validate_month("2026-1").is_err());
        assert!(validate_month("26-01").is_err());
        assert!(validate_month("2026/01").is_err());
        assert_eq!(parse_month_year("2026-07"), Some(2026));
    }

    #[test]
    fn create_payload_requires_positive_basic() {
        let p = CreatePayrollRequest {
            user_id: 1,
            month: "2026-01".to_string(),
            basic_salary: 0.0,
            allowances: 0.0,
            deductions: 0.0,
            notes: None,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn create_defaults_apply_on_missing_amounts() {
        let p: CreatePayrollRequest = serde_json::from_str(
            r#"{"userId": 1, "month": "2026-01", "basicSalary": 6000.0}"#,
        )
        .unwrap();
        assert_eq!(p.allowances, 0.0);
        assert_eq!(p.deductions, 0.0);
        assert!(p.validate().is_ok());
    }
}
