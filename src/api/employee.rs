use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::employee::EmployeeProfile,
    utils::{
        db_utils::{SqlArg, bind_query_as, bind_scalar},
        response::{self, Pagination},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::Display;
use tracing::info;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.employee_code, u.email, u.role, u.status,
           ep.first_name, ep.last_name, ep.avatar, ep.phone, ep.address,
           ep.department, ep.position, ep.date_of_joining, ep.salary,
           u.created_at
    FROM users u
    LEFT JOIN employee_profiles ep ON ep.user_id = u.id
"#;

/// Assembled account + profile view, shared by `/auth/me`, the profile
/// endpoints and the admin employee endpoints.
pub(crate) async fn fetch_profile(
    pool: &MySqlPool,
    user_id: u64,
) -> Result<EmployeeProfile, ApiError> {
    let sql = format!("{PROFILE_SELECT} WHERE u.id = ?");

    sqlx::query_as::<_, EmployeeProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: Option<String>,

    #[validate(
        length(max = 20, message = "Phone must be less than 20 characters"),
        custom(function = validate_phone)
    )]
    pub phone: Option<String>,

    #[validate(length(max = 500, message = "Address must be less than 500 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 500, message = "Avatar URL must be less than 500 characters"))]
    pub avatar: Option<String>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '(' | ')' | '-'))
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_chars");
        err.message = Some("Invalid phone number format".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Matches name, email or employee code
    pub search: Option<String>,
    pub department: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 1, max = 100, message = "Department must be 1-100 characters"))]
    pub department: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Position must be 1-100 characters"))]
    pub position: Option<String>,

    #[validate(range(min = 0.0, message = "Salary cannot be negative"))]
    pub salary: Option<f64>,

    pub status: Option<AccountStatus>,
}

#[derive(Debug, Clone, Copy, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCount {
    #[schema(example = "Engineering")]
    pub department: String,
    #[schema(example = 12)]
    pub employee_count: i64,
}

#[utoipa::path(
    get,
    path = "/users/profile",
    responses(
        (status = 200, description = "Own profile", body = EmployeeProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let profile = fetch_profile(pool.get_ref(), auth.user_id).await?;
    Ok(response::ok(profile, "Success"))
}

/// Owner-editable contact fields only; department/position/salary stay
/// admin-controlled.
#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = EmployeeProfile),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM employee_profiles WHERE user_id = ? LIMIT 1)",
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    if !exists {
        return Err(ApiError::not_found("Profile not found"));
    }

    sqlx::query(
        r#"
        UPDATE employee_profiles
        SET first_name = COALESCE(?, first_name),
            last_name  = COALESCE(?, last_name),
            phone      = COALESCE(?, phone),
            address    = COALESCE(?, address),
            avatar     = COALESCE(?, avatar),
            updated_at = NOW()
        WHERE user_id = ?
        "#,
    )
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(&payload.avatar)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?;

    info!(user_id = auth.user_id, "Profile updated");

    let profile = fetch_profile(pool.get_ref(), auth.user_id).await?;
    Ok(response::ok(profile, "Profile updated successfully"))
}

#[utoipa::path(
    get,
    path = "/employees",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page"),
        ("search" = Option<String>, Query, description = "Search name, email or employee code"),
        ("department" = Option<String>, Query, description = "Filter by department"),
        ("sortBy" = Option<String>, Query, description = "created_at | first_name | last_name | department | position"),
        ("sortOrder" = Option<String>, Query, description = "asc | desc")
    ),
    responses((status = 200, description = "Paginated employee list")),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut where_sql = String::from(" WHERE u.status = 'active'");
    let mut args: Vec<SqlArg> = Vec::new();

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        where_sql.push_str(
            " AND (ep.first_name LIKE ? OR ep.last_name LIKE ? OR u.email LIKE ? OR u.employee_code LIKE ?)",
        );
        let like = format!("%{}%", search);
        for _ in 0..4 {
            args.push(SqlArg::Str(like.clone()));
        }
    }

    if let Some(department) = query.department.as_deref().filter(|s| !s.is_empty()) {
        where_sql.push_str(" AND ep.department = ?");
        args.push(SqlArg::Str(department.to_string()));
    }

    // Sort input is mapped through an allowlist, never interpolated.
    let sort_column = match query.sort_by.as_deref() {
        Some("first_name") => "ep.first_name",
        Some("last_name") => "ep.last_name",
        Some("department") => "ep.department",
        Some("position") => "ep.position",
        _ => "u.created_at",
    };
    let sort_order = match query.sort_order.as_deref() {
        Some("desc") => "DESC",
        _ => "ASC",
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM users u LEFT JOIN employee_profiles ep ON ep.user_id = u.id{where_sql}"
    );
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "{PROFILE_SELECT}{where_sql} ORDER BY {sort_column} {sort_order} LIMIT ? OFFSET ?"
    );
    let employees = bind_query_as(sqlx::query_as::<_, EmployeeProfile>(&data_sql), &args)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(response::paginated(
        employees,
        Pagination::new(page, limit, total),
        "Success",
    ))
}

#[utoipa::path(
    get,
    path = "/employees/departments",
    responses((status = 200, description = "Departments with headcount", body = [DepartmentCount])),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_departments(pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let departments = sqlx::query_as::<_, DepartmentCount>(
        r#"
        SELECT department, COUNT(*) AS employee_count
        FROM employee_profiles
        WHERE department IS NOT NULL
        GROUP BY department
        ORDER BY department
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(response::ok(departments, "Success"))
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Employee found", body = EmployeeProfile),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let profile = fetch_profile(pool.get_ref(), path.into_inner()).await?;
    Ok(response::ok(profile, "Success"))
}

#[utoipa::path(
    put,
    path = "/employees/{id}",
    params(("id" = u64, Path, description = "User ID")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeProfile),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployeeRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let user_id = path.into_inner();

    // Confirm the target exists before touching either table.
    fetch_profile(pool.get_ref(), user_id).await?;

    let mut tx = pool.begin().await?;

    if payload.department.is_some() || payload.position.is_some() || payload.salary.is_some() {
        sqlx::query(
            r#"
            UPDATE employee_profiles
            SET department = COALESCE(?, department),
                position   = COALESCE(?, position),
                salary     = COALESCE(?, salary),
                updated_at = NOW()
            WHERE user_id = ?
            "#,
        )
        .bind(&payload.department)
        .bind(&payload.position)
        .bind(payload.salary)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(status) = payload.status {
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(user_id, "Employee updated by admin");

    let profile = fetch_profile(pool.get_ref(), user_id).await?;
    Ok(response::ok(profile, "Employee updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_format() {
        assert!(validate_phone("+880 (171) 234-5678").is_ok());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn partial_profile_update_validates_supplied_fields_only() {
        let p = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            phone: Some("12345".to_string()),
            address: None,
            avatar: None,
        };
        assert!(p.validate().is_ok());

        let p = UpdateProfileRequest {
            first_name: Some(String::new()),
            last_name: None,
            phone: None,
            address: None,
            avatar: None,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn negative_salary_rejected() {
        let p = UpdateEmployeeRequest {
            department: None,
            position: None,
            salary: Some(-1.0),
            status: None,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn account_status_display() {
        assert_eq!(AccountStatus::Active.to_string(), "active");
        assert_eq!(AccountStatus::Inactive.to_string(), "inactive");
    }
}
