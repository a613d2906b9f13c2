use crate::{
    api::employee::fetch_profile,
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{role::Role, user::User},
    models::TokenType,
    utils::{email_cache, email_filter, response},
};
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Employee code, unique and alphanumeric
    #[schema(example = "EMP001")]
    #[validate(
        length(min = 3, max = 20, message = "Employee ID must be 3-20 characters"),
        custom(function = validate_employee_code)
    )]
    pub employee_id: String,

    #[schema(example = "john.doe@company.com")]
    #[validate(
        email(message = "Invalid email address"),
        length(max = 255, message = "Email must be less than 255 characters")
    )]
    pub email: String,

    #[schema(example = "Str0ngPass")]
    #[validate(
        length(min = 8, max = 100, message = "Password must be 8-100 characters"),
        custom(function = validate_password_strength)
    )]
    pub password: String,

    #[schema(example = "John")]
    #[validate(
        length(min = 1, max = 50, message = "First name must be 1-50 characters"),
        custom(function = validate_person_name)
    )]
    pub first_name: String,

    #[schema(example = "Doe")]
    #[validate(
        length(min = 1, max = 50, message = "Last name must be 1-50 characters"),
        custom(function = validate_person_name)
    )]
    pub last_name: String,

    /// Defaults to employee
    pub role: Option<Role>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "john.doe@company.com")]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: u64,
    #[schema(example = "EMP001")]
    pub employee_id: String,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
}

fn validate_employee_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("alphanumeric");
        err.message = Some("Employee ID must be alphanumeric".into());
        Err(err)
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_upper && has_lower && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message =
            Some("Password must contain an uppercase letter, a lowercase letter and a number".into());
        Err(err)
    }
}

fn validate_person_name(name: &str) -> Result<(), ValidationError> {
    if name
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '\'' || c == '-')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("name_chars");
        err.message = Some("Name must contain only letters".into());
        Err(err)
    }
}

/// true  => email AVAILABLE
/// false => email TAKEN
async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    let email = email.to_lowercase();

    // 1. Cuckoo filter: a miss is a definitive "never registered".
    if !email_filter::might_exist(&email) {
        return true;
    }

    // 2. Moka cache: fast positive for recently seen accounts.
    if email_cache::is_taken(&email).await {
        return false;
    }

    // 3. Database fallback, the source of truth.
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)")
        .bind(&email)
        .fetch_one(pool)
        .await
        .map(|exists| !exists)
        .unwrap_or(false) // fail-safe: treat as taken
}

/// Issue an access/refresh pair and persist the refresh token.
async fn issue_token_pair(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    email: &str,
    role: Role,
) -> Result<(String, String), ApiError> {
    let access_token = generate_access_token(
        user_id,
        email,
        role,
        &config.jwt_access_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal
    })?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email,
        role,
        &config.jwt_refresh_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign refresh token");
        ApiError::Internal
    })?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, token, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_token)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok((access_token, refresh_token))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Validation failed or duplicate email/employee ID")
    ),
    tag = "Auth"
)]
pub async fn signup(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<SignupRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    let role = payload.role.unwrap_or(Role::Employee);

    if !is_email_available(&email, pool.get_ref()).await {
        return Err(ApiError::conflict("Email already registered"));
    }

    let code_taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE employee_code = ? LIMIT 1)",
    )
    .bind(&payload.employee_id)
    .fetch_one(pool.get_ref())
    .await?;

    if code_taken {
        return Err(ApiError::conflict("Employee ID already exists"));
    }

    let hashed = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    // User + placeholder profile land together or not at all. A lost race
    // on the unique keys still surfaces from the store as a 400.
    let mut tx = pool.begin().await?;

    let user_id = sqlx::query(
        r#"
        INSERT INTO users (employee_code, email, password, role, status)
        VALUES (?, ?, ?, ?, 'active')
        "#,
    )
    .bind(&payload.employee_id)
    .bind(&email)
    .bind(&hashed)
    .bind(role.to_string())
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    sqlx::query(
        r#"
        INSERT INTO employee_profiles
            (user_id, first_name, last_name, department, position, date_of_joining)
        VALUES (?, ?, ?, 'Unassigned', 'New Employee', ?)
        "#,
    )
    .bind(user_id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(Local::now().date_naive())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // Keep the fast duplicate-email path warm.
    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), config.get_ref(), user_id, &email, role).await?;

    info!(user_id, "User registered");

    Ok(response::created(
        json!({
            "user": UserSummary {
                id: user_id,
                employee_id: payload.employee_id.clone(),
                email,
                role: role.to_string(),
                first_name: payload.first_name.clone(),
                last_name: payload.last_name.clone(),
            },
            "accessToken": access_token,
            "refreshToken": refresh_token,
        }),
        "Account created successfully",
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();

    debug!("Fetching user from database");

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, employee_code, email, password, role, status, last_login_at, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        ApiError::unauthorized("Invalid email or password")
    })?;

    if user.status != "active" {
        info!(user_id = user.id, "Login rejected: inactive account");
        return Err(ApiError::unauthorized("Account is inactive"));
    }

    if !verify_password(&payload.password, &user.password) {
        info!(user_id = user.id, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let role = Role::from_str(&user.role).map_err(|_| {
        error!(user_id = user.id, role = %user.role, "Unknown role in store");
        ApiError::Internal
    })?;

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), config.get_ref(), user.id, &email, role).await?;

    // Non-fatal: login proceeds even if the stamp fails.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    let profile = fetch_profile(pool.get_ref(), user.id).await?;

    info!(user_id = user.id, "Login successful");

    Ok(response::ok(
        json!({
            "user": profile,
            "accessToken": access_token,
            "refreshToken": refresh_token,
        }),
        "Login successful",
    ))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued"),
        (status = 401, description = "Invalid, expired or already-rotated refresh token")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let claims = verify_token(
        &payload.refresh_token,
        &config.jwt_refresh_secret,
        TokenType::Refresh,
    )
    .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let role = Role::from_str(&claims.role)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        &claims.sub,
        role,
        &config.jwt_refresh_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign refresh token");
        ApiError::Internal
    })?;

    // Single conditional UPDATE keyed on the exact stored token: rotation
    // is atomic, so concurrent reuse of one token loses the race.
    let rotated = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET token = ?, expires_at = FROM_UNIXTIME(?)
        WHERE user_id = ? AND token = ? AND expires_at > NOW()
        "#,
    )
    .bind(&new_refresh_token)
    .bind(new_claims.exp as i64)
    .bind(claims.user_id)
    .bind(&payload.refresh_token)
    .execute(pool.get_ref())
    .await?;

    if rotated.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh rejected: token not in store");
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    let access_token = generate_access_token(
        claims.user_id,
        &claims.sub,
        role,
        &config.jwt_access_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal
    })?;

    Ok(response::ok(
        json!({
            "accessToken": access_token,
            "refreshToken": new_refresh_token,
        }),
        "Token refreshed",
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses((status = 200, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LogoutRequest>,
) -> Result<HttpResponse, ApiError> {
    // Best-effort: a failed delete must not block the response.
    if let Err(e) = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ? AND token = ?")
        .bind(auth.user_id)
        .bind(&payload.refresh_token)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, user_id = auth.user_id, "Failed to delete refresh token");
    }

    info!(user_id = auth.user_id, "User logged out");

    Ok(response::ok(serde_json::Value::Null, "Logged out successfully"))
}

#[utoipa::path(
    post,
    path = "/auth/logout-all",
    responses((status = 200, description = "All sessions revoked")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout_all(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = auth.user_id, "User logged out from all devices");

    Ok(response::ok(
        serde_json::Value::Null,
        "Logged out from all devices",
    ))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Caller profile", body = crate::model::employee::EmployeeProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let profile = fetch_profile(pool.get_ref(), auth.user_id).await?;
    Ok(response::ok(profile, "Success"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_payload() -> SignupRequest {
        SignupRequest {
            employee_id: "EMP042".to_string(),
            email: "jane@company.com".to_string(),
            password: "Str0ngPass".to_string(),
            first_name: "Jane".to_string(),
            last_name: "O'Neil".to_string(),
            role: None,
        }
    }

    #[test]
    fn valid_signup_passes() {
        assert!(signup_payload().validate().is_ok());
    }

    #[test]
    fn weak_passwords_rejected() {
        for bad in ["short1A", "alllowercase1", "ALLUPPERCASE1", "NoDigitsHere"] {
            let mut p = signup_payload();
            p.password = bad.to_string();
            assert!(p.validate().is_err(), "expected rejection for {bad}");
        }
    }

    #[test]
    fn employee_code_must_be_alphanumeric() {
        let mut p = signup_payload();
        p.employee_id = "EMP-042".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn names_allow_apostrophes_and_hyphens() {
        let mut p = signup_payload();
        p.last_name = "Smith-O'Brien".to_string();
        assert!(p.validate().is_ok());

        p.last_name = "Sm1th".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn login_requires_well_formed_email() {
        let p = LoginRequest {
            email: "not-an-email".to_string(),
            password: "x".to_string(),
        };
        assert!(p.validate().is_err());
    }
}
