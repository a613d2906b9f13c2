use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
};
use sqlx::MySqlPool;
use std::str::FromStr;

/// Authentication boundary: bearer token -> verified claims -> active
/// account in the store -> `AuthUser` in request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;
    let pool = req
        .app_data::<Data<MySqlPool>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("DB pool missing"))?;

    let header_value = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let claims = verify_token(token, &config.jwt_access_secret, TokenType::Access)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    // The token alone is not enough: the account must still exist and be
    // active, and the role is taken from the store rather than the claim.
    let row = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT email, role
        FROM users
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let (email, role) = row.ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;

    let role =
        Role::from_str(&role).map_err(|_| ApiError::unauthorized("User not found or inactive"))?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email,
        role,
    });

    next.call(req).await
}

/// Role guard for admin-tagged scopes. Runs inside `auth_middleware`, so
/// a missing identity here means a wiring mistake, not a bad token.
pub async fn require_admin(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .map(AuthUser::is_admin)
        .unwrap_or(false);

    if !is_admin {
        return Err(ApiError::forbidden("Insufficient permissions").into());
    }

    next.call(req).await
}
