use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use std::str::FromStr;

/// The authenticated caller, resolved by the authentication middleware
/// and pulled out of request extensions by handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("Authentication required").into()),
        )
    }
}

/// Optional-auth variant: carries the identity when a valid access token
/// is presented, `None` otherwise. Never fails the request, and does not
/// touch the store.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequest for MaybeAuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Middleware-resolved identity wins when present.
        if let Some(user) = req.extensions().get::<AuthUser>().cloned() {
            return ready(Ok(MaybeAuthUser(Some(user))));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Ok(MaybeAuthUser(None)));
        };

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        let user = token
            .and_then(|t| verify_token(t, &config.jwt_access_secret, TokenType::Access).ok())
            .and_then(|claims| {
                Role::from_str(&claims.role).ok().map(|role| AuthUser {
                    user_id: claims.user_id,
                    email: claims.sub,
                    role,
                })
            });

        ready(Ok(MaybeAuthUser(user)))
    }
}
