use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error as JwtError,
};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as usize
}

fn issue(
    user_id: u64,
    email: &str,
    role: Role,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), JwtError> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        role: role.to_string(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<String, JwtError> {
    issue(user_id, email, role, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), JwtError> {
    issue(user_id, email, role, TokenType::Refresh, secret, ttl)
}

/// Verify signature + expiry and that the token is of the expected kind.
/// Access and refresh tokens are signed with different secrets, so a
/// refresh token presented as an access token fails the signature check
/// before the type check even runs.
pub fn verify_token(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)?;

    if claims.token_type != expected {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trip() {
        let token =
            generate_access_token(42, "a@b.com", Role::Employee, SECRET, 900).unwrap();
        let claims = verify_token(&token, SECRET, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.role, "employee");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token =
            generate_access_token(42, "a@b.com", Role::Employee, SECRET, 900).unwrap();
        assert!(verify_token(&token, "other-secret", TokenType::Access).is_err());
    }

    #[test]
    fn token_type_enforced() {
        let (token, _) =
            generate_refresh_token(42, "a@b.com", Role::Admin, SECRET, 900).unwrap();
        assert!(verify_token(&token, SECRET, TokenType::Access).is_err());
        assert!(verify_token(&token, SECRET, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_token_rejected() {
        // Encode claims already past expiry, beyond the default leeway.
        let claims = Claims {
            user_id: 1,
            sub: "a@b.com".to_string(),
            role: "employee".to_string(),
            exp: now() - 3600,
            jti: "test".to_string(),
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, SECRET, TokenType::Access).is_err());
    }

    #[test]
    fn refresh_tokens_get_unique_jti() {
        let (_, a) = generate_refresh_token(1, "a@b.com", Role::Employee, SECRET, 900).unwrap();
        let (_, b) = generate_refresh_token(1, "a@b.com", Role::Employee, SECRET, 900).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
