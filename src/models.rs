use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Subject: the account email, stored lowercase.
    pub sub: String,
    /// Role name ("admin" | "employee")
    pub role: String,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_round_trip() {
        let claims = Claims {
            user_id: 7,
            sub: "jane@company.com".to_string(),
            role: "employee".to_string(),
            exp: 2_000_000_000,
            jti: "abc".to_string(),
            token_type: TokenType::Refresh,
        };

        let json = serde_json::to_string(&claims).unwrap();
        let back: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_id, 7);
        assert_eq!(back.token_type, TokenType::Refresh);
    }
}
