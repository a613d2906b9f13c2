use chrono::{DateTime, Utc};

/// Full account row. Never serialized: it carries the password hash.
#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub employee_code: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}
