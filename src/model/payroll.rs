use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub id: u64,
    pub user_id: u64,
    /// "YYYY-MM"
    #[schema(example = "2026-01")]
    pub month: String,
    #[schema(example = 2026)]
    pub year: i32,
    pub basic_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    /// Always basic + allowances - deductions; recomputed on every edit.
    pub net_salary: f64,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub paid_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}
