use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Assembled account + profile view, the shape returned by `/auth/me`,
/// `/users/profile` and the admin employee endpoints.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP001")]
    pub employee_code: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "employee")]
    pub role: String,

    #[schema(example = "active")]
    pub status: String,

    #[schema(example = "John", nullable = true)]
    pub first_name: Option<String>,

    #[schema(example = "Doe", nullable = true)]
    pub last_name: Option<String>,

    #[schema(nullable = true)]
    pub avatar: Option<String>,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(nullable = true)]
    pub address: Option<String>,

    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "Backend Developer", nullable = true)]
    pub position: Option<String>,

    #[schema(example = "2024-01-01", value_type = String, format = "date", nullable = true)]
    pub date_of_joining: Option<NaiveDate>,

    #[schema(example = 50000.0, nullable = true)]
    pub salary: Option<f64>,

    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}
