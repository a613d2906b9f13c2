use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, nullable = true)]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = 8.25, nullable = true)]
    pub work_hours: Option<f64>,
    #[schema(nullable = true)]
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}
