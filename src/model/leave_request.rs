use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    /// Denormalised at apply time for the activity feed.
    #[schema(example = "John Doe", nullable = true)]
    pub user_name: Option<String>,
    // Selected as `type` AS leave_type; serialized back as "type".
    #[serde(rename = "type")]
    #[schema(example = "paid")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: String,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(nullable = true)]
    pub admin_comment: Option<String>,
    #[schema(nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}
