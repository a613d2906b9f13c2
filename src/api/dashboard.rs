use crate::{auth::auth::AuthUser, error::ApiError, utils::response};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_employees: i64,
    pub present_today: i64,
    pub pending_leaves: i64,
    pub total_departments: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    #[schema(example = "present")]
    pub today_status: String,
    #[schema(value_type = String, nullable = true)]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,
    pub pending_leaves: i64,
    #[schema(nullable = true)]
    pub last_salary: Option<f64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: u64,
    #[serde(rename = "type")]
    #[schema(example = "leave")]
    pub activity_type: &'static str,
    #[schema(example = "John Doe applied for paid leave")]
    pub message: String,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub timestamp: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStat {
    #[schema(example = "Engineering")]
    pub department: String,
    pub employee_count: i64,
    pub present_today: i64,
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
}

/// Role-dependent stats: admins get the org-wide view, employees their
/// own snapshot. The independent aggregates run concurrently.
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses((status = 200, description = "Admin or employee stats, by role")),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    if auth.is_admin() {
        let stats = admin_stats(pool.get_ref()).await?;
        Ok(response::ok(stats, "Success"))
    } else {
        let stats = employee_stats(pool.get_ref(), auth.user_id).await?;
        Ok(response::ok(stats, "Success"))
    }
}

async fn admin_stats(pool: &MySqlPool) -> Result<AdminStats, ApiError> {
    let (total_employees, present_today, pending_leaves, total_departments) = futures::try_join!(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE status = 'active'")
            .fetch_one(pool),
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendance WHERE date = CURDATE() AND status IN ('present', 'late')"
        )
        .fetch_one(pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'")
            .fetch_one(pool),
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT department) FROM employee_profiles WHERE department IS NOT NULL"
        )
        .fetch_one(pool),
    )?;

    Ok(AdminStats {
        total_employees,
        present_today,
        pending_leaves,
        total_departments,
    })
}

async fn employee_stats(pool: &MySqlPool, user_id: u64) -> Result<EmployeeStats, ApiError> {
    let (today, pending_leaves, last_salary) = futures::try_join!(
        sqlx::query_as::<_, (String, Option<NaiveTime>, Option<NaiveTime>)>(
            "SELECT status, check_in, check_out FROM attendance WHERE user_id = ? AND date = CURDATE()"
        )
        .bind(user_id)
        .fetch_optional(pool),
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM leave_requests WHERE user_id = ? AND status = 'pending'"
        )
        .bind(user_id)
        .fetch_one(pool),
        sqlx::query_scalar::<_, f64>(
            "SELECT net_salary FROM payroll WHERE user_id = ? ORDER BY year DESC, month DESC LIMIT 1"
        )
        .bind(user_id)
        .fetch_optional(pool),
    )?;

    let (today_status, check_in, check_out) = match today {
        Some((status, check_in, check_out)) => (status, check_in, check_out),
        None => ("not-checked-in".to_string(), None, None),
    };

    Ok(EmployeeStats {
        today_status,
        check_in,
        check_out,
        pending_leaves,
        last_salary,
    })
}

#[derive(sqlx::FromRow)]
struct LeaveEvent {
    id: u64,
    user_name: Option<String>,
    leave_type: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct AttendanceEvent {
    id: u64,
    user_name: String,
    status: String,
    check_in: Option<NaiveTime>,
    created_at: Option<DateTime<Utc>>,
}

/// The N most recent leave events merged with the N most recent of
/// today's check-ins, newest first, truncated to N.
#[utoipa::path(
    get,
    path = "/dashboard/activity",
    params(("limit" = Option<u32>, Query, description = "Max events, default 10")),
    responses((status = 200, description = "Recent activity feed", body = [ActivityItem])),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn recent_activity(
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let (leaves, attendances) = futures::try_join!(
        sqlx::query_as::<_, LeaveEvent>(
            r#"
            SELECT id, user_name, `type` AS leave_type, status, created_at
            FROM leave_requests
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool.get_ref()),
        sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT a.id,
                   COALESCE(NULLIF(CONCAT_WS(' ', ep.first_name, ep.last_name), ''), u.employee_code) AS user_name,
                   a.status, a.check_in, a.created_at
            FROM attendance a
            JOIN users u ON u.id = a.user_id
            LEFT JOIN employee_profiles ep ON ep.user_id = a.user_id
            WHERE a.date = CURDATE()
            ORDER BY a.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool.get_ref()),
    )?;

    let mut activities: Vec<ActivityItem> = Vec::with_capacity(leaves.len() + attendances.len());

    for leave in leaves {
        let who = leave.user_name.unwrap_or_else(|| "Unknown".to_string());
        let verb = if leave.status == "pending" {
            "applied for".to_string()
        } else {
            leave.status.clone()
        };
        activities.push(ActivityItem {
            id: leave.id,
            activity_type: "leave",
            message: format!("{} {} {} leave", who, verb, leave.leave_type),
            timestamp: leave.created_at,
            status: leave.status,
        });
    }

    for att in attendances {
        let at = att
            .check_in
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        activities.push(ActivityItem {
            id: att.id,
            activity_type: "attendance",
            message: format!("{} checked in at {}", att.user_name, at),
            timestamp: att.created_at,
            status: att.status,
        });
    }

    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    activities.truncate(limit as usize);

    Ok(response::ok(activities, "Success"))
}

#[utoipa::path(
    get,
    path = "/dashboard/departments",
    responses((status = 200, description = "Per-department headcount and presence", body = [DepartmentStat])),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn department_stats(pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let stats = sqlx::query_as::<_, DepartmentStat>(
        r#"
        SELECT ep.department,
               COUNT(DISTINCT ep.user_id) AS employee_count,
               COUNT(DISTINCT CASE WHEN a.status IN ('present', 'late') THEN a.id END) AS present_today
        FROM employee_profiles ep
        JOIN users u ON u.id = ep.user_id
        LEFT JOIN attendance a ON a.user_id = ep.user_id AND a.date = CURDATE()
        WHERE u.status = 'active' AND ep.department IS NOT NULL
        GROUP BY ep.department
        ORDER BY employee_count DESC
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(response::ok(stats, "Success"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_merge_orders_newest_first_and_truncates() {
        let ts = |s: i64| DateTime::<Utc>::from_timestamp(s, 0);

        let mut items = vec![
            ActivityItem {
                id: 1,
                activity_type: "leave",
                message: "a".into(),
                timestamp: ts(100),
                status: "pending".into(),
            },
            ActivityItem {
                id: 2,
                activity_type: "attendance",
                message: "b".into(),
                timestamp: ts(300),
                status: "present".into(),
            },
            ActivityItem {
                id: 3,
                activity_type: "leave",
                message: "c".into(),
                timestamp: ts(200),
                status: "approved".into(),
            },
        ];

        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(2);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 2);
        assert_eq!(items[1].id, 3);
    }
}
