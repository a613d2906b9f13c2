use crate::api::attendance::{
    AttendanceStatus, CheckInRequest, UpdateAttendanceRequest, WeeklySummary,
};
use crate::api::dashboard::{ActivityItem, AdminStats, DepartmentStat, EmployeeStats};
use crate::api::employee::{
    AccountStatus, DepartmentCount, UpdateEmployeeRequest, UpdateProfileRequest,
};
use crate::api::leave_request::{
    ApplyLeaveRequest, BalanceEntry, LeaveBalance, LeaveDetail, LeaveStatus, LeaveType,
    ReviewDecision, UpdateLeaveStatusRequest,
};
use crate::api::payroll::{
    CreatePayrollRequest, GenerateMonthlyRequest, PayrollDetail, PayrollStatus, PayrollSummary,
    UpdatePayrollRequest,
};
use crate::auth::handlers::{LoginRequest, RefreshRequest, SignupRequest, UserSummary};
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::EmployeeProfile;
use crate::model::leave_request::LeaveRequest;
use crate::model::payroll::PayrollRecord;
use crate::model::role::Role;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dayflow API",
        version = "1.0.0",
        description = r#"
## Dayflow — HR management backend

Employee records, daily attendance, leave requests, payroll and dashboard
aggregation behind a role-gated REST API.

### Security
All endpoints except signup/login/refresh require a **JWT Bearer** access
token; admin-tagged routes additionally require the `admin` role.

### Response format
Every response is wrapped in `{success, message, data, timestamp}`; list
endpoints add a `pagination` block.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::logout_all,
        crate::auth::handlers::me,

        crate::api::employee::get_profile,
        crate::api::employee::update_profile,
        crate::api::employee::list_employees,
        crate::api::employee::list_departments,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::get_today,
        crate::api::attendance::get_history,
        crate::api::attendance::update_attendance,
        crate::api::attendance::weekly_summary,
        crate::api::attendance::weekly_summary_user,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::leave_balance,
        crate::api::leave_request::pending_count,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::update_leave_status,
        crate::api::leave_request::cancel_leave,

        crate::api::payroll::list_payrolls,
        crate::api::payroll::payroll_summary,
        crate::api::payroll::payroll_summary_user,
        crate::api::payroll::get_payroll,
        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::process_payroll,
        crate::api::payroll::generate_monthly,

        crate::api::dashboard::get_stats,
        crate::api::dashboard::recent_activity,
        crate::api::dashboard::department_stats
    ),
    components(
        schemas(
            Role,
            SignupRequest,
            LoginRequest,
            RefreshRequest,
            UserSummary,
            EmployeeProfile,
            UpdateProfileRequest,
            UpdateEmployeeRequest,
            AccountStatus,
            DepartmentCount,
            AttendanceRecord,
            AttendanceStatus,
            CheckInRequest,
            UpdateAttendanceRequest,
            WeeklySummary,
            ApplyLeaveRequest,
            UpdateLeaveStatusRequest,
            ReviewDecision,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveDetail,
            BalanceEntry,
            LeaveBalance,
            PayrollRecord,
            PayrollDetail,
            PayrollStatus,
            CreatePayrollRequest,
            UpdatePayrollRequest,
            GenerateMonthlyRequest,
            PayrollSummary,
            AdminStats,
            EmployeeStats,
            ActivityItem,
            DepartmentStat
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and token lifecycle"),
        (name = "Employee", description = "Profiles and employee administration"),
        (name = "Attendance", description = "Daily check-in/check-out tracking"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Payroll", description = "Payroll records and processing"),
        (name = "Dashboard", description = "Aggregated statistics"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
