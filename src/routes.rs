use crate::{
    api::{attendance, dashboard, employee, leave_request, payroll},
    auth::{
        handlers,
        middleware::{auth_middleware, require_admin},
    },
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let signup_limiter = Arc::new(build_limiter(config.rate_signup_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Auth: signup/login/refresh are public, the rest of the scope is not.
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/signup")
                    .wrap(signup_limiter)
                    .route(web::post().to(handlers::signup)),
            )
            .service(
                web::resource("/login")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware))
                    .service(web::resource("/logout").route(web::post().to(handlers::logout)))
                    .service(
                        web::resource("/logout-all").route(web::post().to(handlers::logout_all)),
                    )
                    .service(web::resource("/me").route(web::get().to(handlers::me))),
            ),
    );

    // Own profile
    cfg.service(
        web::scope("/users")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("/profile")
                    .route(web::get().to(employee::get_profile))
                    .route(web::put().to(employee::update_profile)),
            ),
    );

    // Employee administration (whole scope is admin-only)
    cfg.service(
        web::scope("/employees")
            .wrap(from_fn(require_admin))
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(web::resource("").route(web::get().to(employee::list_employees)))
            .service(
                web::resource("/departments").route(web::get().to(employee::list_departments)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(employee::get_employee))
                    .route(web::put().to(employee::update_employee)),
            ),
    );

    cfg.service(
        web::scope("/attendance")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
            .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
            .service(web::resource("/today").route(web::get().to(attendance::get_today)))
            .service(web::resource("/history").route(web::get().to(attendance::get_history)))
            .service(
                web::resource("/weekly-summary").route(web::get().to(attendance::weekly_summary)),
            )
            .service(
                web::resource("/weekly-summary/{user_id}")
                    .wrap(from_fn(require_admin))
                    .route(web::get().to(attendance::weekly_summary_user)),
            )
            .service(
                web::resource("/{id}")
                    .wrap(from_fn(require_admin))
                    .route(web::put().to(attendance::update_attendance)),
            ),
    );

    cfg.service(
        web::scope("/leave")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("")
                    .route(web::post().to(leave_request::apply_leave))
                    .route(web::get().to(leave_request::leave_list)),
            )
            .service(web::resource("/balance").route(web::get().to(leave_request::leave_balance)))
            .service(
                web::resource("/pending-count")
                    .wrap(from_fn(require_admin))
                    .route(web::get().to(leave_request::pending_count)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(leave_request::get_leave))
                    .route(web::delete().to(leave_request::cancel_leave)),
            )
            .service(
                web::resource("/{id}/status")
                    .wrap(from_fn(require_admin))
                    .route(web::put().to(leave_request::update_leave_status)),
            ),
    );

    cfg.service(
        web::scope("/payroll")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            // GET is for everyone, POST checks the admin capability itself
            .service(
                web::resource("")
                    .route(web::get().to(payroll::list_payrolls))
                    .route(web::post().to(payroll::create_payroll)),
            )
            .service(web::resource("/summary").route(web::get().to(payroll::payroll_summary)))
            .service(
                web::resource("/summary/{user_id}")
                    .wrap(from_fn(require_admin))
                    .route(web::get().to(payroll::payroll_summary_user)),
            )
            .service(
                web::resource("/generate")
                    .wrap(from_fn(require_admin))
                    .route(web::post().to(payroll::generate_monthly)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(payroll::get_payroll))
                    .route(web::put().to(payroll::update_payroll)),
            )
            .service(
                web::resource("/{id}/process")
                    .wrap(from_fn(require_admin))
                    .route(web::post().to(payroll::process_payroll)),
            ),
    );

    cfg.service(
        web::scope("/dashboard")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/stats").route(web::get().to(dashboard::get_stats)))
            .service(
                web::resource("/activity")
                    .wrap(from_fn(require_admin))
                    .route(web::get().to(dashboard::recent_activity)),
            )
            .service(
                web::resource("/departments")
                    .wrap(from_fn(require_admin))
                    .route(web::get().to(dashboard::department_stats)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min, access secret)
//  └─ refresh_token (7 days, refresh secret, stored server-side)
//
// API REQUEST
//  └─ Authorization: Bearer access_token
//
// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ rotates the stored token, returns a new pair
