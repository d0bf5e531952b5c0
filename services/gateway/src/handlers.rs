use crate::auth::{Authenticated, MaybeAuthenticated};
use crate::errors::GatewayError;
use crate::metrics;
use crate::models::{
    AdjustCreditsRequest, BalanceResponse, CreateCourseRequest, EnrollResponse,
    FacebookLoginRequest, GoogleLoginRequest, LoginRequest, MessageResponse,
    PurchaseCreditsRequest, RegisterRequest, UpdateCourseRequest, UpdateProfileRequest,
    UpdateRoleRequest,
};
use crate::services::AuthService;
use actix_web::{web, HttpResponse};
use exchange_core::{AccountId, CourseId, Exchange};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

type ExchangeData = web::Data<Arc<Exchange>>;
type AuthData = web::Data<Arc<AuthService>>;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "skill-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(exchange: ExchangeData) -> HttpResponse {
    match metrics::metrics_handler(exchange.metrics().registry()) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

// ---- auth ----

pub async fn register(
    auth: AuthData,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = auth.register(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn login(
    auth: AuthData,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = auth.login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn google_login(
    auth: AuthData,
    request: web::Json<GoogleLoginRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = auth.google_login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn facebook_login(
    auth: AuthData,
    request: web::Json<FacebookLoginRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = auth.facebook_login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn me(exchange: ExchangeData, caller: Authenticated) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.me(&caller.0)?))
}

pub async fn dashboard_stats(
    exchange: ExchangeData,
    caller: Authenticated,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.dashboard(&caller.0)?))
}

/// Update own profile; responds with the account and a refreshed token
pub async fn update_profile(
    auth: AuthData,
    caller: Authenticated,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = auth.update_profile(&caller.0, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn transactions(
    exchange: ExchangeData,
    caller: Authenticated,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.transactions(&caller.0)?))
}

pub async fn purchase_credits(
    exchange: ExchangeData,
    caller: Authenticated,
    request: web::Json<PurchaseCreditsRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    request.validate()?;

    let new_balance = exchange
        .purchase_credits(&caller.0, request.amount, &request.bundle_name)
        .await?;

    Ok(HttpResponse::Ok().json(BalanceResponse {
        message: "Purchase successful!".to_string(),
        new_balance,
    }))
}

pub async fn public_profile(
    exchange: ExchangeData,
    id: web::Path<AccountId>,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.public_profile(id.into_inner())?))
}

// ---- courses ----

pub async fn create_course(
    exchange: ExchangeData,
    caller: Authenticated,
    request: web::Json<CreateCourseRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    request.validate()?;

    let course = exchange.create_course(&caller.0, request.into()).await?;
    Ok(HttpResponse::Created().json(exchange.course(course.id)?))
}

/// Catalog; an authenticated caller does not see their own courses
pub async fn list_courses(exchange: ExchangeData, caller: MaybeAuthenticated) -> HttpResponse {
    HttpResponse::Ok().json(exchange.list_courses(caller.0.as_ref()))
}

pub async fn get_course(
    exchange: ExchangeData,
    id: web::Path<CourseId>,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.course(id.into_inner())?))
}

pub async fn courses_by_instructor(exchange: ExchangeData, id: web::Path<AccountId>) -> HttpResponse {
    HttpResponse::Ok().json(exchange.courses_by_instructor(id.into_inner()))
}

pub async fn update_course(
    exchange: ExchangeData,
    caller: Authenticated,
    id: web::Path<CourseId>,
    request: web::Json<UpdateCourseRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    request.validate()?;

    let course = exchange
        .update_course(&caller.0, id.into_inner(), request.into())
        .await?;
    Ok(HttpResponse::Ok().json(exchange.course(course.id)?))
}

pub async fn enroll(
    exchange: ExchangeData,
    caller: Authenticated,
    id: web::Path<CourseId>,
) -> Result<HttpResponse, GatewayError> {
    let remaining_credits = exchange.enroll(&caller.0, id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(EnrollResponse {
        message: "Enrolled successfully".to_string(),
        remaining_credits,
    }))
}

pub async fn complete(
    exchange: ExchangeData,
    caller: Authenticated,
    id: web::Path<CourseId>,
) -> Result<HttpResponse, GatewayError> {
    let outcome = exchange.complete(&caller.0, id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Congratulations! Course finished. Mentor rewarded.",
        "course_id": outcome.course_id,
        "mentor_reward": outcome.mentor_reward
    })))
}

// ---- discovery ----

pub async fn matches(exchange: ExchangeData, caller: Authenticated) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.find_matches(&caller.0)?))
}

// ---- admin ----

pub async fn list_users(
    exchange: ExchangeData,
    caller: Authenticated,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.list_users(&caller.0)?))
}

pub async fn platform_stats(
    exchange: ExchangeData,
    caller: Authenticated,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.platform_stats(&caller.0)?))
}

pub async fn audit_logs(
    exchange: ExchangeData,
    caller: Authenticated,
) -> Result<HttpResponse, GatewayError> {
    Ok(HttpResponse::Ok().json(exchange.audit_logs(&caller.0)?))
}

pub async fn adjust_credits(
    exchange: ExchangeData,
    caller: Authenticated,
    request: web::Json<AdjustCreditsRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    request.validate()?;

    let adjustment = exchange
        .adjust_credits(
            &caller.0,
            request.user_id,
            request.amount,
            request.reason.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(BalanceResponse {
        message: format!("Credits adjusted for {}", adjustment.name),
        new_balance: adjustment.new_balance,
    }))
}

pub async fn update_role(
    exchange: ExchangeData,
    caller: Authenticated,
    request: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    let user = exchange
        .update_role(&caller.0, request.user_id, request.new_role)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Role updated to {}", request.new_role),
        "user": user
    })))
}

pub async fn delete_course(
    exchange: ExchangeData,
    caller: Authenticated,
    id: web::Path<CourseId>,
) -> Result<HttpResponse, GatewayError> {
    exchange.delete_course(&caller.0, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Course deleted by Admin successfully")))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/google-login", web::post().to(google_login))
                    .route("/facebook-login", web::post().to(facebook_login))
                    .route("/me", web::get().to(me))
                    .route("/dashboard-stats", web::get().to(dashboard_stats))
                    .route("/update-profile", web::put().to(update_profile))
                    .route("/transactions", web::get().to(transactions))
                    .route("/purchase-credits", web::post().to(purchase_credits))
                    // must be last
                    .route("/{id}", web::get().to(public_profile)),
            )
            .service(
                web::scope("/courses")
                    .route("/all", web::get().to(list_courses))
                    .route("/create", web::post().to(create_course))
                    .route("/instructor/{id}", web::get().to(courses_by_instructor))
                    .route("/enroll/{id}", web::post().to(enroll))
                    .route("/complete/{id}", web::post().to(complete))
                    .route("/{id}", web::get().to(get_course))
                    .route("/{id}", web::put().to(update_course)),
            )
            .service(web::scope("/discovery").route("/matches", web::get().to(matches)))
            .service(
                web::scope("/admin")
                    .route("/users", web::get().to(list_users))
                    .route("/stats", web::get().to(platform_stats))
                    .route("/logs", web::get().to(audit_logs))
                    .route("/adjust-credits", web::patch().to(adjust_credits))
                    .route("/update-role", web::patch().to(update_role))
                    .route("/delete-course/{id}", web::delete().to(delete_course)),
            ),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
