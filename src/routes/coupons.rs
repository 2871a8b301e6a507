use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::coupons::{PublicCouponList, RedeemCouponRequest, ValidateCouponRequest},
    dto::orders::OrderWithItems,
    error::AppResult,
    middleware::auth::AuthUser,
    pricing::CouponCheck,
    response::ApiResponse,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/active", get(list_active_coupons))
        .route("/validate", post(validate_coupon))
        .route("/redeem", post(redeem_coupon))
}

#[utoipa::path(
    get,
    path = "/api/coupons/active",
    responses(
        (status = 200, description = "Coupons usable right now", body = ApiResponse<PublicCouponList>)
    ),
    tag = "Coupons"
)]
pub async fn list_active_coupons(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PublicCouponList>>> {
    let resp = coupon_service::list_active_coupons(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Evaluation result; `valid` is false with a `reason` when the coupon does not apply", body = ApiResponse<CouponCheck>),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> AppResult<Json<ApiResponse<CouponCheck>>> {
    let resp = coupon_service::validate_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons/redeem",
    request_body = RedeemCouponRequest,
    responses(
        (status = 200, description = "Coupon applied and order repriced", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order cannot take a coupon"),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Coupon rejected; body carries the reason code"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn redeem_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RedeemCouponRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = coupon_service::redeem_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}
