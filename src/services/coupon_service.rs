use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::coupons::{
        CouponList, CreateCouponRequest, PublicCouponList, RedeemCouponRequest,
        UpdateCouponRequest, ValidateCouponRequest,
    },
    dto::orders::OrderWithItems,
    entity::{
        coupon_redemptions::{
            ActiveModel as RedemptionActive, Column as RedemptionCol, Entity as CouponRedemptions,
        },
        coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons, Model as CouponModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, PublicCoupon},
    pricing::{
        CouponCheck, CouponEvaluation, CouponRules, OrderStatus, OrderTotals, PaymentStatus,
        PricingError, evaluate, normalize_code,
    },
    response::{ApiResponse, Meta},
    routes::params::CouponListQuery,
    services::order_service::{load_order_items, order_from_entity},
    state::AppState,
};

/// A coupon whose usage counter has been incremented inside the caller's
/// transaction. The redemption row is written once the order exists.
#[derive(Debug, Clone)]
pub(crate) struct ReservedCoupon {
    pub coupon_id: Uuid,
    pub code: String,
    pub discount: i64,
}

/// Dry-run evaluation for the checkout page. Rejections are part of the
/// answer, not an error.
pub async fn validate_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<CouponCheck>> {
    payload.validate()?;
    let now = Utc::now();

    let outcome = match normalize_code(&payload.code) {
        None => Err(PricingError::InvalidInput),
        Some(code) => {
            let coupon = find_by_code(&state.orm, &code, false).await?;
            evaluate_loaded(&state.orm, coupon.as_ref(), user.user_id, payload.subtotal, now).await?
        }
    };

    if let Err(reason) = &outcome {
        tracing::debug!(code = %payload.code, reason = reason.code(), "coupon rejected");
    }

    let message = if outcome.is_ok() {
        "Coupon applied"
    } else {
        "Coupon not applicable"
    };
    Ok(ApiResponse::item(message, CouponCheck::from(outcome)))
}

pub async fn list_active_coupons(state: &AppState) -> AppResult<ApiResponse<PublicCouponList>> {
    let now = Utc::now();
    let items = Coupons::find()
        .filter(
            Condition::all()
                .add(CouponCol::IsActive.eq(true))
                .add(CouponCol::StartDate.lte(now))
                .add(CouponCol::ExpiryDate.gte(now))
                .add(
                    Condition::any()
                        .add(CouponCol::UsageLimit.is_null())
                        .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::UsageLimit))),
                ),
        )
        .order_by_asc(CouponCol::ExpiryDate)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(public_coupon_from_entity)
        .collect();

    Ok(ApiResponse::item("Active coupons", PublicCouponList { items }))
}

/// Apply a coupon to one of the caller's own orders that was placed without
/// one, then reprice the order. Same transaction rules as checkout.
pub async fn redeem_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: RedeemCouponRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(payload.order_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.coupon_code.is_some() {
        return Err(AppError::BadRequest("Order already has a coupon applied".into()));
    }
    if order.order_status != OrderStatus::Placed || order.payment_status != PaymentStatus::Pending {
        return Err(AppError::BadRequest(
            "Coupons can only be applied to placed, unpaid orders".into(),
        ));
    }

    let reserved = reserve_coupon(&txn, user.user_id, &payload.code, order.subtotal, now).await?;
    let totals = OrderTotals::from_parts(order.subtotal, reserved.discount, &state.delivery)?;
    record_redemption(&txn, &reserved, user.user_id, order.id).await?;

    let mut active: OrderActive = order.into();
    active.discount = Set(totals.discount);
    active.coupon_code = Set(Some(reserved.code.clone()));
    active.delivery_charge = Set(totals.delivery_charge);
    active.total_amount = Set(totals.total_amount);
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let items = load_order_items(&txn, order.id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_redeem",
        "orders",
        Some(order.id),
        Some(serde_json::json!({ "code": reserved.code, "discount": reserved.discount })),
    )
    .await;

    Ok(ApiResponse::item(
        "Coupon applied",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
    ))
}

/// Lock the coupon row, evaluate it for `user_id` and consume one use.
///
/// The row lock serializes concurrent redemptions of the same code, and the
/// increment is conditional on the cap so the counter can never pass
/// `usage_limit` even without the lock.
pub(crate) async fn reserve_coupon(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    raw_code: &str,
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<ReservedCoupon> {
    let code = normalize_code(raw_code).ok_or(PricingError::InvalidInput)?;
    let coupon = find_by_code(txn, &code, true).await?;
    let evaluation = evaluate_loaded(txn, coupon.as_ref(), user_id, subtotal, now)
        .await?
        .inspect_err(|reason| {
            tracing::debug!(%code, reason = reason.code(), "coupon rejected at checkout");
        })?;
    let coupon = coupon.ok_or(PricingError::NotFound)?;

    let result = Coupons::update_many()
        .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).add(1))
        .col_expr(CouponCol::UpdatedAt, Expr::value(now))
        .filter(CouponCol::Id.eq(coupon.id))
        .filter(CouponCol::IsActive.eq(true))
        .filter(
            Condition::any()
                .add(CouponCol::UsageLimit.is_null())
                .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::UsageLimit))),
        )
        .exec(txn)
        .await?;

    if result.rows_affected != 1 {
        tracing::debug!(%code, "coupon cap reached during redemption");
        return Err(PricingError::UsageLimitReached.into());
    }

    Ok(ReservedCoupon {
        coupon_id: coupon.id,
        code: evaluation.code,
        discount: evaluation.discount,
    })
}

pub(crate) async fn record_redemption(
    txn: &DatabaseTransaction,
    reserved: &ReservedCoupon,
    user_id: Uuid,
    order_id: Uuid,
) -> AppResult<()> {
    RedemptionActive {
        id: Set(Uuid::new_v4()),
        coupon_id: Set(reserved.coupon_id),
        user_id: Set(user_id),
        order_id: Set(order_id),
        discount: Set(reserved.discount),
        created_at: NotSet,
    }
    .insert(txn)
    .await?;
    Ok(())
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    query: CouponListQuery,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(CouponCol::Code).ilike(format!("%{}%", search)));
    }
    if let Some(is_active) = query.is_active {
        condition = condition.add(CouponCol::IsActive.eq(is_active));
    }

    let finder = Coupons::find()
        .filter(condition)
        .order_by_desc(CouponCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_coupon(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::item("Coupon", coupon_from_entity(coupon)))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    payload.validate()?;

    let code = normalize_code(&payload.code)
        .ok_or_else(|| AppError::BadRequest("code must not be empty".into()))?;
    let rules = CouponRules {
        code: code.clone(),
        discount_type: payload.discount_type,
        discount_value: payload.discount_value,
        max_discount_amount: payload.max_discount_amount,
        min_order_value: payload.min_order_value.unwrap_or(0),
        start_date: payload.start_date,
        expiry_date: payload.expiry_date,
        usage_limit: payload.usage_limit,
        used_count: 0,
        per_user_limit: payload.per_user_limit.unwrap_or(1),
        is_active: payload.is_active.unwrap_or(true),
    };
    rules.check_definition().map_err(AppError::BadRequest)?;

    if find_by_code(&state.orm, &code, false).await?.is_some() {
        return Err(AppError::BadRequest(format!("Coupon code {code} already exists")));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(rules.code),
        description: Set(payload.description),
        discount_type: Set(rules.discount_type),
        discount_value: Set(rules.discount_value),
        max_discount_amount: Set(rules.max_discount_amount),
        min_order_value: Set(rules.min_order_value),
        start_date: Set(rules.start_date.into()),
        expiry_date: Set(rules.expiry_date.into()),
        usage_limit: Set(rules.usage_limit),
        used_count: Set(0),
        per_user_limit: Set(rules.per_user_limit),
        is_active: Set(rules.is_active),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        "coupons",
        Some(coupon.id),
        Some(serde_json::json!({ "code": coupon.code })),
    )
    .await;

    Ok(ApiResponse::item("Coupon created", coupon_from_entity(coupon)))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Coupons::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut rules = coupon_rules_from_entity(&existing);
    if let Some(discount_type) = payload.discount_type {
        rules.discount_type = discount_type;
    }
    if let Some(value) = payload.discount_value {
        rules.discount_value = value;
    }
    if payload.clear_max_discount_amount {
        rules.max_discount_amount = None;
    } else if let Some(cap) = payload.max_discount_amount {
        rules.max_discount_amount = Some(cap);
    }
    if let Some(min) = payload.min_order_value {
        rules.min_order_value = min;
    }
    if let Some(start) = payload.start_date {
        rules.start_date = start;
    }
    if let Some(expiry) = payload.expiry_date {
        rules.expiry_date = expiry;
    }
    if payload.clear_usage_limit {
        rules.usage_limit = None;
    } else if let Some(limit) = payload.usage_limit {
        rules.usage_limit = Some(limit);
    }
    if let Some(per_user) = payload.per_user_limit {
        rules.per_user_limit = per_user;
    }
    if let Some(is_active) = payload.is_active {
        rules.is_active = is_active;
    }

    rules.check_definition().map_err(AppError::BadRequest)?;
    if rules.usage_limit.is_some_and(|limit| limit < existing.used_count) {
        return Err(AppError::BadRequest(format!(
            "usage_limit cannot be below the {} redemptions already made",
            existing.used_count
        )));
    }

    let mut active: CouponActive = existing.into();
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    active.discount_type = Set(rules.discount_type);
    active.discount_value = Set(rules.discount_value);
    active.max_discount_amount = Set(rules.max_discount_amount);
    active.min_order_value = Set(rules.min_order_value);
    active.start_date = Set(rules.start_date.into());
    active.expiry_date = Set(rules.expiry_date.into());
    active.usage_limit = Set(rules.usage_limit);
    active.per_user_limit = Set(rules.per_user_limit);
    active.is_active = Set(rules.is_active);
    active.updated_at = Set(Utc::now().into());
    let coupon = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_update",
        "coupons",
        Some(coupon.id),
        Some(serde_json::json!({ "code": coupon.code, "is_active": coupon.is_active })),
    )
    .await;

    Ok(ApiResponse::item("Coupon updated", coupon_from_entity(coupon)))
}

/// Coupons that were ever redeemed are kept for the order history; deactivate
/// them instead.
pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;

    let coupon = Coupons::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let redemptions = CouponRedemptions::find()
        .filter(RedemptionCol::CouponId.eq(coupon.id))
        .count(&txn)
        .await?;
    if redemptions > 0 {
        return Err(AppError::BadRequest(
            "Coupon has been redeemed; deactivate it instead".into(),
        ));
    }

    Coupons::delete_by_id(coupon.id).exec(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "coupon_delete",
        "coupons",
        Some(id),
        Some(serde_json::json!({ "code": coupon.code })),
    )
    .await;

    Ok(ApiResponse::item("Deleted", serde_json::json!({})))
}

async fn find_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    for_update: bool,
) -> AppResult<Option<CouponModel>> {
    let mut finder = Coupons::find().filter(CouponCol::Code.eq(code));
    if for_update {
        finder = finder.lock(LockType::Update);
    }
    Ok(finder.one(conn).await?)
}

// Outer error: storage failure. Inner error: the coupon does not apply.
async fn evaluate_loaded<C: ConnectionTrait>(
    conn: &C,
    coupon: Option<&CouponModel>,
    user_id: Uuid,
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<Result<CouponEvaluation, PricingError>> {
    let redemptions = match coupon {
        Some(coupon) => {
            CouponRedemptions::find()
                .filter(RedemptionCol::CouponId.eq(coupon.id))
                .filter(RedemptionCol::UserId.eq(user_id))
                .count(conn)
                .await? as i64
        }
        None => 0,
    };
    let rules = coupon.map(coupon_rules_from_entity);
    Ok(evaluate(rules.as_ref(), subtotal, redemptions, now))
}

fn coupon_rules_from_entity(model: &CouponModel) -> CouponRules {
    CouponRules {
        code: model.code.clone(),
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        max_discount_amount: model.max_discount_amount,
        min_order_value: model.min_order_value,
        start_date: model.start_date.with_timezone(&Utc),
        expiry_date: model.expiry_date.with_timezone(&Utc),
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        per_user_limit: model.per_user_limit,
        is_active: model.is_active,
    }
}

fn coupon_from_entity(model: CouponModel) -> Coupon {
    Coupon {
        id: model.id,
        code: model.code,
        description: model.description,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        max_discount_amount: model.max_discount_amount,
        min_order_value: model.min_order_value,
        start_date: model.start_date.with_timezone(&Utc),
        expiry_date: model.expiry_date.with_timezone(&Utc),
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        per_user_limit: model.per_user_limit,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn public_coupon_from_entity(model: CouponModel) -> PublicCoupon {
    PublicCoupon {
        code: model.code,
        description: model.description,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        max_discount_amount: model.max_discount_amount,
        min_order_value: model.min_order_value,
        expiry_date: model.expiry_date.with_timezone(&Utc),
    }
}
