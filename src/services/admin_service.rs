use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithItems, UpdateOrderRequest},
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::{load_order_items, order_from_entity},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::OrderStatus.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_order_items(&state.orm, order.id).await?;
    Ok(ApiResponse::item(
        "Order found",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
    ))
}

/// Status, payment status and shipping details. Amounts stay as priced at
/// checkout.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let previous_status = existing.order_status;
    if let Some(next) = payload.order_status {
        if !previous_status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot move order from {previous_status} to {next}"
            )));
        }
    }

    let mut active: OrderActive = existing.into();
    if let Some(status) = payload.order_status {
        active.order_status = Set(status);
    }
    if let Some(payment_status) = payload.payment_status {
        active.payment_status = Set(payment_status);
    }
    if let Some(courier) = payload.courier_name {
        active.courier_name = Set(Some(courier));
    }
    if let Some(tracking) = payload.tracking_number {
        active.tracking_number = Set(Some(tracking));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        order_number = %order.order_number,
        from = %previous_status,
        to = %order.order_status,
        payment_status = %order.payment_status,
        "order updated"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_update",
        "orders",
        Some(order.id),
        Some(serde_json::json!({
            "order_status": order.order_status,
            "payment_status": order.payment_status,
            "tracking_number": order.tracking_number,
        })),
    )
    .await;

    Ok(ApiResponse::item("Order updated", order_from_entity(order)))
}
