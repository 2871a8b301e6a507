use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::orders::{OrderLineRequest, OrderList, OrderWithItems, PlaceOrderRequest},
    entity::{
        custom_designs::{Column as DesignCol, Entity as CustomDesigns},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    pricing::{OrderStatus, OrderTotals, PaymentStatus, line_total},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::coupon_service::{record_redemption, reserve_coupon},
    state::AppState,
};

const MAX_LINE_QUANTITY: i32 = 100;

/// A requested line after its unit price was read from the catalog.
struct PricedLine {
    product_id: Option<Uuid>,
    custom_design_id: Option<Uuid>,
    name: String,
    size: Option<String>,
    color: Option<String>,
    quantity: i32,
    price: i64,
    total: i64,
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
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
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Price the requested lines from the catalog, apply the coupon if any, and
/// store the order. The coupon use, the stock decrement and the order rows
/// commit together or not at all.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;
    for line in &payload.items {
        validate_line(line)?;
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let mut lines: Vec<PricedLine> = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let (name, price) = match (line.product_id, line.custom_design_id) {
            (Some(product_id), None) => {
                let product = Products::find_by_id(product_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} not found")))?;
                (product.name, product.price)
            }
            (None, Some(design_id)) => {
                let design = CustomDesigns::find()
                    .filter(DesignCol::Id.eq(design_id))
                    .filter(DesignCol::UserId.eq(user.user_id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(format!("Custom design {design_id} not found")))?;
                (design.name, design.price)
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Each item needs exactly one of product_id or custom_design_id".into(),
                ));
            }
        };

        lines.push(PricedLine {
            product_id: line.product_id,
            custom_design_id: line.custom_design_id,
            name,
            size: line.size.clone(),
            color: line.color.clone(),
            quantity: line.quantity,
            price,
            total: line_total(price, line.quantity)?,
        });
    }

    let subtotal = OrderTotals::price(lines.iter().map(|l| l.total), 0, &state.delivery)?.subtotal;

    let reserved = match payload.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(reserve_coupon(&txn, user.user_id, code, subtotal, now).await?),
        None => None,
    };
    let discount = reserved.as_ref().map(|r| r.discount).unwrap_or(0);
    let totals = OrderTotals::from_parts(subtotal, discount, &state.delivery)?;

    let order_id = Uuid::new_v4();
    let shipping_address = serde_json::to_value(&payload.shipping_address)
        .map_err(|e| AppError::Internal(e.into()))?;

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(build_order_number(order_id, now)),
        subtotal: Set(totals.subtotal),
        discount: Set(totals.discount),
        coupon_code: Set(reserved.as_ref().map(|r| r.code.clone())),
        delivery_charge: Set(totals.delivery_charge),
        total_amount: Set(totals.total_amount),
        order_status: Set(OrderStatus::Placed),
        payment_status: Set(PaymentStatus::Pending),
        payment_method: Set(payload.payment_method),
        shipping_address: Set(shipping_address),
        courier_name: Set(None),
        tracking_number: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (product_id, (quantity, name)) in stock_decrements(&lines) {
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
            .filter(ProdCol::Id.eq(product_id))
            .filter(ProdCol::Stock.gte(quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::BadRequest(format!("Insufficient stock for {name}")));
        }
    }

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (position, line) in lines.into_iter().enumerate() {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            position: Set(position as i32),
            product_id: Set(line.product_id),
            custom_design_id: Set(line.custom_design_id),
            name: Set(line.name),
            size: Set(line.size),
            color: Set(line.color),
            quantity: Set(line.quantity),
            price: Set(line.price),
            total: Set(line.total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item));
    }

    if let Some(reserved) = &reserved {
        record_redemption(&txn, reserved, user.user_id, order.id).await?;
    }

    txn.commit().await?;

    tracing::info!(
        order_number = %order.order_number,
        total_amount = order.total_amount,
        coupon = ?order.coupon_code,
        "order placed"
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_place",
        "orders",
        Some(order.id),
        Some(serde_json::json!({
            "total_amount": order.total_amount,
            "coupon_code": order.coupon_code,
        })),
    )
    .await;

    Ok(ApiResponse::item(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_order_items(&state.orm, order.id).await?;

    Ok(ApiResponse::item(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
    ))
}

pub(crate) async fn load_order_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

/// Per-product quantities in ascending product id order. Stock rows are
/// updated in this order so crossed checkouts cannot deadlock.
fn stock_decrements(lines: &[PricedLine]) -> BTreeMap<Uuid, (i32, &str)> {
    let mut requested: BTreeMap<Uuid, (i32, &str)> = BTreeMap::new();
    for line in lines {
        if let Some(product_id) = line.product_id {
            let entry = requested.entry(product_id).or_insert((0, line.name.as_str()));
            entry.0 += line.quantity;
        }
    }
    requested
}

fn validate_line(line: &OrderLineRequest) -> AppResult<()> {
    if line.product_id.is_some() == line.custom_design_id.is_some() {
        return Err(AppError::BadRequest(
            "Each item needs exactly one of product_id or custom_design_id".into(),
        ));
    }
    if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        subtotal: model.subtotal,
        discount: model.discount,
        coupon_code: model.coupon_code,
        delivery_charge: model.delivery_charge,
        total_amount: model.total_amount,
        order_status: model.order_status,
        payment_status: model.payment_status,
        payment_method: model.payment_method,
        shipping_address: model.shipping_address,
        courier_name: model.courier_name,
        tracking_number: model.tracking_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        custom_design_id: model.custom_design_id,
        name: model.name,
        size: model.size,
        color: model.color,
        quantity: model.quantity,
        price: model.price,
        total: model.total,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("ORD-{}-{}", date, suffix[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(product: bool, design: bool, quantity: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: product.then(Uuid::new_v4),
            custom_design_id: design.then(Uuid::new_v4),
            size: Some("M".into()),
            color: None,
            quantity,
        }
    }

    #[test]
    fn line_needs_exactly_one_source() {
        assert!(validate_line(&line(true, false, 1)).is_ok());
        assert!(validate_line(&line(false, true, 1)).is_ok());
        assert!(validate_line(&line(true, true, 1)).is_err());
        assert!(validate_line(&line(false, false, 1)).is_err());
    }

    #[test]
    fn line_quantity_bounds() {
        assert!(validate_line(&line(true, false, 0)).is_err());
        assert!(validate_line(&line(true, false, MAX_LINE_QUANTITY)).is_ok());
        assert!(validate_line(&line(true, false, MAX_LINE_QUANTITY + 1)).is_err());
    }

    fn priced(product_id: Option<Uuid>, name: &str, quantity: i32) -> PricedLine {
        PricedLine {
            product_id,
            custom_design_id: product_id.is_none().then(Uuid::new_v4),
            name: name.into(),
            size: None,
            color: None,
            quantity,
            price: 100,
            total: 100 * i64::from(quantity),
        }
    }

    #[test]
    fn stock_decrements_merge_and_sort_by_product() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let lines = vec![
            priced(Some(high), "Hoodie", 2),
            priced(None, "Custom Tee", 1),
            priced(Some(low), "Tee", 1),
            priced(Some(high), "Hoodie", 3),
        ];

        let decrements: Vec<_> = stock_decrements(&lines).into_iter().collect();
        assert_eq!(decrements, vec![(low, (1, "Tee")), (high, (5, "Hoodie"))]);
    }

    #[test]
    fn order_number_embeds_date_and_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        assert_eq!(build_order_number(id, now), "ORD-20261018-A1B2C3D4");
    }
}
