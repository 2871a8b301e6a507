use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pricing::{DiscountType, OrderStatus, PaymentStatus};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

/// Full coupon record, as admins see it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub min_order_value: i64,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What shoppers see in the list of currently available offers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicCoupon {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub min_order_value: i64,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub subtotal: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
    pub delivery_charge: i64,
    pub total_amount: i64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    #[schema(value_type = Object)]
    pub shipping_address: serde_json::Value,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub custom_design_id: Option<Uuid>,
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}
