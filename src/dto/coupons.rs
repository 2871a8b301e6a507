use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Coupon, PublicCoupon};
use crate::pricing::DiscountType;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub subtotal: i64,
}

/// Apply a coupon to an order that was placed without one.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RedeemCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1))]
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub min_order_value: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub is_active: Option<bool>,
}

/// Partial update. Omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateCouponRequest {
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(range(min = 1))]
    pub discount_value: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub min_order_value: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub clear_max_discount_amount: bool,
    #[serde(default)]
    pub clear_usage_limit: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponList {
    pub items: Vec<Coupon>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicCouponList {
    pub items: Vec<PublicCoupon>,
}
