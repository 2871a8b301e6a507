use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderItem};
use crate::pricing::{OrderStatus, PaymentStatus};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<OrderLineRequest>,
    pub coupon_code: Option<String>,
    #[validate]
    pub shipping_address: ShippingAddress,
    #[validate(length(min = 1, max = 32))]
    pub payment_method: String,
}

/// One line of an order: exactly one of `product_id` or `custom_design_id`.
/// Prices are looked up server side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Option<Uuid>,
    pub custom_design_id: Option<Uuid>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 5, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[validate(length(min = 1, max = 80))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
}

/// Admin edit of an order. Pricing fields are never editable.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateOrderRequest {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[validate(length(min = 1, max = 80))]
    pub courier_name: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: usize) -> PlaceOrderRequest {
        PlaceOrderRequest {
            items: (0..items)
                .map(|_| OrderLineRequest {
                    product_id: Some(Uuid::new_v4()),
                    custom_design_id: None,
                    size: Some("M".into()),
                    color: None,
                    quantity: 1,
                })
                .collect(),
            coupon_code: None,
            shipping_address: ShippingAddress {
                full_name: "Asha Rao".into(),
                phone: "9876543210".into(),
                line1: "12 Market Road".into(),
                line2: None,
                city: "Pune".into(),
                state: "MH".into(),
                postal_code: "411001".into(),
                country: "IN".into(),
            },
            payment_method: "cod".into(),
        }
    }

    #[test]
    fn item_count_is_bounded() {
        assert!(request(1).validate().is_ok());
        assert!(request(50).validate().is_ok());
        assert!(request(0).validate().is_err());
        assert!(request(51).validate().is_err());
    }

    #[test]
    fn nested_address_is_validated() {
        let mut req = request(1);
        req.shipping_address.postal_code = "1".into();
        assert!(req.validate().is_err());
    }
}
