use serde::Serialize;
use utoipa::ToSchema;

use super::{DeliveryPolicy, PricingError};

/// `max(0, subtotal - discount) + delivery_charge`.
///
/// Negative inputs are rejected rather than clamped.
pub fn compute_total(subtotal: i64, discount: i64, delivery_charge: i64) -> Result<i64, PricingError> {
    if subtotal < 0 || discount < 0 || delivery_charge < 0 {
        return Err(PricingError::InvalidInput);
    }
    (subtotal - discount)
        .max(0)
        .checked_add(delivery_charge)
        .ok_or(PricingError::InvalidInput)
}

pub fn line_total(unit_price: i64, quantity: i32) -> Result<i64, PricingError> {
    if unit_price < 0 || quantity <= 0 {
        return Err(PricingError::InvalidInput);
    }
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or(PricingError::InvalidInput)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub delivery_charge: i64,
    pub total_amount: i64,
}

impl OrderTotals {
    /// Price an order from its line totals, an already evaluated coupon
    /// discount and the delivery policy. Delivery is charged on the
    /// discounted subtotal.
    pub fn price(
        line_totals: impl IntoIterator<Item = i64>,
        discount: i64,
        delivery: &DeliveryPolicy,
    ) -> Result<Self, PricingError> {
        let subtotal = line_totals
            .into_iter()
            .try_fold(0_i64, |acc, line| {
                if line < 0 {
                    None
                } else {
                    acc.checked_add(line)
                }
            })
            .ok_or(PricingError::InvalidInput)?;
        Self::from_parts(subtotal, discount, delivery)
    }

    pub fn from_parts(
        subtotal: i64,
        discount: i64,
        delivery: &DeliveryPolicy,
    ) -> Result<Self, PricingError> {
        if subtotal < 0 || discount < 0 {
            return Err(PricingError::InvalidInput);
        }
        let delivery_charge = delivery.charge_for((subtotal - discount).max(0));
        let total_amount = compute_total(subtotal, discount, delivery_charge)?;
        Ok(Self {
            subtotal,
            discount,
            delivery_charge,
            total_amount,
        })
    }
}
