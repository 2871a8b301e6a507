//! Pricing rules for the storefront: coupon evaluation, order totals,
//! delivery charges and the order status lifecycle.
//!
//! Nothing in here touches the database. Services load a coupon snapshot and
//! the caller's redemption count, then hand them to these functions, so the
//! same rules apply to `/coupons/validate`, checkout and redemption.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod coupon;
pub mod delivery;
pub mod status;
pub mod totals;

pub use coupon::{CouponCheck, CouponEvaluation, CouponRules, DiscountType, evaluate, normalize_code};
pub use delivery::DeliveryPolicy;
pub use status::{OrderStatus, PaymentStatus};
pub use totals::{OrderTotals, compute_total, line_total};

/// Why a coupon or a pricing input was rejected.
///
/// Every variant is recoverable: checkout reports it and lets the shopper try
/// another code or continue without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingError {
    #[error("Coupon not found")]
    NotFound,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon is not valid yet")]
    NotYetValid,
    #[error("Order subtotal is below the coupon minimum")]
    BelowMinOrder,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("You have already used this coupon the maximum number of times")]
    PerUserLimitReached,
    #[error("Invalid pricing input")]
    InvalidInput,
}

impl PricingError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            PricingError::NotFound => "NOT_FOUND",
            PricingError::Inactive => "INACTIVE",
            PricingError::Expired => "EXPIRED",
            PricingError::NotYetValid => "NOT_YET_VALID",
            PricingError::BelowMinOrder => "BELOW_MIN_ORDER",
            PricingError::UsageLimitReached => "USAGE_LIMIT_REACHED",
            PricingError::PerUserLimitReached => "PER_USER_LIMIT_REACHED",
            PricingError::InvalidInput => "INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_match_serialized_form() {
        let all = [
            PricingError::NotFound,
            PricingError::Inactive,
            PricingError::Expired,
            PricingError::NotYetValid,
            PricingError::BelowMinOrder,
            PricingError::UsageLimitReached,
            PricingError::PerUserLimitReached,
            PricingError::InvalidInput,
        ];
        for err in all {
            let json = serde_json::to_value(err).unwrap();
            assert_eq!(json, serde_json::Value::String(err.code().to_string()));
        }
    }
}
