use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PricingError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `discount_value` is a whole percent of the subtotal.
    #[sea_orm(string_value = "PERCENTAGE")]
    Percentage,
    /// `discount_value` is an amount in minor units.
    #[sea_orm(string_value = "FLAT")]
    Flat,
}

/// Snapshot of a stored coupon, as needed to decide whether it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRules {
    pub code: String,
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
}

impl CouponRules {
    /// Global redemption cap reached.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count >= limit)
            .unwrap_or(false)
    }

    fn window_check(&self, now: DateTime<Utc>) -> Result<(), PricingError> {
        if now < self.start_date {
            return Err(PricingError::NotYetValid);
        }
        if now > self.expiry_date {
            return Err(PricingError::Expired);
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`, ignoring eligibility.
    /// Never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        if subtotal <= 0 {
            return 0;
        }
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = (subtotal as i128 * self.discount_value as i128 / 100) as i64;
                match self.max_discount_amount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Flat => self.discount_value.min(subtotal),
        };
        discount.clamp(0, subtotal)
    }

    /// Structural checks an admin-supplied coupon must pass before it is stored.
    pub fn check_definition(&self) -> Result<(), String> {
        if normalize_code(&self.code).is_none() {
            return Err("code must not be empty".into());
        }
        if self.discount_value <= 0 {
            return Err("discount_value must be positive".into());
        }
        match self.discount_type {
            DiscountType::Percentage if self.discount_value > 100 => {
                return Err("percentage discount_value must be between 1 and 100".into());
            }
            DiscountType::Flat if self.max_discount_amount.is_some() => {
                return Err("max_discount_amount only applies to PERCENTAGE coupons".into());
            }
            _ => {}
        }
        if self.max_discount_amount.is_some_and(|cap| cap <= 0) {
            return Err("max_discount_amount must be positive".into());
        }
        if self.min_order_value < 0 {
            return Err("min_order_value must not be negative".into());
        }
        if self.start_date > self.expiry_date {
            return Err("start_date must not be after expiry_date".into());
        }
        if self.usage_limit.is_some_and(|limit| limit < 1) {
            return Err("usage_limit must be at least 1".into());
        }
        if self.per_user_limit < 1 {
            return Err("per_user_limit must be at least 1".into());
        }
        Ok(())
    }
}

/// Case-insensitive lookup key for a coupon code. `None` for blank input.
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponEvaluation {
    pub code: String,
    pub discount: i64,
}

/// Decide whether `coupon` applies to an order of `subtotal` placed by a user
/// who has already redeemed it `user_redemptions` times.
///
/// Checks run in a fixed order and the first failure is reported.
pub fn evaluate(
    coupon: Option<&CouponRules>,
    subtotal: i64,
    user_redemptions: i64,
    now: DateTime<Utc>,
) -> Result<CouponEvaluation, PricingError> {
    if subtotal < 0 || user_redemptions < 0 {
        return Err(PricingError::InvalidInput);
    }
    let coupon = coupon.ok_or(PricingError::NotFound)?;
    if !coupon.is_active {
        return Err(PricingError::Inactive);
    }
    coupon.window_check(now)?;
    if subtotal < coupon.min_order_value {
        return Err(PricingError::BelowMinOrder);
    }
    if coupon.is_exhausted() {
        return Err(PricingError::UsageLimitReached);
    }
    if user_redemptions >= i64::from(coupon.per_user_limit) {
        return Err(PricingError::PerUserLimitReached);
    }

    Ok(CouponEvaluation {
        code: coupon.code.clone(),
        discount: coupon.discount_for(subtotal),
    })
}

/// Wire shape of an evaluation: `{ valid, discount, reason }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponCheck {
    pub valid: bool,
    pub discount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PricingError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Result<CouponEvaluation, PricingError>> for CouponCheck {
    fn from(result: Result<CouponEvaluation, PricingError>) -> Self {
        match result {
            Ok(eval) => Self {
                valid: true,
                discount: eval.discount,
                reason: None,
                message: None,
            },
            Err(reason) => Self {
                valid: false,
                discount: 0,
                reason: Some(reason),
                message: Some(reason.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rules(discount_type: DiscountType, value: i64) -> CouponRules {
        let now = Utc::now();
        CouponRules {
            code: "TEST".into(),
            discount_type,
            discount_value: value,
            max_discount_amount: None,
            min_order_value: 0,
            start_date: now - Duration::days(1),
            expiry_date: now + Duration::days(1),
            usage_limit: None,
            used_count: 0,
            per_user_limit: 1,
            is_active: true,
        }
    }

    #[test]
    fn normalizes_codes() {
        assert_eq!(normalize_code("  save20 "), Some("SAVE20".to_string()));
        assert_eq!(normalize_code("   "), None);
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let mut coupon = rules(DiscountType::Percentage, 50);
        coupon.max_discount_amount = Some(300);
        assert_eq!(coupon.discount_for(1000), 300);
        assert_eq!(coupon.discount_for(400), 200);
    }

    #[test]
    fn percentage_discount_floors_fractions() {
        let coupon = rules(DiscountType::Percentage, 15);
        assert_eq!(coupon.discount_for(999), 149);
    }

    #[test]
    fn flat_discount_never_exceeds_subtotal() {
        let coupon = rules(DiscountType::Flat, 100);
        assert_eq!(coupon.discount_for(50), 50);
        assert_eq!(coupon.discount_for(0), 0);
    }

    #[test]
    fn first_failing_check_wins() {
        let now = Utc::now();
        let mut coupon = rules(DiscountType::Flat, 100);
        coupon.is_active = false;
        coupon.expiry_date = now - Duration::hours(1);
        coupon.usage_limit = Some(1);
        coupon.used_count = 1;
        assert_eq!(evaluate(Some(&coupon), 500, 5, now), Err(PricingError::Inactive));

        coupon.is_active = true;
        assert_eq!(evaluate(Some(&coupon), 500, 5, now), Err(PricingError::Expired));

        coupon.expiry_date = now + Duration::hours(1);
        assert_eq!(
            evaluate(Some(&coupon), 500, 5, now),
            Err(PricingError::UsageLimitReached)
        );

        coupon.usage_limit = None;
        assert_eq!(
            evaluate(Some(&coupon), 500, 5, now),
            Err(PricingError::PerUserLimitReached)
        );
    }

    #[test]
    fn window_is_inclusive() {
        let coupon = rules(DiscountType::Flat, 10);
        assert!(evaluate(Some(&coupon), 100, 0, coupon.start_date).is_ok());
        assert!(evaluate(Some(&coupon), 100, 0, coupon.expiry_date).is_ok());
        assert_eq!(
            evaluate(
                Some(&coupon),
                100,
                0,
                coupon.start_date - Duration::seconds(1)
            ),
            Err(PricingError::NotYetValid)
        );
    }

    #[test]
    fn below_minimum_is_rejected() {
        let mut coupon = rules(DiscountType::Flat, 10);
        coupon.min_order_value = 500;
        assert_eq!(
            evaluate(Some(&coupon), 499, 0, Utc::now()),
            Err(PricingError::BelowMinOrder)
        );
        assert!(evaluate(Some(&coupon), 500, 0, Utc::now()).is_ok());
    }

    #[test]
    fn negative_subtotal_is_invalid_input() {
        assert_eq!(evaluate(None, -1, 0, Utc::now()), Err(PricingError::InvalidInput));
    }

    #[test]
    fn definition_checks() {
        let mut coupon = rules(DiscountType::Percentage, 101);
        assert!(coupon.check_definition().is_err());
        coupon.discount_value = 100;
        assert!(coupon.check_definition().is_ok());

        let mut flat = rules(DiscountType::Flat, 100);
        flat.max_discount_amount = Some(10);
        assert!(flat.check_definition().is_err());

        let mut window = rules(DiscountType::Flat, 100);
        window.start_date = window.expiry_date + Duration::seconds(1);
        assert!(window.check_definition().is_err());
    }

    #[test]
    fn check_carries_reason() {
        let check = CouponCheck::from(Err(PricingError::Expired));
        assert!(!check.valid);
        assert_eq!(check.discount, 0);
        assert_eq!(check.reason, Some(PricingError::Expired));
    }
}
