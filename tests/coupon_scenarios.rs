use chrono::{DateTime, Duration, TimeZone, Utc};
use storefront_api::pricing::{
    CouponCheck, CouponRules, DeliveryPolicy, DiscountType, OrderTotals, PricingError,
    compute_total, evaluate,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

fn coupon(code: &str, discount_type: DiscountType, value: i64) -> CouponRules {
    CouponRules {
        code: code.into(),
        discount_type,
        discount_value: value,
        max_discount_amount: None,
        min_order_value: 0,
        start_date: now() - Duration::days(1),
        expiry_date: now() + Duration::days(30),
        usage_limit: None,
        used_count: 0,
        per_user_limit: 1,
        is_active: true,
    }
}

#[test]
fn save20_takes_a_fifth_of_the_subtotal() {
    let save20 = coupon("SAVE20", DiscountType::Percentage, 20);
    let eval = evaluate(Some(&save20), 100, 0, now()).unwrap();
    assert_eq!(eval.discount, 20);
    assert_eq!(compute_total(100, eval.discount, 0).unwrap(), 80);
}

#[test]
fn flat100_is_clamped_to_a_smaller_subtotal() {
    let flat100 = coupon("FLAT100", DiscountType::Flat, 100);
    let eval = evaluate(Some(&flat100), 50, 0, now()).unwrap();
    assert_eq!(eval.discount, 50);
    assert_eq!(compute_total(50, eval.discount, 0).unwrap(), 0);
}

#[test]
fn exhausted_coupon_reports_usage_limit() {
    let mut limited = coupon("ONCE", DiscountType::Flat, 10);
    limited.usage_limit = Some(1);
    limited.used_count = 1;

    assert_eq!(
        evaluate(Some(&limited), 1_000, 0, now()),
        Err(PricingError::UsageLimitReached)
    );
    limited.discount_type = DiscountType::Percentage;
    limited.max_discount_amount = Some(5);
    assert_eq!(
        evaluate(Some(&limited), 1_000, 0, now()),
        Err(PricingError::UsageLimitReached)
    );
}

#[test]
fn past_expiry_wins_over_active_flag() {
    let mut old = coupon("SUMMER", DiscountType::Percentage, 10);
    old.start_date = now() - Duration::days(60);
    old.expiry_date = now() - Duration::days(1);
    assert!(old.is_active);

    let check = CouponCheck::from(evaluate(Some(&old), 500, 0, now()));
    assert!(!check.valid);
    assert_eq!(check.discount, 0);
    assert_eq!(check.reason, Some(PricingError::Expired));
}

#[test]
fn unknown_code_is_not_found() {
    assert_eq!(evaluate(None, 100, 0, now()), Err(PricingError::NotFound));
}

#[test]
fn checkout_totals_with_coupon_and_delivery() {
    let save20 = coupon("SAVE20", DiscountType::Percentage, 20);
    let delivery = DeliveryPolicy {
        flat_charge: 4_900,
        free_above: Some(100_000),
    };
    let subtotal = 2 * 59_900;
    let eval = evaluate(Some(&save20), subtotal, 0, now()).unwrap();
    let totals = OrderTotals::price([59_900, 59_900], eval.discount, &delivery).unwrap();

    assert_eq!(totals.subtotal, 119_800);
    assert_eq!(totals.discount, 23_960);
    // 95_840 after discount is below the free delivery threshold.
    assert_eq!(totals.delivery_charge, 4_900);
    assert_eq!(totals.total_amount, 95_840 + 4_900);
}
