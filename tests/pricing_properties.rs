use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use storefront_api::pricing::{CouponRules, DiscountType, compute_total, evaluate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn rules(discount_type: DiscountType, value: i64, cap: Option<i64>) -> CouponRules {
    CouponRules {
        code: "PROP".into(),
        discount_type,
        discount_value: value,
        max_discount_amount: cap,
        min_order_value: 0,
        start_date: now() - Duration::days(1),
        expiry_date: now() + Duration::days(1),
        usage_limit: None,
        used_count: 0,
        per_user_limit: 1,
        is_active: true,
    }
}

proptest! {
    #[test]
    fn percentage_discount_respects_cap_and_subtotal(
        subtotal in 0_i64..10_000_000,
        percent in 1_i64..=100,
        cap in proptest::option::of(1_i64..1_000_000),
    ) {
        let coupon = rules(DiscountType::Percentage, percent, cap);
        let eval = evaluate(Some(&coupon), subtotal, 0, now()).unwrap();
        let raw = subtotal * percent / 100;
        prop_assert_eq!(eval.discount, cap.map_or(raw, |c| raw.min(c)));
        prop_assert!(eval.discount <= subtotal);
    }

    #[test]
    fn flat_discount_never_exceeds_subtotal(
        subtotal in 0_i64..10_000_000,
        value in 1_i64..10_000_000,
    ) {
        let coupon = rules(DiscountType::Flat, value, None);
        let eval = evaluate(Some(&coupon), subtotal, 0, now()).unwrap();
        prop_assert_eq!(eval.discount, value.min(subtotal));
    }

    #[test]
    fn total_is_deterministic_and_never_negative(
        subtotal in 0_i64..10_000_000,
        discount in 0_i64..10_000_000,
        delivery in 0_i64..100_000,
    ) {
        let first = compute_total(subtotal, discount, delivery).unwrap();
        let second = compute_total(subtotal, discount, delivery).unwrap();
        prop_assert_eq!(first, second);
        prop_assert!(first >= delivery);
    }

    #[test]
    fn more_delivery_means_higher_total(
        subtotal in 0_i64..10_000_000,
        discount in 0_i64..10_000_000,
        delivery in 0_i64..100_000,
        extra in 1_i64..10_000,
    ) {
        let base = compute_total(subtotal, discount, delivery).unwrap();
        let more = compute_total(subtotal, discount, delivery + extra).unwrap();
        prop_assert!(more > base);
    }

    #[test]
    fn more_discount_lowers_total_until_floor(
        subtotal in 1_i64..10_000_000,
        delivery in 0_i64..100_000,
        discount in 0_i64..10_000_000,
    ) {
        let base = compute_total(subtotal, discount, delivery).unwrap();
        let more = compute_total(subtotal, discount + 1, delivery).unwrap();
        if discount < subtotal {
            prop_assert!(more < base);
        } else {
            prop_assert_eq!(more, delivery);
        }
    }

    #[test]
    fn negative_inputs_are_rejected(value in i64::MIN..0) {
        prop_assert!(compute_total(value, 0, 0).is_err());
        prop_assert!(compute_total(0, value, 0).is_err());
        prop_assert!(compute_total(0, 0, value).is_err());
    }
}
