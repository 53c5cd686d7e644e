/// Property-based tests using proptest
/// Invariants of phone normalization and intake validation that should hold
/// for all inputs.
use lead_broker_api::errors::AppError;
use lead_broker_api::intake::{normalize, normalize_phone};
use proptest::prelude::*;

// Property: phone normalization is pure and total
proptest! {
    #[test]
    fn phone_normalization_never_panics(raw in "\\PC*") {
        let _ = normalize_phone(&raw);
    }

    #[test]
    fn ten_digit_numbers_get_a_us_country_code(digits in "[0-9]{10}") {
        let normalized = normalize_phone(&digits);
        prop_assert_eq!(normalized, format!("+1{}", digits));
    }

    #[test]
    fn eleven_digit_numbers_with_leading_one_get_a_plus(rest in "[0-9]{10}") {
        let raw = format!("1{}", rest);
        let normalized = normalize_phone(&raw);
        prop_assert_eq!(normalized, format!("+1{}", rest));
    }

    #[test]
    fn formatting_characters_do_not_change_the_result(
        area in "[0-9]{3}",
        exchange in "[0-9]{3}",
        line in "[0-9]{4}",
        use_parens in proptest::bool::ANY,
        use_dash in proptest::bool::ANY
    ) {
        let bare = format!("{}{}{}", area, exchange, line);
        let formatted = if use_parens && use_dash {
            format!("({}) {}-{}", area, exchange, line)
        } else if use_parens {
            format!("({}) {} {}", area, exchange, line)
        } else if use_dash {
            format!("{}-{}-{}", area, exchange, line)
        } else {
            bare.clone()
        };
        prop_assert_eq!(normalize_phone(&formatted), normalize_phone(&bare));
    }

    #[test]
    fn outputs_without_a_plus_input_are_plus_then_digits(raw in "[0-9 ()\\-.]{0,20}") {
        // Inputs without a leading '+' normalize to '+' followed only by
        // the input's digits, in order.
        let normalized = normalize_phone(&raw);
        prop_assert!(normalized.starts_with('+'));
        prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn normalization_is_idempotent_for_us_numbers(digits in "[0-9]{10}") {
        let once = normalize_phone(&digits);
        prop_assert_eq!(normalize_phone(&once), once);
    }
}

// Property: intake validation gates on the phone
proptest! {
    #[test]
    fn flat_payloads_with_valid_phones_always_normalize(
        digits in "[0-9]{10}",
        first in "[A-Za-z]{1,12}",
        last in "[A-Za-z]{1,12}"
    ) {
        let payload = serde_json::json!({
            "phone": digits,
            "firstName": first,
            "lastName": last,
        });

        let draft = normalize(&payload).expect("valid flat payload");
        prop_assert_eq!(draft.phone, format!("+1{}", &digits));
        prop_assert_eq!(draft.full_payload, payload);
    }

    #[test]
    fn short_phones_are_rejected(digits in "[0-9]{1,9}") {
        let payload = serde_json::json!({ "phone": digits });
        let result = normalize(&payload);
        prop_assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
