use chrono::SubsecRound;
use lazy_static::lazy_static;
use regex::Regex;
use validator::Validate;

use crate::errors::OrderRejection;
use crate::order::Order;

lazy_static! {
    static ref E164_PATTERN: Regex =
        Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("E.164 pattern must compile");
}

/// Admission checks applied to every order entering the pipeline.
///
/// Constructed by the caller and passed to whoever needs it, so the ingestion
/// path can be exercised without any process-wide state.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    phone_pattern: Regex,
}

impl OrderValidator {
    pub fn new() -> Self {
        Self {
            phone_pattern: E164_PATTERN.clone(),
        }
    }

    /// Decode a raw payload and run every admission check on it.
    ///
    /// `date_created` is truncated to microseconds, the precision the store keeps.
    pub fn decode(&self, payload: &[u8]) -> Result<Order, OrderRejection> {
        let mut order: Order = serde_json::from_slice(payload)?;
        order.date_created = order.date_created.trunc_subsecs(6);
        self.validate(&order)?;
        Ok(order)
    }

    /// Completeness first, then field rules.
    pub fn validate(&self, order: &Order) -> Result<(), OrderRejection> {
        if order.delivery.is_empty() {
            return Err(OrderRejection::Incomplete("delivery"));
        }
        if order.payment.is_empty() {
            return Err(OrderRejection::Incomplete("payment"));
        }
        if order.items.is_empty() {
            return Err(OrderRejection::Incomplete("items"));
        }

        order.validate()?;

        for item in &order.items {
            if item.chrt_id == 0 {
                return Err(OrderRejection::MissingItemId("chrt_id"));
            }
            if item.nm_id == 0 {
                return Err(OrderRejection::MissingItemId("nm_id"));
            }
        }

        if !self.phone_pattern.is_match(&order.delivery.phone) {
            return Err(OrderRejection::InvalidPhone(order.delivery.phone.clone()));
        }

        Ok(())
    }
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Delivery, Payment};
    use crate::testing::sample_order;

    fn validator() -> OrderValidator {
        OrderValidator::new()
    }

    #[test]
    fn test_valid_order_passes() {
        assert!(validator().validate(&sample_order("ok")).is_ok());
    }

    #[test]
    fn test_empty_delivery_rejected() {
        let mut order = sample_order("x");
        order.delivery = Delivery::default();

        let result = validator().validate(&order);
        assert!(matches!(result, Err(OrderRejection::Incomplete("delivery"))));
    }

    #[test]
    fn test_empty_payment_rejected() {
        let mut order = sample_order("x");
        order.payment = Payment::default();

        let result = validator().validate(&order);
        assert!(matches!(result, Err(OrderRejection::Incomplete("payment"))));
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut order = sample_order("x");
        order.items.clear();

        let result = validator().validate(&order);
        assert!(matches!(result, Err(OrderRejection::Incomplete("items"))));
    }

    #[test]
    fn test_phone_must_be_e164() {
        for phone in ["89991234567", "+0123456", "+1", "+1234567890123456", "+7 999 123"] {
            let mut order = sample_order("x");
            order.delivery.phone = phone.to_string();

            let result = validator().validate(&order);
            assert!(
                matches!(result, Err(OrderRejection::InvalidPhone(_))),
                "phone {phone} should be rejected"
            );
        }
    }

    #[test]
    fn test_email_must_be_well_formed() {
        let mut order = sample_order("x");
        order.delivery.email = "not-an-email".to_string();

        let result = validator().validate(&order);
        assert!(matches!(result, Err(OrderRejection::Invalid(_))));
    }

    #[test]
    fn test_currency_must_have_three_characters() {
        for currency in ["US", "USDT", ""] {
            let mut order = sample_order("x");
            order.payment.currency = currency.to_string();

            let result = validator().validate(&order);
            assert!(
                matches!(result, Err(OrderRejection::Invalid(_))),
                "currency {currency:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut order = sample_order("x");
        order.payment.amount = 0;
        assert!(validator().validate(&order).is_err());

        let mut order = sample_order("x");
        order.items[0].price = -1;
        assert!(validator().validate(&order).is_err());

        let mut order = sample_order("x");
        order.items[0].total_price = 0;
        assert!(validator().validate(&order).is_err());
    }

    #[test]
    fn test_negative_fees_rejected_but_zero_allowed() {
        let mut order = sample_order("x");
        order.payment.custom_fee = 0;
        order.payment.delivery_cost = 0;
        assert!(validator().validate(&order).is_ok());

        order.payment.custom_fee = -5;
        assert!(validator().validate(&order).is_err());
    }

    #[test]
    fn test_item_ids_must_be_non_zero() {
        let mut order = sample_order("x");
        order.items[0].chrt_id = 0;
        assert!(matches!(
            validator().validate(&order),
            Err(OrderRejection::MissingItemId("chrt_id"))
        ));

        let mut order = sample_order("x");
        order.items[0].nm_id = 0;
        assert!(matches!(
            validator().validate(&order),
            Err(OrderRejection::MissingItemId("nm_id"))
        ));
    }

    #[test]
    fn test_negative_item_ids_accepted() {
        let mut order = sample_order("x");
        order.items[0].chrt_id = -9934930;
        order.items[0].nm_id = -2389212;
        assert!(validator().validate(&order).is_ok());
    }

    #[test]
    fn test_required_strings_rejected_when_blank() {
        let mut order = sample_order("x");
        order.customer_id.clear();
        assert!(matches!(
            validator().validate(&order),
            Err(OrderRejection::Invalid(_))
        ));

        let mut order = sample_order("x");
        order.items[0].brand.clear();
        assert!(matches!(
            validator().validate(&order),
            Err(OrderRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = validator().decode(b"{not json");
        assert!(matches!(result, Err(OrderRejection::Malformed(_))));
    }

    #[test]
    fn test_decode_accepts_valid_payload() {
        let order = sample_order("decoded");
        let payload = serde_json::to_vec(&order).unwrap();

        let decoded = validator().decode(&payload).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn test_decode_truncates_date_created_to_microseconds() {
        let mut json = serde_json::to_value(sample_order("precise")).unwrap();
        json["date_created"] = "2021-11-26T06:22:19.123456789Z".into();
        let payload = serde_json::to_vec(&json).unwrap();

        let decoded = validator().decode(&payload).unwrap();

        let expected: chrono::DateTime<chrono::Utc> =
            "2021-11-26T06:22:19.123456Z".parse().unwrap();
        assert_eq!(decoded.date_created, expected);
    }
}
