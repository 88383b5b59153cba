use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Order aggregate as carried on the wire and stored across the four order tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Order {
    #[validate(length(min = 1, message = "order_uid cannot be empty"))]
    pub order_uid: String,

    #[validate(length(min = 1, message = "track_number cannot be empty"))]
    pub track_number: String,

    #[validate(length(min = 1, message = "entry cannot be empty"))]
    pub entry: String,

    #[serde(default)]
    #[validate(nested)]
    pub delivery: Delivery,

    #[serde(default)]
    #[validate(nested)]
    pub payment: Payment,

    #[serde(default)]
    #[validate(length(min = 1, message = "Order must have at least one item"), nested)]
    pub items: Vec<Item>,

    #[validate(length(min = 1, message = "locale cannot be empty"))]
    pub locale: String,

    #[serde(default)]
    pub internal_signature: String,

    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,

    #[validate(length(min = 1, message = "delivery_service cannot be empty"))]
    pub delivery_service: String,

    #[serde(default)]
    pub shardkey: String,

    #[serde(default)]
    pub sm_id: i32,

    pub date_created: DateTime<Utc>,

    #[serde(default)]
    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Delivery {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: String,

    /// E.164, checked by `OrderValidator`.
    pub phone: String,

    pub zip: String,

    #[validate(length(min = 1, message = "city cannot be empty"))]
    pub city: String,

    #[validate(length(min = 1, message = "address cannot be empty"))]
    pub address: String,

    pub region: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

impl Delivery {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Payment {
    #[validate(length(min = 1, message = "transaction cannot be empty"))]
    pub transaction: String,

    pub request_id: String,

    #[validate(length(equal = 3, message = "currency must be a 3 letter code"))]
    pub currency: String,

    #[validate(length(min = 1, message = "provider cannot be empty"))]
    pub provider: String,

    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i32,

    /// Unix seconds.
    pub payment_dt: i64,

    #[validate(length(min = 1, message = "bank cannot be empty"))]
    pub bank: String,

    #[validate(range(min = 0, message = "delivery_cost cannot be negative"))]
    pub delivery_cost: i32,

    #[validate(range(min = 0, message = "goods_total cannot be negative"))]
    pub goods_total: i32,

    #[validate(range(min = 0, message = "custom_fee cannot be negative"))]
    pub custom_fee: i32,
}

impl Payment {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Item {
    /// Must be non-zero; checked by `OrderValidator`.
    pub chrt_id: i64,

    #[validate(length(min = 1, message = "track_number cannot be empty"))]
    pub track_number: String,

    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: i32,

    #[validate(length(min = 1, message = "rid cannot be empty"))]
    pub rid: String,

    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: String,

    #[validate(range(min = 0, message = "sale cannot be negative"))]
    pub sale: i32,

    pub size: String,

    #[validate(range(min = 1, message = "total_price must be positive"))]
    pub total_price: i32,

    pub nm_id: i64,

    #[validate(length(min = 1, message = "brand cannot be empty"))]
    pub brand: String,

    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_order;

    #[test]
    fn test_order_json_uses_wire_field_names() {
        let order = sample_order("b563feb7b2b84b6test");
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["order_uid"], "b563feb7b2b84b6test");
        assert_eq!(json["delivery"]["phone"], "+9720000000");
        assert_eq!(json["payment"]["currency"], "USD");
        assert_eq!(json["items"][0]["chrt_id"], 9934930);
        assert_eq!(json["date_created"], "2021-11-26T06:22:19Z");
    }

    #[test]
    fn test_missing_sections_decode_as_empty() {
        let json = r#"{
            "order_uid": "abc",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "locale": "en",
            "customer_id": "test",
            "delivery_service": "meest",
            "date_created": "2021-11-26T06:22:19Z"
        }"#;

        let order: Order = serde_json::from_str(json).unwrap();
        assert!(order.delivery.is_empty());
        assert!(order.payment.is_empty());
        assert!(order.items.is_empty());
    }
}
