//! WebAssembly module for the restaurant storefront and staff screens
//!
//! Provides client-side computation for:
//! - Checkout validation with the same rules the server applies
//! - Cart totals
//! - Status transition checks for the kitchen board

use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Checkout validation result handed back to JavaScript
#[derive(Debug, Serialize)]
struct IntakeCheck {
    valid: bool,
    errors: Vec<String>,
    /// Cart total as a decimal string, present when the cart is valid
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<Decimal>,
}

/// Validate a checkout form before it is posted
///
/// Takes the order submission as JSON and returns `{valid, errors, total}`.
#[wasm_bindgen]
pub fn validate_checkout(intake_json: &str) -> Result<String, JsValue> {
    let intake: OrderIntake = serde_json::from_str(intake_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid order JSON: {}", e)))?;

    let check = match validate_order_intake(&intake) {
        Ok(order) => IntakeCheck {
            valid: true,
            errors: Vec::new(),
            total: Some(order.total_price),
        },
        Err(errors) => IntakeCheck {
            valid: false,
            errors,
            total: None,
        },
    };

    serde_json::to_string(&check).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Sum a cart given as a JSON array of items
#[wasm_bindgen]
pub fn calculate_cart_total(items_json: &str) -> Result<String, JsValue> {
    let items: Vec<IntakeItem> = serde_json::from_str(items_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid items JSON: {}", e)))?;

    order_total(items.iter().map(|item| (item.price, item.quantity)))
        .map(|total| total.to_string())
        .ok_or_else(|| JsValue::from_str("Cart total is too large"))
}

/// Check a phone number against the accepted national format
#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_phone(phone).is_ok()
}

/// Whether the staff board may offer a move from `from` to `to`
#[wasm_bindgen]
pub fn can_transition(from: &str, to: &str) -> bool {
    match (from.parse::<OrderStatus>(), to.parse::<OrderStatus>()) {
        (Ok(from), Ok(to)) => from.check_transition(to).is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_checkout() {
        let valid = r#"{
            "user_fullname": "Dilnoza Karimova",
            "phone": "+998901234567",
            "address": "Tashkent, Yunusabad 4, apt 12",
            "items": [{"product_name": "Lagman", "price": "32000", "quantity": 2}]
        }"#;
        let result: serde_json::Value =
            serde_json::from_str(&validate_checkout(valid).unwrap()).unwrap();
        assert_eq!(result["valid"], true);
        assert_eq!(result["total"], "64000");

        let oversized = r#"{
            "user_fullname": "Dilnoza Karimova",
            "phone": "+998901234567",
            "address": "Tashkent, Yunusabad 4, apt 12",
            "items": [{"product_name": "Lagman", "price": "79228162514264337593543950335", "quantity": 2}]
        }"#;
        let result: serde_json::Value =
            serde_json::from_str(&validate_checkout(oversized).unwrap()).unwrap();
        assert_eq!(result["valid"], false);
        assert_eq!(result["errors"].as_array().unwrap().len(), 2);

        let invalid = r#"{"user_fullname": "D", "phone": "123", "address": "x", "items": []}"#;
        let result: serde_json::Value =
            serde_json::from_str(&validate_checkout(invalid).unwrap()).unwrap();
        assert_eq!(result["valid"], false);
        assert_eq!(result["errors"].as_array().unwrap().len(), 4);
        assert!(result.get("total").is_none());
    }

    #[test]
    fn test_cart_total() {
        let items = r#"[
            {"product_name": "Lagman", "price": "32000", "quantity": 2},
            {"product_name": "Tea", "price": "4500.50", "quantity": 1}
        ]"#;
        assert_eq!(calculate_cart_total(items).unwrap(), "68500.50");
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("+998901234567"));
        assert!(!is_valid_phone("998901234567"));
        assert!(!is_valid_phone("+99890123456"));
    }

    #[test]
    fn test_can_transition() {
        assert!(can_transition("new", "cooking"));
        assert!(can_transition("ready", "delivered"));
        assert!(!can_transition("delivered", "cancelled"));
        assert!(!can_transition("new", "new"));
        assert!(!can_transition("new", "lost"));
    }
}
