//! Validation rules for public order intake
//!
//! Every rule reports a human-readable message; [`validate_order_intake`]
//! runs all of them and returns the complete list so the checkout form can
//! show every problem at once.

use rust_decimal::Decimal;

use crate::models::{order_total, NewOrder, NewOrderItem, OrderIntake, PaymentType};

/// National dialing code accepted for customer phones
pub const COUNTRY_CODE: &str = "998";

/// Digits after the country code in a mobile number
pub const SUBSCRIBER_DIGITS: usize = 9;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const ADDRESS_MIN_CHARS: usize = 10;
pub const ADDRESS_MAX_CHARS: usize = 500;
pub const NOTES_MAX_CHARS: usize = 500;
pub const ITEM_MIN_QUANTITY: i32 = 1;
pub const ITEM_MAX_QUANTITY: i32 = 100;

/// Decimal places kept for prices and costs
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept for ingredient quantities
pub const STOCK_SCALE: u32 = 3;

/// Largest price or cost a `NUMERIC(14,2)` column holds
pub fn max_money() -> Decimal {
    Decimal::new(99_999_999_999_999, MONEY_SCALE)
}

/// Largest ingredient quantity a `NUMERIC(14,3)` column holds
pub fn max_stock_quantity() -> Decimal {
    Decimal::new(99_999_999_999_999, STOCK_SCALE)
}

// ============================================================================
// Field rules
// ============================================================================

/// Validate customer full name length (2-100 characters)
pub fn validate_full_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if len < NAME_MIN_CHARS {
        return Err("Full name must be at least 2 characters");
    }
    if len > NAME_MAX_CHARS {
        return Err("Full name must be at most 100 characters");
    }
    Ok(())
}

/// Validate mobile number in national format
/// Accepts: +998901234567
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let Some(rest) = phone.trim().strip_prefix('+') else {
        return Err("Phone number must start with +998 followed by 9 digits");
    };
    let Some(subscriber) = rest.strip_prefix(COUNTRY_CODE) else {
        return Err("Phone number must start with +998 followed by 9 digits");
    };
    if subscriber.len() != SUBSCRIBER_DIGITS || !subscriber.chars().all(|c| c.is_ascii_digit()) {
        return Err("Phone number must start with +998 followed by 9 digits");
    }
    Ok(())
}

/// Validate delivery address length (10-500 characters)
pub fn validate_address(address: &str) -> Result<(), &'static str> {
    let len = address.trim().chars().count();
    if len < ADDRESS_MIN_CHARS {
        return Err("Address must be at least 10 characters");
    }
    if len > ADDRESS_MAX_CHARS {
        return Err("Address must be at most 500 characters");
    }
    Ok(())
}

/// Validate optional order notes (at most 500 characters)
pub fn validate_notes(notes: &str) -> Result<(), &'static str> {
    if notes.chars().count() > NOTES_MAX_CHARS {
        return Err("Notes must be at most 500 characters");
    }
    Ok(())
}

/// Parse a payment label; absent means cash
pub fn parse_payment_type(payment_type: Option<&str>) -> Result<PaymentType, &'static str> {
    match payment_type.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(PaymentType::default()),
        Some(label) => label
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| "Payment type must be one of: cash, card, click, payme"),
    }
}

/// Money amount that fits the price and cost columns
pub fn validate_money_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err("must have at most 2 decimal places");
    }
    if amount.abs() > max_money() {
        return Err("must be at most 999999999999.99");
    }
    Ok(())
}

/// Ingredient quantity that fits the stock columns
pub fn validate_stock_amount(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.normalize().scale() > STOCK_SCALE {
        return Err("must have at most 3 decimal places");
    }
    if quantity.abs() > max_stock_quantity() {
        return Err("must be at most 99999999999.999");
    }
    Ok(())
}

/// Validate a unit price (positive, at most 2 decimal places)
pub fn validate_item_price(price: Decimal) -> Result<(), String> {
    if price <= Decimal::ZERO {
        return Err("price must be greater than 0".to_string());
    }
    validate_money_amount(price).map_err(|e| format!("price {}", e))
}

/// Validate a line quantity (1-100)
pub fn validate_item_quantity(quantity: i32) -> Result<(), &'static str> {
    if !(ITEM_MIN_QUANTITY..=ITEM_MAX_QUANTITY).contains(&quantity) {
        return Err("quantity must be between 1 and 100");
    }
    Ok(())
}

// ============================================================================
// Order intake
// ============================================================================

/// Run every intake rule and collect all violations.
///
/// On success the submission is normalised (trimmed, empty optionals dropped)
/// into a [`NewOrder`].
pub fn validate_order_intake(intake: &OrderIntake) -> Result<NewOrder, Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_full_name(&intake.user_fullname) {
        errors.push(e.to_string());
    }
    if let Err(e) = validate_phone(&intake.phone) {
        errors.push(e.to_string());
    }
    if let Err(e) = validate_address(&intake.address) {
        errors.push(e.to_string());
    }
    let payment_type = parse_payment_type(intake.payment_type.as_deref())
        .map_err(|e| errors.push(e.to_string()))
        .ok();
    if let Some(notes) = &intake.notes {
        if let Err(e) = validate_notes(notes) {
            errors.push(e.to_string());
        }
    }

    if intake.items.is_empty() {
        errors.push("Order must contain at least one item".to_string());
    }
    for (index, item) in intake.items.iter().enumerate() {
        let position = index + 1;
        if item.product_name.trim().is_empty() {
            errors.push(format!("Item {}: product name is required", position));
        }
        if let Err(e) = validate_item_price(item.price) {
            errors.push(format!("Item {}: {}", position, e));
        }
        if let Err(e) = validate_item_quantity(item.quantity) {
            errors.push(format!("Item {}: {}", position, e));
        }
    }

    let total_price = order_total(intake.items.iter().map(|item| (item.price, item.quantity)))
        .filter(|total| *total <= max_money());
    if total_price.is_none() {
        errors.push("Order total must be at most 999999999999.99".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewOrder {
        customer_name: intake.user_fullname.trim().to_string(),
        phone: intake.phone.trim().to_string(),
        address: intake.address.trim().to_string(),
        delivery_zone: non_empty(intake.delivery_zone.as_deref()),
        payment_type: payment_type.unwrap_or_default(),
        notes: non_empty(intake.notes.as_deref()),
        items: intake
            .items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                product_name: item.product_name.trim().to_string(),
                price: item.price,
                quantity: item.quantity,
            })
            .collect(),
        total_price: total_price.unwrap_or_default(),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntakeItem;

    fn valid_intake() -> OrderIntake {
        OrderIntake {
            user_fullname: "Dilnoza Karimova".into(),
            phone: "+998901234567".into(),
            address: "Tashkent, Yunusobod 4, kv 12".into(),
            delivery_zone: Some("north".into()),
            payment_type: Some("card".into()),
            notes: Some("Ring twice".into()),
            items: vec![IntakeItem {
                product_id: None,
                product_name: "Lagman".into(),
                price: Decimal::new(32000, 0),
                quantity: 2,
            }],
        }
    }

    // ========================================================================
    // Phone
    // ========================================================================

    #[test]
    fn test_validate_phone_valid() {
        assert!(validate_phone("+998901234567").is_ok());
    }

    #[test]
    fn test_validate_phone_missing_plus() {
        assert!(validate_phone("998901234567").is_err());
    }

    #[test]
    fn test_validate_phone_wrong_length() {
        assert!(validate_phone("+99890123456").is_err());
        assert!(validate_phone("+9989012345678").is_err());
    }

    #[test]
    fn test_validate_phone_other_country() {
        assert!(validate_phone("+771234567890").is_err());
    }

    #[test]
    fn test_validate_phone_non_digits() {
        assert!(validate_phone("+998 90 123 45 67").is_err());
        assert!(validate_phone("+99890123456a").is_err());
    }

    // ========================================================================
    // Text fields
    // ========================================================================

    #[test]
    fn test_validate_full_name_bounds() {
        assert!(validate_full_name("A").is_err());
        assert!(validate_full_name("Al").is_ok());
        assert!(validate_full_name(&"x".repeat(100)).is_ok());
        assert!(validate_full_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_full_name_counts_characters_not_bytes() {
        // 50 Cyrillic characters are 100 bytes
        assert!(validate_full_name(&"Ж".repeat(50)).is_ok());
        assert!(validate_full_name(&"Ж".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_address_bounds() {
        assert!(validate_address("short").is_err());
        assert!(validate_address("1234567890").is_ok());
        assert!(validate_address(&"a".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_notes_limit() {
        assert!(validate_notes(&"n".repeat(500)).is_ok());
        assert!(validate_notes(&"n".repeat(501)).is_err());
    }

    #[test]
    fn test_parse_payment_type() {
        assert_eq!(parse_payment_type(None), Ok(PaymentType::Cash));
        assert_eq!(parse_payment_type(Some("")), Ok(PaymentType::Cash));
        assert_eq!(parse_payment_type(Some("Click")), Ok(PaymentType::Click));
        assert!(parse_payment_type(Some("bitcoin")).is_err());
    }

    // ========================================================================
    // Intake
    // ========================================================================

    #[test]
    fn test_valid_intake_is_normalised() {
        let mut intake = valid_intake();
        intake.user_fullname = "  Dilnoza Karimova ".into();
        intake.notes = Some("   ".into());

        let order = validate_order_intake(&intake).unwrap();
        assert_eq!(order.customer_name, "Dilnoza Karimova");
        assert_eq!(order.payment_type, PaymentType::Card);
        assert_eq!(order.notes, None);
        assert_eq!(order.total_price, Decimal::new(64000, 0));
    }

    #[test]
    fn test_intake_collects_all_errors() {
        let intake = OrderIntake {
            user_fullname: "A".into(),
            phone: "998901234567".into(),
            address: "short".into(),
            delivery_zone: None,
            payment_type: Some("barter".into()),
            notes: Some("n".repeat(501)),
            items: vec![IntakeItem {
                product_id: None,
                product_name: "Somsa".into(),
                price: Decimal::ZERO,
                quantity: 101,
            }],
        };

        let errors = validate_order_intake(&intake).unwrap_err();
        assert_eq!(errors.len(), 7, "{:?}", errors);
        assert!(errors.iter().any(|e| e.starts_with("Item 1: price")));
        assert!(errors.iter().any(|e| e.starts_with("Item 1: quantity")));
    }

    #[test]
    fn test_intake_requires_items() {
        let mut intake = valid_intake();
        intake.items.clear();
        let errors = validate_order_intake(&intake).unwrap_err();
        assert_eq!(errors, vec!["Order must contain at least one item".to_string()]);
    }

    #[test]
    fn test_intake_reports_every_bad_item() {
        let mut intake = valid_intake();
        intake.items.push(IntakeItem {
            product_id: None,
            product_name: "Non".into(),
            price: Decimal::from(-1),
            quantity: 1,
        });
        intake.items.push(IntakeItem {
            product_id: None,
            product_name: "".into(),
            price: Decimal::from(3000),
            quantity: 0,
        });

        let errors = validate_order_intake(&intake).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Item 2: price must be greater than 0".to_string(),
                "Item 3: product name is required".to_string(),
                "Item 3: quantity must be between 1 and 100".to_string(),
            ]
        );
    }

    // ========================================================================
    // Amounts
    // ========================================================================

    #[test]
    fn test_money_amount_scale_and_range() {
        assert!(validate_money_amount(Decimal::new(1050, 2)).is_ok());
        assert!(validate_money_amount(Decimal::new(10500, 3)).is_ok());
        assert!(validate_money_amount(max_money()).is_ok());
        assert!(validate_money_amount(Decimal::new(4, 3)).is_err());
        assert!(validate_money_amount(max_money() + Decimal::new(1, 2)).is_err());
    }

    #[test]
    fn test_stock_amount_scale_and_range() {
        assert!(validate_stock_amount(Decimal::new(1255, 3)).is_ok());
        assert!(validate_stock_amount(Decimal::new(-1255, 3)).is_ok());
        assert!(validate_stock_amount(Decimal::new(12555, 4)).is_err());
        assert!(validate_stock_amount(-max_stock_quantity() - Decimal::ONE).is_err());
    }

    #[test]
    fn test_fractional_cent_price_is_rejected() {
        for price in [Decimal::new(4, 3), Decimal::new(10005, 3)] {
            let mut intake = valid_intake();
            intake.items[0].price = price;
            let errors = validate_order_intake(&intake).unwrap_err();
            assert_eq!(
                errors,
                vec!["Item 1: price must have at most 2 decimal places".to_string()]
            );
        }
    }

    #[test]
    fn test_oversized_price_is_a_validation_error() {
        let mut intake = valid_intake();
        intake.items[0].price = Decimal::MAX;
        intake.items[0].quantity = 2;

        let errors = validate_order_intake(&intake).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Item 1: price must be at most 999999999999.99".to_string(),
                "Order total must be at most 999999999999.99".to_string(),
            ]
        );
    }

    #[test]
    fn test_total_above_column_limit_is_rejected() {
        let mut intake = valid_intake();
        intake.items[0].price = max_money();
        intake.items[0].quantity = 2;

        let errors = validate_order_intake(&intake).unwrap_err();
        assert_eq!(errors, vec!["Order total must be at most 999999999999.99".to_string()]);
    }
}
