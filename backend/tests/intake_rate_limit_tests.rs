//! Public order intake and rate limiting tests
//!
//! Tests for storefront submissions including:
//! - Property 10: Invalid submissions are rejected with every violation
//! - Property 11: At most five accepted submissions per client per minute
//! - Property 12: Rejected submissions do not count against the limit

mod common;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use common::{dec, intake, intake_service, item, memory_store};
use restaurant_ops::models::{OrderStatus, PaymentType, SlidingWindow};
use restaurant_ops::services::{OrderIntakeService, OrderQueries, RateLimiter};
use restaurant_ops::store::MemoryRateLimitStore;
use restaurant_ops::AppError;

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

// ============================================================================
// Intake
// ============================================================================

#[tokio::test]
async fn test_valid_intake_creates_new_order() {
    let (_, store) = memory_store();
    let service = intake_service(&store);

    let order = service
        .submit(
            "10.0.0.1",
            &intake(vec![item(None, 32_000, 2), item(None, 8_000, 1)]),
        )
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.payment_type, PaymentType::Card);
    assert_eq!(order.total_price, dec(72_000));
    assert_eq!(order.courier_id, None);

    let details = OrderQueries::new(store).get_order(order.id).await.unwrap();
    assert_eq!(details.items.len(), 2);
    assert!(details.history.is_empty());
}

#[tokio::test]
async fn test_intake_defaults_to_cash_and_trims() {
    let (_, store) = memory_store();
    let mut submission = intake(vec![item(None, 10_000, 1)]);
    submission.payment_type = None;
    submission.user_fullname = "  Dilnoza Karimova  ".to_string();
    submission.notes = Some("   ".to_string());

    let order = intake_service(&store)
        .submit("10.0.0.1", &submission)
        .await
        .unwrap();
    assert_eq!(order.payment_type, PaymentType::Cash);
    assert_eq!(order.customer_name, "Dilnoza Karimova");
    assert_eq!(order.notes, None);
}

#[tokio::test]
async fn test_invalid_intake_collects_every_error() {
    let (_, store) = memory_store();
    let mut submission = intake(vec![item(None, 0, 0)]);
    submission.user_fullname = "D".to_string();
    submission.phone = "998901234567".to_string();
    submission.address = "short".to_string();
    submission.payment_type = Some("bitcoin".to_string());

    let result = intake_service(&store).submit("10.0.0.1", &submission).await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert_eq!(errors.len(), 6, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("Full name")));
            assert!(errors.iter().any(|e| e.contains("+998")));
            assert!(errors.iter().any(|e| e.contains("Address")));
            assert!(errors.iter().any(|e| e.contains("Payment type")));
            assert!(errors.iter().any(|e| e.starts_with("Item 1: price")));
            assert!(errors.iter().any(|e| e.starts_with("Item 1: quantity")));
        }
        other => panic!("expected validation error, got {:?}", other.map(|o| o.id)),
    }

    let orders = OrderQueries::new(store).list_orders(None).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_phone_format() {
    let (_, store) = memory_store();
    let service = intake_service(&store);

    for rejected in ["998901234567", "+99890123456", "+9989012345678", "+998 90 123 45 67"] {
        let mut submission = intake(vec![item(None, 10_000, 1)]);
        submission.phone = rejected.to_string();
        let result = service.submit("10.0.0.2", &submission).await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "{} should be rejected",
            rejected
        );
    }

    let mut submission = intake(vec![item(None, 10_000, 1)]);
    submission.phone = "+998901234567".to_string();
    service.submit("10.0.0.2", &submission).await.unwrap();
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let (_, store) = memory_store();
    let result = intake_service(&store)
        .submit("10.0.0.1", &intake(Vec::new()))
        .await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert_eq!(errors, vec!["Order must contain at least one item".to_string()]);
        }
        other => panic!("expected validation error, got {:?}", other.map(|o| o.id)),
    }
}

#[tokio::test]
async fn test_oversized_price_is_rejected() {
    let (_, store) = memory_store();
    let mut line = item(None, 10_000, 2);
    line.price = Decimal::MAX;

    let result = intake_service(&store).submit("10.0.0.3", &intake(vec![line])).await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.starts_with("Item 1: price must be at most")));
            assert!(errors.iter().any(|e| e.starts_with("Order total")));
        }
        other => panic!("expected validation error, got {:?}", other.map(|o| o.id)),
    }
}

#[tokio::test]
async fn test_prices_keep_whole_cents() {
    let (_, store) = memory_store();
    let service = intake_service(&store);

    for price in [Decimal::new(4, 3), Decimal::new(10005, 3)] {
        let mut line = item(None, 0, 2);
        line.price = price;
        let result = service.submit("10.0.0.4", &intake(vec![line])).await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "{} should be rejected",
            price
        );
    }

    let mut line = item(None, 0, 2);
    line.price = Decimal::new(1050, 2);
    let order = service.submit("10.0.0.4", &intake(vec![line])).await.unwrap();
    assert_eq!(order.total_price, Decimal::new(2100, 2));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_sixth_submission_in_a_minute_is_limited() {
    let (_, store) = memory_store();
    let service = intake_service(&store);
    let submission = intake(vec![item(None, 10_000, 1)]);
    let t0 = start();

    for second in 0..5 {
        service
            .submit_at("203.0.113.7", &submission, t0 + Duration::seconds(second * 10))
            .await
            .unwrap();
    }

    let sixth = service
        .submit_at("203.0.113.7", &submission, t0 + Duration::seconds(50))
        .await;
    assert!(matches!(sixth, Err(AppError::RateLimited)));

    // The first hit has left the window
    service
        .submit_at("203.0.113.7", &submission, t0 + Duration::seconds(61))
        .await
        .unwrap();

    let orders = OrderQueries::new(store).list_orders(None).await.unwrap();
    assert_eq!(orders.len(), 6);
}

#[tokio::test]
async fn test_invalid_submissions_are_not_counted() {
    let (_, store) = memory_store();
    let service = intake_service(&store);
    let t0 = start();

    let mut invalid = intake(vec![item(None, 10_000, 1)]);
    invalid.phone = "12345".to_string();
    for _ in 0..10 {
        let result = service.submit_at("198.51.100.4", &invalid, t0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    let valid = intake(vec![item(None, 10_000, 1)]);
    for _ in 0..5 {
        service.submit_at("198.51.100.4", &valid, t0).await.unwrap();
    }
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let (_, store) = memory_store();
    let service = intake_service(&store);
    let submission = intake(vec![item(None, 10_000, 1)]);
    let t0 = start();

    for _ in 0..5 {
        service.submit_at("client-a", &submission, t0).await.unwrap();
    }
    assert!(matches!(
        service.submit_at("client-a", &submission, t0).await,
        Err(AppError::RateLimited)
    ));
    service.submit_at("client-b", &submission, t0).await.unwrap();
}

#[tokio::test]
async fn test_limiter_honours_custom_window() {
    let window = SlidingWindow::new(Duration::seconds(10), 2);
    let limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), window);
    let t0 = start();

    limiter.check_at("k", t0).await.unwrap();
    limiter.check_at("k", t0 + Duration::seconds(1)).await.unwrap();
    assert!(matches!(
        limiter.check_at("k", t0 + Duration::seconds(2)).await,
        Err(AppError::RateLimited)
    ));
    // Exactly one window after the first hit, that hit no longer counts
    limiter.check_at("k", t0 + Duration::seconds(10)).await.unwrap();
    assert_eq!(limiter.window(), window);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hits_admit_exactly_the_limit() {
    let limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), SlidingWindow::default());
    let t0 = start();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check_at("203.0.113.99", t0).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(AppError::RateLimited) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(admitted, 5);
}

#[tokio::test]
async fn test_limited_intake_stores_nothing() {
    let (_, store) = memory_store();
    let window = SlidingWindow::new(Duration::seconds(60), 1);
    let service = OrderIntakeService::new(
        store.clone(),
        RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), window),
    );
    let submission = intake(vec![item(None, 10_000, 1)]);
    let t0 = start();

    service.submit_at("k", &submission, t0).await.unwrap();
    assert!(service.submit_at("k", &submission, t0).await.is_err());

    let orders = OrderQueries::new(store).list_orders(None).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_cleanup_drops_idle_clients() {
    let limits = MemoryRateLimitStore::new();
    let window = SlidingWindow::default();
    let limiter = RateLimiter::new(Arc::new(limits.clone()), window);
    let t0 = start();

    limiter.check_at("old", t0).await.unwrap();
    limiter
        .check_at("recent", t0 + Duration::seconds(50))
        .await
        .unwrap();
    assert_eq!(limits.tracked_keys().await, 2);

    limits.cleanup(window, t0 + Duration::seconds(70)).await;
    assert_eq!(limits.tracked_keys().await, 1);

    limits.cleanup(window, t0 + Duration::seconds(200)).await;
    assert_eq!(limits.tracked_keys().await, 0);
}
