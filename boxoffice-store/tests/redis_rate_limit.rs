//! Exercises `RedisClient::check_rate_limit` against a real server.
//!
//! Run with `REDIS_URL=redis://... cargo test -p boxoffice-store -- --ignored`.

use boxoffice_store::RedisClient;
use std::time::Duration;
use uuid::Uuid;

async fn client() -> RedisClient {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for Redis tests");
    RedisClient::new(&url).await.expect("Failed to configure Redis")
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_limit_within_window() {
    let redis = client().await;
    let key = format!("ratelimit:test:{}", Uuid::new_v4());

    assert!(redis.check_rate_limit(&key, 3, 60).await.unwrap());
    assert!(redis.check_rate_limit(&key, 3, 60).await.unwrap());
    assert!(redis.check_rate_limit(&key, 3, 60).await.unwrap());
    assert!(!redis.check_rate_limit(&key, 3, 60).await.unwrap());
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_window_is_not_extended_by_later_requests() {
    let redis = client().await;
    let key = format!("ratelimit:test:{}", Uuid::new_v4());

    // Window opens at t=0 and must close at t=1s regardless of traffic
    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
    assert!(!redis.check_rate_limit(&key, 2, 1).await.unwrap());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let redis = RedisClient::new("redis://127.0.0.1:1").await.unwrap();
    assert!(redis.check_rate_limit("ratelimit:test", 10, 60).await.is_err());
}
