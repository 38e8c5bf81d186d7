//! HTTP behaviour of the FoodData Central client
//!
//! Covers:
//! - Query parameters sent to `foods/search`
//! - Retry with backoff on 429 / 5xx
//! - Fatal classification of other 4xx and undecodable bodies
//! - Minimum spacing between requests

use pantry_ingest::config::IngestConfig;
use pantry_ingest::usda::{FoodSource, RateLimitedClient};
use pantry_ingest::FetchError;
use std::time::{Duration, Instant};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn config(server: &MockServer) -> IngestConfig {
    IngestConfig::default()
        .with_base_url(server.uri())
        .with_api_key("test-key")
        .with_page_size(2)
        .with_requests_per_hour(3_600_000)
        .with_retry(3, 10)
}

fn search_page(total_hits: u64, ids: &[i64]) -> serde_json::Value {
    let foods: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "fdcId": id,
                "description": format!("Food {}", id),
                "dataType": "Foundation",
                "foodCategory": "Vegetables and Vegetable Products",
                "foodNutrients": [
                    {"nutrientId": 1008, "nutrientNumber": "208", "unitName": "KCAL", "value": 25.0}
                ]
            })
        })
        .collect();
    serde_json::json!({
        "totalHits": total_hits,
        "currentPage": 1,
        "totalPages": 3,
        "foods": foods
    })
}

#[tokio::test]
async fn test_fetch_page_sends_expected_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("dataType", "Survey (FNDDS)"))
        .and(query_param("pageSize", "2"))
        .and(query_param("pageNumber", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(5, &[5])))
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(&config(&server)).expect("client");
    let page = client.fetch_page("Survey (FNDDS)", 3).await.expect("page");

    assert_eq!(page.total_hits, 5);
    assert_eq!(page.page, 3);
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].fdc_id, 5);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(2, &[1, 2])))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(&config(&server)).expect("client");
    let page = client.fetch_page("Foundation", 1).await.expect("page after retry");

    assert_eq!(page.records.len(), 2);
}

#[tokio::test]
async fn test_server_errors_exhaust_to_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(&config(&server)).expect("client");
    let err = client.fetch_page("Foundation", 1).await.unwrap_err();

    assert!(matches!(err, FetchError::Transient { status: Some(503), .. }));
}

#[tokio::test]
async fn test_bad_request_is_fatal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad dataType"))
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(&config(&server)).expect("client");
    let err = client.fetch_page("Nonsense", 1).await.unwrap_err();

    assert!(matches!(err, FetchError::Fatal { status: Some(400), .. }));
}

#[tokio::test]
async fn test_undecodable_body_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(&config(&server)).expect("client");
    let err = client.fetch_page("Foundation", 1).await.unwrap_err();

    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Grab a free port, then shut the server down so nothing listens there
    let server = MockServer::start().await;
    let config = config(&server).with_retry(2, 1);
    drop(server);

    let client = RateLimitedClient::new(&config).expect("client");
    let err = client.fetch_page("Foundation", 1).await.unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_requests_are_spaced_by_min_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, &[])))
        .expect(3)
        .mount(&server)
        .await;

    // 36,000 requests/hour = one every 100 ms
    let config = config(&server).with_requests_per_hour(36_000);
    let client = RateLimitedClient::new(&config).expect("client");
    assert_eq!(client.min_interval(), Duration::from_millis(100));

    let start = Instant::now();
    for page in 1..=3 {
        client.fetch_page("Foundation", page).await.expect("page");
    }

    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_concurrent_callers_share_the_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, &[])))
        .expect(4)
        .mount(&server)
        .await;

    let config = config(&server).with_requests_per_hour(36_000);
    let client = std::sync::Arc::new(RateLimitedClient::new(&config).expect("client"));

    let start = Instant::now();
    let handles: Vec<_> = (1..=4)
        .map(|page| {
            let client = client.clone();
            tokio::spawn(async move { client.fetch_page("Foundation", page).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join").expect("page");
    }

    assert!(start.elapsed() >= Duration::from_millis(300));
}
