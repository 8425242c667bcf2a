use std::time::Duration;
use sumi_sift::config::{AdaptiveConfig, BreakerConfig, RetryConfig};
use sumi_sift::extract::{extract_from_html, ExtractOptions};
use sumi_sift::http::error_for_status;
use sumi_sift::recovery::{
    BreakerError, CircuitBreaker, CircuitState, ErrorCategory, ErrorCode, ErrorHandler, Failure,
    RetryContext,
};
use sumi_sift::throttle::{LimitType, RateLimiter, SmartThrottler};
use sumi_sift::SiftError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTACT_PAGE: &str = r#"<html><head><title>Acme Contact</title></head><body>
    <a href="mailto:sales@acme-anvils.com">Sales</a>
    <p>Support: help [at] acme-anvils [dot] com, (555) 123-4567</p>
</body></html>"#;

/// Fast retries so the tests only wait on category floors
fn create_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        retry_delay_ms: 10,
        exponential_backoff: true,
        max_backoff_delay_ms: 5_000,
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<String, Failure> {
    let response = client.get(url).send().await?;
    let response = error_for_status(response)?;
    Ok(response.text().await?)
}

/// Host part of the mock server's address, used as the throttling identifier
fn host_of(server: &MockServer) -> String {
    url::Url::parse(&server.uri())
        .expect("Failed to parse mock server URI")
        .host_str()
        .expect("Mock server URI has no host")
        .to_string()
}

#[tokio::test]
async fn test_server_error_then_success_is_recovered_and_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTACT_PAGE))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let handler = ErrorHandler::new(create_retry_config());
    let url = format!("{}/contact", server.uri());

    let html = handler
        .retry_with_backoff(|| fetch(&client, &url), &RetryContext::new("contact page"))
        .await
        .expect("page should be fetched after one retry");

    let record = extract_from_html(&html, &ExtractOptions::default());
    assert_eq!(
        record.contacts.emails,
        vec!["sales@acme-anvils.com", "help@acme-anvils.com"]
    );
    assert_eq!(record.contacts.phones, vec!["(555) 123-4567"]);

    let stats = handler.stats();
    assert_eq!(stats.recovered, 1);
    assert_eq!(stats.by_category.get(&ErrorCategory::ServerError), Some(&1));
    assert_eq!(handler.recent_errors(1)[0].status, Some(503));
}

#[tokio::test]
async fn test_rate_limit_blocks_and_recovers_through_throttler() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTACT_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let throttler = SmartThrottler::new(RateLimiter::default(), AdaptiveConfig::default());
    let handler = ErrorHandler::new(create_retry_config());
    let host = host_of(&server);
    let url = format!("{}/api", server.uri());

    let before = throttler.limiter().ceiling(&host, LimitType::Domain).requests;

    let body = handler
        .retry_with_backoff(
            || async {
                match throttler
                    .throttle(&host, LimitType::Domain, || fetch(&client, &url))
                    .await
                {
                    Ok(body) => Ok(body),
                    Err(SiftError::Operation(failure)) => Err(failure),
                    Err(other) => Err(Failure::new(other.to_string()).with_code("RATE_LIMITED")),
                }
            },
            &RetryContext::new("api"),
        )
        .await
        .expect("call should succeed once the block lifts");

    assert!(body.contains("Acme Contact"));

    let metrics = throttler
        .metrics(&host, LimitType::Domain)
        .expect("lane should have metrics");
    assert_eq!(metrics.rate_limit_hits, 1);
    assert_eq!(metrics.successes, 1);
    assert_eq!(
        throttler.limiter().ceiling(&host, LimitType::Domain).requests,
        before / 2
    );
    assert!(!throttler.limiter().is_blocked(&host));
}

#[tokio::test]
async fn test_not_found_is_skippable_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let handler = ErrorHandler::new(create_retry_config());
    let url = format!("{}/gone", server.uri());

    let error = handler
        .retry_with_backoff(|| fetch(&client, &url), &RetryContext::new("profile"))
        .await
        .expect_err("404 should surface");

    assert_eq!(error.code, ErrorCode::Category(ErrorCategory::NotFound));
    assert!(error.is_skippable());
    assert_eq!(error.details.attempts, 1);
    assert_eq!(handler.stats().fatal, 0);
}

#[tokio::test]
async fn test_unauthorized_is_fatal_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let handler = ErrorHandler::new(create_retry_config());
    let url = format!("{}/private", server.uri());

    let error = handler
        .retry_with_backoff(|| fetch(&client, &url), &RetryContext::new("private"))
        .await
        .expect_err("401 should surface");

    assert_eq!(error.code, ErrorCode::Category(ErrorCategory::Auth));
    assert!(error.details.fatal);
    assert_eq!(handler.stats().retried, 0);
}

#[tokio::test]
async fn test_breaker_opens_on_slow_backend() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let breaker = CircuitBreaker::new(
        "slow-backend",
        BreakerConfig {
            threshold: 2,
            timeout_ms: 100,
            reset_timeout_ms: 60_000,
        },
    );
    let url = format!("{}/slow", server.uri());

    for _ in 0..2 {
        let result = breaker.execute(|| fetch(&client, &url)).await;
        assert!(matches!(result, Err(BreakerError::Timeout(_))));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let result = breaker.execute(|| fetch(&client, &url)).await;
    assert!(result.expect_err("circuit should be open").is_open());
}
