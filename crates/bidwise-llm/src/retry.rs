use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;

/// Honor `Retry-After` when present, otherwise back off exponentially.
pub(crate) fn backoff_for(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get(reqwest::header::RETRY_AFTER)
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(6))
}

/// Send a request, retrying up to `max_retries` times while the server answers 429.
///
/// # Errors
///
/// `LlmError::RateLimited` once attempts are exhausted, `LlmError::Http` on transport failure.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    mut send: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = send().await?;
        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt == max_retries {
            break;
        }
        let delay = backoff_for(&response, attempt);
        tracing::warn!(
            provider = provider_name,
            attempt = attempt + 1,
            max_retries,
            delay_secs = delay.as_secs(),
            "rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
    }
    Err(LlmError::RateLimited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn get(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        client.get(url).send().await
    }

    #[tokio::test]
    async fn passes_through_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ping", server.uri());
        let resp = send_with_retry("test", 3, || get(&client, &url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn recovers_after_single_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ping", server.uri());
        let resp = send_with_retry("test", 2, || get(&client, &url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn gives_up_with_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ping", server.uri());
        let err = send_with_retry("test", 1, || get(&client, &url))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn non_429_errors_are_returned_for_caller_to_classify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ping", server.uri());
        let resp = send_with_retry("test", 3, || get(&client, &url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_is_capped(attempt in 0u32..1000) {
            let secs = BASE_BACKOFF_SECS << attempt.min(6);
            prop_assert!(secs <= 64);
            prop_assert!(secs >= BASE_BACKOFF_SECS);
        }
    }
}
