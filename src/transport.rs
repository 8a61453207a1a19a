use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

const USER_AGENT: &str = concat!("animist/", env!("CARGO_PKG_VERSION"));

/// Generous timeout: both backends run on cold-starting free-tier hosts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Retry behavior for idempotent requests, tuned per call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Catalog queries: two retries, 1 s base, capped at 4 s.
    pub fn catalog() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        }
    }

    /// Meta-service queries cold-start more often: five attempts total.
    pub fn meta() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(5),
        }
    }

    /// Single attempt; used for non-idempotent requests.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Exponential backoff from the base unit, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Seam between the gateways and HTTP. The mocks in the gateway tests
/// implement this with scripted responses.
pub trait Transport {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, ApiError>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ApiError>;
}

pub struct HttpTransport {
    client: Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(policy: RetryPolicy) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, policy })
    }

    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ApiError::Network(format!("invalid JSON from {url}: {err}")))
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ApiError::Network(format!("invalid JSON from {url}: {err}")))
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, ApiError> {
        let value = with_retry(&self.policy, url, || self.fetch(url, params)).await?;
        Ok(normalize_value(value))
    }

    /// Writes and GraphQL posts are not idempotent here; a single attempt.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let value = with_retry(&RetryPolicy::none(), url, || self.post(url, body)).await?;
        Ok(normalize_value(value))
    }
}

/// Runs `operation`, retrying transient failures per `policy` with
/// exponential backoff. Non-transient failures return immediately.
pub async fn with_retry<F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<Value, ApiError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Value, ApiError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{operation_name} succeeded after {attempt} retries");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{operation_name} failed (attempt {}/{}): {err}; retrying in {delay:?}",
                    attempt + 1,
                    policy.max_retries + 1,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Rewrites every string in a response: insecure scheme upgraded, and the
/// retired gogocdn host alias swapped for its current equivalent.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(normalize_text(text)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key, normalize_value(inner)))
                .collect(),
        ),
        other => other,
    }
}

fn normalize_text(mut text: String) -> String {
    if let Some(rest) = text.strip_prefix("http://") {
        text = format!("https://{rest}");
    }
    if text.contains("gogocdn") {
        text = text.replace("gogocdn", "gogoplay");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn read_retry_recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&quick_policy(2), "get", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Http { status: 503 })
                } else {
                    Ok(json!({"ok": true}))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), json!({"ok": true}));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_failures_are_never_retried() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&quick_policy(3), "get", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Http { status: 404 }) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::Http { status: 404 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_policy_makes_a_single_attempt() {
        // post_json runs under RetryPolicy::none(): a 503 is not retried.
        let attempts = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::none(), "post", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Http { status: 503 }) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::Http { status: 503 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn normalization_rewrites_strings_recursively() {
        let input = json!({
            "url": "http://example.com/ep1.m3u8",
            "cdn": "https://gogocdn.net/video/1",
            "nested": [{"file": "http://gogocdn.io/x.mp4"}, 42, null],
            "count": 7,
        });
        let output = normalize_value(input);
        assert_eq!(output["url"], "https://example.com/ep1.m3u8");
        assert_eq!(output["cdn"], "https://gogoplay.net/video/1");
        assert_eq!(output["nested"][0]["file"], "https://gogoplay.io/x.mp4");
        assert_eq!(output["nested"][1], 42);
        assert_eq!(output["count"], 7);
    }
}
