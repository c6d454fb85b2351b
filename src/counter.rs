use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::case_type::CaseType;
use crate::time_bucket::MonthBucket;

pub type CounterFuture = Pin<Box<dyn Future<Output = Result<i64, CounterError>> + Send>>;

/// Capability interface over the external atomic-increment store.
///
/// Every call to [`CounterStore::increment`] consumes exactly one sequence
/// value for `key` once it reaches the store, whether or not the response
/// makes it back to the caller. The store is the sole authority for ordering
/// and uniqueness; no in-process coordination happens on top of it.
pub trait CounterStore: Send + Sync {
    fn increment(&self, key: &str) -> CounterFuture;
}

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// The increment call never completed (connect/transport/decode failure).
    #[error("counter INCR request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status. The upstream status and
    /// body text are carried verbatim for diagnostics.
    #[error("counter INCR failed: {status} {body}")]
    Upstream { status: StatusCode, body: String },

    /// The store answered 2xx but the `result` field was not a number.
    #[error("counter INCR returned a non-numeric result: {0}")]
    BadResult(Value),
}

/// Key of the monotonically increasing sequence owned by the external store.
/// One counter per (type, month) pair, created implicitly on first increment.
pub fn counter_key(case_type: CaseType, bucket: &MonthBucket) -> String {
    format!("counter:{}:{}", case_type, bucket.key())
}

/// REST client for the atomic counter store.
///
/// Issues `POST <base>/incr/<key>` with a static bearer credential. Exactly
/// one network call per increment: no batching, no retries; any failure
/// propagates to the current request immediately.
pub struct RestCounterClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl RestCounterClient {
    pub fn new(base_url: &str, token: String) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid counter URL: {}", base_url))?;
        if base_url.path_segments_mut().is_err() {
            return Err(anyhow::anyhow!("Counter URL cannot carry a path: {}", base_url));
        }

        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn incr_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        // `new` guarantees the base accepts path segments. `push` escapes the
        // key as a single URL path segment.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("incr").push(key);
        }
        url
    }
}

impl CounterStore for RestCounterClient {
    fn increment(&self, key: &str) -> CounterFuture {
        let client = self.client.clone();
        let token = self.token.clone();
        let url = self.incr_url(key);

        Box::pin(async move {
            let res = client.post(url).bearer_auth(&token).send().await?;

            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(CounterError::Upstream { status, body });
            }

            let payload: Value = res.json().await?;
            let result = payload.get("result").cloned().unwrap_or(Value::Null);
            coerce_seq(&result).ok_or(CounterError::BadResult(result))
        })
    }
}

/// Numeric coercion for the store's `result` field: integers pass through,
/// floats truncate, numeric strings parse. Everything else is rejected.
fn coerce_seq(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counter_key_format() {
        let bucket = MonthBucket {
            year: "2024".to_string(),
            month: "06".to_string(),
        };
        assert_eq!(
            counter_key(CaseType::Fcr, &bucket),
            "counter:FCR:2024-06"
        );
        assert_eq!(counter_key(CaseType::Rma, &bucket), "counter:RMA:2024-06");
    }

    #[test]
    fn incr_url_appends_key_as_path_segment() {
        let client =
            RestCounterClient::new("https://counters.example.com", "tok".to_string()).unwrap();
        assert_eq!(
            client.incr_url("counter:FCR:2024-06").as_str(),
            "https://counters.example.com/incr/counter:FCR:2024-06"
        );
    }

    #[test]
    fn incr_url_tolerates_trailing_slash() {
        let client =
            RestCounterClient::new("https://counters.example.com/", "tok".to_string()).unwrap();
        assert_eq!(
            client.incr_url("counter:CR:2025-01").as_str(),
            "https://counters.example.com/incr/counter:CR:2025-01"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(RestCounterClient::new("not a url", "tok".to_string()).is_err());
        assert!(RestCounterClient::new("mailto:x@example.com", "tok".to_string()).is_err());
    }

    #[test]
    fn coerces_numeric_results() {
        assert_eq!(coerce_seq(&json!(7)), Some(7));
        assert_eq!(coerce_seq(&json!(10234)), Some(10234));
        assert_eq!(coerce_seq(&json!(7.0)), Some(7));
        assert_eq!(coerce_seq(&json!("42")), Some(42));
    }

    #[test]
    fn rejects_non_numeric_results() {
        assert_eq!(coerce_seq(&json!("OK")), None);
        assert_eq!(coerce_seq(&json!(null)), None);
        assert_eq!(coerce_seq(&json!({"nested": 1})), None);
    }

    #[test]
    fn upstream_error_carries_status_and_body() {
        let err = CounterError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream unavailable".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("502"));
        assert!(message.contains("upstream unavailable"));
    }
}
