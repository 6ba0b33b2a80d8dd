//! HTTP client wrapper with envelope decoding and retry logic for reads.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::api_types::{Envelope, Form};
use super::config::{KiteConfig, RetryConfig};
use super::error::KiteError;

/// Header carrying the API version.
const VERSION_HEADER: &str = "X-Kite-Version";

/// HTTP client for the Kite Connect API.
#[derive(Debug, Clone)]
pub struct KiteHttpClient {
    client: Client,
    authorization: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl KiteHttpClient {
    /// Create a new HTTP client from config.
    ///
    /// # Errors
    ///
    /// Returns `KiteError::Network` when the underlying client cannot be
    /// built.
    pub fn new(config: &KiteConfig) -> Result<Self, KiteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KiteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            authorization: config.credentials.authorization(),
            base_url: config.base_url.clone(),
            retry_config: config.retry.clone(),
        })
    }

    /// GET a JSON endpoint and unwrap its `data`.
    ///
    /// # Errors
    ///
    /// Returns `KiteError` for transport, API and decode failures.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, KiteError> {
        let (status, body) = self
            .execute(true, || self.client.get(self.url(path)).query(query))
            .await?;
        decode(status, &body)
    }

    /// GET a plain-text endpoint such as the instrument CSV dump.
    ///
    /// # Errors
    ///
    /// Returns `KiteError` for transport and API failures.
    pub async fn get_text(&self, path: &str) -> Result<String, KiteError> {
        let (status, body) = self
            .execute(true, || self.client.get(self.url(path)))
            .await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(decode::<serde_json::Value>(status, &body)
                .err()
                .unwrap_or_else(|| KiteError::Decode(format!("HTTP {status}"))))
        }
    }

    /// Send a mutation once and unwrap its `data`. `DELETE` parameters go
    /// in the query string, others in a form body.
    ///
    /// # Errors
    ///
    /// Returns `KiteError` for transport, API and decode failures.
    pub async fn send_form<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &Form,
    ) -> Result<T, KiteError> {
        let (status, body) = self
            .execute(false, || {
                let request = self.client.request(method.clone(), self.url(path));
                if form.is_empty() {
                    request
                } else if method == Method::DELETE {
                    request.query(form)
                } else {
                    request.form(form)
                }
            })
            .await?;
        decode(status, &body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send with auth headers, retrying transient failures when `retry`.
    async fn execute<F>(&self, retry: bool, build: F) -> Result<(StatusCode, String), KiteError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let request = build()
                .header(VERSION_HEADER, "3")
                .header(reqwest::header::AUTHORIZATION, &self.authorization);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let timed_out = e.is_timeout();
                    if retry && let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(if timed_out {
                        KiteError::Timeout
                    } else if retry {
                        KiteError::MaxRetriesExceeded {
                            attempts: backoff.attempt,
                        }
                    } else {
                        KiteError::Network(e.to_string())
                    });
                }
            };

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response
                .text()
                .await
                .map_err(|e| KiteError::Network(e.to_string()))?;

            let delay = match categorize_status(status) {
                ErrorCategory::Success | ErrorCategory::NonRetryable => {
                    return Ok((status, body));
                }
                ErrorCategory::RateLimited if retry => backoff
                    .next_backoff()
                    .map(|d| retry_after.map_or(d, Duration::from_secs)),
                ErrorCategory::Retryable if retry => backoff.next_backoff(),
                ErrorCategory::RateLimited | ErrorCategory::Retryable => None,
            };

            match delay {
                Some(delay) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        delay_ms = delay.as_millis(),
                        "Retryable response, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Ok((status, body)),
            }
        }
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, KiteError> {
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_result(status.as_u16()),
        Err(_) if status == StatusCode::TOO_MANY_REQUESTS => Err(KiteError::RateLimited),
        Err(_) if !status.is_success() => Err(KiteError::Api {
            status: status.as_u16(),
            error_type: "GeneralException".to_string(),
            message: body.chars().take(200).collect(),
        }),
        Err(e) => Err(KiteError::Decode(e.to_string())),
    }
}

/// Error category for determining retry behavior.
#[derive(Debug, PartialEq, Eq)]
enum ErrorCategory {
    Success,
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        200..=299 => ErrorCategory::Success,
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff calculator.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_statuses() {
        assert_eq!(categorize_status(StatusCode::OK), ErrorCategory::Success);
        assert_eq!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        );
        assert_eq!(
            categorize_status(StatusCode::BAD_GATEWAY),
            ErrorCategory::Retryable
        );
        assert_eq!(
            categorize_status(StatusCode::FORBIDDEN),
            ErrorCategory::NonRetryable
        );
    }

    #[test]
    fn backoff_stops_at_max_attempts() {
        let mut backoff = ExponentialBackoff::new(&RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(150),
            multiplier: 2.0,
        });
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(150)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn non_json_error_body_becomes_api_error() {
        let err = decode::<serde_json::Value>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, KiteError::Api { status: 502, .. }));
    }

    #[test]
    fn malformed_success_body_is_decode_error() {
        let err = decode::<serde_json::Value>(StatusCode::OK, "{").unwrap_err();
        assert!(matches!(err, KiteError::Decode(_)));
    }
}
