use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::error::GatewayError;
use crate::pipeline::RetryPolicy;

/// Extract JSON from markdown code blocks if present, otherwise return the content as-is.
///
/// Reasoning services sometimes wrap JSON answers in ```json ... ``` fences
/// even when asked not to.
pub fn extract_json_from_markdown(content: &str) -> String {
    let trimmed = content.trim();

    if trimmed.starts_with("```")
        && let Some(start_idx) = trimmed.find('\n')
    {
        let after_start = &trimmed[start_idx + 1..];
        if let Some(end_idx) = after_start.rfind("```") {
            return after_start[..end_idx].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Check HTTP response status and classify unsuccessful responses.
///
/// Rate limiting and server-side failures are reported as
/// [`GatewayError::ServiceUnavailable`] so they are retried; any other
/// non-success status is a permanent [`GatewayError::Rejected`].
#[cfg(feature = "reqwest")]
pub async fn check_response_status(
    response: reqwest::Response,
    provider_name: &str,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    error!(
        status = %status,
        error = %error_text,
        "{} API returned error response", provider_name
    );
    if status.as_u16() == 429 || status.as_u16() == 408 || status.is_server_error() {
        Err(GatewayError::ServiceUnavailable(format!(
            "{provider_name} returned {status}: {error_text}"
        )))
    } else {
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message: error_text,
        })
    }
}

/// Convert a reqwest error to a GatewayError, logging it first.
#[cfg(feature = "reqwest")]
pub fn handle_http_error(e: reqwest::Error, provider_name: &str) -> GatewayError {
    error!(error = %e, "HTTP request to {} failed", provider_name);
    GatewayError::from(e)
}

/// Run one external call under a deadline, retrying transient failures.
///
/// Each attempt gets the full `call_timeout`; an attempt that exceeds it is
/// dropped (which cancels it) and reported as [`GatewayError::Timeout`]
/// without retrying. Transient errors are retried up to
/// `policy.max_retries` times with exponential backoff. Everything else is
/// returned as is.
pub async fn call_with_retry<F, Fut, T>(
    label: &str,
    call_timeout: Duration,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_retries + 1;
    trace!(
        label,
        max_attempts,
        timeout_ms = call_timeout.as_millis() as u64,
        "Starting gateway call"
    );

    for attempt in 0..max_attempts {
        let outcome = match timeout(call_timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(GatewayError::Timeout),
        };

        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    info!(label, attempts_used = attempt + 1, "Gateway call succeeded after retries");
                } else {
                    debug!(label, "Gateway call succeeded on first attempt");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient gateway error, retrying"
                );
                sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    error!(label, attempts = max_attempts, error = %err, "Gateway call failed after maximum retry attempts");
                } else {
                    warn!(label, error = %err, "Gateway call failed");
                }
                return Err(err);
            }
        }
    }

    // max_attempts is at least 1, so the loop always returns
    Err(GatewayError::Timeout)
}
