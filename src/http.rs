//! Shared HTTP helper for the hosted embedding and chat backends.
//!
//! Both backends speak JSON over POST and share the same retry contract:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

/// POST a JSON body and return the parsed JSON response, retrying transient
/// failures with exponential backoff.
///
/// Errors are returned as plain strings; callers wrap them in their own
/// error variant.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer_token: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value, String> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| format!("invalid JSON response from {}: {}", url, e));
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("{} returned {}: {}", url, status, body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                return Err(format!("{} returned {}: {}", url, status, body_text));
            }
            Err(e) => {
                last_err = Some(format!("request to {} failed: {}", url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("request to {} failed after retries", url)))
}
