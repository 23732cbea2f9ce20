use crate::types::{RuntimeError, RuntimeResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Check that a preview URL actually answers.
///
/// Returns the HTTP status on success. A transport failure or a non-success
/// status is reported as `PreviewUnreachable`; the session state is never
/// touched, so the caller can simply retry.
pub async fn probe_preview(url: &str, timeout: Duration) -> RuntimeResult<u16> {
    let unreachable = |reason: String| RuntimeError::PreviewUnreachable {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| unreachable(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        warn!("Preview probe of {} failed: {}", url, e);
        if e.is_timeout() {
            unreachable(format!("no response within {:?}", timeout))
        } else {
            unreachable(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!("Preview at {} answered with {}", url, status);
        return Err(unreachable(format!("HTTP {}", status)));
    }

    debug!("Preview at {} is reachable ({})", url, status);
    Ok(status.as_u16())
}
