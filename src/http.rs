use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(8),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn describe_status(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP status {status}")
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!("HTTP status {status} ({truncated})")
    }
}

/// GETs `url` and returns the body, retrying throttling, server errors and
/// transport failures up to `policy.attempts` times.
pub(crate) fn get_json_text(
    url: &str,
    query: &[(&str, String)],
    policy: RetryPolicy,
) -> Result<String> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    for attempt in 1..=attempts {
        let mut request = agent.get(url).set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }

        let failure = match request.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| anyhow!("request failed: response decode failed: {err}"));
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                let described = describe_status(status, &body);
                if !is_retryable_status(status) {
                    bail!("request failed: {described}");
                }
                described
            }
            Err(ureq::Error::Transport(err)) => format!("transport error: {err}"),
        };

        if attempt < attempts {
            tracing::debug!(attempt, url, %failure, "retrying request");
            thread::sleep(policy.retry_delay);
            continue;
        }
        bail!("request failed after {attempts} attempt(s): {failure}");
    }

    bail!("request failed: exhausted attempts without a concrete error")
}
