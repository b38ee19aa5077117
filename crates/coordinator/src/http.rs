//! Shared retry engine for the coordinator's outbound HTTP clients
//! (responder, notification surface).
//!
//! Retries on 5xx and transport errors with exponential back-off; 4xx is
//! permanent and never retried.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use swb_domain::error::{Error, Result};

pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

pub(crate) async fn execute_with_retry(
    endpoint: &str,
    max_retries: u32,
    build_request: impl Fn() -> RequestBuilder,
) -> Result<Response> {
    let mut last_err: Option<Error> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            tokio::time::sleep(backoff).await;
        }

        match build_request().send().await {
            Ok(resp) => {
                let status = resp.status();

                if status.is_server_error() {
                    let body = resp.text().await.unwrap_or_default();
                    last_err = Some(Error::Http(format!("{endpoint} returned {status}: {body}")));
                    continue;
                }

                if status.is_client_error() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::Http(format!("{endpoint} returned {status}: {body}")));
                }

                return Ok(resp);
            }
            Err(e) => {
                last_err = Some(from_reqwest(e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Http(format!("{endpoint}: all retries exhausted"))))
}
