//! Whole-file asset downloads with retry.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{CloudError, Result};

/// Downloads asset files over HTTP(S).
pub struct AssetFetcher {
    client: Client,
    max_retries: u32,
}

impl AssetFetcher {
    /// Wrap an existing client (usually the STAC client's).
    pub fn new(client: Client, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
        }
    }

    /// Fetch the full body of `url`.
    ///
    /// Timeouts, connection failures and 5xx responses are retried with
    /// exponential backoff; 4xx responses fail immediately.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                warn!(url, attempt, ?delay, "retrying asset download");
                tokio::time::sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let bytes = resp.bytes().await?;
                    debug!(url, bytes = bytes.len(), "asset downloaded");
                    return Ok(bytes.to_vec());
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_err = Some(CloudError::Network(format!("HTTP {} fetching {}", status, url)));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = Some(CloudError::Http(e));
                }
                Err(e) => return Err(CloudError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("download of {} failed", url))))
    }

    /// Fetch several URLs concurrently, results in input order.
    pub async fn fetch_all(&self, urls: &[String]) -> Result<Vec<Vec<u8>>> {
        use futures::stream::{FuturesOrdered, StreamExt};

        let mut futs = FuturesOrdered::new();
        for url in urls {
            futs.push_back(self.fetch(url));
        }

        let mut results = Vec::with_capacity(urls.len());
        while let Some(res) = futs.next().await {
            results.push(res?);
        }
        Ok(results)
    }
}
