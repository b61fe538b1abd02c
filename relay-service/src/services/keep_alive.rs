//! Periodic self-ping that keeps hosting platforms from idling the process.

use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct KeepAlive {
    url: String,
    interval: Duration,
    client: Client,
}

impl KeepAlive {
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self::with_client(url, interval, Client::new())
    }

    pub fn with_client(url: impl Into<String>, interval: Duration, client: Client) -> Self {
        Self {
            url: url.into(),
            interval,
            client,
        }
    }

    /// Start the loop. It runs until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            url = %self.url,
            interval_secs = self.interval.as_secs(),
            "Keep-alive loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.ping_once() => {}
            }
        }

        tracing::info!("Keep-alive loop stopped");
    }

    /// Issue a single GET to the configured URL and log the outcome.
    pub async fn ping_once(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %self.url, status = %response.status(), "Keep-alive ping ok");
                true
            }
            Ok(response) => {
                tracing::warn!(
                    url = %self.url,
                    status = %response.status(),
                    "Keep-alive ping returned non-success status"
                );
                false
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Keep-alive ping failed");
                false
            }
        }
    }
}
