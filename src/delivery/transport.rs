use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

/// Why a delivery attempt failed. Every variant is retryable; the queue
/// decides when to stop trying.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery attempt timed out")]
    Timeout,
    #[error("TAK server returned status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// A delivery mechanism for CoT documents. The queue holds an ordered
/// list of these and tries each in turn until one succeeds.
#[async_trait]
pub trait CotTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, cot_xml: &str) -> Result<(), DeliveryError>;
}

/// HTTP PUT of the CoT XML body to a TAK endpoint; 2xx means delivered.
pub struct HttpTakTransport {
    client: reqwest::Client,
    endpoint_url: String,
}

impl HttpTakTransport {
    pub fn new(endpoint_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build TAK HTTP client")?;
        Ok(Self {
            client,
            endpoint_url: endpoint_url.to_string(),
        })
    }
}

#[async_trait]
impl CotTransport for HttpTakTransport {
    fn name(&self) -> &'static str {
        "http-tak"
    }

    async fn deliver(&self, cot_xml: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .put(&self.endpoint_url)
            .header("Content-Type", "application/xml")
            .body(cot_xml.to_string())
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
