//! HTTP implementation of [`PaymentProcessor`].
//!
//! Amounts cross the wire as integer cents. 5xx and transport errors map to
//! `Unavailable` (retryable), 4xx to `Rejected` (not retryable).

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use payment_links::{HostedLink, HostedLinkRequest, PaymentProcessor, ProcessorError};
use pricing_engine::dollars_to_cents;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the hosted-checkout payment processor.
pub struct HttpPaymentProcessor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentProcessor {
    pub fn new(base_url: String, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build payment processor HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct CreateLinkRequest<'a> {
    reference: Uuid,
    amount_cents: i64,
    description: &'a str,
}

#[derive(Deserialize)]
struct CreateLinkResponse {
    token: String,
    url: String,
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn create_hosted_link(
        &self,
        request: &HostedLinkRequest,
    ) -> Result<HostedLink, ProcessorError> {
        let amount_cents = dollars_to_cents(request.amount)
            .map_err(|e| ProcessorError::Rejected(format!("unrepresentable amount: {e}")))?;

        let url = format!("{}/v1/links", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CreateLinkRequest {
                reference: request.reference,
                amount_cents,
                description: &request.description,
            })
            .send()
            .await
            .map_err(|e| ProcessorError::Unavailable(format!("request error: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProcessorError::Unavailable(format!(
                "processor returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessorError::Rejected(format!(
                "processor returned {status}: {body}"
            )));
        }

        let link: CreateLinkResponse = response
            .json()
            .await
            .map_err(|e| ProcessorError::Unavailable(format!("response parse error: {e}")))?;

        Ok(HostedLink {
            token: link.token,
            url: link.url,
        })
    }
}
