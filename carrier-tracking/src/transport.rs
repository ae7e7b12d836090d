//! Wire-level carrier API access.
//!
//! The HTTP details live behind [`CarrierTransport`] so the client's token
//! reuse and 401 handling can be exercised against scripted fakes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{CarrierError, CarrierResult};

/// Connection settings for the carrier API.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Scheme and host only, e.g. `https://onlinetools.ups.com`.
    pub base_url: String,
}

/// A freshly issued access token, lifetime still relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in_secs: i64,
}

/// Outcome of a tracking request that reached the carrier.
#[derive(Debug, Clone)]
pub enum TrackingResponse {
    /// 2xx with a decodable body.
    Payload(TrackPayload),
    /// 401; the bearer token is stale.
    Unauthorized,
    /// Any other non-2xx status.
    Failed(u16),
}

#[async_trait]
pub trait CarrierTransport: Send + Sync {
    /// Perform the OAuth2 client-credentials exchange. Returns `Ok(None)`
    /// when the carrier refuses the exchange or answers with an unusable
    /// body; `Err` is reserved for transport-level failures.
    async fn exchange_token(&self) -> CarrierResult<Option<IssuedToken>>;

    async fn get_tracking(
        &self,
        access_token: &str,
        tracking_number: &str,
    ) -> CarrierResult<TrackingResponse>;
}

// Tracking payload as the carrier serializes it. Every field is optional
// and unknown fields are ignored; the carrier adds fields without notice.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    #[serde(default)]
    pub track_response: Option<TrackResponseBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponseBody {
    #[serde(default)]
    pub shipment: Vec<ShipmentBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentBody {
    /// Carrier alerts, e.g. "tracking number not found".
    #[serde(default)]
    pub warnings: Vec<WarningBody>,
    #[serde(default)]
    pub package: Vec<PackageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageBody {
    /// Most recent first.
    #[serde(default)]
    pub activity: Vec<ActivityBody>,
    #[serde(default)]
    pub delivery_date: Vec<DeliveryDateBody>,
    pub current_status: Option<StatusBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBody {
    pub status: Option<StatusBody>,
    /// `YYYYMMDD`
    pub date: Option<String>,
    /// `HHMMSS`
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    /// One-letter category; `D` marks a delivery scan.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDateBody {
    /// `DEL` for an actual delivery date, other codes are estimates.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `YYYYMMDD`
    pub date: Option<String>,
}

/// `reqwest`-backed [`CarrierTransport`].
pub struct HttpCarrierTransport {
    http: reqwest::Client,
    config: CarrierConfig,
}

impl HttpCarrierTransport {
    pub fn new(config: CarrierConfig) -> CarrierResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| CarrierError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    /// The carrier serializes this as a string.
    expires_in: Option<serde_json::Value>,
}

impl TokenBody {
    fn expires_in_secs(&self) -> Option<i64> {
        let value = self.expires_in.as_ref()?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

#[async_trait]
impl CarrierTransport for HttpCarrierTransport {
    async fn exchange_token(&self) -> CarrierResult<Option<IssuedToken>> {
        let url = format!("{}/security/v1/oauth/token", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CarrierError::Transport(format!("token exchange failed: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "carrier token endpoint refused the exchange");
            return Ok(None);
        }

        let body: TokenBody = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "carrier token response body was not decodable");
                return Ok(None);
            }
        };

        match (body.access_token.as_deref(), body.expires_in_secs()) {
            (Some(token), Some(secs)) if !token.is_empty() && secs > 0 => Ok(Some(IssuedToken {
                access_token: token.to_string(),
                expires_in_secs: secs,
            })),
            _ => {
                warn!("carrier token response missing access_token or expires_in");
                Ok(None)
            }
        }
    }

    async fn get_tracking(
        &self,
        access_token: &str,
        tracking_number: &str,
    ) -> CarrierResult<TrackingResponse> {
        let url = format!(
            "{}/api/track/v1/details/{}",
            self.config.base_url, tracking_number
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("transId", Uuid::new_v4().simple().to_string())
            .header("transactionSrc", "telerx")
            .send()
            .await
            .map_err(|e| CarrierError::Transport(format!("tracking request failed: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(TrackingResponse::Unauthorized),
            status if !status.is_success() => Ok(TrackingResponse::Failed(status.as_u16())),
            _ => {
                let payload: TrackPayload = response.json().await.map_err(|e| {
                    CarrierError::Transport(format!("tracking response body was not decodable: {e}"))
                })?;
                Ok(TrackingResponse::Payload(payload))
            }
        }
    }
}
