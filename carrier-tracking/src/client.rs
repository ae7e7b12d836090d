//! Best-effort tracking enrichment.
//!
//! Nothing here returns an error to the pipeline: a carrier outage, a stale
//! token or an undecodable payload degrades to `None` so order display
//! keeps working without the enrichment.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CachedToken, TokenCache};
use crate::transport::{CarrierTransport, PackageBody, TrackPayload, TrackingResponse};

/// A cached token is only reused while it has at least this much life left,
/// so a request never departs with a token about to lapse in flight.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Parsed tracking state for one shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingDetails {
    pub tracking_number: String,
    pub status: Option<String>,
    pub delivered: bool,
    /// Actual delivery date when delivered, otherwise the carrier's current
    /// estimate.
    pub delivery_date: Option<NaiveDate>,
    pub last_activity_at: Option<NaiveDateTime>,
}

impl TrackingDetails {
    fn from_payload(payload: &TrackPayload, tracking_number: &str) -> Option<Self> {
        let shipment = payload.track_response.as_ref()?.shipment.first()?;
        if let Some(warning) = shipment.warnings.first() {
            debug!(
                tracking_number,
                code = warning.code.as_deref().unwrap_or("unknown"),
                "carrier returned a shipment alert"
            );
            return None;
        }
        let package = shipment.package.first()?;

        let status = package
            .current_status
            .as_ref()
            .or_else(|| package.activity.first().and_then(|a| a.status.as_ref()));

        let actual = delivery_date_of_kind(package, |kind| kind == Some("DEL"));
        let estimate = delivery_date_of_kind(package, |kind| kind != Some("DEL"));
        let delivered =
            actual.is_some() || status.is_some_and(|s| s.kind.as_deref() == Some("D"));

        Some(Self {
            tracking_number: tracking_number.to_string(),
            status: status.and_then(|s| s.description.clone()),
            delivered,
            delivery_date: actual.or(estimate),
            last_activity_at: package.activity.first().and_then(|activity| {
                parse_carrier_datetime(activity.date.as_deref(), activity.time.as_deref())
            }),
        })
    }
}

fn delivery_date_of_kind(
    package: &PackageBody,
    matches: impl Fn(Option<&str>) -> bool,
) -> Option<NaiveDate> {
    package
        .delivery_date
        .iter()
        .find(|d| matches(d.kind.as_deref()))
        .and_then(|d| parse_carrier_date(d.date.as_deref()?))
}

fn parse_carrier_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y%m%d").ok()
}

fn parse_carrier_datetime(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = parse_carrier_date(date?)?;
    let time = chrono::NaiveTime::parse_from_str(time?, "%H%M%S").ok()?;
    Some(date.and_time(time))
}

/// Carrier tracking client with injected token cache and transport.
pub struct CarrierTrackingClient {
    transport: Arc<dyn CarrierTransport>,
    cache: Arc<dyn TokenCache>,
}

impl CarrierTrackingClient {
    pub fn new(transport: Arc<dyn CarrierTransport>, cache: Arc<dyn TokenCache>) -> Self {
        Self { transport, cache }
    }

    /// Return a usable bearer token, exchanging credentials only when the
    /// cached one is absent or inside the expiry margin. `None` when the
    /// carrier cannot or will not issue one.
    pub async fn get_access_token(&self) -> Option<String> {
        let now = Utc::now();
        if let Some(cached) = self.cache.get().await {
            if now < cached.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) {
                return Some(cached.access_token);
            }
        }

        match self.transport.exchange_token().await {
            Ok(Some(issued)) => {
                self.cache
                    .put(CachedToken {
                        access_token: issued.access_token.clone(),
                        expires_at: now + Duration::seconds(issued.expires_in_secs),
                    })
                    .await;
                Some(issued.access_token)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "carrier token exchange failed");
                None
            }
        }
    }

    /// Fetch tracking state for a shipment. Best-effort: every failure mode
    /// degrades to `None`.
    ///
    /// On a 401 the cached token is dropped before returning, so the next
    /// call re-authenticates instead of looping on a dead token.
    pub async fn fetch_tracking(&self, tracking_number: &str) -> Option<TrackingDetails> {
        let token = self.get_access_token().await?;

        match self.transport.get_tracking(&token, tracking_number).await {
            Ok(TrackingResponse::Payload(payload)) => {
                TrackingDetails::from_payload(&payload, tracking_number)
            }
            Ok(TrackingResponse::Unauthorized) => {
                warn!(tracking_number, "carrier rejected the bearer token, dropping it");
                self.cache.invalidate().await;
                None
            }
            Ok(TrackingResponse::Failed(status)) => {
                warn!(tracking_number, status, "carrier tracking request failed");
                None
            }
            Err(err) => {
                warn!(tracking_number, error = %err, "carrier tracking request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryTokenCache;
    use crate::error::CarrierResult;
    use crate::transport::IssuedToken;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn payload(value: serde_json::Value) -> TrackPayload {
        serde_json::from_value(value).unwrap()
    }

    fn in_transit_payload() -> TrackPayload {
        payload(json!({
            "trackResponse": {
                "shipment": [{
                    "package": [{
                        "activity": [{
                            "status": {"type": "I", "description": "In Transit", "code": "IT"},
                            "date": "20260818",
                            "time": "143000"
                        }],
                        "deliveryDate": [{"type": "SDD", "date": "20260820"}]
                    }]
                }]
            }
        }))
    }

    /// Transport that pops one scripted tracking response per call and
    /// counts exchanges.
    struct ScriptedTransport {
        exchanges: AtomicUsize,
        tracking_calls: AtomicUsize,
        responses: Mutex<VecDeque<TrackingResponse>>,
        issue_tokens: bool,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<TrackingResponse>) -> Arc<Self> {
            Arc::new(Self {
                exchanges: AtomicUsize::new(0),
                tracking_calls: AtomicUsize::new(0),
                responses: Mutex::new(responses.into()),
                issue_tokens: true,
            })
        }

        fn refusing() -> Arc<Self> {
            Arc::new(Self {
                exchanges: AtomicUsize::new(0),
                tracking_calls: AtomicUsize::new(0),
                responses: Mutex::new(VecDeque::new()),
                issue_tokens: false,
            })
        }

        fn exchange_count(&self) -> usize {
            self.exchanges.load(Ordering::SeqCst)
        }

        fn tracking_call_count(&self) -> usize {
            self.tracking_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CarrierTransport for ScriptedTransport {
        async fn exchange_token(&self) -> CarrierResult<Option<IssuedToken>> {
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.issue_tokens {
                return Ok(None);
            }
            Ok(Some(IssuedToken {
                access_token: format!("token-{n}"),
                expires_in_secs: 14_400,
            }))
        }

        async fn get_tracking(
            &self,
            _access_token: &str,
            _tracking_number: &str,
        ) -> CarrierResult<TrackingResponse> {
            self.tracking_calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            Ok(responses
                .pop_front()
                .unwrap_or(TrackingResponse::Failed(500)))
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> CarrierTrackingClient {
        CarrierTrackingClient::new(transport, Arc::new(InMemoryTokenCache::new()))
    }

    #[tokio::test]
    async fn token_is_exchanged_once_within_its_window() {
        let transport = ScriptedTransport::new(vec![
            TrackingResponse::Payload(in_transit_payload()),
            TrackingResponse::Payload(in_transit_payload()),
        ]);
        let client = client(transport.clone());

        assert!(client.fetch_tracking("1Z1").await.is_some());
        assert!(client.fetch_tracking("1Z1").await.is_some());
        assert_eq!(transport.exchange_count(), 1);
    }

    #[tokio::test]
    async fn unauthorized_drops_the_token_and_next_call_reauthenticates() {
        let transport = ScriptedTransport::new(vec![
            TrackingResponse::Payload(in_transit_payload()),
            TrackingResponse::Unauthorized,
            TrackingResponse::Payload(in_transit_payload()),
        ]);
        let client = client(transport.clone());

        assert!(client.fetch_tracking("1Z1").await.is_some());
        // stale token: degrade, don't retry inside the call
        assert!(client.fetch_tracking("1Z1").await.is_none());
        assert_eq!(transport.exchange_count(), 1);

        assert!(client.fetch_tracking("1Z1").await.is_some());
        assert_eq!(transport.exchange_count(), 2);
    }

    #[tokio::test]
    async fn token_inside_expiry_margin_is_replaced() {
        let transport = ScriptedTransport::new(vec![]);
        let cache = Arc::new(InMemoryTokenCache::new());
        cache
            .put(CachedToken {
                access_token: "nearly-dead".to_string(),
                expires_at: Utc::now() + Duration::seconds(30),
            })
            .await;
        let client = CarrierTrackingClient::new(transport.clone(), cache);

        let token = client.get_access_token().await.unwrap();
        assert_eq!(token, "token-1");
        assert_eq!(transport.exchange_count(), 1);
    }

    #[tokio::test]
    async fn refused_exchange_skips_the_tracking_call() {
        let transport = ScriptedTransport::refusing();
        let client = client(transport.clone());

        assert!(client.fetch_tracking("1Z1").await.is_none());
        assert_eq!(transport.tracking_call_count(), 0);
    }

    #[tokio::test]
    async fn carrier_failure_degrades_without_dropping_the_token() {
        let transport = ScriptedTransport::new(vec![
            TrackingResponse::Failed(503),
            TrackingResponse::Payload(in_transit_payload()),
        ]);
        let client = client(transport.clone());

        assert!(client.fetch_tracking("1Z1").await.is_none());
        assert!(client.fetch_tracking("1Z1").await.is_some());
        assert_eq!(transport.exchange_count(), 1);
    }

    #[test]
    fn parses_in_transit_shipment() {
        let details = TrackingDetails::from_payload(&in_transit_payload(), "1Z1").unwrap();
        assert_eq!(details.status.as_deref(), Some("In Transit"));
        assert!(!details.delivered);
        assert_eq!(
            details.delivery_date,
            NaiveDate::from_ymd_opt(2026, 8, 20)
        );
        assert_eq!(
            details.last_activity_at,
            NaiveDate::from_ymd_opt(2026, 8, 18)
                .and_then(|d| d.and_hms_opt(14, 30, 0))
        );
    }

    #[test]
    fn actual_delivery_date_wins_over_estimate() {
        let details = TrackingDetails::from_payload(
            &payload(json!({
                "trackResponse": {
                    "shipment": [{
                        "package": [{
                            "currentStatus": {"type": "D", "description": "Delivered"},
                            "deliveryDate": [
                                {"type": "SDD", "date": "20260821"},
                                {"type": "DEL", "date": "20260820"}
                            ]
                        }]
                    }]
                }
            })),
            "1Z1",
        )
        .unwrap();
        assert!(details.delivered);
        assert_eq!(details.delivery_date, NaiveDate::from_ymd_opt(2026, 8, 20));
        assert_eq!(details.status.as_deref(), Some("Delivered"));
    }

    #[test]
    fn shipment_alert_degrades_to_none() {
        let parsed = TrackingDetails::from_payload(
            &payload(json!({
                "trackResponse": {
                    "shipment": [{
                        "warnings": [{"code": "TW011", "message": "No tracking information"}],
                        "package": []
                    }]
                }
            })),
            "1Z1",
        );
        assert!(parsed.is_none());
    }

    #[test]
    fn empty_or_alien_bodies_degrade_to_none() {
        assert!(TrackingDetails::from_payload(&payload(json!({})), "1Z1").is_none());
        assert!(TrackingDetails::from_payload(
            &payload(json!({"trackResponse": {"shipment": []}})),
            "1Z1"
        )
        .is_none());
        // unknown fields are ignored, recognizable structure still parses
        assert!(TrackingDetails::from_payload(
            &payload(json!({
                "apiVersion": "2",
                "trackResponse": {
                    "shipment": [{
                        "extraField": true,
                        "package": [{"activity": [], "deliveryDate": []}]
                    }]
                }
            })),
            "1Z1"
        )
        .is_some());
    }

    #[test]
    fn malformed_dates_are_dropped_not_fatal() {
        let details = TrackingDetails::from_payload(
            &payload(json!({
                "trackResponse": {
                    "shipment": [{
                        "package": [{
                            "activity": [{
                                "status": {"type": "I", "description": "In Transit"},
                                "date": "tomorrow",
                                "time": "noonish"
                            }],
                            "deliveryDate": [{"type": "SDD", "date": "08/20/2026"}]
                        }]
                    }]
                }
            })),
            "1Z1",
        )
        .unwrap();
        assert_eq!(details.delivery_date, None);
        assert_eq!(details.last_activity_at, None);
        assert_eq!(details.status.as_deref(), Some("In Transit"));
    }
}
