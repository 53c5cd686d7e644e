use crate::config::Config;
use crate::errors::AppError;
use crate::models::Lead;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// A single bid attempt is made per ping; the partner either answers inside
/// this window or the lead is rejected.
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Ringba real-time bidding endpoint.
///
/// Sends a lead's normalized fields (merged with its raw payload) to the
/// ping endpoint and returns the partner's bid.
#[derive(Clone)]
pub struct RingbaClient {
    client: reqwest::Client,
    ping_url: String,
    api_key: String,
    campaign_id: String,
}

/// Bid response from the partner. All fields are optional on the wire; a
/// missing bid is treated as zero by the workflow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidResponse {
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default, rename = "buyerId")]
    pub buyer_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl RingbaClient {
    /// Creates a new `RingbaClient`.
    ///
    /// # Arguments
    ///
    /// * `ping_url` - The ping endpoint URL.
    /// * `api_key` - The bearer token for authentication.
    /// * `campaign_id` - The campaign the leads are pinged under.
    pub fn new(ping_url: String, api_key: String, campaign_id: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(PING_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::ExternalApi(format!("Failed to create Ringba client: {}", e))
            })?;

        Ok(Self {
            client,
            ping_url,
            api_key,
            campaign_id,
        })
    }

    /// Builds the client from configuration, returning `None` when the
    /// credentials are not fully configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        match (&config.ringba_api_key, &config.ringba_campaign_id) {
            (Some(api_key), Some(campaign_id)) => Ok(Some(Self::new(
                config.ringba_ping_url.clone(),
                api_key.clone(),
                campaign_id.clone(),
            )?)),
            _ => Ok(None),
        }
    }

    /// Sends a ping for the given lead and returns the partner's bid.
    ///
    /// Any transport failure, timeout, or non-2xx response is an error; the
    /// workflow downgrades those to a REJECTED outcome.
    pub async fn ping(&self, lead: &Lead) -> Result<BidResponse, AppError> {
        let payload = self.ping_payload(lead);

        tracing::info!(
            "Pinging Ringba for lead {} (external id {:?})",
            lead.id,
            lead.external_lead_id
        );

        let response = self
            .client
            .post(&self.ping_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Ringba request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApi(format!(
                "Ringba returned {}: {}",
                status, error_text
            )));
        }

        let bid: BidResponse = response.json().await.map_err(|e| {
            AppError::ExternalApi(format!("Failed to parse Ringba response: {}", e))
        })?;

        tracing::info!(
            "Ringba response for lead {}: bid={:?} buyerId={:?}",
            lead.id,
            bid.bid,
            bid.buyer_id
        );

        Ok(bid)
    }

    /// Request body: the lead's normalized contact/demographic fields with
    /// the raw inbound payload spread over them (raw keys win on collision).
    fn ping_payload(&self, lead: &Lead) -> Value {
        let mut fields = serde_json::Map::new();
        fields.insert("externalLeadId".to_string(), json!(lead.external_lead_id));
        fields.insert("state".to_string(), json!(lead.state));
        fields.insert("zip".to_string(), json!(lead.zip));
        fields.insert("insuranceStatus".to_string(), json!(lead.insurance_status));
        fields.insert("phone".to_string(), json!(lead.phone));
        fields.insert("firstName".to_string(), json!(lead.first_name));
        fields.insert("lastName".to_string(), json!(lead.last_name));

        if let Value::Object(raw) = &lead.full_payload {
            for (key, value) in raw {
                fields.insert(key.clone(), value.clone());
            }
        }

        json!({
            "campaignId": self.campaign_id,
            "lead": Value::Object(fields),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_succeeds() {
        let client = RingbaClient::new(
            "https://example.com/ping".to_string(),
            "key".to_string(),
            "campaign".to_string(),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn bid_response_tolerates_missing_fields() {
        let bid: BidResponse = serde_json::from_str("{}").unwrap();
        assert!(bid.bid.is_none());
        assert!(bid.buyer_id.is_none());

        let bid: BidResponse =
            serde_json::from_str(r#"{"bid": 7.25, "buyerId": "buyer-9", "token": "tok"}"#)
                .unwrap();
        assert_eq!(bid.bid, Some(7.25));
        assert_eq!(bid.buyer_id.as_deref(), Some("buyer-9"));
        assert_eq!(bid.token.as_deref(), Some("tok"));
    }
}
