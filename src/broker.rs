//! Bid brokering workflow.
//!
//! Orchestrates the ping -> bid -> accept/reject transition and the later
//! postback -> posted transition. A ping trigger is acknowledged immediately
//! and the bid exchange runs as a detached task with its own error boundary,
//! so bid-partner latency never propagates to the triggering caller.

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::lead_store::{self, PingUpdate, PostbackUpdate};
use crate::lifecycle::{self, LeadStatus};
use crate::models::{Lead, PingAck, PostbackRequest};
use crate::ringba::{BidResponse, RingbaClient};
use bigdecimal::{BigDecimal, FromPrimitive};
use sqlx::PgPool;
use uuid::Uuid;

fn decimal_from_f64(value: f64) -> BigDecimal {
    BigDecimal::from_f64(value).unwrap_or_else(|| BigDecimal::from(0))
}

/// Validates a ping trigger and schedules the bid exchange.
///
/// Fails synchronously with `Configuration` when the Ringba client is not
/// configured and `NotFound` when the lead does not exist. On success the
/// caller is acknowledged immediately; the lead's status is written only
/// once the detached bid exchange resolves.
pub async fn request_ping(state: &AppState, lead_id: Uuid) -> Result<PingAck, AppError> {
    let client = state.ringba.clone().ok_or_else(|| {
        AppError::Configuration("Ringba credentials are not configured".to_string())
    })?;

    let lead = lead_store::find_by_id(&state.db, lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    // Re-pinging a PINGED lead is routine (a stalled task, an operator
    // retry); anything later in the lifecycle is worth an audit trail.
    if !matches!(lead.status, LeadStatus::New | LeadStatus::Pinged) {
        tracing::warn!(
            "Ping requested for lead {} in status {}; transition is off the lifecycle table",
            lead.id,
            lead.status
        );
    }

    tracing::info!(
        "Processing trigger ping for lead {} (external id {:?}, status {})",
        lead.id,
        lead.external_lead_id,
        lead.status
    );

    tokio::spawn(run_ping(state.db.clone(), client, lead));

    Ok(PingAck {
        success: true,
        lead_id,
        message: "Ping request received".to_string(),
    })
}

/// Detached unit of work: one bid attempt, no retry.
///
/// The final write targets the lead by id. If the write itself fails the
/// lead is left in its prior persisted state; the failure is logged and
/// swallowed (known inconsistency window).
async fn run_ping(db: PgPool, client: RingbaClient, lead: Lead) {
    let lead_id = lead.id;
    let outcome = client.ping(&lead).await;
    let update = resolve_ping_outcome(outcome, lead_id);

    if let Err(e) = lead_store::record_ping_outcome(&db, lead_id, &update).await {
        tracing::error!(
            "Failed to record ping outcome for lead {} ({}): {}",
            lead_id,
            update.status,
            e
        );
    }
}

/// Maps a bid exchange result onto the lifecycle: a bid greater than zero
/// accepts the lead with the partner's bid/buyer/token, anything else
/// (zero bid, missing bid, transport error, timeout) rejects it with bid 0.
pub fn resolve_ping_outcome(outcome: Result<BidResponse, AppError>, lead_id: Uuid) -> PingUpdate {
    match outcome {
        Ok(response) => {
            let bid = response.bid.unwrap_or(0.0);
            if bid > 0.0 {
                tracing::info!(
                    "Lead {} accepted by Ringba: bid={} buyerId={:?}",
                    lead_id,
                    bid,
                    response.buyer_id
                );
                PingUpdate {
                    status: LeadStatus::Accepted,
                    bid: decimal_from_f64(bid),
                    buyer_id: response.buyer_id,
                    token: response.token,
                }
            } else {
                tracing::info!("Lead {} rejected by Ringba: zero bid", lead_id);
                rejected_update()
            }
        }
        Err(e) => {
            tracing::error!("Ping for lead {} failed: {}", lead_id, e);
            rejected_update()
        }
    }
}

fn rejected_update() -> PingUpdate {
    PingUpdate {
        status: LeadStatus::Rejected,
        bid: BigDecimal::from(0),
        buyer_id: None,
        token: None,
    }
}

/// Records a postback from the bid partner.
///
/// Resolves the lead by primary id first, then by external id. The postback
/// is applied whatever the lead's current status (late and out-of-order
/// postbacks are deliberately not dropped); off-table transitions are
/// logged for audit. Idempotent under duplicates: repeated calls converge
/// on the same field values, only `posted_at` is re-stamped.
pub async fn record_postback(db: &PgPool, request: &PostbackRequest) -> Result<Lead, AppError> {
    let lead = resolve_lead(db, request).await?.ok_or_else(|| {
        tracing::warn!(
            "Lead not found for Ringba postback (leadId {:?}, externalLeadId {:?})",
            request.lead_id,
            request.external_lead_id
        );
        AppError::NotFound("Lead not found".to_string())
    })?;

    let target = resolve_postback_status(request.status.as_deref(), lead.id);
    if !lifecycle::is_valid_transition(lead.status, target) {
        let direction = if lifecycle::is_forward(lead.status, target) {
            "skips ahead"
        } else {
            "moves backward"
        };
        tracing::warn!(
            "Postback {} for lead {} ({} -> {}); transition is off the lifecycle table, \
             applying anyway",
            direction,
            lead.id,
            lead.status,
            target
        );
    }

    let update = PostbackUpdate {
        status: target,
        bid: request.bid.map(decimal_from_f64),
        buyer_id: request.buyer_id.clone(),
        token: request.token.clone(),
    };

    let updated = lead_store::record_postback(db, lead.id, &update).await?;

    tracing::info!(
        "Ringba postback processed for lead {} (external id {:?}): status {}",
        updated.id,
        updated.external_lead_id,
        updated.status
    );

    Ok(updated)
}

/// Target status of a postback: the supplied status when it is one of the
/// five lifecycle values, POSTED otherwise. Unrecognized values are logged
/// rather than silently accepted.
pub fn resolve_postback_status(supplied: Option<&str>, lead_id: Uuid) -> LeadStatus {
    match supplied {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Postback for lead {} carried unrecognized status {:?}; forcing POSTED",
                lead_id,
                raw
            );
            LeadStatus::Posted
        }),
        None => LeadStatus::Posted,
    }
}

async fn resolve_lead(db: &PgPool, request: &PostbackRequest) -> Result<Option<Lead>, AppError> {
    if let Some(id) = request
        .lead_id
        .as_deref()
        .and_then(|raw| raw.parse::<Uuid>().ok())
    {
        if let Some(lead) = lead_store::find_by_id(db, id).await? {
            return Ok(Some(lead));
        }
    }
    if let Some(external_id) = request.external_lead_id.as_deref() {
        return lead_store::find_by_external_id(db, external_id).await;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bid_response(bid: Option<f64>) -> BidResponse {
        BidResponse {
            bid,
            buyer_id: Some("buyer-1".to_string()),
            token: Some("tok-1".to_string()),
        }
    }

    #[test]
    fn positive_bid_accepts_the_lead() {
        let update = resolve_ping_outcome(Ok(bid_response(Some(5.0))), Uuid::new_v4());
        assert_eq!(update.status, LeadStatus::Accepted);
        assert_eq!(update.bid, BigDecimal::from_str("5").unwrap());
        assert_eq!(update.buyer_id.as_deref(), Some("buyer-1"));
        assert_eq!(update.token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn zero_or_missing_bid_rejects_the_lead() {
        let update = resolve_ping_outcome(Ok(bid_response(Some(0.0))), Uuid::new_v4());
        assert_eq!(update.status, LeadStatus::Rejected);
        assert_eq!(update.bid, BigDecimal::from(0));
        assert!(update.buyer_id.is_none());

        let update = resolve_ping_outcome(Ok(bid_response(None)), Uuid::new_v4());
        assert_eq!(update.status, LeadStatus::Rejected);

        let update = resolve_ping_outcome(Ok(bid_response(Some(-2.5))), Uuid::new_v4());
        assert_eq!(update.status, LeadStatus::Rejected);
    }

    #[test]
    fn client_error_rejects_the_lead() {
        let err = AppError::ExternalApi("connection timed out".to_string());
        let update = resolve_ping_outcome(Err(err), Uuid::new_v4());
        assert_eq!(update.status, LeadStatus::Rejected);
        assert_eq!(update.bid, BigDecimal::from(0));
    }

    #[test]
    fn postback_status_honors_known_values() {
        let id = Uuid::new_v4();
        assert_eq!(
            resolve_postback_status(Some("ACCEPTED"), id),
            LeadStatus::Accepted
        );
        assert_eq!(
            resolve_postback_status(Some("REJECTED"), id),
            LeadStatus::Rejected
        );
        assert_eq!(
            resolve_postback_status(Some("POSTED"), id),
            LeadStatus::Posted
        );
    }

    #[test]
    fn unknown_or_absent_postback_status_forces_posted() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_postback_status(None, id), LeadStatus::Posted);
        assert_eq!(
            resolve_postback_status(Some("SOLD"), id),
            LeadStatus::Posted
        );
        assert_eq!(resolve_postback_status(Some(""), id), LeadStatus::Posted);
    }

    #[test]
    fn duplicate_postbacks_produce_identical_updates() {
        let request = PostbackRequest {
            lead_id: None,
            external_lead_id: Some("ext-1".to_string()),
            status: Some("POSTED".to_string()),
            buyer_id: Some("buyer-2".to_string()),
            bid: Some(12.5),
            token: Some("tok-2".to_string()),
        };

        let build = |req: &PostbackRequest| PostbackUpdate {
            status: resolve_postback_status(req.status.as_deref(), Uuid::nil()),
            bid: req.bid.map(decimal_from_f64),
            buyer_id: req.buyer_id.clone(),
            token: req.token.clone(),
        };

        assert_eq!(build(&request), build(&request));
    }
}
