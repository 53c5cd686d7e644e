use crate::broker;
use crate::config::Config;
use crate::errors::AppError;
use crate::intake;
use crate::lead_store::{self, LeadFilter};
use crate::models::{
    AdminLeadQuery, LeadPage, LeadSummary, Pagination, PingAck, PostbackRequest,
    PostbackResponse, StatsResponse, WebhookLeadResponse,
};
use crate::ringba::RingbaClient;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Bid partner client; `None` when credentials are not configured, in
    /// which case ping triggers fail with a configuration error.
    pub ringba: Option<RingbaClient>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-broker-api",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// POST /webhook/lead
///
/// Receives an inbound lead (flat or nested shape), normalizes it, and
/// persists it in status NEW. The raw body is retained verbatim on the
/// record for audit/replay.
///
/// # Returns
///
/// * 200 with `{success, leadId, externalLeadId, message}` on success.
/// * 400 when the phone is absent or malformed.
/// * 409 when a lead with the same normalized phone already exists.
pub async fn receive_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<WebhookLeadResponse>), AppError> {
    let draft = intake::normalize(&payload).map_err(|e| {
        tracing::warn!("Webhook validation failed: {}", e);
        e
    })?;

    let lead = lead_store::create_lead(&state.db, &draft).await?;

    tracing::info!(
        "Lead created successfully: id={} externalLeadId={:?} phone={}",
        lead.id,
        lead.external_lead_id,
        lead.phone
    );

    Ok((
        StatusCode::OK,
        Json(WebhookLeadResponse {
            success: true,
            lead_id: lead.id,
            external_lead_id: lead.external_lead_id,
            message: "Lead received and processed successfully".to_string(),
        }),
    ))
}

/// GET /webhook/stats
///
/// Intake statistics: total leads, today's leads, and a per-status
/// breakdown.
pub async fn webhook_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = lead_store::stats(&state.db).await?;
    Ok(Json(stats))
}

/// POST /vici/trigger-ping/:lead_id
///
/// Two-phase handshake: validates synchronously (lead exists, bid partner
/// configured) and acknowledges immediately; the bid exchange then runs as
/// a detached task so dialer latency is never coupled to the bid partner.
///
/// # Returns
///
/// * 200 with `{success, leadId, message}` once the exchange is scheduled.
/// * 404 when the lead does not exist.
/// * 500 when the bid partner is not configured.
pub async fn trigger_ping(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<PingAck>, AppError> {
    let ack = broker::request_ping(&state, lead_id).await?;
    Ok(Json(ack))
}

/// GET /vici/lead/:lead_id
///
/// Lead summary projection for the dialer.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<LeadSummary>, AppError> {
    let summary = lead_store::lead_summary(&state.db, lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;
    Ok(Json(summary))
}

/// POST /ringba/postback
///
/// Records the bid partner's disposition callback for a lead, resolved by
/// primary id first, then by external id.
pub async fn ringba_postback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostbackRequest>,
) -> Result<Json<PostbackResponse>, AppError> {
    let lead = broker::record_postback(&state.db, &request).await?;

    Ok(Json(PostbackResponse {
        success: true,
        lead_id: lead.id,
        status: lead.status,
        message: "Postback processed successfully".to_string(),
    }))
}

/// GET /admin/leads
///
/// Filtered, paginated lead listing for the admin interface.
///
/// # Query parameters
///
/// * `page` (>= 1, default 1), `limit` (1-100, default 25)
/// * `status` - one of NEW/PINGED/ACCEPTED/REJECTED/POSTED
/// * `search` - substring match over phone, names, external id, buyer id
/// * `startDate` / `endDate` - RFC3339 timestamps or plain dates
pub async fn admin_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminLeadQuery>,
) -> Result<Json<LeadPage>, AppError> {
    let page = params.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    let limit = params.limit.unwrap_or(25);
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }

    let filter = LeadFilter {
        status: params.status,
        search: params.search.filter(|s| !s.trim().is_empty()),
        start_date: params
            .start_date
            .as_deref()
            .map(parse_date_bound)
            .transpose()?,
        end_date: params
            .end_date
            .as_deref()
            .map(parse_date_bound)
            .transpose()?,
        limit: i64::from(limit),
        offset: i64::from(page - 1) * i64::from(limit),
    };

    let (leads, total_count) = lead_store::list_leads(&state.db, &filter).await?;

    Ok(Json(LeadPage {
        leads,
        pagination: Pagination::new(page, limit, total_count),
    }))
}

/// Parses a date filter bound: RFC3339 first, then a naive datetime, then a
/// plain `YYYY-MM-DD` date taken as UTC midnight.
fn parse_date_bound(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|date| {
                DateTime::<Utc>::from_naive_utc_and_offset(
                    date.and_hms_opt(0, 0, 0).unwrap_or_default(),
                    Utc,
                )
            })
        })
        .map_err(|e| {
            AppError::Validation(format!(
                "Invalid date '{}': {}. Expected ISO 8601 (RFC3339)",
                raw, e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_bounds_accept_rfc3339_and_plain_dates() {
        let parsed = parse_date_bound("2025-06-01T12:30:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T12:30:00+00:00");

        let parsed = parse_date_bound("2025-06-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T00:00:00+00:00");

        let parsed = parse_date_bound("2025-06-01 08:15:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T08:15:00+00:00");
    }

    #[test]
    fn garbage_date_bounds_are_validation_errors() {
        assert!(matches!(
            parse_date_bound("next tuesday"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_date_bound(""),
            Err(AppError::Validation(_))
        ));
    }
}
