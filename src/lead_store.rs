//! Persistence operations for lead records.
//!
//! The store is the only shared mutable resource in the system. Writes from
//! the brokering workflow target leads by id and set only the fields they
//! own, so concurrent unrelated updates are never overwritten wholesale.

use crate::errors::AppError;
use crate::lifecycle::LeadStatus;
use crate::models::{Lead, LeadDraft, LeadSummary, StatsResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;

const LEAD_COLUMNS: &str = "id, external_lead_id, phone, first_name, last_name, email, city, \
     state, zip, address, driver, vehicle, requested_policy, source_meta, total_drivers, \
     total_vehicles, total_accidents, total_tickets, total_violations, total_claims, \
     has_current_policy, insurance_status, status, ringba_bid, ringba_buyer_id, ringba_token, \
     full_payload, created_at, pinged_at, posted_at";

const SUMMARY_COLUMNS: &str = "id, external_lead_id, phone, first_name, last_name, state, zip, \
     insurance_status, status, ringba_bid, ringba_buyer_id, created_at, pinged_at, posted_at";

/// Fields written when a detached ping task resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct PingUpdate {
    pub status: LeadStatus,
    pub bid: BigDecimal,
    pub buyer_id: Option<String>,
    pub token: Option<String>,
}

/// Fields written when a postback is recorded. Bid/buyer/token are only
/// touched when the postback carried them.
#[derive(Debug, Clone, PartialEq)]
pub struct PostbackUpdate {
    pub status: LeadStatus,
    pub bid: Option<BigDecimal>,
    pub buyer_id: Option<String>,
    pub token: Option<String>,
}

/// Filters and window for the admin lead listing.
#[derive(Debug, Clone)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Inserts a new lead in status NEW.
///
/// A unique violation on the normalized phone surfaces as `Conflict`.
pub async fn create_lead(pool: &PgPool, draft: &LeadDraft) -> Result<Lead, AppError> {
    let sql = format!(
        r#"
        INSERT INTO leads (
            external_lead_id, phone, first_name, last_name, email, city, state, zip, address,
            driver, vehicle, requested_policy, source_meta,
            total_drivers, total_vehicles, total_accidents, total_tickets, total_violations,
            total_claims, has_current_policy, insurance_status, full_payload
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22)
        RETURNING {LEAD_COLUMNS}
        "#
    );

    let lead = sqlx::query_as::<_, Lead>(&sql)
        .bind(&draft.external_lead_id)
        .bind(&draft.phone)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(&draft.zip)
        .bind(&draft.address)
        .bind(draft.driver.clone().map(Json))
        .bind(draft.vehicle.clone().map(Json))
        .bind(draft.requested_policy.clone().map(Json))
        .bind(draft.source_meta.clone().map(Json))
        .bind(draft.total_drivers)
        .bind(draft.total_vehicles)
        .bind(draft.total_accidents)
        .bind(draft.total_tickets)
        .bind(draft.total_violations)
        .bind(draft.total_claims)
        .bind(draft.has_current_policy)
        .bind(draft.insurance_status)
        .bind(&draft.full_payload)
        .fetch_one(pool)
        .await?;

    Ok(lead)
}

/// Point lookup by primary id.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Lead>, AppError> {
    let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
    let lead = sqlx::query_as::<_, Lead>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(lead)
}

/// Point lookup by the source system's lead id. Takes the oldest match when
/// the external id is not unique.
pub async fn find_by_external_id(pool: &PgPool, external_id: &str) -> Result<Option<Lead>, AppError> {
    let sql = format!(
        "SELECT {LEAD_COLUMNS} FROM leads WHERE external_lead_id = $1 ORDER BY created_at ASC LIMIT 1"
    );
    let lead = sqlx::query_as::<_, Lead>(&sql)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;
    Ok(lead)
}

/// Summary projection by primary id.
pub async fn lead_summary(pool: &PgPool, id: Uuid) -> Result<Option<LeadSummary>, AppError> {
    let sql = format!("SELECT {SUMMARY_COLUMNS} FROM leads WHERE id = $1");
    let summary = sqlx::query_as::<_, LeadSummary>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(summary)
}

/// Writes the outcome of a resolved ping. `pinged_at` is stamped at most
/// once; repeated pings keep the original timestamp.
pub async fn record_ping_outcome(
    pool: &PgPool,
    id: Uuid,
    update: &PingUpdate,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET status = $2,
            ringba_bid = $3,
            ringba_buyer_id = $4,
            ringba_token = $5,
            pinged_at = COALESCE(pinged_at, now())
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(update.status)
    .bind(&update.bid)
    .bind(&update.buyer_id)
    .bind(&update.token)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Lead {} disappeared before ping outcome could be recorded",
            id
        )));
    }

    Ok(())
}

/// Applies a postback. `posted_at` is stamped on every call so duplicate
/// postbacks converge on the same field values with a fresher timestamp;
/// bid/buyer/token are preserved unless the postback carried replacements.
pub async fn record_postback(
    pool: &PgPool,
    id: Uuid,
    update: &PostbackUpdate,
) -> Result<Lead, AppError> {
    let sql = format!(
        r#"
        UPDATE leads
        SET status = $2,
            posted_at = now(),
            ringba_bid = COALESCE($3, ringba_bid),
            ringba_buyer_id = COALESCE($4, ringba_buyer_id),
            ringba_token = COALESCE($5, ringba_token)
        WHERE id = $1
        RETURNING {LEAD_COLUMNS}
        "#
    );

    let lead = sqlx::query_as::<_, Lead>(&sql)
        .bind(id)
        .bind(update.status)
        .bind(&update.bid)
        .bind(&update.buyer_id)
        .bind(&update.token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;

    Ok(lead)
}

/// Intake statistics: total count, today's count, and a per-status breakdown.
pub async fn stats(pool: &PgPool) -> Result<StatsResponse, AppError> {
    let total_leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;

    let today_leads: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE created_at >= CURRENT_DATE")
            .fetch_one(pool)
            .await?;

    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status::TEXT, COUNT(*) FROM leads GROUP BY status")
            .fetch_all(pool)
            .await?;

    let status_breakdown: BTreeMap<String, i64> = rows.into_iter().collect();

    Ok(StatsResponse {
        total_leads,
        today_leads,
        status_breakdown,
    })
}

/// Filtered, paginated listing ordered by creation time, newest first.
pub async fn list_leads(
    pool: &PgPool,
    filter: &LeadFilter,
) -> Result<(Vec<LeadSummary>, i64), AppError> {
    let mut query = QueryBuilder::new(format!("SELECT {SUMMARY_COLUMNS} FROM leads WHERE TRUE"));
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let leads = query
        .build_query_as::<LeadSummary>()
        .fetch_all(pool)
        .await?;

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM leads WHERE TRUE");
    push_filters(&mut count_query, filter);
    let total_count: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    Ok((leads, total_count))
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &LeadFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (phone ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR external_lead_id ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR ringba_buyer_id ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(start) = filter.start_date {
        query.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND created_at <= ").push_bind(end);
    }
}
