use crate::lifecycle::LeadStatus;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

// ============ Database Models ============

/// Insurance coverage status derived at intake.
///
/// `CURRENT` when the inbound payload carried a non-null current-policy
/// object, `NONE` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "insurance_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum InsuranceStatus {
    Current,
    None,
}

/// Represents an insurance lead — the central entity.
///
/// Created by intake in status NEW, mutated only by the bid brokering
/// workflow, never deleted by this service.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Internally generated unique identifier.
    pub id: Uuid,
    /// Optional lead id supplied by the source system (`meta.lead_id_code`).
    pub external_lead_id: Option<String>,
    /// Normalized E.164-like phone number; unique across all leads.
    pub phone: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    /// Primary driver attributes, when the nested payload carried any.
    pub driver: Option<Json<DriverProfile>>,
    /// Primary vehicle attributes, when the nested payload carried any.
    pub vehicle: Option<Json<VehicleProfile>>,
    /// Requested policy coverage, when present.
    pub requested_policy: Option<Json<PolicyRequest>>,
    /// Source-system metadata (campaign, TCPA compliance, tracking fields).
    pub source_meta: Option<Json<SourceMeta>>,
    pub total_drivers: i32,
    pub total_vehicles: i32,
    pub total_accidents: i32,
    pub total_tickets: i32,
    pub total_violations: i32,
    pub total_claims: i32,
    pub has_current_policy: bool,
    pub insurance_status: InsuranceStatus,
    /// Lifecycle status; advances through the transition table only.
    pub status: LeadStatus,
    /// Bid amount offered by the bid partner; null until a ping resolves.
    pub ringba_bid: Option<BigDecimal>,
    pub ringba_buyer_id: Option<String>,
    pub ringba_token: Option<String>,
    /// The raw inbound payload, retained verbatim for audit/replay.
    pub full_payload: serde_json::Value,
    /// Set once, at creation.
    pub created_at: DateTime<Utc>,
    /// Set once, when the first ping attempt resolves.
    pub pinged_at: Option<DateTime<Utc>>,
    /// Set when a postback is recorded; re-stamped by duplicate postbacks.
    pub posted_at: Option<DateTime<Utc>>,
}

/// Projection of a lead returned by the dialer and admin endpoints.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: Uuid,
    pub external_lead_id: Option<String>,
    pub phone: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub insurance_status: InsuranceStatus,
    pub status: LeadStatus,
    pub ringba_bid: Option<BigDecimal>,
    pub ringba_buyer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pinged_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
}

// ============ Risk / Underwriting Sub-Records ============

/// Named attributes of the primary driver.
///
/// All fields are optional; absence is an explicit None, never "".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub relationship: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    pub age_licensed: Option<i32>,
    pub license_state: Option<String>,
    pub license_status: Option<String>,
    pub license_ever_suspended: Option<bool>,
    pub requires_sr22: Option<bool>,
    pub bankruptcy: Option<bool>,
    pub months_at_employer: Option<i32>,
    pub months_at_residence: Option<i32>,
    pub residence_type: Option<String>,
}

/// Named attributes of the primary vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub submodel: Option<String>,
    pub vin: Option<String>,
    pub ownership: Option<String>,
    pub primary_use: Option<String>,
    pub annual_miles: Option<i32>,
    pub one_way_distance: Option<i32>,
    pub weekly_commute_days: Option<i32>,
    pub garage: Option<String>,
    pub four_wheel_drive: Option<bool>,
    pub airbags: Option<bool>,
    pub abs: Option<bool>,
    pub automatic_seat_belts: Option<bool>,
    pub alarm: Option<String>,
    pub salvaged: Option<bool>,
    pub rental: Option<bool>,
    pub towing: Option<bool>,
    pub collision_deductible: Option<i32>,
    pub comprehensive_deductible: Option<i32>,
}

/// Coverage requested by the lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub coverage_type: Option<String>,
    pub property_damage: Option<i64>,
    pub bodily_injury: Option<String>,
}

/// Source-system metadata carried on the lead for tracking and compliance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub jangl_id: Option<i64>,
    pub jangl_url: Option<String>,
    pub sell_price: Option<f64>,
    pub campaign_id: Option<i64>,
    pub offer_id: Option<String>,
    pub source_id: Option<String>,
    pub landing_page_url: Option<String>,
    pub user_agent: Option<String>,
    pub originally_created: Option<String>,
    pub trusted_form_cert_url: Option<String>,
    pub tcpa_compliant: Option<bool>,
    pub tcpa_consent_text: Option<String>,
    pub one_to_one: Option<bool>,
    pub lead_timestamp: Option<String>,
    pub extra_data: Option<serde_json::Value>,
}

// ============ Intake Draft ============

/// Canonical lead draft produced by the intake normalizer, ready for
/// persistence. Everything the workflow later mutates (status, bid fields,
/// lifecycle timestamps) is deliberately absent.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadDraft {
    pub external_lead_id: Option<String>,
    pub phone: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    pub driver: Option<DriverProfile>,
    pub vehicle: Option<VehicleProfile>,
    pub requested_policy: Option<PolicyRequest>,
    pub source_meta: Option<SourceMeta>,
    pub total_drivers: i32,
    pub total_vehicles: i32,
    pub total_accidents: i32,
    pub total_tickets: i32,
    pub total_violations: i32,
    pub total_claims: i32,
    pub has_current_policy: bool,
    pub insurance_status: InsuranceStatus,
    pub full_payload: serde_json::Value,
}

// ============ API Request/Response Models ============

/// Response to a successful lead intake.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLeadResponse {
    pub success: bool,
    pub lead_id: Uuid,
    pub external_lead_id: Option<String>,
    pub message: String,
}

/// Aggregate intake statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_leads: i64,
    pub today_leads: i64,
    pub status_breakdown: BTreeMap<String, i64>,
}

/// Immediate acknowledgement of a ping trigger. The bid exchange itself
/// resolves out of band; callers observe the outcome via follow-up queries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingAck {
    pub success: bool,
    pub lead_id: Uuid,
    pub message: String,
}

/// Postback payload from the bid partner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackRequest {
    pub lead_id: Option<String>,
    pub external_lead_id: Option<String>,
    pub status: Option<String>,
    pub buyer_id: Option<String>,
    pub bid: Option<f64>,
    pub token: Option<String>,
}

/// Response to a processed postback.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackResponse {
    pub success: bool,
    pub lead_id: Uuid,
    pub status: LeadStatus,
    pub message: String,
}

/// Query parameters for the admin lead listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLeadQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<LeadStatus>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Pagination envelope for list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_count: i64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Computes the envelope from the requested page/limit and total count.
    pub fn new(page: u32, limit: u32, total_count: i64) -> Self {
        let total_pages = ((total_count as f64) / (limit as f64)).ceil() as u32;
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Paginated lead listing.
#[derive(Debug, Serialize)]
pub struct LeadPage {
    pub leads: Vec<LeadSummary>,
    pub pagination: Pagination,
}
