//! Lead intake normalizer.
//!
//! Maps the two inbound payload shapes (flat, or nested under
//! `contact`/`meta`/`data`) into the canonical [`LeadDraft`], normalizing the
//! phone number and computing the aggregate risk counters. The raw payload is
//! always retained verbatim on the draft for audit/replay.

use crate::errors::AppError;
use crate::models::{
    DriverProfile, InsuranceStatus, LeadDraft, PolicyRequest, SourceMeta, VehicleProfile,
};
use serde::Deserialize;
use serde_json::Value;

/// Normalizes a phone number into an E.164-like form.
///
/// Strips all non-digit characters; exactly 10 digits get a `+1` prefix,
/// 11 digits beginning with `1` get a `+` prefix, inputs that already carried
/// a leading `+` pass through unchanged, anything else gets `+` prefixed onto
/// its digit string. Pure and total over any input string.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        format!("+1{}", digits)
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{}", digits)
    } else if raw.starts_with('+') {
        raw.to_string()
    } else {
        format!("+{}", digits)
    }
}

/// Nested shape: the lead arrives under `contact` / `meta` / `data` blocks.
#[derive(Debug, Deserialize)]
struct NestedPayload {
    contact: ContactBlock,
    #[serde(default)]
    meta: Option<MetaBlock>,
    #[serde(default)]
    data: Option<RiskBlock>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    campaign_id: Option<i64>,
    #[serde(default)]
    sell_price: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    extra_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ContactBlock {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    zip_code: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaBlock {
    #[serde(default)]
    lead_id_code: Option<String>,
    #[serde(default)]
    offer_id: Option<String>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    originally_created: Option<String>,
    #[serde(default)]
    trusted_form_cert_url: Option<String>,
    #[serde(default)]
    tcpa_compliant: Option<bool>,
    #[serde(default)]
    tcpa_consent_text: Option<String>,
    #[serde(default)]
    one_to_one: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RiskBlock {
    #[serde(default)]
    drivers: Option<Vec<DriverInput>>,
    #[serde(default)]
    vehicles: Option<Vec<VehicleProfile>>,
    #[serde(default)]
    requested_policy: Option<PolicyRequest>,
    #[serde(default)]
    current_policy: Option<Value>,
}

/// A driver entry: the named profile fields plus the incident arrays that
/// only feed the aggregate counters.
#[derive(Debug, Deserialize)]
struct DriverInput {
    #[serde(flatten)]
    profile: DriverProfile,
    #[serde(default)]
    accidents: Vec<Value>,
    #[serde(default)]
    tickets: Vec<Value>,
    #[serde(default)]
    major_violations: Vec<Value>,
    #[serde(default)]
    claims: Vec<Value>,
}

/// Flat shape: contact fields at the top level.
#[derive(Debug, Deserialize)]
struct FlatPayload {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default, alias = "firstName")]
    first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default, alias = "zipCode", alias = "zip_code")]
    zip: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, alias = "externalLeadId")]
    external_lead_id: Option<String>,
}

/// Optional fields default to an explicit absent marker, never "".
fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validates the raw phone and returns its normalized form.
fn require_phone(raw: Option<String>) -> Result<String, AppError> {
    let raw = none_if_empty(raw)
        .ok_or_else(|| AppError::Validation("Phone number is required".to_string()))?;
    let digit_count = raw.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count < 10 {
        return Err(AppError::Validation(
            "Phone number must have at least 10 digits".to_string(),
        ));
    }
    Ok(normalize_phone(&raw))
}

/// Normalizes an inbound webhook payload into a canonical [`LeadDraft`].
///
/// Fails with a validation error when the phone is absent or carries fewer
/// than 10 digits; this blocks persistence.
pub fn normalize(payload: &Value) -> Result<LeadDraft, AppError> {
    if payload.get("contact").map_or(false, Value::is_object) {
        normalize_nested(payload)
    } else {
        normalize_flat(payload)
    }
}

fn normalize_flat(payload: &Value) -> Result<LeadDraft, AppError> {
    let flat: FlatPayload = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Validation(format!("Malformed lead payload: {}", e)))?;

    Ok(LeadDraft {
        external_lead_id: none_if_empty(flat.external_lead_id),
        phone: require_phone(flat.phone)?,
        first_name: none_if_empty(flat.first_name),
        last_name: none_if_empty(flat.last_name),
        email: none_if_empty(flat.email),
        city: none_if_empty(flat.city),
        state: none_if_empty(flat.state),
        zip: none_if_empty(flat.zip),
        address: none_if_empty(flat.address),
        driver: None,
        vehicle: None,
        requested_policy: None,
        source_meta: None,
        total_drivers: 1,
        total_vehicles: 1,
        total_accidents: 0,
        total_tickets: 0,
        total_violations: 0,
        total_claims: 0,
        has_current_policy: false,
        insurance_status: InsuranceStatus::None,
        full_payload: payload.clone(),
    })
}

fn normalize_nested(payload: &Value) -> Result<LeadDraft, AppError> {
    let nested: NestedPayload = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Validation(format!("Malformed lead payload: {}", e)))?;

    let contact = nested.contact;
    let meta = nested.meta;
    let risk = nested.data;

    let drivers = risk.as_ref().and_then(|r| r.drivers.as_ref());
    let vehicles = risk.as_ref().and_then(|r| r.vehicles.as_ref());

    // Drivers/vehicles default to 1 when the array is absent, the incident
    // counters sum across all drivers and default to 0.
    let total_drivers = drivers.map_or(1, |d| d.len() as i32);
    let total_vehicles = vehicles.map_or(1, |v| v.len() as i32);
    let sum_incidents = |pick: fn(&DriverInput) -> usize| -> i32 {
        drivers.map_or(0, |list| list.iter().map(pick).sum::<usize>() as i32)
    };

    let has_current_policy = risk
        .as_ref()
        .and_then(|r| r.current_policy.as_ref())
        .map_or(false, |p| !p.is_null());
    let insurance_status = if has_current_policy {
        InsuranceStatus::Current
    } else {
        InsuranceStatus::None
    };

    let source_meta = SourceMeta {
        jangl_id: nested.id,
        jangl_url: nested.url,
        sell_price: nested.sell_price,
        campaign_id: nested.campaign_id,
        offer_id: meta.as_ref().and_then(|m| m.offer_id.clone()),
        source_id: meta.as_ref().and_then(|m| m.source_id.clone()),
        landing_page_url: meta.as_ref().and_then(|m| m.landing_page_url.clone()),
        user_agent: meta.as_ref().and_then(|m| m.user_agent.clone()),
        originally_created: meta.as_ref().and_then(|m| m.originally_created.clone()),
        trusted_form_cert_url: meta.as_ref().and_then(|m| m.trusted_form_cert_url.clone()),
        tcpa_compliant: meta.as_ref().and_then(|m| m.tcpa_compliant),
        tcpa_consent_text: meta.as_ref().and_then(|m| m.tcpa_consent_text.clone()),
        one_to_one: meta.as_ref().and_then(|m| m.one_to_one),
        lead_timestamp: nested.timestamp,
        extra_data: nested.extra_data,
    };

    Ok(LeadDraft {
        external_lead_id: none_if_empty(meta.as_ref().and_then(|m| m.lead_id_code.clone())),
        phone: require_phone(contact.phone)?,
        first_name: none_if_empty(contact.first_name),
        last_name: none_if_empty(contact.last_name),
        email: none_if_empty(contact.email),
        city: none_if_empty(contact.city),
        state: none_if_empty(contact.state),
        zip: none_if_empty(contact.zip_code),
        address: none_if_empty(contact.address),
        driver: drivers
            .and_then(|d| d.first())
            .map(|d| d.profile.clone()),
        vehicle: vehicles.and_then(|v| v.first()).cloned(),
        requested_policy: risk.as_ref().and_then(|r| r.requested_policy.clone()),
        source_meta: (source_meta != SourceMeta::default()).then_some(source_meta),
        total_drivers,
        total_vehicles,
        total_accidents: sum_incidents(|d| d.accidents.len()),
        total_tickets: sum_incidents(|d| d.tickets.len()),
        total_violations: sum_incidents(|d| d.major_violations.len()),
        total_claims: sum_incidents(|d| d.claims.len()),
        has_current_policy,
        insurance_status,
        full_payload: payload.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ten_digit_numbers_get_us_country_code() {
        assert_eq!(normalize_phone("5551234567"), "+15551234567");
        assert_eq!(normalize_phone("555-123-4567"), "+15551234567");
        assert_eq!(normalize_phone("(555) 123-4567"), "+15551234567");
    }

    #[test]
    fn eleven_digit_numbers_starting_with_one_get_plus() {
        assert_eq!(normalize_phone("15551234567"), "+15551234567");
        assert_eq!(normalize_phone("1-555-123-4567"), "+15551234567");
    }

    #[test]
    fn international_numbers_pass_through_unchanged() {
        assert_eq!(normalize_phone("+447911123456"), "+447911123456");
    }

    #[test]
    fn other_digit_strings_get_plus_prefixed() {
        assert_eq!(normalize_phone("447911123456"), "+447911123456");
        assert_eq!(normalize_phone(""), "+");
    }

    #[test]
    fn missing_or_short_phone_is_a_validation_error() {
        let err = normalize(&json!({})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = normalize(&json!({"phone": "12345"})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = normalize(&json!({"contact": {"phone": "555-123"}})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn flat_payload_normalizes_with_defaults() {
        let payload = json!({"phone": "555-123-4567", "firstName": "Jane"});
        let draft = normalize(&payload).unwrap();
        assert_eq!(draft.phone, "+15551234567");
        assert_eq!(draft.first_name.as_deref(), Some("Jane"));
        assert!(draft.last_name.is_none());
        assert_eq!(draft.total_drivers, 1);
        assert_eq!(draft.total_vehicles, 1);
        assert_eq!(draft.total_accidents, 0);
        assert_eq!(draft.insurance_status, InsuranceStatus::None);
        assert!(draft.driver.is_none());
        assert!(draft.source_meta.is_none());
    }

    #[test]
    fn empty_strings_become_absent_not_empty() {
        let payload = json!({"phone": "5551234567", "firstName": "", "state": "  "});
        let draft = normalize(&payload).unwrap();
        assert!(draft.first_name.is_none());
        assert!(draft.state.is_none());
    }

    #[test]
    fn nested_payload_extracts_contact_meta_and_risk_fields() {
        let payload = json!({
            "id": 991122,
            "campaign_id": 42,
            "sell_price": 3.75,
            "contact": {
                "phone": "(555) 123-4567",
                "first_name": "John",
                "last_name": "Doe",
                "state": "TX",
                "zip_code": "75001",
                "email": "john@example.com"
            },
            "meta": {
                "lead_id_code": "EXT-789",
                "offer_id": "offer-1",
                "tcpa_compliant": true
            },
            "data": {
                "drivers": [
                    {
                        "first_name": "John",
                        "gender": "M",
                        "accidents": [{}, {}],
                        "tickets": [{}],
                        "claims": []
                    },
                    {
                        "first_name": "Mary",
                        "major_violations": [{}]
                    }
                ],
                "vehicles": [
                    {"year": 2019, "make": "Toyota", "model": "Camry"}
                ],
                "requested_policy": {"coverage_type": "FULL"},
                "current_policy": {"carrier": "Acme"}
            }
        });

        let draft = normalize(&payload).unwrap();
        assert_eq!(draft.phone, "+15551234567");
        assert_eq!(draft.external_lead_id.as_deref(), Some("EXT-789"));
        assert_eq!(draft.state.as_deref(), Some("TX"));
        assert_eq!(draft.zip.as_deref(), Some("75001"));
        assert_eq!(draft.total_drivers, 2);
        assert_eq!(draft.total_vehicles, 1);
        assert_eq!(draft.total_accidents, 2);
        assert_eq!(draft.total_tickets, 1);
        assert_eq!(draft.total_violations, 1);
        assert_eq!(draft.total_claims, 0);
        assert_eq!(draft.insurance_status, InsuranceStatus::Current);
        assert!(draft.has_current_policy);

        let driver = draft.driver.unwrap();
        assert_eq!(driver.first_name.as_deref(), Some("John"));
        assert_eq!(driver.gender.as_deref(), Some("M"));

        let vehicle = draft.vehicle.unwrap();
        assert_eq!(vehicle.year, Some(2019));
        assert_eq!(vehicle.make.as_deref(), Some("Toyota"));

        let meta = draft.source_meta.unwrap();
        assert_eq!(meta.jangl_id, Some(991122));
        assert_eq!(meta.campaign_id, Some(42));
        assert_eq!(meta.offer_id.as_deref(), Some("offer-1"));
        assert_eq!(meta.tcpa_compliant, Some(true));
    }

    #[test]
    fn null_current_policy_means_no_coverage() {
        let payload = json!({
            "contact": {"phone": "5551234567"},
            "data": {"current_policy": null}
        });
        let draft = normalize(&payload).unwrap();
        assert_eq!(draft.insurance_status, InsuranceStatus::None);
        assert!(!draft.has_current_policy);
    }

    #[test]
    fn full_payload_round_trips_verbatim() {
        let payload = json!({
            "contact": {"phone": "5551234567", "unknown_field": {"deep": [1, 2, 3]}},
            "some_extra": "kept"
        });
        let draft = normalize(&payload).unwrap();
        assert_eq!(draft.full_payload, payload);

        let flat = json!({"phone": "5551234567", "weird": null});
        let draft = normalize(&flat).unwrap();
        assert_eq!(draft.full_payload, flat);
    }
}
