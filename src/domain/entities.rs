//! Domain entities. Pure data structures for the core business.
//!
//! Rows come from the hosted backend and are deserialized leniently: nulls
//! become defaults, unknown enum values become `Unknown`, amounts may arrive
//! as numbers or numeric strings, and dates stay as the raw strings the
//! backend sent (parsed on access). One malformed row must not fail the
//! whole result set.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A person the business works with (client, patient, player, parent...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Role tags, e.g. "patient", "player".
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Contact {
    /// `"{first} {last}"` trimmed. `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("").trim(),
            self.last_name.as_deref().unwrap_or("").trim()
        );
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Settlement state shared by deals and payments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unknown => "unknown",
        }
    }

    /// Status a deal should carry given its paid and total amounts.
    pub fn from_amounts(amount_paid: f64, amount_total: f64) -> Self {
        if amount_paid <= 0.0 {
            PaymentStatus::Pending
        } else if amount_paid >= amount_total {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        }
    }
}

/// A sellable engagement tracked through a workflow stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount_paid: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_status: PaymentStatus,
    /// Free-form pipeline label; "won" and "lost" close the deal.
    #[serde(default)]
    pub workflow_stage: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_fields: Map<String, Value>,
    /// Embedded by the gateway when the query asks for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Deal {
    pub fn amount_total_or_zero(&self) -> f64 {
        finite_or_zero(self.amount_total)
    }

    pub fn amount_paid_or_zero(&self) -> f64 {
        finite_or_zero(self.amount_paid)
    }

    /// Open iff the stage is absent or neither "won" nor "lost".
    pub fn is_open(&self) -> bool {
        !matches!(self.workflow_stage.as_deref(), Some("won") | Some("lost"))
    }

    pub fn custom_field(&self, key: &str) -> Option<&Value> {
        self.custom_fields.get(key)
    }

    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom_field(key).and_then(Value::as_str)
    }
}

/// A single installment (or the whole amount) paid against a deal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub deal_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub contact_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    /// `YYYY-MM-DD` as sent by the backend.
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal: Option<Deal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Payment {
    pub fn amount_or_zero(&self) -> f64 {
        finite_or_zero(self.amount)
    }

    pub fn due_on(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_date)
    }

    /// Overdue iff due strictly before `today` and not paid.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != PaymentStatus::Paid && self.due_on().is_some_and(|due| due < today)
    }

    /// Direct contact wins over the contact reached through the deal.
    pub fn resolved_contact(&self) -> Option<&Contact> {
        self.contact
            .as_ref()
            .or_else(|| self.deal.as_ref().and_then(|d| d.contact.as_ref()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// A session, match or appointment, optionally tied to a deal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub deal_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: EventStatus,
}

impl Event {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.event_date.as_deref().and_then(parse_datetime)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: TaskPriority,
}

impl Task {
    pub fn due_on(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_date)
    }
}

/// Pricing policy tag of a service domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    /// Full package price.
    Full,
    /// Share of a base amount, `pricing_value` is the percentage.
    Percentage,
    /// Fixed add-on fee.
    Fixed,
    #[serde(other)]
    Unknown,
}

/// A service category (coaching, therapy, events...) with its pricing policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pricing_type: Option<PricingType>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub pricing_value: Option<f64>,
    #[serde(default)]
    pub pricing_notes: Option<String>,
}

/// Insert payload for a new payment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPayment {
    pub deal_id: Option<String>,
    pub contact_id: Option<String>,
    pub amount: f64,
    pub payment_date: Option<String>,
    pub due_date: Option<String>,
    pub status: PaymentStatus,
}

/// Patch payload for a deal's settlement fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealPaymentUpdate {
    pub amount_paid: f64,
    pub payment_status: PaymentStatus,
}

/// Parses the leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parses RFC 3339, naive `T`/space separated timestamps (taken as UTC), or a bare date (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if raw.len() == 10 {
        return parse_date(raw)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }
    None
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a JSON number, a numeric string (Postgres `numeric` may be sent as text) or null.
/// Anything else is treated as absent rather than failing the row.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Primary keys may be text/uuid or integer columns; both become a `String`.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("id must be a string or a number"))
}

/// Foreign keys: like `lenient_id`, but null or junk is absent.
fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(id_from_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_become_strings() {
        let p: Payment =
            serde_json::from_str(r#"{"id":42,"deal_id":7,"contact_id":null,"amount":100}"#).unwrap();
        assert_eq!(p.id, "42");
        assert_eq!(p.deal_id.as_deref(), Some("7"));
        assert_eq!(p.contact_id, None);
        assert!(serde_json::from_str::<Task>(r#"{"id":{"x":1}}"#).is_err());
    }

    #[test]
    fn payment_row_tolerates_nulls_and_unknown_status() {
        let json = r#"{
            "id": "p1",
            "amount": null,
            "payment_date": null,
            "due_date": "2024-03-01",
            "status": "refunded"
        }"#;
        let p: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(p.amount, None);
        assert_eq!(p.amount_or_zero(), 0.0);
        assert_eq!(p.status, PaymentStatus::Unknown);
        assert_eq!(p.due_on(), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn amount_accepts_numeric_strings_and_ignores_garbage() {
        let p: Payment = serde_json::from_str(r#"{"id":"p","amount":"1250.50"}"#).unwrap();
        assert_eq!(p.amount, Some(1250.5));

        let p: Payment = serde_json::from_str(r#"{"id":"p","amount":"n/a"}"#).unwrap();
        assert_eq!(p.amount, None);

        let p: Payment = serde_json::from_str(r#"{"id":"p","amount":{"x":1}}"#).unwrap();
        assert_eq!(p.amount, None);
    }

    #[test]
    fn deal_with_null_collections_and_custom_fields() {
        let json = r#"{
            "id": "d1",
            "amount_total": 3000,
            "amount_paid": 500,
            "payment_status": null,
            "workflow_stage": "negotiation",
            "custom_fields": {"team": "U12", "sessions": 10},
            "contact": {"id": "c1", "first_name": "Ana", "last_name": null, "roles": null}
        }"#;
        let d: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(d.payment_status, PaymentStatus::Pending);
        assert_eq!(d.custom_str("team"), Some("U12"));
        assert_eq!(d.custom_field("sessions").and_then(Value::as_u64), Some(10));
        assert!(d.is_open());
        let contact = d.contact.unwrap();
        assert!(contact.roles.is_empty());
        assert_eq!(contact.display_name().as_deref(), Some("Ana"));
    }

    #[test]
    fn won_and_lost_deals_are_closed() {
        let mut d = Deal {
            id: "d".into(),
            workflow_stage: Some("won".into()),
            ..Default::default()
        };
        assert!(!d.is_open());
        d.workflow_stage = Some("lost".into());
        assert!(!d.is_open());
        d.workflow_stage = None;
        assert!(d.is_open());
    }

    #[test]
    fn status_from_amounts() {
        assert_eq!(PaymentStatus::from_amounts(0.0, 100.0), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_amounts(40.0, 100.0), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_amounts(100.0, 100.0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(120.0, 100.0), PaymentStatus::Paid);
    }

    #[test]
    fn parse_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 21)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_datetime("2024-03-21T10:00:00+00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-21T10:00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-21 10:00:00"), Some(expected));
        assert_eq!(
            parse_datetime("2024-03-21"),
            NaiveDate::from_ymd_opt(2024, 3, 21)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .map(|n| n.and_utc())
        );
        assert_eq!(parse_datetime("next tuesday"), None);
    }

    #[test]
    fn pricing_type_unknown_tag() {
        let d: Domain =
            serde_json::from_str(r#"{"id":"x","pricing_type":"tiered","pricing_value":5}"#).unwrap();
        assert_eq!(d.pricing_type, Some(PricingType::Unknown));
    }

    #[test]
    fn direct_contact_wins_over_deal_contact() {
        let deal_contact = Contact {
            id: "c-deal".into(),
            first_name: Some("Deal".into()),
            ..Default::default()
        };
        let direct = Contact {
            id: "c-direct".into(),
            first_name: Some("Direct".into()),
            ..Default::default()
        };
        let mut p = Payment {
            id: "p".into(),
            deal: Some(Deal {
                id: "d".into(),
                contact: Some(deal_contact),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(p.resolved_contact().unwrap().id, "c-deal");
        p.contact = Some(direct);
        assert_eq!(p.resolved_contact().unwrap().id, "c-direct");
    }
}
