//! bpr-schemas
//!
//! Record shapes for the four collections the reconciliation layer reads
//! (bid postings, participations, seller identities, confirmations) plus the
//! write-side types handed to the confirmation store.
//!
//! Identifier fields that arrive as either a JSON string or a JSON number are
//! modelled as [`RawId`]. No normalization happens here; see
//! `bpr_reconcile::PhoneNormalizer`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawId
// ---------------------------------------------------------------------------

/// Phone-like identifier exactly as stored by the producing collection.
///
/// Upstream writers disagree on the type: some store `"9999999999"`, others
/// `9999999999` or `9999999999.0`. All decode; [`RawId::as_text`] gives the
/// coerced string. Integral floats become `Number`; any other number is kept
/// as its text so one odd row never fails a whole collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for RawId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawIdVisitor)
    }
}

struct RawIdVisitor;

impl<'de> Visitor<'de> for RawIdVisitor {
    type Value = RawId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a phone-like string or number")
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<RawId, E> {
        Ok(RawId::Number(n))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<RawId, E> {
        Ok(match u64::try_from(n) {
            Ok(u) => RawId::Number(u),
            Err(_) => RawId::Text(n.to_string()),
        })
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> Result<RawId, E> {
        // 2^64 itself is not representable as u64.
        if n.is_finite() && n.fract() == 0.0 && n >= 0.0 && n < 18_446_744_073_709_551_616.0 {
            Ok(RawId::Number(n as u64))
        } else {
            Ok(RawId::Text(n.to_string()))
        }
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<RawId, E> {
        Ok(RawId::Text(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<RawId, E> {
        Ok(RawId::Text(s))
    }
}

impl RawId {
    pub fn as_text(&self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{n}"),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawId {
    fn from(s: &str) -> Self {
        RawId::Text(s.to_string())
    }
}

impl From<String> for RawId {
    fn from(s: String) -> Self {
        RawId::Text(s)
    }
}

impl From<u64> for RawId {
    fn from(n: u64) -> Self {
        RawId::Number(n)
    }
}

// ---------------------------------------------------------------------------
// Bid postings
// ---------------------------------------------------------------------------

/// A buyer's purchase offer broadcast to sellers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidPosting {
    pub id: String,
    /// Trading group used by the admin overview.
    pub group: String,
    pub consignee: String,
    pub origin: String,
    pub commodity: String,
    pub quantity: f64,
    pub rate: f64,
    /// Quality parameters (e.g. "moisture" -> "12%").
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub bid_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub payment_terms: String,
    #[serde(default)]
    pub delivery: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Participations
// ---------------------------------------------------------------------------

/// A seller's offer against one bid. Append-only; written outside this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub id: String,
    pub bid_id: String,
    pub mobile: RawId,
    pub rate: f64,
    pub quantity: f64,
    pub participation_date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Seller identities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub value: RawId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub value: String,
}

/// Live seller master record. May change after a decision was taken; the
/// confirmation keeps its own snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerIdentity {
    pub id: String,
    pub seller_name: String,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub commodities: Vec<String>,
}

impl SellerIdentity {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(|e| e.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// Confirmations
// ---------------------------------------------------------------------------

/// Terminal admin decision on one participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionStatus {
    Confirmed,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Confirmed => "Confirmed",
            DecisionStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("confirmed") {
            Some(DecisionStatus::Confirmed)
        } else if s.eq_ignore_ascii_case("rejected") {
            Some(DecisionStatus::Rejected)
        } else {
            None
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seller details copied onto the confirmation at decision time.
///
/// This is a historical record of what the admin saw, kept apart from the
/// live [`SellerIdentity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub seller_name: String,
    #[serde(default)]
    pub email: String,
    pub rate: f64,
    pub quantity: f64,
    #[serde(default)]
    pub company: String,
}

/// A persisted admin decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: String,
    pub bid_id: String,
    pub phone: RawId,
    pub seller_name: String,
    #[serde(default)]
    pub email: String,
    pub rate: f64,
    pub quantity: f64,
    #[serde(default)]
    pub company: String,
    pub status: DecisionStatus,
    /// Admin who took the decision. Absent on rows written before it was recorded.
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Write request handed to the confirmation store.
///
/// `phone_normalized` is the uniqueness key together with `bid_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConfirmation {
    pub bid_id: String,
    pub phone: RawId,
    pub phone_normalized: String,
    pub snapshot: DecisionSnapshot,
    pub status: DecisionStatus,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
}

impl NewConfirmation {
    /// Materialize the stored row once the store has assigned an id.
    pub fn into_confirmation(self, id: impl Into<String>) -> Confirmation {
        Confirmation {
            id: id.into(),
            bid_id: self.bid_id,
            phone: self.phone,
            seller_name: self.snapshot.seller_name,
            email: self.snapshot.email,
            rate: self.snapshot.rate,
            quantity: self.snapshot.quantity,
            company: self.snapshot.company,
            status: self.status,
            decided_by: Some(self.decided_by),
            decided_at: Some(self.decided_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_id_accepts_string_and_number() {
        let a: RawId = serde_json::from_str("\"9999999999\"").unwrap();
        let b: RawId = serde_json::from_str("9999999999").unwrap();
        assert_eq!(a, RawId::Text("9999999999".to_string()));
        assert_eq!(b, RawId::Number(9_999_999_999));
        assert_eq!(a.as_text(), b.as_text());
    }

    #[test]
    fn raw_id_accepts_float_typed_numbers() {
        let a: RawId = serde_json::from_str("9999999999.0").unwrap();
        assert_eq!(a, RawId::Number(9_999_999_999));
        assert_eq!(a.as_text(), "9999999999");

        let odd: RawId = serde_json::from_str("99999.5").unwrap();
        assert_eq!(odd, RawId::Text("99999.5".to_string()));
        let neg: RawId = serde_json::from_str("-42").unwrap();
        assert_eq!(neg, RawId::Text("-42".to_string()));

        assert!(serde_json::from_str::<RawId>("true").is_err());
    }

    #[test]
    fn float_typed_mobile_does_not_fail_the_row() {
        let p: Participation = serde_json::from_str(
            r#"{"id":"P1","bid_id":"B1","mobile":9999999999.0,"rate":100,"quantity":10,
                "participation_date":"2026-10-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(p.mobile, RawId::Number(9_999_999_999));
    }

    #[test]
    fn participation_decodes_numeric_mobile() {
        let p: Participation = serde_json::from_str(
            r#"{"id":"P1","bid_id":"B1","mobile":9999999999,"rate":100,"quantity":10,
                "participation_date":"2026-10-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(p.mobile.as_text(), "9999999999");
        assert_eq!(p.rate, 100.0);
    }

    #[test]
    fn decision_status_parse_is_case_tolerant() {
        assert_eq!(DecisionStatus::parse("confirmed"), Some(DecisionStatus::Confirmed));
        assert_eq!(DecisionStatus::parse("REJECTED"), Some(DecisionStatus::Rejected));
        assert_eq!(DecisionStatus::parse(" rEjEcTeD "), Some(DecisionStatus::Rejected));
        assert_eq!(DecisionStatus::parse("Review"), None);
    }
}
