//! Record builders for tests. Values are plausible, not meaningful.

use bpr_schemas::{
    BidPosting, Confirmation, DecisionSnapshot, DecisionStatus, Email, Participation, PhoneNumber,
    RawId, SellerIdentity,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Fixed "now" used across scenarios: 2026-10-16 12:00 IST.
pub fn reference_now() -> DateTime<Utc> {
    utc(2026, 10, 16, 6, 30)
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

pub fn bid(id: &str, group: &str, consignee: &str, commodity: &str) -> BidPosting {
    let now = reference_now();
    BidPosting {
        id: id.to_string(),
        group: group.to_string(),
        consignee: consignee.to_string(),
        origin: "Indore".to_string(),
        commodity: commodity.to_string(),
        quantity: 500.0,
        rate: 4200.0,
        parameters: [("moisture".to_string(), "12%".to_string())]
            .into_iter()
            .collect(),
        bid_date: now.date_naive(),
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
        end_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN),
        payment_terms: "7 days".to_string(),
        delivery: "Ex-warehouse".to_string(),
        created_at: now,
    }
}

pub fn dated_bid(id: &str, group: &str, consignee: &str, bid_date: NaiveDate) -> BidPosting {
    BidPosting {
        bid_date,
        ..bid(id, group, consignee, "Soybean")
    }
}

pub fn participation(id: &str, bid_id: &str, mobile: impl Into<RawId>) -> Participation {
    Participation {
        id: id.to_string(),
        bid_id: bid_id.to_string(),
        mobile: mobile.into(),
        rate: 4150.0,
        quantity: 50.0,
        participation_date: reference_now(),
    }
}

pub fn identity(id: &str, name: &str, phones: &[&str], commodities: &[&str]) -> SellerIdentity {
    SellerIdentity {
        id: id.to_string(),
        seller_name: name.to_string(),
        phone_numbers: phones
            .iter()
            .map(|p| PhoneNumber {
                value: RawId::from(*p),
            })
            .collect(),
        emails: vec![Email {
            value: format!("ops@{}.test", name.to_lowercase()),
        }],
        companies: vec![format!("{name} Agro")],
        commodities: commodities.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn snapshot(name: &str) -> DecisionSnapshot {
    DecisionSnapshot {
        seller_name: name.to_string(),
        email: format!("ops@{}.test", name.to_lowercase()),
        rate: 4150.0,
        quantity: 50.0,
        company: format!("{name} Agro"),
    }
}

pub fn confirmation(
    id: &str,
    bid_id: &str,
    phone: impl Into<RawId>,
    status: DecisionStatus,
) -> Confirmation {
    let snap = snapshot("Seller");
    Confirmation {
        id: id.to_string(),
        bid_id: bid_id.to_string(),
        phone: phone.into(),
        seller_name: snap.seller_name,
        email: snap.email,
        rate: snap.rate,
        quantity: snap.quantity,
        company: snap.company,
        status,
        decided_by: Some("admin-1".to_string()),
        decided_at: Some(reference_now()),
    }
}
