use anyhow::{anyhow, bail, Result};
use bpr_config::{read_bool, read_str, read_u64};
use bpr_reconcile::{NotificationPolicy, PhoneNormalizer, WindowFilter, DEFAULT_PHONE_WIDTH};
use chrono_tz::Tz;
use serde_json::Value;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;
pub const DEFAULT_LISTING_DAYS: u32 = 7;
pub const DEFAULT_NOTIFICATION_DAYS: u32 = 1;

/// Engine knobs. Every field has a default; config only overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub phone_width: usize,
    pub timezone: Tz,
    /// Window for bid and participation listings.
    pub listing_days: u32,
    /// Window for "recent bids matching your commodities".
    pub notification_days: u32,
    pub notification_policy: NotificationPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            phone_width: DEFAULT_PHONE_WIDTH,
            timezone: DEFAULT_TIMEZONE,
            listing_days: DEFAULT_LISTING_DAYS,
            notification_days: DEFAULT_NOTIFICATION_DAYS,
            notification_policy: NotificationPolicy::AllDecisions,
        }
    }
}

impl EngineSettings {
    /// Build from canonical config JSON (produced by bpr-config).
    ///
    /// Optional fields:
    /// - identity.phone_width (1..=15)
    /// - window.timezone (IANA name)
    /// - window.listing_days, window.notification_days
    /// - notifications.count_rejected (true keeps Rejected in the badge)
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut s = Self::default();

        if let Some(w) = read_u64(cfg, "/identity/phone_width")? {
            if !(1..=15).contains(&w) {
                bail!("identity.phone_width must be within 1..=15 (got {w})");
            }
            s.phone_width = w as usize;
        }

        if let Some(tz) = read_str(cfg, "/window/timezone")? {
            s.timezone = tz
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow!("window.timezone {tz:?} is not an IANA zone: {e}"))?;
        }

        if let Some(d) = read_u64(cfg, "/window/listing_days")? {
            s.listing_days = days(d, "window.listing_days")?;
        }
        if let Some(d) = read_u64(cfg, "/window/notification_days")? {
            s.notification_days = days(d, "window.notification_days")?;
        }

        if let Some(b) = read_bool(cfg, "/notifications/count_rejected")? {
            s.notification_policy = NotificationPolicy::from_count_rejected(b);
        }

        Ok(s)
    }

    pub fn normalizer(&self) -> PhoneNormalizer {
        PhoneNormalizer::new(self.phone_width)
    }

    pub fn listing_window(&self) -> WindowFilter {
        WindowFilter::new(self.timezone, self.listing_days)
    }

    pub fn notification_window(&self) -> WindowFilter {
        WindowFilter::new(self.timezone, self.notification_days)
    }
}

fn days(v: u64, name: &str) -> Result<u32> {
    if v > 366 {
        bail!("{name} must be at most 366 (got {v})");
    }
    Ok(v as u32)
}
