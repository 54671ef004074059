//! Identifier normalization and seller identity resolution.
//!
//! Participations, confirmations and seller records all carry a phone-like
//! identifier, typed inconsistently across sources. [`PhoneNormalizer`] is the
//! single place those values are turned into join keys; nothing else in the
//! crate compares raw identifiers.

use std::collections::{BTreeSet, HashMap};

use bpr_schemas::{RawId, SellerIdentity};
use serde::Serialize;

/// Digits kept per phone key. Longer values lose their leading digits
/// (country code); shorter values are zero-padded on the left.
pub const DEFAULT_PHONE_WIDTH: usize = 10;

// ---------------------------------------------------------------------------
// PhoneNormalizer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhoneNormalizer {
    width: usize,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PHONE_WIDTH)
    }
}

impl PhoneNormalizer {
    /// A width of zero falls back to [`DEFAULT_PHONE_WIDTH`].
    pub fn new(width: usize) -> Self {
        let width = if width == 0 { DEFAULT_PHONE_WIDTH } else { width };
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Strip non-digits, then trim or pad to the fixed width.
    ///
    /// Returns `None` when the input holds no digit at all; such a value
    /// never matches anything.
    pub fn normalize_str(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        if digits.len() > self.width {
            return Some(digits[digits.len() - self.width..].to_string());
        }
        Some(format!("{:0>width$}", digits, width = self.width))
    }

    pub fn normalize(&self, raw: &RawId) -> Option<String> {
        self.normalize_str(&raw.as_text())
    }
}

/// All join keys a seller identity answers to.
pub fn identity_phone_keys(identity: &SellerIdentity, normalizer: PhoneNormalizer) -> BTreeSet<String> {
    identity
        .phone_numbers
        .iter()
        .filter_map(|p| normalizer.normalize(&p.value))
        .collect()
}

// ---------------------------------------------------------------------------
// ResolvedIdentity
// ---------------------------------------------------------------------------

/// Outcome of resolving a participation's identifier.
///
/// `Unknown` is a normal value, rendered as "Unknown"; it never stops a
/// roster from being built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedIdentity {
    Known(SellerIdentity),
    Unknown,
}

impl ResolvedIdentity {
    pub fn display_name(&self) -> &str {
        match self {
            ResolvedIdentity::Known(id) => &id.seller_name,
            ResolvedIdentity::Unknown => "Unknown",
        }
    }

    pub fn as_known(&self) -> Option<&SellerIdentity> {
        match self {
            ResolvedIdentity::Known(id) => Some(id),
            ResolvedIdentity::Unknown => None,
        }
    }
}

// ---------------------------------------------------------------------------
// IdentityResolver
// ---------------------------------------------------------------------------

/// Index of seller identities by normalized phone key.
///
/// When two identities list the same key the first one (source order) keeps
/// it; the key is reported through [`IdentityResolver::shadowed_keys`].
#[derive(Debug, Clone)]
pub struct IdentityResolver<'a> {
    normalizer: PhoneNormalizer,
    by_key: HashMap<String, &'a SellerIdentity>,
    shadowed: BTreeSet<String>,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(identities: &'a [SellerIdentity], normalizer: PhoneNormalizer) -> Self {
        let mut by_key: HashMap<String, &'a SellerIdentity> = HashMap::new();
        let mut shadowed = BTreeSet::new();

        for identity in identities {
            for key in identity_phone_keys(identity, normalizer) {
                match by_key.get(&key) {
                    Some(existing) if existing.id != identity.id => {
                        shadowed.insert(key);
                    }
                    Some(_) => {}
                    None => {
                        by_key.insert(key, identity);
                    }
                }
            }
        }

        Self {
            normalizer,
            by_key,
            shadowed,
        }
    }

    /// Resolver with nothing to resolve against (identity source unavailable).
    pub fn empty(normalizer: PhoneNormalizer) -> Self {
        Self {
            normalizer,
            by_key: HashMap::new(),
            shadowed: BTreeSet::new(),
        }
    }

    pub fn normalizer(&self) -> PhoneNormalizer {
        self.normalizer
    }

    pub fn resolve(&self, raw: &RawId) -> Option<&'a SellerIdentity> {
        let key = self.normalizer.normalize(raw)?;
        self.resolve_key(&key)
    }

    pub fn resolve_key(&self, key: &str) -> Option<&'a SellerIdentity> {
        self.by_key.get(key).copied()
    }

    pub fn resolve_or_unknown(&self, raw: &RawId) -> ResolvedIdentity {
        match self.resolve(raw) {
            Some(id) => ResolvedIdentity::Known(id.clone()),
            None => ResolvedIdentity::Unknown,
        }
    }

    pub fn shadowed_keys(&self) -> &BTreeSet<String> {
        &self.shadowed
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpr_schemas::PhoneNumber;

    fn seller(id: &str, name: &str, phones: &[RawId]) -> SellerIdentity {
        SellerIdentity {
            id: id.to_string(),
            seller_name: name.to_string(),
            phone_numbers: phones
                .iter()
                .map(|p| PhoneNumber { value: p.clone() })
                .collect(),
            emails: vec![],
            companies: vec![],
            commodities: vec![],
        }
    }

    #[test]
    fn normalizer_strips_formatting_and_country_code() {
        let n = PhoneNormalizer::default();
        assert_eq!(n.normalize_str("+91 99999-99999").as_deref(), Some("9999999999"));
        assert_eq!(n.normalize_str("919999999999").as_deref(), Some("9999999999"));
        assert_eq!(n.normalize_str(" 9999999999 ").as_deref(), Some("9999999999"));
    }

    #[test]
    fn normalizer_pads_short_values() {
        let n = PhoneNormalizer::new(10);
        assert_eq!(n.normalize_str("12345").as_deref(), Some("0000012345"));
    }

    #[test]
    fn normalizer_rejects_digitless_input() {
        let n = PhoneNormalizer::default();
        assert_eq!(n.normalize_str(""), None);
        assert_eq!(n.normalize_str("n/a"), None);
    }

    #[test]
    fn string_and_number_identifiers_resolve_to_same_identity() {
        let ids = vec![seller("S1", "Acme", &[RawId::from("9999999999")])];
        let r = IdentityResolver::new(&ids, PhoneNormalizer::default());

        assert_eq!(r.resolve(&RawId::Number(9_999_999_999)).map(|s| s.seller_name.as_str()), Some("Acme"));
        assert_eq!(r.resolve(&RawId::from("+91-9999999999")).map(|s| s.id.as_str()), Some("S1"));
        assert!(r.resolve(&RawId::from("8888888888")).is_none());
    }

    #[test]
    fn first_identity_keeps_a_shared_phone() {
        let ids = vec![
            seller("S1", "First", &[RawId::from("9999999999")]),
            seller("S2", "Second", &[RawId::from("09999999999")]),
        ];
        let r = IdentityResolver::new(&ids, PhoneNormalizer::default());

        assert_eq!(r.resolve(&RawId::from("9999999999")).unwrap().id, "S1");
        assert!(r.shadowed_keys().contains("9999999999"));
    }

    #[test]
    fn unresolved_identity_renders_unknown() {
        let r = IdentityResolver::empty(PhoneNormalizer::default());
        let resolved = r.resolve_or_unknown(&RawId::from("9999999999"));
        assert_eq!(resolved, ResolvedIdentity::Unknown);
        assert_eq!(resolved.display_name(), "Unknown");
    }
}
