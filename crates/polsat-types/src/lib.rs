//! # polsat-types: Core types for `polsat`
//!
//! This crate contains the policy model shared across the `polsat` workspace:
//! - Identity ids ([`IdentityId`])
//! - Rules and numeric bounds ([`Rule`], [`RuleKind`], [`Bounds`])
//! - Parsed policies ([`PolicyRecord`])
//! - Conflict grouping keys ([`GroupKey`])
//! - Policy timestamps ([`parse_timestamp`], [`format_timestamp`])

use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity IDs
// ============================================================================

/// Stable small integer assigned to a user or group name.
///
/// Identity ids index into a 16-bit selector domain, so the type itself is
/// `u16`. Id `0` is never assigned; the first identity of a run gets `1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct IdentityId(u16);

impl IdentityId {
    /// The first id handed out by a registry.
    pub const FIRST: IdentityId = IdentityId(1);

    /// The largest id that fits the selector domain.
    pub const MAX: IdentityId = IdentityId(u16::MAX);

    pub fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the id as a `u16`.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the next id, or `None` once the selector domain is exhausted.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for IdentityId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<IdentityId> for u16 {
    fn from(id: IdentityId) -> Self {
        id.0
    }
}

impl From<IdentityId> for i64 {
    fn from(id: IdentityId) -> Self {
        i64::from(id.0)
    }
}

impl TryFrom<i64> for IdentityId {
    type Error = std::num::TryFromIntError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u16::try_from(value).map(Self)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// The kind of rule a policy expresses. Part of the conflict grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// A numeric attribute must fall strictly inside a range.
    Comparator,
    /// Binary grant, no numeric bounds.
    Access,
    /// Rule text that is neither of the above. Carries no bounds.
    Other(String),
}

impl RuleKind {
    /// Parses the free-text rule name used in policy documents.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("comparator") {
            Self::Comparator
        } else if trimmed.eq_ignore_ascii_case("access") {
            Self::Access
        } else {
            Self::Other(trimmed.to_string())
        }
    }
}

impl Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparator => write!(f, "comparator"),
            Self::Access => write!(f, "access"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Numeric bounds of a comparator rule.
///
/// Both sides are exclusive: a value satisfies the bounds when
/// `min < value < max`. Either side may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Exclusive lower bound.
    pub min: Option<i64>,
    /// Exclusive upper bound.
    pub max: Option<i64>,
}

impl Bounds {
    /// Creates bounds with both sides present.
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Creates bounds with only a lower side.
    pub fn above(min: i64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

impl Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "({min}, {max})"),
            (Some(min), None) => write!(f, "({min}, +inf)"),
            (None, Some(max)) => write!(f, "(-inf, {max})"),
            (None, None) => write!(f, "(-inf, +inf)"),
        }
    }
}

/// A policy rule.
///
/// Only the comparator variant carries bounds, which makes "bounds present
/// iff comparator" hold for every [`PolicyRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    Comparator(Bounds),
    Access,
    Other(String),
}

impl Rule {
    /// Returns the rule kind used for grouping.
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Comparator(_) => RuleKind::Comparator,
            Self::Access => RuleKind::Access,
            Self::Other(name) => RuleKind::Other(name.clone()),
        }
    }

    /// Returns the bounds of a comparator rule.
    pub fn bounds(&self) -> Option<&Bounds> {
        match self {
            Self::Comparator(bounds) => Some(bounds),
            Self::Access | Self::Other(_) => None,
        }
    }
}

// ============================================================================
// Grouping Key
// ============================================================================

/// The (rule kind, attribute type, vendor) tuple that decides which
/// policies can conflict with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub rule: RuleKind,
    pub attribute_type: String,
    pub vendor: String,
}

impl GroupKey {
    pub fn new(rule: RuleKind, attribute_type: &str, vendor: &str) -> Self {
        Self {
            rule,
            attribute_type: attribute_type.to_string(),
            vendor: vendor.to_string(),
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.rule, self.attribute_type, self.vendor)
    }
}

// ============================================================================
// Policy Record
// ============================================================================

/// One parsed policy with its identities already resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// The rule, with bounds for comparators.
    pub rule: Rule,
    /// Informational description.
    pub description: String,
    /// Attribute the policy governs (e.g. "temperature").
    pub attribute_type: String,
    /// Vendor the policy applies to.
    pub vendor: String,
    /// Raw `YYYY-MM-DDTHH:MM:SS` validity timestamp, if the policy has one.
    ///
    /// Kept as text so that a malformed value surfaces while encoding the
    /// group it belongs to, not while reading the document.
    pub valid_from: Option<String>,
    /// Users the policy applies to. Empty means unrestricted.
    pub users: Vec<IdentityId>,
    /// Groups the policy applies to. Empty means unrestricted.
    pub groups: Vec<IdentityId>,
}

impl PolicyRecord {
    /// Creates a record with no description, time, users or groups.
    pub fn new(rule: Rule, attribute_type: &str, vendor: &str) -> Self {
        Self {
            rule,
            description: String::new(),
            attribute_type: attribute_type.to_string(),
            vendor: vendor.to_string(),
            valid_from: None,
            users: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Sets the validity timestamp text.
    pub fn with_valid_from(mut self, valid_from: &str) -> Self {
        self.valid_from = Some(valid_from.to_string());
        self
    }

    /// Sets the permitted users.
    pub fn with_users(mut self, users: impl IntoIterator<Item = IdentityId>) -> Self {
        self.users = users.into_iter().collect();
        self
    }

    /// Sets the permitted groups.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = IdentityId>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// Returns the conflict grouping key of this record.
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.rule.kind(), &self.attribute_type, &self.vendor)
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Calendar format used by policy documents.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a policy timestamp, interpreting it as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Formats a timestamp in the policy document calendar format.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Converts epoch seconds back to a UTC timestamp.
///
/// Returns `None` for values outside chrono's representable range.
pub fn timestamp_from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("comparator", RuleKind::Comparator; "lowercase comparator")]
    #[test_case("  Comparator\n", RuleKind::Comparator; "padded comparator")]
    #[test_case("ACCESS", RuleKind::Access; "uppercase access")]
    #[test_case("deny", RuleKind::Other("deny".to_string()); "unknown kind")]
    fn rule_kind_from_text(text: &str, expected: RuleKind) {
        assert_eq!(RuleKind::from_text(text), expected);
    }

    #[test]
    fn comparator_is_the_only_rule_with_bounds() {
        assert_eq!(
            Rule::Comparator(Bounds::new(-5, 5)).bounds(),
            Some(&Bounds::new(-5, 5))
        );
        assert!(Rule::Access.bounds().is_none());
        assert!(Rule::Other("audit".to_string()).bounds().is_none());
    }

    #[test]
    fn record_key_uses_rule_kind_type_and_vendor() {
        let record = PolicyRecord::new(Rule::Comparator(Bounds::new(1, 2)), "temperature", "Google")
            .with_description("in degrees Celsius");
        assert_eq!(
            record.key(),
            GroupKey::new(RuleKind::Comparator, "temperature", "Google")
        );
        assert_eq!(record.key().to_string(), "(comparator, temperature, Google)");
    }

    #[test]
    fn identity_id_domain() {
        assert_eq!(IdentityId::FIRST.as_u16(), 1);
        assert_eq!(IdentityId::new(7).checked_next(), Some(IdentityId::new(8)));
        assert_eq!(IdentityId::MAX.checked_next(), None);
        assert!(IdentityId::try_from(65_536_i64).is_err());
        assert_eq!(IdentityId::try_from(42_i64).unwrap(), IdentityId::new(42));
    }

    #[test]
    fn timestamp_parses_as_utc() {
        let ts = parse_timestamp("1970-01-02T00:00:00").unwrap();
        assert_eq!(ts.timestamp(), 86_400);
        assert_eq!(format_timestamp(&ts), "1970-01-02T00:00:00");
        assert!(parse_timestamp("2006-13-40T99:00:00").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = PolicyRecord::new(Rule::Access, "password", "Latas")
            .with_valid_from("2006-07-16T23:30:30")
            .with_users([IdentityId::new(1), IdentityId::new(2)]);
        let json = serde_json::to_string(&record).expect("serialize record");
        let back: PolicyRecord = serde_json::from_str(&json).expect("deserialize record");
        assert_eq!(back, record);
    }

    proptest! {
        #[test]
        fn epoch_conversion_is_reversible(seconds in 0_i64..4_102_444_800) {
            let ts = timestamp_from_epoch(seconds).unwrap();
            let text = format_timestamp(&ts);
            prop_assert_eq!(parse_timestamp(&text).unwrap().timestamp(), seconds);
        }
    }
}
