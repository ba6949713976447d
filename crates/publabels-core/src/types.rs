//! Domain types for the label registry.
//!
//! Contains the fixed-width `Address` identifier, the `Role` and
//! `EntryState` enums, and the `Entry` / `PendingChange` records shared by
//! the change log, the entry store and the event log.

use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressParseError;

/// Position of a change in the pending-change log. Dense from 0.
pub type ChangeId = u64;

// ==============================================================================
// Address
// ==============================================================================

/// A 20-byte account or contract address.
///
/// Text form is `0x` followed by 40 hex digits. Parsing accepts mixed case,
/// display is always lowercase so the text form is canonical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .or_else(|| s.trim().strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ==============================================================================
// Roles
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Contributor,
    Verifier,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Contributor, Role::Verifier];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Contributor => write!(f, "contributor"),
            Self::Verifier => write!(f, "verifier"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}` (expected admin, contributor or verifier)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "contributor" => Ok(Self::Contributor),
            "verifier" => Ok(Self::Verifier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ==============================================================================
// Entries and Pending Changes
// ==============================================================================

/// Review state of an entry or pending change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    #[default]
    Unset,
    Pending,
    Verified,
    Rejected,
}

impl EntryState {
    /// Numeric code, stable across versions: 0 unset, 1 pending,
    /// 2 verified, 3 rejected.
    pub fn code(self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Pending => 1,
            Self::Verified => 2,
            Self::Rejected => 3,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A label together with its review state and proposer.
///
/// `Entry::default()` is what lookups return for identifiers that were
/// never published: empty label, `Unset`, zero submitter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub state: EntryState,
    pub submitter: Address,
}

/// One record of the pending-change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub change_id: ChangeId,
    pub identifier: Address,
    pub entry: Entry,
}

// ==============================================================================
// Paging
// ==============================================================================

/// Index range for a `(start, limit)` page over `len` items. Starts past
/// the end yield an empty range instead of an error.
pub(crate) fn page_range(len: usize, start: usize, limit: usize) -> Range<usize> {
    let begin = start.min(len);
    let end = begin.saturating_add(limit).min(len);
    begin..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_accepts_mixed_case_and_displays_lowercase() {
        let addr: Address = "0xAbCdEf0123456789abcdef0123456789ABCDEF01"
            .parse()
            .expect("valid address");
        assert_eq!(
            addr.to_string(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn address_parse_rejects_bad_input() {
        assert!(matches!(
            "abcdef0123456789abcdef0123456789abcdef01".parse::<Address>(),
            Err(AddressParseError::MissingPrefix)
        ));
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
        assert!(matches!(
            "0xzz00000000000000000000000000000000000000".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn address_serializes_as_string() {
        let addr = Address([0x11; 20]);
        let json = serde_json::to_string(&addr).expect("serialize address");
        assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");
        let back: Address = serde_json::from_str(&json).expect("deserialize address");
        assert_eq!(back, addr);
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().expect("parse role"), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn entry_state_codes_match_numbering() {
        assert_eq!(EntryState::Unset.code(), 0);
        assert_eq!(EntryState::Pending.code(), 1);
        assert_eq!(EntryState::Verified.code(), 2);
        assert_eq!(EntryState::Rejected.code(), 3);
        assert!(!EntryState::Pending.is_final());
        assert!(EntryState::Rejected.is_final());
    }

    #[test]
    fn page_range_clamps() {
        assert_eq!(page_range(3, 0, 2), 0..2);
        assert_eq!(page_range(3, 2, 2), 2..3);
        assert_eq!(page_range(3, 5, 2), 3..3);
        assert_eq!(page_range(3, 1, usize::MAX), 1..3);
        assert_eq!(page_range(0, 0, 10), 0..0);
    }
}
