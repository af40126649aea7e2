//! Carrier and segment classes of a phone number, and the request filters
//! built from them.
//!
//! Clients send filters as small integer codes: `0` means unrestricted,
//! anything else selects one class. A filter is therefore an
//! `Option<Carrier>` / `Option<Segment>`, where `None` is unrestricted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FilterKind, LeaseError, Result};

/// The network operator a number prefix is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Mobile,
    Unicom,
    Telecom,
}

impl Carrier {
    pub const ALL: [Self; 3] = [Self::Mobile, Self::Unicom, Self::Telecom];

    /// Wire code of this carrier (1, 2, 3).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Mobile => 1,
            Self::Unicom => 2,
            Self::Telecom => 3,
        }
    }

    /// Parse a carrier filter code. `0` is unrestricted.
    pub fn filter_from_code(code: u8) -> Result<Option<Self>> {
        match code {
            0 => Ok(None),
            1 => Ok(Some(Self::Mobile)),
            2 => Ok(Some(Self::Unicom)),
            3 => Ok(Some(Self::Telecom)),
            _ => Err(LeaseError::InvalidFilter {
                kind: FilterKind::Carrier,
                code,
            }),
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mobile => write!(f, "MOBILE"),
            Self::Unicom => write!(f, "UNICOM"),
            Self::Telecom => write!(f, "TELECOM"),
        }
    }
}

/// Whether a prefix belongs to an ordinary or a virtual-operator segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Normal,
    Virtual,
}

impl Segment {
    pub const ALL: [Self; 2] = [Self::Normal, Self::Virtual];

    /// Wire code of this segment (1, 2).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::Virtual => 2,
        }
    }

    /// Parse a segment filter code. `0` is unrestricted.
    pub fn filter_from_code(code: u8) -> Result<Option<Self>> {
        match code {
            0 => Ok(None),
            1 => Ok(Some(Self::Normal)),
            2 => Ok(Some(Self::Virtual)),
            _ => Err(LeaseError::InvalidFilter {
                kind: FilterKind::Segment,
                code,
            }),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Virtual => write!(f, "VIRTUAL"),
        }
    }
}

/// Requested carrier class; `None` is unrestricted.
pub type CarrierFilter = Option<Carrier>;

/// Requested segment class; `None` is unrestricted.
pub type SegmentFilter = Option<Segment>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_codes_roundtrip() {
        assert_eq!(Carrier::filter_from_code(0).unwrap(), None);
        for carrier in Carrier::ALL {
            assert_eq!(
                Carrier::filter_from_code(carrier.code()).unwrap(),
                Some(carrier)
            );
        }
    }

    #[test]
    fn unknown_carrier_code_rejected() {
        let err = Carrier::filter_from_code(4).unwrap_err();
        assert_eq!(
            err,
            LeaseError::InvalidFilter {
                kind: FilterKind::Carrier,
                code: 4
            }
        );
    }

    #[test]
    fn segment_codes() {
        assert_eq!(Segment::filter_from_code(0).unwrap(), None);
        assert_eq!(Segment::filter_from_code(2).unwrap(), Some(Segment::Virtual));
        assert!(matches!(
            Segment::filter_from_code(3),
            Err(LeaseError::InvalidFilter {
                kind: FilterKind::Segment,
                ..
            })
        ));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Carrier::Unicom).unwrap();
        assert_eq!(json, "\"unicom\"");
        let back: Segment = serde_json::from_str("\"virtual\"").unwrap();
        assert_eq!(back, Segment::Virtual);
    }
}
