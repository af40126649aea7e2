//! Carrier and segment prefix tables.
//!
//! A number's first three digits decide its carrier and segment. Some
//! prefixes appear both in a carrier table and in the virtual-operator
//! table; those are virtual numbers resold on that carrier's network.
//! Virtual prefixes that belong to no carrier table are not recognized.

use std::collections::BTreeSet;

use numlease_types::{
    Carrier, CarrierFilter, LeaseError, Result, Segment, SegmentFilter, constants,
};

const MAINLAND_MOBILE: &[&str] = &[
    "134", "135", "136", "137", "138", "139", "150", "151", "152", "157", "158", "159", "182",
    "183", "184", "187", "188", "178", "147", "172", "198",
];

const MAINLAND_UNICOM: &[&str] = &[
    "130", "131", "132", "155", "156", "185", "186", "166", "145", "175", "176", "171",
];

const MAINLAND_TELECOM: &[&str] = &[
    "133", "153", "177", "173", "180", "181", "189", "199", "149",
];

const MAINLAND_VIRTUAL: &[&str] = &[
    "170", "171", "165", "167", "162", "174", "191", "192", "195", "196", "197", "198", "199",
];

/// Prefix tables for one numbering plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    mobile: Vec<String>,
    unicom: Vec<String>,
    telecom: Vec<String>,
    virtual_segment: BTreeSet<String>,
}

impl PrefixTable {
    /// Build a table, dropping duplicate prefixes within each carrier list.
    ///
    /// # Errors
    /// Returns `Configuration` if any prefix is not exactly three ASCII
    /// digits or any carrier has no prefixes at all.
    pub fn new<S: AsRef<str>>(
        mobile: &[S],
        unicom: &[S],
        telecom: &[S],
        virtual_segment: &[S],
    ) -> Result<Self> {
        let table = Self {
            mobile: dedup(mobile)?,
            unicom: dedup(unicom)?,
            telecom: dedup(telecom)?,
            virtual_segment: dedup(virtual_segment)?.into_iter().collect(),
        };
        for carrier in Carrier::ALL {
            if table.carrier_prefixes(carrier).is_empty() {
                return Err(LeaseError::Configuration(format!(
                    "prefix table has no prefixes for {carrier}"
                )));
            }
        }
        Ok(table)
    }

    /// The mainland-China mobile numbering plan.
    #[must_use]
    pub fn mainland() -> Self {
        let own = |list: &[&str]| list.iter().map(|p| (*p).to_string()).collect::<Vec<_>>();
        Self {
            mobile: own(MAINLAND_MOBILE),
            unicom: own(MAINLAND_UNICOM),
            telecom: own(MAINLAND_TELECOM),
            virtual_segment: MAINLAND_VIRTUAL.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// All prefixes assigned to `carrier`, in table order.
    #[must_use]
    pub fn carrier_prefixes(&self, carrier: Carrier) -> &[String] {
        match carrier {
            Carrier::Mobile => &self.mobile,
            Carrier::Unicom => &self.unicom,
            Carrier::Telecom => &self.telecom,
        }
    }

    /// First carrier whose table contains `prefix` (Mobile, Unicom, Telecom).
    #[must_use]
    pub fn carrier_of(&self, prefix: &str) -> Option<Carrier> {
        Carrier::ALL
            .into_iter()
            .find(|c| self.carrier_prefixes(*c).iter().any(|p| p == prefix))
    }

    #[must_use]
    pub fn segment_of(&self, prefix: &str) -> Segment {
        if self.virtual_segment.contains(prefix) {
            Segment::Virtual
        } else {
            Segment::Normal
        }
    }

    /// Prefixes a generator may draw from for the given filters.
    ///
    /// A specific carrier with an unrestricted segment means that carrier's
    /// normal prefixes. When a filter combination selects nothing, the
    /// carrier's full list (or every carrier prefix) is used instead.
    /// Never empty for a table built through [`PrefixTable::new`].
    #[must_use]
    pub fn candidates(&self, carrier: CarrierFilter, segment: SegmentFilter) -> Vec<&str> {
        let base: Vec<&str> = match carrier {
            Some(c) => self.carrier_prefixes(c).iter().map(String::as_str).collect(),
            None => Carrier::ALL
                .into_iter()
                .flat_map(|c| self.carrier_prefixes(c).iter().map(String::as_str))
                .collect(),
        };
        let wanted = match (carrier, segment) {
            (None, None) => return base,
            (_, Some(Segment::Virtual)) => Segment::Virtual,
            _ => Segment::Normal,
        };
        let filtered: Vec<&str> = base
            .iter()
            .copied()
            .filter(|p| self.segment_of(p) == wanted)
            .collect();
        if filtered.is_empty() { base } else { filtered }
    }
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::mainland()
    }
}

fn dedup<S: AsRef<str>>(prefixes: &[S]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let prefix = prefix.as_ref();
        if prefix.len() != constants::PREFIX_LENGTH || !prefix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(LeaseError::Configuration(format!(
                "invalid prefix {prefix:?}: expected {} digits",
                constants::PREFIX_LENGTH
            )));
        }
        if !out.iter().any(|p| p == prefix) {
            out.push(prefix.to_string());
        }
    }
    Ok(out)
}
