//! Validation and classification of caller-supplied numbers.

use numlease_types::{
    Carrier, CarrierFilter, FilterKind, LeaseError, PhoneNumber, Result, Segment,
    SegmentFilter, constants,
};

use crate::prefix::PrefixTable;

/// Detected classes of a valid number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub carrier: Carrier,
    pub segment: Segment,
}

/// Checks number format against a prefix table. Stateless apart from the
/// table it was built with.
#[derive(Debug, Clone, Default)]
pub struct PhoneValidator {
    table: PrefixTable,
}

impl PhoneValidator {
    #[must_use]
    pub fn new(table: PrefixTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &PrefixTable {
        &self.table
    }

    /// Classify `phone`, or `None` if it is not a valid number.
    ///
    /// Valid means: exactly eleven ASCII digits starting with a prefix that
    /// some carrier table contains.
    #[must_use]
    pub fn classify(&self, phone: &PhoneNumber) -> Option<Classification> {
        let digits = phone.as_str();
        if digits.len() != constants::PHONE_LENGTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let prefix = phone.prefix()?;
        let carrier = self.table.carrier_of(prefix)?;
        Some(Classification {
            carrier,
            segment: self.table.segment_of(prefix),
        })
    }

    #[must_use]
    pub fn is_valid(&self, phone: &PhoneNumber) -> bool {
        self.classify(phone).is_some()
    }

    /// Classify `phone`, failing with `InvalidPhoneFormat` if it is not valid.
    pub fn validate(&self, phone: &PhoneNumber) -> Result<Classification> {
        self.classify(phone)
            .ok_or_else(|| LeaseError::InvalidPhoneFormat(phone.clone()))
    }

    /// Validate `phone` and check it against the requested filters.
    ///
    /// Unrestricted filters always match.
    ///
    /// # Errors
    /// - `InvalidPhoneFormat` if the number is not valid
    /// - `FilterMismatch` naming the first filter that does not match
    pub fn check_filters(
        &self,
        phone: &PhoneNumber,
        carrier: CarrierFilter,
        segment: SegmentFilter,
    ) -> Result<Classification> {
        let class = self.validate(phone)?;
        if carrier.is_some_and(|c| c != class.carrier) {
            return Err(LeaseError::FilterMismatch {
                phone: phone.clone(),
                kind: FilterKind::Carrier,
            });
        }
        if segment.is_some_and(|s| s != class.segment) {
            return Err(LeaseError::FilterMismatch {
                phone: phone.clone(),
                kind: FilterKind::Segment,
            });
        }
        Ok(class)
    }
}
