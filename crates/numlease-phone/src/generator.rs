//! Candidate number generation.
//!
//! A candidate is a random number whose prefix fits the requested filters.
//! Generation has no memory: it does not know which numbers are leased or
//! blacklisted, so callers must check every candidate.

use numlease_types::{CarrierFilter, PhoneNumber, SegmentFilter, constants};
use rand::Rng;

use crate::prefix::PrefixTable;

/// Something that proposes candidate numbers for allocation.
pub trait CandidateSource: Send + Sync {
    /// Propose one number matching the filters.
    fn draw(&self, carrier: CarrierFilter, segment: SegmentFilter) -> PhoneNumber;
}

/// Draws a prefix uniformly from the qualifying set, then eight
/// independent uniform digits.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    table: PrefixTable,
}

impl CandidateGenerator {
    #[must_use]
    pub fn new(table: PrefixTable) -> Self {
        Self { table }
    }

    /// Generate one candidate using the supplied RNG.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        carrier: CarrierFilter,
        segment: SegmentFilter,
    ) -> PhoneNumber {
        let prefixes = self.table.candidates(carrier, segment);
        let mut number = String::with_capacity(constants::PHONE_LENGTH);
        if !prefixes.is_empty() {
            number.push_str(prefixes[rng.gen_range(0..prefixes.len())]);
        }
        while number.len() < constants::PHONE_LENGTH {
            number.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }
        PhoneNumber::new(number)
    }
}

impl CandidateSource for CandidateGenerator {
    fn draw(&self, carrier: CarrierFilter, segment: SegmentFilter) -> PhoneNumber {
        self.generate(&mut rand::thread_rng(), carrier, segment)
    }
}

/// Deterministic candidate source cycling through a fixed list, ignoring
/// filters. Used to restrict the candidate space in tests.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug)]
pub struct FixedCandidates {
    numbers: Vec<PhoneNumber>,
    next: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-helpers"))]
impl FixedCandidates {
    /// # Panics
    /// Panics if `numbers` is empty.
    pub fn new<I, P>(numbers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PhoneNumber>,
    {
        let numbers: Vec<PhoneNumber> = numbers.into_iter().map(Into::into).collect();
        assert!(!numbers.is_empty(), "FixedCandidates needs at least one number");
        Self {
            numbers,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Total draws so far.
    pub fn draws(&self) -> usize {
        self.next.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl CandidateSource for FixedCandidates {
    fn draw(&self, _carrier: CarrierFilter, _segment: SegmentFilter) -> PhoneNumber {
        let n = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.numbers[n % self.numbers.len()].clone()
    }
}
