//! # Lease manager
//!
//! Orchestrates allocation, consumption, release and blacklisting over the
//! [`Ledger`] and the [`NumberBook`].
//!
//! ## Atomicity
//!
//! Every operation runs inside the caller's account lock
//! ([`Ledger::with_account`]) and, nested inside it, holds the shard lock of
//! one phone at a time ([`NumberBook::with_phone`]). Because every change to
//! a lease is made by its owner, holding the owner's account lock pins both
//! the account's balance and all of its leases for the whole operation.
//!
//! When a later step fails after funds were reserved, the reservation is
//! refunded before the error is returned, still under the account lock, so
//! no other operation ever observes the intermediate state.
//!
//! ## Money flow per operation
//!
//! ```text
//! allocate   available ──reserve──▶ reserved     (lease created)
//! release    reserved  ──refund───▶ available    (lease deleted)
//! blacklist  reserved  ──refund───▶ available    (own lease deleted)
//! consume    reserved  ──capture──▶ spent        (lease consumed)
//! ```

use std::sync::Arc;

use numlease_phone::{CandidateGenerator, CandidateSource, PhoneValidator, PrefixTable};
use numlease_store::{BlacklistInsert, InsertOutcome, Ledger, NumberBook, Snapshot};
use numlease_types::{
    AccountBalance, AccountId, Carrier, CarrierFilter, Lease, LeaseConfig, LeaseError,
    LeaseStatus, PhoneNumber, Project, ProjectId, Result, Segment, SegmentFilter,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::ProjectCatalog;
use crate::delivery::{CodeDelivery, SimulatedDelivery, SmsMessage};

/// A successful allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub phone: PhoneNumber,
    pub project: ProjectId,
    pub carrier: Carrier,
    pub segment: Segment,
    /// Price reserved for this lease.
    pub reserved_amount: Decimal,
    /// Free balance left after the reservation.
    pub balance: Decimal,
}

/// Result of polling an active lease for its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// The code arrived; the lease is consumed and its price spent.
    Delivered(SmsMessage),
    /// Nothing yet. The lease and its reservation are unchanged.
    Pending,
}

impl Delivery {
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Delivered(msg) => Some(&msg.code),
            Self::Pending => None,
        }
    }
}

enum Polled {
    Delivered { code: String, captured: Decimal },
    Pending,
}

/// The lease state machine over shared ledger and number-book state.
///
/// All methods take `&self`; share a manager across threads with `Arc`.
pub struct LeaseManager {
    config: LeaseConfig,
    ledger: Ledger,
    book: NumberBook,
    catalog: Arc<dyn ProjectCatalog>,
    candidates: Arc<dyn CandidateSource>,
    delivery: Arc<dyn CodeDelivery>,
    validator: PhoneValidator,
}

impl LeaseManager {
    /// Create a manager with empty state, the mainland prefix table and
    /// simulated delivery.
    #[must_use]
    pub fn new(config: LeaseConfig, catalog: Arc<dyn ProjectCatalog>) -> Self {
        let book = NumberBook::new(config.store_shards);
        Self::with_state(config, catalog, Ledger::new(), book)
    }

    /// Create a manager over existing state.
    #[must_use]
    pub fn with_state(
        config: LeaseConfig,
        catalog: Arc<dyn ProjectCatalog>,
        ledger: Ledger,
        book: NumberBook,
    ) -> Self {
        let delivery = Arc::new(SimulatedDelivery::from_config(&config));
        Self {
            config,
            ledger,
            book,
            catalog,
            candidates: Arc::new(CandidateGenerator::default()),
            delivery,
            validator: PhoneValidator::default(),
        }
    }

    /// Create a manager from a verified snapshot.
    pub fn from_snapshot(
        config: LeaseConfig,
        catalog: Arc<dyn ProjectCatalog>,
        snapshot: &Snapshot,
    ) -> Result<Self> {
        let (ledger, book) = snapshot.restore(config.store_shards)?;
        Ok(Self::with_state(config, catalog, ledger, book))
    }

    /// Replace the candidate source.
    #[must_use]
    pub fn with_candidates(mut self, candidates: Arc<dyn CandidateSource>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Replace the code delivery collaborator.
    #[must_use]
    pub fn with_delivery(mut self, delivery: Arc<dyn CodeDelivery>) -> Self {
        self.delivery = delivery;
        self
    }

    /// Use another numbering plan for both generation and validation.
    #[must_use]
    pub fn with_prefix_table(mut self, table: PrefixTable) -> Self {
        self.candidates = Arc::new(CandidateGenerator::new(table.clone()));
        self.validator = PhoneValidator::new(table);
        self
    }

    #[must_use]
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn book(&self) -> &NumberBook {
        &self.book
    }

    #[must_use]
    pub fn validator(&self) -> &PhoneValidator {
        &self.validator
    }

    // =================================================================
    // Lease operations
    // =================================================================

    /// Lease a random number matching the filters.
    ///
    /// # Errors
    /// - `UnknownProject`
    /// - `InsufficientBalance` if the free balance is below the unit price
    /// - `NoAvailableNumber` if every draw was blacklisted for the project
    ///   or already leased (the reservation is refunded)
    pub fn allocate_random(
        &self,
        account: AccountId,
        project: &ProjectId,
        carrier: CarrierFilter,
        segment: SegmentFilter,
    ) -> Result<Allocation> {
        let project = self.project(project)?;
        let price = project.unit_price;

        self.ledger.with_account(account, |acct| {
            acct.reserve(price)?;
            match self.place_random(account, &project, carrier, segment) {
                Ok(lease) => {
                    tracing::info!(
                        %account,
                        phone = %lease.phone,
                        project = %project.id,
                        reserved = %price,
                        "Random lease allocated"
                    );
                    Ok(allocation(&lease, acct.balance()))
                }
                Err(err) => {
                    acct.refund(price);
                    tracing::debug!(%account, project = %project.id, error = %err, "Random allocation failed");
                    Err(err)
                }
            }
        })
    }

    /// Lease a caller-chosen number.
    ///
    /// Succeeds even if the number is blacklisted for the project; the
    /// blacklist entry is removed as part of the allocation.
    ///
    /// # Errors
    /// - `UnknownProject`
    /// - `InvalidPhoneFormat`, or `FilterMismatch` when a filter is given
    ///   and the number is of another class
    /// - `InsufficientBalance`
    /// - `AlreadyLeased` if an active lease holds the number (refunded)
    pub fn allocate_specified(
        &self,
        account: AccountId,
        project: &ProjectId,
        phone: &PhoneNumber,
        carrier: CarrierFilter,
        segment: SegmentFilter,
    ) -> Result<Allocation> {
        let project = self.project(project)?;
        let class = self.validator.check_filters(phone, carrier, segment)?;
        let price = project.unit_price;

        self.ledger.with_account(account, |acct| {
            acct.reserve(price)?;
            let lease = Lease::new(
                phone.clone(),
                account,
                project.id.clone(),
                class.carrier,
                class.segment,
                price,
            );
            let placed = self
                .book
                .with_phone(phone, |shard| match shard.leases.insert_if_absent(lease) {
                    InsertOutcome::Inserted => {
                        Ok(shard.blacklist.remove(phone, &project.id).is_some())
                    }
                    InsertOutcome::Conflict => Err(LeaseError::AlreadyLeased(phone.clone())),
                })
                .and_then(|inner| inner);

            match placed {
                Ok(unblocked) => {
                    tracing::info!(
                        %account,
                        %phone,
                        project = %project.id,
                        reserved = %price,
                        unblocked,
                        "Specified lease allocated"
                    );
                    Ok(Allocation {
                        phone: phone.clone(),
                        project: project.id.clone(),
                        carrier: class.carrier,
                        segment: class.segment,
                        reserved_amount: price,
                        balance: acct.balance().available,
                    })
                }
                Err(err) => {
                    acct.refund(price);
                    tracing::debug!(%account, %phone, error = %err, "Specified allocation failed");
                    Err(err)
                }
            }
        })
    }

    /// Poll for the verification code of the caller's active lease.
    ///
    /// On delivery the lease is consumed and its reservation spent. When
    /// nothing has arrived the lease is left exactly as it was.
    ///
    /// # Errors
    /// - `NotFoundOrNotOwned` if the caller has no active lease on `phone`
    /// - `ProjectMismatch` if the lease was taken under another project
    pub fn consume(
        &self,
        account: AccountId,
        project: &ProjectId,
        phone: &PhoneNumber,
    ) -> Result<Delivery> {
        self.ledger.with_account(account, |acct| {
            let polled = self.book.with_phone(phone, |shard| -> Result<Polled> {
                let lease = shard
                    .leases
                    .find(phone)
                    .filter(|l| l.is_active() && l.is_owned_by(account))
                    .ok_or_else(|| LeaseError::NotFoundOrNotOwned(phone.clone()))?;
                if &lease.project != project {
                    return Err(LeaseError::ProjectMismatch {
                        phone: phone.clone(),
                        requested: project.clone(),
                        actual: lease.project.clone(),
                    });
                }
                let Some(code) = self.delivery.poll(lease) else {
                    return Ok(Polled::Pending);
                };
                let captured = shard.leases.update_status(phone, LeaseStatus::Consumed)?;
                Ok(Polled::Delivered { code, captured })
            })??;

            match polled {
                Polled::Pending => {
                    tracing::debug!(%account, %phone, "No code yet");
                    Ok(Delivery::Pending)
                }
                Polled::Delivered { code, captured } => {
                    acct.capture(captured);
                    tracing::info!(%account, %phone, %project, captured = %captured, "Code delivered");
                    Ok(Delivery::Delivered(SmsMessage::render(
                        &self.config.sms_template,
                        code,
                    )))
                }
            }
        })
    }

    /// Give back the caller's active lease and refund its reservation.
    ///
    /// # Errors
    /// Returns `NotFoundOrNotOwned` unless the caller holds an active lease
    /// on `phone` under `project`.
    pub fn release(&self, account: AccountId, project: &ProjectId, phone: &PhoneNumber) -> Result<()> {
        self.ledger.with_account(account, |acct| {
            let removed = self.book.with_phone(phone, |shard| {
                let held = shard.leases.find(phone).is_some_and(|l| {
                    l.is_active() && l.is_owned_by(account) && &l.project == project
                });
                if held { shard.leases.remove(phone) } else { None }
            })?;
            let lease = removed.ok_or_else(|| LeaseError::NotFoundOrNotOwned(phone.clone()))?;
            acct.refund(lease.reserved_amount);
            tracing::info!(%account, %phone, %project, refunded = %lease.reserved_amount, "Lease released");
            Ok(())
        })
    }

    /// Permanently exclude `phone` from random allocation within `project`.
    ///
    /// If the caller holds the number, that lease is removed and its
    /// reservation refunded in the same step. Leases of other accounts
    /// are not touched.
    ///
    /// # Errors
    /// - `InvalidPhoneFormat`
    /// - `AlreadyBlacklisted` if the pair is already excluded (nothing
    ///   changes, nothing is refunded)
    pub fn blacklist(&self, account: AccountId, project: &ProjectId, phone: &PhoneNumber) -> Result<()> {
        self.validator.validate(phone)?;

        self.ledger.with_account(account, |acct| {
            let released = self.book.with_phone(phone, |shard| {
                if shard.blacklist.insert(phone.clone(), project.clone(), account)
                    == BlacklistInsert::AlreadyPresent
                {
                    return Err(LeaseError::AlreadyBlacklisted {
                        phone: phone.clone(),
                        project: project.clone(),
                    });
                }
                let own = shard.leases.find(phone).is_some_and(|l| l.is_owned_by(account));
                Ok(if own { shard.leases.remove(phone) } else { None })
            })??;

            let refunded = released.map_or(Decimal::ZERO, |l| l.reserved_amount);
            acct.refund(refunded);
            tracing::info!(%account, %phone, %project, %refunded, "Phone blacklisted");
            Ok(())
        })
    }

    // =================================================================
    // Queries and funding
    // =================================================================

    /// The caller's active leases under `project`, sorted by phone.
    pub fn leases_for(&self, account: AccountId, project: &ProjectId) -> Result<Vec<Lease>> {
        self.book.find_by_owner_and_project(account, project)
    }

    /// The record for `phone`, in any state.
    pub fn lease(&self, phone: &PhoneNumber) -> Result<Option<Lease>> {
        self.book.find(phone)
    }

    /// Add funds to `account`.
    pub fn deposit(&self, account: AccountId, amount: Decimal) -> Result<AccountBalance> {
        let balance = self.ledger.deposit(account, amount)?;
        tracing::info!(%account, %amount, available = %balance.available, "Deposit");
        Ok(balance)
    }

    pub fn balance(&self, account: AccountId) -> Result<AccountBalance> {
        self.ledger.balance(account)
    }

    /// A consistent, digest-protected copy of all state.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::capture(&self.ledger, &self.book)
    }

    /// Check that every account's reserved total matches its active leases.
    pub fn audit(&self) -> Result<()> {
        self.snapshot()?.audit()
    }

    // =================================================================
    // Internals
    // =================================================================

    fn project(&self, id: &ProjectId) -> Result<Project> {
        self.catalog
            .lookup(id)
            .ok_or_else(|| LeaseError::UnknownProject(id.clone()))
    }

    /// Draw candidates until one is free. Must run under the account lock
    /// with the price already reserved.
    fn place_random(
        &self,
        account: AccountId,
        project: &Project,
        carrier: CarrierFilter,
        segment: SegmentFilter,
    ) -> Result<Lease> {
        let attempts = self.config.max_random_attempts;
        for attempt in 1..=attempts {
            let phone = self.candidates.draw(carrier, segment);
            let Some(class) = self.validator.classify(&phone) else {
                tracing::warn!(%phone, attempt, "Candidate source produced an invalid number");
                continue;
            };
            let lease = Lease::new(
                phone.clone(),
                account,
                project.id.clone(),
                class.carrier,
                class.segment,
                project.unit_price,
            );
            let placed = self.book.with_phone(&phone, |shard| {
                if shard.blacklist.contains(&phone, &project.id) {
                    return None;
                }
                match shard.leases.insert_if_absent(lease.clone()) {
                    InsertOutcome::Inserted => Some(lease),
                    InsertOutcome::Conflict => None,
                }
            })?;
            match placed {
                Some(lease) => return Ok(lease),
                None => tracing::debug!(%phone, attempt, "Candidate rejected"),
            }
        }
        Err(LeaseError::NoAvailableNumber { attempts })
    }
}

fn allocation(lease: &Lease, balance: &AccountBalance) -> Allocation {
    Allocation {
        phone: lease.phone.clone(),
        project: lease.project.clone(),
        carrier: lease.carrier,
        segment: lease.segment,
        reserved_amount: lease.reserved_amount,
        balance: balance.available,
    }
}
