//! # Lease service
//!
//! Async facade in front of the [`LeaseManager`]. Every call goes through
//! the same pipeline:
//!
//! ```text
//! credential ──▶ rate limit ──▶ admission gate ──▶ blocking pool ──▶ Outcome
//! ```
//!
//! The manager runs on `spawn_blocking` with the admission permit moved into
//! the task, so a caller that stops awaiting does not cut an operation short
//! and the permit is returned only when the work is done.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use numlease_core::{Allocation, Delivery, InMemoryCatalog, LeaseManager};
use numlease_store::Snapshot;
use numlease_types::{
    AccountBalance, AccountId, Carrier, LeaseConfig, LeaseError, PhoneNumber, Project, ProjectId,
    Result, Segment,
};
use rust_decimal::Decimal;

use crate::gate::AdmissionGate;
use crate::outcome::Outcome;
use crate::rate_limit::RateLimiter;
use crate::session::SessionResolver;

/// The lease operations as a transport would call them.
#[derive(Clone)]
pub struct LeaseService {
    manager: Arc<LeaseManager>,
    catalog: Arc<InMemoryCatalog>,
    sessions: Arc<dyn SessionResolver>,
    limiter: Option<Arc<Mutex<RateLimiter>>>,
    gate: AdmissionGate,
}

impl LeaseService {
    /// Wire a service around an existing manager. Gate capacity and rate
    /// limit come from the manager's configuration.
    #[must_use]
    pub fn new(
        manager: Arc<LeaseManager>,
        catalog: Arc<InMemoryCatalog>,
        sessions: Arc<dyn SessionResolver>,
    ) -> Self {
        let config = manager.config();
        let gate = AdmissionGate::new(config.admission_permits);
        let limiter = config
            .rate_limit
            .map(|limit| Arc::new(Mutex::new(RateLimiter::new(limit))));
        Self {
            manager,
            catalog,
            sessions,
            limiter,
            gate,
        }
    }

    /// Build manager and service from configuration alone.
    #[must_use]
    pub fn from_config(
        config: LeaseConfig,
        catalog: Arc<InMemoryCatalog>,
        sessions: Arc<dyn SessionResolver>,
    ) -> Self {
        let manager = LeaseManager::new(config, catalog.clone());
        Self::new(Arc::new(manager), catalog, sessions)
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<LeaseManager> {
        &self.manager
    }

    #[must_use]
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Lease a random number. Filter code 0 means "any".
    pub async fn get_phone(
        &self,
        credential: &str,
        project: &str,
        carrier: u8,
        segment: u8,
    ) -> Outcome<Allocation> {
        let project = ProjectId::new(project);
        let result = async {
            let account = self.admit_caller(credential)?;
            let carrier = Carrier::filter_from_code(carrier)?;
            let segment = Segment::filter_from_code(segment)?;
            self.run(move |mgr| mgr.allocate_random(account, &project, carrier, segment))
                .await
        }
        .await;
        Outcome::from_result(result, "phone leased")
    }

    /// Lease a caller-chosen number.
    pub async fn get_specified_phone(
        &self,
        credential: &str,
        project: &str,
        phone: &str,
        carrier: u8,
        segment: u8,
    ) -> Outcome<Allocation> {
        let project = ProjectId::new(project);
        let phone = PhoneNumber::new(phone);
        let result = async {
            let account = self.admit_caller(credential)?;
            let carrier = Carrier::filter_from_code(carrier)?;
            let segment = Segment::filter_from_code(segment)?;
            self.run(move |mgr| {
                mgr.allocate_specified(account, &project, &phone, carrier, segment)
            })
            .await
        }
        .await;
        Outcome::from_result(result, "phone leased")
    }

    /// Poll a leased number for its verification code.
    pub async fn get_sms_code(&self, credential: &str, project: &str, phone: &str) -> Outcome<Delivery> {
        let project = ProjectId::new(project);
        let phone = PhoneNumber::new(phone);
        let result = async {
            let account = self.admit_caller(credential)?;
            self.run(move |mgr| mgr.consume(account, &project, &phone)).await
        }
        .await;
        let message = match &result {
            Ok(Delivery::Pending) => "no code yet",
            _ => "code delivered",
        };
        Outcome::from_result(result, message)
    }

    /// Give a leased number back.
    pub async fn release_phone(&self, credential: &str, project: &str, phone: &str) -> Outcome<()> {
        let project = ProjectId::new(project);
        let phone = PhoneNumber::new(phone);
        let result = async {
            let account = self.admit_caller(credential)?;
            self.run(move |mgr| mgr.release(account, &project, &phone)).await
        }
        .await;
        Outcome::from_result(result, "phone released")
    }

    /// Exclude a number from random allocation for a project.
    pub async fn blacklist_phone(&self, credential: &str, project: &str, phone: &str) -> Outcome<()> {
        let project = ProjectId::new(project);
        let phone = PhoneNumber::new(phone);
        let result = async {
            let account = self.admit_caller(credential)?;
            self.run(move |mgr| mgr.blacklist(account, &project, &phone)).await
        }
        .await;
        Outcome::from_result(result, "phone blacklisted")
    }

    pub async fn balance(&self, credential: &str) -> Outcome<AccountBalance> {
        let result = async {
            let account = self.admit_caller(credential)?;
            self.run(move |mgr| mgr.balance(account)).await
        }
        .await;
        Outcome::from_result(result, "balance")
    }

    /// Add funds to the caller's account.
    pub async fn recharge(&self, credential: &str, amount: Decimal) -> Outcome<AccountBalance> {
        let result = async {
            let account = self.admit_caller(credential)?;
            self.run(move |mgr| mgr.deposit(account, amount)).await
        }
        .await;
        Outcome::from_result(result, "recharged")
    }

    /// Projects matching an exact id and/or a name fragment.
    pub async fn search_projects(
        &self,
        credential: &str,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Outcome<Vec<Project>> {
        let result = self
            .admit_caller(credential)
            .and_then(|_| self.catalog.search(id.map(ProjectId::new).as_ref(), name));
        Outcome::from_result(result, "projects")
    }

    /// Consistent dump of all lease state.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.run(LeaseManager::snapshot).await
    }

    /// Resolve the credential and charge one call to the account's window.
    fn admit_caller(&self, credential: &str) -> Result<AccountId> {
        let account = self.sessions.resolve(credential)?;
        if let Some(limiter) = &self.limiter {
            let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
            limiter.lock()?.check_and_record(account, now_ms)?;
        }
        Ok(account)
    }

    /// Run `op` on the blocking pool under an admission permit.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LeaseManager) -> Result<T> + Send + 'static,
    {
        let admission = self.gate.try_admit()?;
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || {
            let _admission = admission;
            op(&manager)
        })
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "Lease operation task failed");
            LeaseError::Internal(format!("lease task failed: {err}"))
        })?
    }
}
