//! Per-account balances with available/reserved accounting.
//!
//! Every account sits behind its own mutex, so operations on different
//! accounts never contend. The outer map is only write-locked when an
//! account is seen for the first time.
//!
//! Money only moves in three ways:
//! - **reserve**: available → reserved, if available covers it
//! - **refund**: reserved → available
//! - **capture**: reserved → spent
//!
//! Deposits are the only way funds enter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use numlease_types::{AccountBalance, AccountId, LeaseError, Result};
use rust_decimal::Decimal;
use tracing::warn;

type Slot = Arc<Mutex<AccountBalance>>;

/// The source of truth for account balances.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: RwLock<HashMap<AccountId, Slot>>,
}

/// Exclusive access to one account for the duration of a
/// [`Ledger::with_account`] closure.
#[derive(Debug)]
pub struct AccountHandle<'a> {
    account: AccountId,
    balance: &'a mut AccountBalance,
}

impl AccountHandle<'_> {
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    #[must_use]
    pub fn balance(&self) -> &AccountBalance {
        self.balance
    }

    /// Move `amount` from available to reserved.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if available < amount. The balance is
    /// left unchanged.
    pub fn reserve(&mut self, amount: Decimal) -> Result<()> {
        if self.balance.available < amount {
            return Err(LeaseError::InsufficientBalance {
                needed: amount,
                available: self.balance.available,
            });
        }
        let reserved = self
            .balance
            .reserved
            .checked_add(amount)
            .ok_or(LeaseError::InvalidAmount(amount))?;
        self.balance.available -= amount;
        self.balance.reserved = reserved;
        Ok(())
    }

    /// Move `amount` from reserved back to available. Never fails.
    ///
    /// Refunding more than is reserved means a lease and the ledger
    /// disagree; the refund still goes through and `reserved` stops at zero.
    pub fn refund(&mut self, amount: Decimal) {
        if self.balance.reserved < amount {
            warn!(
                account = %self.account,
                %amount,
                reserved = %self.balance.reserved,
                "Refund exceeds reserved total"
            );
            self.balance.reserved = Decimal::ZERO;
        } else {
            self.balance.reserved -= amount;
        }
        self.balance.available = self.balance.available.checked_add(amount).unwrap_or_else(|| {
            warn!(account = %self.account, %amount, "Refund overflows available; capped");
            Decimal::MAX
        });
    }

    /// Add `amount` to available, keeping `available + reserved` representable.
    fn credit(&mut self, amount: Decimal) -> Result<()> {
        let available = self
            .balance
            .available
            .checked_add(amount)
            .filter(|a| a.checked_add(self.balance.reserved).is_some())
            .ok_or(LeaseError::InvalidAmount(amount))?;
        self.balance.available = available;
        Ok(())
    }

    /// Spend `amount` of the reserved total. Available is untouched.
    pub fn capture(&mut self, amount: Decimal) {
        if self.balance.reserved < amount {
            warn!(
                account = %self.account,
                %amount,
                reserved = %self.balance.reserved,
                "Capture exceeds reserved total"
            );
            self.balance.reserved = Decimal::ZERO;
        } else {
            self.balance.reserved -= amount;
        }
    }
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from exported balances.
    #[must_use]
    pub fn from_balances(balances: impl IntoIterator<Item = (AccountId, AccountBalance)>) -> Self {
        let accounts = balances
            .into_iter()
            .map(|(id, balance)| (id, Arc::new(Mutex::new(balance))))
            .collect();
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Register `account` with an opening balance.
    ///
    /// Returns `false` and leaves the account alone if it already exists.
    ///
    /// # Errors
    /// Returns `InvalidAmount` for a negative opening balance.
    pub fn open_account(&self, account: AccountId, opening: Decimal) -> Result<bool> {
        if opening < Decimal::ZERO {
            return Err(LeaseError::InvalidAmount(opening));
        }
        let mut accounts = self.accounts.write()?;
        if accounts.contains_key(&account) {
            return Ok(false);
        }
        accounts.insert(account, Arc::new(Mutex::new(AccountBalance::funded(opening))));
        Ok(true)
    }

    /// Add funds to `account`, opening it if needed.
    ///
    /// # Errors
    /// Returns `InvalidAmount` unless `amount` is strictly positive, or if
    /// the resulting balance would not be representable. The balance is
    /// left unchanged on error.
    pub fn deposit(&self, account: AccountId, amount: Decimal) -> Result<AccountBalance> {
        if amount <= Decimal::ZERO {
            return Err(LeaseError::InvalidAmount(amount));
        }
        self.with_account(account, |handle| {
            handle.credit(amount)?;
            Ok(handle.balance.clone())
        })
    }

    /// Current balance. Unknown accounts read as zero.
    pub fn balance(&self, account: AccountId) -> Result<AccountBalance> {
        let slot = self.accounts.read()?.get(&account).cloned();
        match slot {
            Some(slot) => Ok(slot.lock()?.clone()),
            None => Ok(AccountBalance::default()),
        }
    }

    /// Reserve `amount` on `account`.
    pub fn reserve(&self, account: AccountId, amount: Decimal) -> Result<()> {
        self.with_account(account, |handle| handle.reserve(amount))
    }

    /// Refund `amount` to `account`.
    pub fn refund(&self, account: AccountId, amount: Decimal) -> Result<()> {
        self.with_account(account, |handle| {
            handle.refund(amount);
            Ok(())
        })
    }

    /// Capture `amount` of `account`'s reservation.
    pub fn capture(&self, account: AccountId, amount: Decimal) -> Result<()> {
        self.with_account(account, |handle| {
            handle.capture(amount);
            Ok(())
        })
    }

    /// Run `f` while holding `account`'s lock.
    ///
    /// Every ledger call on the same account made by other threads waits
    /// until `f` returns. Unknown accounts are opened with a zero balance.
    pub fn with_account<T>(
        &self,
        account: AccountId,
        f: impl FnOnce(&mut AccountHandle<'_>) -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot(account)?;
        let mut guard = slot.lock()?;
        let mut handle = AccountHandle {
            account,
            balance: &mut *guard,
        };
        f(&mut handle)
    }

    /// Known account ids, sorted.
    pub fn accounts(&self) -> Result<Vec<AccountId>> {
        let mut ids: Vec<AccountId> = self.accounts.read()?.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Total funds held across all accounts (available + reserved),
    /// saturating at `Decimal::MAX`.
    pub fn total_funds(&self) -> Result<Decimal> {
        let slots: Vec<Slot> = self.accounts.read()?.values().cloned().collect();
        let mut total = Decimal::ZERO;
        for slot in slots {
            total = total.saturating_add(slot.lock()?.total());
        }
        Ok(total)
    }

    /// Run `f` over a copy of every balance while no account can change.
    ///
    /// Holds the account map read lock (no account can be opened) and
    /// every account lock, taken in id order, until `f` returns.
    pub fn with_all_accounts<T>(
        &self,
        f: impl FnOnce(BTreeMap<AccountId, AccountBalance>) -> Result<T>,
    ) -> Result<T> {
        let accounts = self.accounts.read()?;
        let mut ordered: Vec<(&AccountId, &Slot)> = accounts.iter().collect();
        ordered.sort_unstable_by_key(|(id, _)| **id);

        let mut guards: Vec<(AccountId, MutexGuard<'_, AccountBalance>)> =
            Vec::with_capacity(ordered.len());
        for (id, slot) in ordered {
            guards.push((*id, slot.lock()?));
        }
        let balances = guards
            .iter()
            .map(|(id, guard)| (*id, (**guard).clone()))
            .collect();
        f(balances)
    }

    fn slot(&self, account: AccountId) -> Result<Slot> {
        if let Some(slot) = self.accounts.read()?.get(&account) {
            return Ok(Arc::clone(slot));
        }
        let mut accounts = self.accounts.write()?;
        Ok(Arc::clone(accounts.entry(account).or_default()))
    }
}
