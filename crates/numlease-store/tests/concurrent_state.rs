//! Many threads reserving, inserting, refunding and capturing through the
//! account → shard lock order, followed by a snapshot audit.

use std::sync::atomic::{AtomicUsize, Ordering};

use numlease_store::{InsertOutcome, Ledger, NumberBook, Snapshot};
use numlease_types::{AccountId, Carrier, Lease, LeaseError, LeaseStatus, PhoneNumber, Segment};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;

fn price() -> Decimal {
    Decimal::new(10, 2)
}

fn held_by(shard: &numlease_store::Shard, phone: &PhoneNumber, account: AccountId) -> bool {
    shard
        .leases
        .find(phone)
        .is_some_and(|l| l.is_active() && l.is_owned_by(account))
}

/// Reserve, then insert under the shard lock; refund on conflict.
fn try_lease(ledger: &Ledger, book: &NumberBook, account: AccountId, phone: &PhoneNumber) -> bool {
    ledger
        .with_account(account, |handle| {
            handle.reserve(price())?;
            let lease = Lease::new(
                phone.clone(),
                account,
                "p".into(),
                Carrier::Mobile,
                Segment::Normal,
                price(),
            );
            match book.with_phone(phone, |s| s.leases.insert_if_absent(lease)) {
                Ok(InsertOutcome::Inserted) => Ok(true),
                Ok(InsertOutcome::Conflict) => {
                    handle.refund(price());
                    Ok(false)
                }
                Err(e) => {
                    handle.refund(price());
                    Err(e)
                }
            }
        })
        .unwrap_or(false)
}

/// Remove the caller's own active lease and refund it.
fn try_release(ledger: &Ledger, book: &NumberBook, account: AccountId, phone: &PhoneNumber) {
    let _ = ledger.with_account(account, |handle| {
        let removed = book.with_phone(phone, |s| {
            if held_by(s, phone, account) {
                s.leases.remove(phone)
            } else {
                None
            }
        })?;
        if let Some(lease) = removed {
            handle.refund(lease.reserved_amount);
        }
        Ok::<(), LeaseError>(())
    });
}

/// Consume the caller's own active lease and capture its reservation.
fn try_consume(ledger: &Ledger, book: &NumberBook, account: AccountId, phone: &PhoneNumber) {
    let _ = ledger.with_account(account, |handle| {
        let captured = book.with_phone(phone, |s| {
            if held_by(s, phone, account) {
                s.leases.update_status(phone, LeaseStatus::Consumed).ok()
            } else {
                None
            }
        })?;
        if let Some(amount) = captured {
            handle.capture(amount);
        }
        Ok::<(), LeaseError>(())
    });
}

#[test]
fn concurrent_mutations_keep_reservations_consistent() {
    let ledger = Ledger::new();
    let book = NumberBook::new(8);
    let accounts: Vec<AccountId> = (0..6).map(|_| AccountId::new()).collect();
    for a in &accounts {
        ledger.deposit(*a, Decimal::new(500, 2)).unwrap();
    }
    let phones: Vec<PhoneNumber> = (0..12)
        .map(|n| PhoneNumber::new(format!("139000000{n:02}")))
        .collect();
    let consumed = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for (t, account) in accounts.iter().enumerate() {
            let (ledger, book, phones, consumed) = (&ledger, &book, &phones, &consumed);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                for _ in 0..300 {
                    let phone = &phones[rng.gen_range(0..phones.len())];
                    match rng.gen_range(0..10) {
                        0..=5 => {
                            try_lease(ledger, book, *account, phone);
                        }
                        6..=8 => try_release(ledger, book, *account, phone),
                        _ => {
                            try_consume(ledger, book, *account, phone);
                            consumed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    let snap = Snapshot::capture(&ledger, &book).unwrap();
    snap.audit().unwrap();

    // At most one record per phone, so at most one active lease.
    assert!(snap.leases.len() <= phones.len());

    // Funds only ever left through consumption, 0.10 at a time.
    let spent = Decimal::new(3000, 2) - snap.total_funds();
    let consumed_records = snap
        .leases
        .iter()
        .filter(|l| l.status == LeaseStatus::Consumed)
        .count();
    assert!(spent >= Decimal::ZERO);
    assert_eq!(spent % price(), Decimal::ZERO);
    assert!(spent / price() >= Decimal::from(consumed_records));
    assert!(consumed.load(Ordering::Relaxed) > 0);
}

#[test]
fn first_writer_wins_on_one_phone() {
    let ledger = Ledger::new();
    let book = NumberBook::new(4);
    let phone = PhoneNumber::new("13900000000");
    let accounts: Vec<AccountId> = (0..16).map(|_| AccountId::new()).collect();
    for a in &accounts {
        ledger.deposit(*a, price()).unwrap();
    }
    let winners = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for account in &accounts {
            let (ledger, book, phone, winners) = (&ledger, &book, &phone, &winners);
            s.spawn(move || {
                if try_lease(ledger, book, *account, phone) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    let owner = book.find(&phone).unwrap().unwrap().owner;
    for a in &accounts {
        let bal = ledger.balance(*a).unwrap();
        if *a == owner {
            assert_eq!(bal.reserved, price());
            assert_eq!(bal.available, Decimal::ZERO);
        } else {
            assert_eq!(bal.available, price());
            assert_eq!(bal.reserved, Decimal::ZERO);
        }
    }
    Snapshot::capture(&ledger, &book).unwrap().audit().unwrap();
}
