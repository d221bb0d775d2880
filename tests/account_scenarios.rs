use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use micro_lending_rs::{
    AccountLifecycle, BorrowerFields, LendingError, MemoryStore, Money, PaymentStatus,
    SafeTimeProvider, StoreOp, TimeSource,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn clock() -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ))
}

fn fields(handle: &str, income: Decimal) -> BorrowerFields {
    BorrowerFields {
        first_name: "Jorge".to_string(),
        paternal_surname: "Ramírez".to_string(),
        maternal_surname: "Ortega".to_string(),
        age: 41,
        monthly_income: income,
        handle: handle.to_string(),
        credential: "7305".to_string(),
    }
}

fn setup() -> (Arc<MemoryStore>, Arc<AccountLifecycle<MemoryStore>>) {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = Arc::new(AccountLifecycle::standard(store.clone()));
    (store, lifecycle)
}

#[test]
fn test_full_account_lifecycle() {
    let (store, lifecycle) = setup();
    let time = clock();

    let quote = lifecycle.decide_credit_str("50,000.00").unwrap();
    assert_eq!(quote.installment, Money::from_major(15_900));

    let id = lifecycle.register(&fields("jorge", dec!(50000)), &time).unwrap();
    let payments = lifecycle.list_payments(id).unwrap();
    assert_eq!(payments.len(), 12);
    assert_eq!(payments[0].due_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert_eq!(payments[1].due_date, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
    for pair in payments.windows(2) {
        assert_eq!((pair[1].due_date - pair[0].due_date).num_days(), 15);
    }

    // settle one by one
    for payment in &payments {
        assert!(matches!(
            lifecycle.delete_cascade(id, &time),
            Err(LendingError::SettlementRequired { .. })
        ));
        lifecycle.mark_paid(payment.id, &time).unwrap();
    }
    assert!(lifecycle.all_settled(id).unwrap());

    lifecycle.delete_cascade(id, &time).unwrap();
    assert_eq!(store.borrower_count(), 0);
    assert_eq!(store.credit_offer_count(), 0);
    assert_eq!(store.payment_count(), 0);
}

#[test]
fn test_denied_incomes_persist_nothing() {
    let (store, lifecycle) = setup();
    let time = clock();

    for (handle, income) in [("a", dec!(1799.99)), ("b", dec!(100000)), ("c", dec!(1000))] {
        assert!(matches!(
            lifecycle.register(&fields(handle, income), &time),
            Err(LendingError::CreditDenied { .. })
        ));
    }
    assert_eq!(store.borrower_count(), 0);
    assert_eq!(store.payment_count(), 0);
}

#[test]
fn test_every_storage_fault_rolls_back_registration() {
    let ops = [
        StoreOp::FindBorrower,
        StoreOp::InsertBorrower,
        StoreOp::InsertCreditOffer,
        StoreOp::InsertPayments,
        StoreOp::Commit,
    ];

    for op in ops {
        let (store, lifecycle) = setup();
        store.fail_on(op);

        let result = lifecycle.register(&fields("jorge", dec!(25000)), &clock());
        assert_eq!(
            result,
            Err(LendingError::Lifecycle {
                message: "technical failure".to_string()
            }),
            "fault on {op:?}"
        );
        assert_eq!(store.borrower_count(), 0, "fault on {op:?}");
        assert_eq!(store.credit_offer_count(), 0, "fault on {op:?}");
        assert_eq!(store.payment_count(), 0, "fault on {op:?}");
    }
}

#[test]
fn test_concurrent_registration_same_handle() {
    let (store, lifecycle) = setup();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    let time = clock();
                    barrier.wait();
                    lifecycle.register(&fields("shared", dec!(20000)), &time)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(LendingError::DuplicateUser { .. }))));
    assert_eq!(store.borrower_count(), 1);
    assert_eq!(store.credit_offer_count(), 1);
    assert_eq!(store.payment_count(), 12);
}

#[test]
fn test_concurrent_registrations_distinct_handles() {
    let (store, lifecycle) = setup();
    let threads = 6;
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for n in 0..threads {
            let lifecycle = &lifecycle;
            let barrier = &barrier;
            s.spawn(move || {
                let time = clock();
                barrier.wait();
                lifecycle
                    .register(&fields(&format!("user{n}"), dec!(8000)), &time)
                    .unwrap();
            });
        }
    });

    assert_eq!(store.borrower_count(), threads);
    assert_eq!(store.payment_count(), threads * 12);
}

#[test]
fn test_delete_racing_final_payment_never_orphans() {
    for _ in 0..20 {
        let (store, lifecycle) = setup();
        let time = clock();
        let id = lifecycle.register(&fields("jorge", dec!(6000)), &time).unwrap();
        let payments = lifecycle.list_payments(id).unwrap();
        let (last, rest) = payments.split_last().unwrap();
        for payment in rest {
            lifecycle.mark_paid(payment.id, &time).unwrap();
        }

        let barrier = Barrier::new(2);
        let (paid, deleted) = thread::scope(|s| {
            let payer = s.spawn(|| {
                let time = clock();
                barrier.wait();
                lifecycle.mark_paid(last.id, &time)
            });
            let deleter = s.spawn(|| {
                let time = clock();
                barrier.wait();
                lifecycle.delete_cascade(id, &time)
            });
            (payer.join().unwrap(), deleter.join().unwrap())
        });

        assert!(paid.is_ok());
        match deleted {
            // delete ran first and saw the pending installment
            Err(LendingError::SettlementRequired { pending: 1, .. }) => {
                assert_eq!(store.borrower_count(), 1);
                assert_eq!(store.payment_count(), 12);
                assert!(lifecycle
                    .list_payments(id)
                    .unwrap()
                    .iter()
                    .all(|p| p.status == PaymentStatus::Paid));
            }
            Ok(()) => {
                assert_eq!(store.borrower_count(), 0);
                assert_eq!(store.payment_count(), 0);
            }
            other => panic!("unexpected delete outcome: {other:?}"),
        }
    }
}
