use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{error, info};

use crate::config::ScheduleConfig;
use crate::errors::{LendingError, Result};
use crate::store::{LockKey, PersistentStore, StoreError, StoreResult, UnitOfWork};
use crate::types::{BorrowerId, CreditDecision, NewPayment, Payment, PaymentId, PaymentStatus};

/// scheduled payments and their settlement state
pub struct PaymentLedger<S> {
    store: Arc<S>,
    schedule: ScheduleConfig,
}

/// installments for a decision: `months` rows, `spacing_days` apart, all pending
pub fn build_schedule(
    decision: &CreditDecision,
    start_date: NaiveDate,
    spacing_days: u32,
) -> Vec<NewPayment> {
    (0..decision.months)
        .map(|k| NewPayment {
            due_date: start_date + Duration::days(i64::from(spacing_days) * i64::from(k)),
            amount: decision.installment,
            status: PaymentStatus::Pending,
        })
        .collect()
}

/// log the storage cause and replace it with an opaque ledger error
fn ledger_fault(operation: &'static str) -> impl Fn(StoreError) -> LendingError {
    move |err| {
        error!(operation, error = %err, "ledger storage failure");
        LendingError::ledger_fault()
    }
}

impl<S: PersistentStore> PaymentLedger<S> {
    pub fn new(store: Arc<S>, schedule: ScheduleConfig) -> Self {
        Self { store, schedule }
    }

    /// insert the installment rows inside the caller's unit of work
    pub fn initialize_schedule(
        &self,
        uow: &mut dyn UnitOfWork,
        borrower_id: BorrowerId,
        decision: &CreditDecision,
        start_date: NaiveDate,
    ) -> StoreResult<Vec<Payment>> {
        let rows = build_schedule(decision, start_date, self.schedule.spacing_days);
        uow.insert_payments(borrower_id, rows)
    }

    /// unsettled installments, read inside the caller's unit of work
    pub fn unsettled_in(&self, uow: &mut dyn UnitOfWork, borrower_id: BorrowerId) -> StoreResult<usize> {
        uow.count_unsettled(borrower_id)
    }

    /// mark one installment paid; re-marking a paid installment succeeds
    ///
    /// Returns the owning borrower.
    pub fn mark_paid(&self, payment_id: PaymentId) -> Result<BorrowerId> {
        let fault = ledger_fault("mark_paid");

        let owner = self
            .store
            .unit_of_work(&[], |uow| uow.find_payment_owner(payment_id).map_err(&fault))
            .map_err(|e| e.into_inner(&fault))?
            .ok_or(LendingError::PaymentNotFound { id: payment_id })?;

        self.store
            .unit_of_work(&[LockKey::Borrower(owner)], |uow| {
                let updated = uow
                    .update_payment_status(payment_id, PaymentStatus::Paid)
                    .map_err(&fault)?;
                if !updated {
                    // removed between lookup and lock
                    return Err(LendingError::PaymentNotFound { id: payment_id });
                }
                Ok(())
            })
            .map_err(|e| e.into_inner(&fault))?;

        info!(%payment_id, borrower_id = %owner, "payment marked paid");
        Ok(owner)
    }

    /// mark every installment of a borrower paid, whatever its current status
    pub fn mark_all_paid(&self, borrower_id: BorrowerId) -> Result<usize> {
        let fault = ledger_fault("mark_all_paid");

        let count = self
            .store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                if uow.find_borrower_by_id(borrower_id).map_err(&fault)?.is_none() {
                    return Err(LendingError::BorrowerNotFound { id: borrower_id });
                }
                uow.update_all_payment_status(borrower_id, PaymentStatus::Paid)
                    .map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))?;

        info!(%borrower_id, payments = count, "all payments marked paid");
        Ok(count)
    }

    /// true when no installment is outstanding; vacuously true with no installments
    pub fn all_settled(&self, borrower_id: BorrowerId) -> Result<bool> {
        let fault = ledger_fault("all_settled");

        self.store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                uow.count_unsettled(borrower_id).map_err(&fault)
            })
            .map(|unsettled| unsettled == 0)
            .map_err(|e| e.into_inner(&fault))
    }

    /// installments ordered by due date
    pub fn list_payments(&self, borrower_id: BorrowerId) -> Result<Vec<Payment>> {
        let fault = ledger_fault("list_payments");

        self.store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                uow.list_payments(borrower_id).map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))
    }
}
