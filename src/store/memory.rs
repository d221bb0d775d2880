//! In-process store.
//!
//! Tables live behind one `RwLock` that is only held for the duration of a
//! single statement. Isolation between units comes from the keyed lock
//! manager: a unit holds its borrower/handle keys until it commits or rolls
//! back, so units touching different borrowers run concurrently. Rollback
//! restores each borrower slice the unit touched to its state at first touch.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use super::{LockKey, PersistentStore, StoreError, StoreOp, StoreResult, UnitError, UnitOfWork};
use crate::types::{
    BorrowerId, BorrowerPatch, BorrowerRecord, CreditOffer, NewBorrower, NewPayment, Payment,
    PaymentId, PaymentStatus,
};

#[derive(Debug, Default)]
struct Tables {
    borrowers: HashMap<BorrowerId, BorrowerRecord>,
    handles: HashMap<String, BorrowerId>,
    offers: HashMap<BorrowerId, CreditOffer>,
    payments: HashMap<BorrowerId, Vec<Payment>>,
    payment_owners: HashMap<PaymentId, BorrowerId>,
}

/// every row owned by one borrower
#[derive(Debug, Clone)]
struct BorrowerSlice {
    borrower: Option<BorrowerRecord>,
    offer: Option<CreditOffer>,
    payments: Vec<Payment>,
}

impl Tables {
    fn slice(&self, id: BorrowerId) -> BorrowerSlice {
        BorrowerSlice {
            borrower: self.borrowers.get(&id).cloned(),
            offer: self.offers.get(&id).cloned(),
            payments: self.payments.get(&id).cloned().unwrap_or_default(),
        }
    }

    fn restore(&mut self, id: BorrowerId, slice: BorrowerSlice) {
        if let Some(current) = self.borrowers.remove(&id) {
            self.handles.remove(&current.handle);
        }
        self.offers.remove(&id);
        for payment in self.payments.remove(&id).unwrap_or_default() {
            self.payment_owners.remove(&payment.id);
        }

        if let Some(borrower) = slice.borrower {
            self.handles.insert(borrower.handle.clone(), id);
            self.borrowers.insert(id, borrower);
        }
        if let Some(offer) = slice.offer {
            self.offers.insert(id, offer);
        }
        if !slice.payments.is_empty() {
            for payment in &slice.payments {
                self.payment_owners.insert(payment.id, id);
            }
            self.payments.insert(id, slice.payments);
        }
    }
}

/// keyed exclusive locks
#[derive(Debug, Default)]
struct LockManager {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockManager {
    /// wait until every key is free, then take them all at once
    fn acquire(&self, keys: &[LockKey]) -> StoreResult<Vec<LockKey>> {
        let mut wanted = keys.to_vec();
        wanted.sort();
        wanted.dedup();

        let mut held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        while wanted.iter().any(|key| held.contains(key)) {
            held = self.released.wait(held).map_err(|_| StoreError::Poisoned)?;
        }
        held.extend(wanted.iter().cloned());
        Ok(wanted)
    }

    fn release(&self, keys: &[LockKey]) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }
}

/// in-memory `PersistentStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: LockManager,
    faults: Mutex<HashSet<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make every future `op` fail with `StoreError::Fault`
    pub fn fail_on(&self, op: StoreOp) {
        self.faults_guard().insert(op);
    }

    pub fn clear_faults(&self) {
        self.faults_guard().clear();
    }

    /// committed borrower rows
    pub fn borrower_count(&self) -> usize {
        self.read_tables().borrowers.len()
    }

    /// committed credit offer rows
    pub fn credit_offer_count(&self) -> usize {
        self.read_tables().offers.len()
    }

    /// committed payment rows across all borrowers
    pub fn payment_count(&self) -> usize {
        self.read_tables().payment_owners.len()
    }

    fn faults_guard(&self) -> MutexGuard<'_, HashSet<StoreOp>> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        if self.faults_guard().contains(&op) {
            warn!(?op, "injected storage fault");
            return Err(StoreError::Fault { op });
        }
        Ok(())
    }

    fn read(&self, op: StoreOp) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.check(op)?;
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, op: StoreOp) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.check(op)?;
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl PersistentStore for MemoryStore {
    fn unit_of_work<T, E, F>(&self, scope: &[LockKey], work: F) -> Result<T, UnitError<E>>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E>,
    {
        let locks = self.locks.acquire(scope).map_err(UnitError::Store)?;
        let mut unit = MemoryUnit {
            store: self,
            locks,
            saved: HashMap::new(),
            committed: false,
        };

        match work(&mut unit) {
            Ok(value) => {
                unit.commit().map_err(UnitError::Store)?;
                Ok(value)
            }
            Err(err) => {
                unit.rollback();
                Err(UnitError::Work(err))
            }
        }
    }
}

struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    locks: Vec<LockKey>,
    saved: HashMap<BorrowerId, BorrowerSlice>,
    committed: bool,
}

impl<'a> MemoryUnit<'a> {
    /// record a borrower's rows the first time this unit writes to them
    fn remember(&mut self, tables: &Tables, id: BorrowerId) {
        self.saved.entry(id).or_insert_with(|| tables.slice(id));
    }

    fn commit(mut self) -> StoreResult<()> {
        if let Err(err) = self.store.check(StoreOp::Commit) {
            self.rollback();
            return Err(err);
        }
        self.saved.clear();
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.saved.is_empty() {
            return;
        }
        let mut tables = self.store.tables.write().unwrap_or_else(PoisonError::into_inner);
        for (id, slice) in self.saved.drain() {
            tables.restore(id, slice);
        }
        debug!("unit of work rolled back");
    }
}

impl Drop for MemoryUnit<'_> {
    fn drop(&mut self) {
        // work that panicked never reached commit or rollback
        if !self.committed {
            self.rollback();
        }
        self.store.locks.release(&self.locks);
    }
}

impl UnitOfWork for MemoryUnit<'_> {
    fn insert_borrower(&mut self, borrower: NewBorrower) -> StoreResult<BorrowerId> {
        let store = self.store;
        let id = Uuid::new_v4();
        // fresh id, never contended
        let key = store.locks.acquire(&[LockKey::Borrower(id)])?;
        self.locks.extend(key);

        let mut tables = store.write(StoreOp::InsertBorrower)?;
        if tables.handles.contains_key(&borrower.handle) {
            return Err(StoreError::UniqueViolation {
                constraint: "borrowers.handle".to_string(),
            });
        }
        self.remember(&tables, id);

        tables.handles.insert(borrower.handle.clone(), id);
        tables.borrowers.insert(
            id,
            BorrowerRecord {
                id,
                first_name: borrower.first_name,
                paternal_surname: borrower.paternal_surname,
                maternal_surname: borrower.maternal_surname,
                age: borrower.age,
                monthly_income: borrower.monthly_income,
                handle: borrower.handle,
                credential_hash: borrower.credential_hash,
            },
        );
        Ok(id)
    }

    fn find_borrower_by_handle(&mut self, handle: &str) -> StoreResult<Option<BorrowerRecord>> {
        let tables = self.store.read(StoreOp::FindBorrower)?;
        Ok(tables
            .handles
            .get(handle)
            .and_then(|id| tables.borrowers.get(id))
            .cloned())
    }

    fn find_borrower_by_id(&mut self, id: BorrowerId) -> StoreResult<Option<BorrowerRecord>> {
        let tables = self.store.read(StoreOp::FindBorrower)?;
        Ok(tables.borrowers.get(&id).cloned())
    }

    fn update_borrower_fields(&mut self, id: BorrowerId, patch: BorrowerPatch) -> StoreResult<bool> {
        let store = self.store;
        let mut tables = store.write(StoreOp::UpdateBorrower)?;
        if !tables.borrowers.contains_key(&id) {
            return Ok(false);
        }
        self.remember(&tables, id);

        if let Some(borrower) = tables.borrowers.get_mut(&id) {
            borrower.first_name = patch.first_name;
            borrower.paternal_surname = patch.paternal_surname;
            borrower.maternal_surname = patch.maternal_surname;
            borrower.age = patch.age;
            borrower.credential_hash = patch.credential_hash;
        }
        Ok(true)
    }

    fn insert_credit_offer(&mut self, borrower_id: BorrowerId, offer: &CreditOffer) -> StoreResult<()> {
        let store = self.store;
        let mut tables = store.write(StoreOp::InsertCreditOffer)?;
        if !tables.borrowers.contains_key(&borrower_id) {
            return Err(StoreError::MissingReference { table: "borrowers" });
        }
        if tables.offers.contains_key(&borrower_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "credit_offers.borrower_id".to_string(),
            });
        }
        self.remember(&tables, borrower_id);

        tables.offers.insert(borrower_id, offer.clone());
        Ok(())
    }

    fn find_credit_offer(&mut self, borrower_id: BorrowerId) -> StoreResult<Option<CreditOffer>> {
        let tables = self.store.read(StoreOp::FindCreditOffer)?;
        Ok(tables.offers.get(&borrower_id).cloned())
    }

    fn insert_payments(
        &mut self,
        borrower_id: BorrowerId,
        payments: Vec<NewPayment>,
    ) -> StoreResult<Vec<Payment>> {
        let store = self.store;
        let mut tables = store.write(StoreOp::InsertPayments)?;
        if !tables.borrowers.contains_key(&borrower_id) {
            return Err(StoreError::MissingReference { table: "borrowers" });
        }
        self.remember(&tables, borrower_id);

        let inserted: Vec<Payment> = payments
            .into_iter()
            .map(|p| Payment {
                id: Uuid::new_v4(),
                borrower_id,
                due_date: p.due_date,
                amount: p.amount,
                status: p.status,
            })
            .collect();

        for payment in &inserted {
            tables.payment_owners.insert(payment.id, borrower_id);
        }
        tables
            .payments
            .entry(borrower_id)
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    fn list_payments(&mut self, borrower_id: BorrowerId) -> StoreResult<Vec<Payment>> {
        let tables = self.store.read(StoreOp::ListPayments)?;
        let mut payments = tables.payments.get(&borrower_id).cloned().unwrap_or_default();
        payments.sort_by_key(|p| p.due_date);
        Ok(payments)
    }

    fn update_payment_status(&mut self, payment_id: PaymentId, status: PaymentStatus) -> StoreResult<bool> {
        let store = self.store;
        let mut tables = store.write(StoreOp::UpdatePaymentStatus)?;
        let Some(owner) = tables.payment_owners.get(&payment_id).copied() else {
            return Ok(false);
        };
        self.remember(&tables, owner);

        let payment = tables
            .payments
            .get_mut(&owner)
            .and_then(|rows| rows.iter_mut().find(|p| p.id == payment_id));
        match payment {
            Some(payment) => {
                payment.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_all_payment_status(
        &mut self,
        borrower_id: BorrowerId,
        status: PaymentStatus,
    ) -> StoreResult<usize> {
        let store = self.store;
        let mut tables = store.write(StoreOp::UpdateAllPaymentStatus)?;
        self.remember(&tables, borrower_id);

        let rows = tables.payments.get_mut(&borrower_id);
        Ok(rows.map_or(0, |rows| {
            rows.iter_mut().for_each(|p| p.status = status);
            rows.len()
        }))
    }

    fn count_unsettled(&mut self, borrower_id: BorrowerId) -> StoreResult<usize> {
        let tables = self.store.read(StoreOp::CountUnsettled)?;
        Ok(tables
            .payments
            .get(&borrower_id)
            .map_or(0, |rows| rows.iter().filter(|p| !p.status.is_settled()).count()))
    }

    fn find_payment_owner(&mut self, payment_id: PaymentId) -> StoreResult<Option<BorrowerId>> {
        let tables = self.store.read(StoreOp::FindPaymentOwner)?;
        Ok(tables.payment_owners.get(&payment_id).copied())
    }

    fn delete_payments(&mut self, borrower_id: BorrowerId) -> StoreResult<usize> {
        let store = self.store;
        let mut tables = store.write(StoreOp::DeletePayments)?;
        self.remember(&tables, borrower_id);

        let removed = tables.payments.remove(&borrower_id).unwrap_or_default();
        for payment in &removed {
            tables.payment_owners.remove(&payment.id);
        }
        Ok(removed.len())
    }

    fn delete_credit_offer(&mut self, borrower_id: BorrowerId) -> StoreResult<bool> {
        let store = self.store;
        let mut tables = store.write(StoreOp::DeleteCreditOffer)?;
        self.remember(&tables, borrower_id);

        Ok(tables.offers.remove(&borrower_id).is_some())
    }

    fn delete_borrower(&mut self, id: BorrowerId) -> StoreResult<bool> {
        let store = self.store;
        let mut tables = store.write(StoreOp::DeleteBorrower)?;
        if tables.payments.get(&id).is_some_and(|rows| !rows.is_empty()) || tables.offers.contains_key(&id) {
            return Err(StoreError::MissingReference { table: "dependent rows still present" });
        }
        self.remember(&tables, id);

        match tables.borrowers.remove(&id) {
            Some(borrower) => {
                tables.handles.remove(&borrower.handle);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
