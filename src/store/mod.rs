pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    BorrowerId, BorrowerPatch, BorrowerRecord, CreditOffer, NewBorrower, NewPayment, Payment,
    PaymentId, PaymentStatus,
};

pub use memory::MemoryStore;

/// storage operations, used to name fault points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreOp {
    InsertBorrower,
    FindBorrower,
    UpdateBorrower,
    InsertCreditOffer,
    FindCreditOffer,
    InsertPayments,
    ListPayments,
    UpdatePaymentStatus,
    UpdateAllPaymentStatus,
    CountUnsettled,
    FindPaymentOwner,
    DeletePayments,
    DeleteCreditOffer,
    DeleteBorrower,
    Commit,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        constraint: String,
    },

    #[error("referenced row missing from {table}")]
    MissingReference {
        table: &'static str,
    },

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage fault during {op:?}")]
    Fault {
        op: StoreOp,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// row-level lock taken for the duration of a unit of work
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Borrower(BorrowerId),
    Handle(String),
}

/// outcome of a failed unit of work; every write made inside it was rolled back
#[derive(Debug, Clone, PartialEq)]
pub enum UnitError<E> {
    /// the store could not begin or commit the unit
    Store(StoreError),
    /// the work itself returned an error
    Work(E),
}

impl<E> UnitError<E> {
    /// collapse into the work's error type
    pub fn into_inner(self, on_store: impl FnOnce(StoreError) -> E) -> E {
        match self {
            UnitError::Store(err) => on_store(err),
            UnitError::Work(err) => err,
        }
    }
}

/// statements available inside a unit of work
pub trait UnitOfWork {
    fn insert_borrower(&mut self, borrower: NewBorrower) -> StoreResult<BorrowerId>;

    fn find_borrower_by_handle(&mut self, handle: &str) -> StoreResult<Option<BorrowerRecord>>;

    fn find_borrower_by_id(&mut self, id: BorrowerId) -> StoreResult<Option<BorrowerRecord>>;

    /// returns false when no such borrower exists
    fn update_borrower_fields(&mut self, id: BorrowerId, patch: BorrowerPatch) -> StoreResult<bool>;

    fn insert_credit_offer(&mut self, borrower_id: BorrowerId, offer: &CreditOffer) -> StoreResult<()>;

    fn find_credit_offer(&mut self, borrower_id: BorrowerId) -> StoreResult<Option<CreditOffer>>;

    fn insert_payments(
        &mut self,
        borrower_id: BorrowerId,
        payments: Vec<NewPayment>,
    ) -> StoreResult<Vec<Payment>>;

    /// ordered by due date, then insertion order
    fn list_payments(&mut self, borrower_id: BorrowerId) -> StoreResult<Vec<Payment>>;

    /// returns false when no such payment exists
    fn update_payment_status(&mut self, payment_id: PaymentId, status: PaymentStatus) -> StoreResult<bool>;

    /// returns the number of rows touched
    fn update_all_payment_status(
        &mut self,
        borrower_id: BorrowerId,
        status: PaymentStatus,
    ) -> StoreResult<usize>;

    /// payments not yet paid
    fn count_unsettled(&mut self, borrower_id: BorrowerId) -> StoreResult<usize>;

    fn find_payment_owner(&mut self, payment_id: PaymentId) -> StoreResult<Option<BorrowerId>>;

    fn delete_payments(&mut self, borrower_id: BorrowerId) -> StoreResult<usize>;

    fn delete_credit_offer(&mut self, borrower_id: BorrowerId) -> StoreResult<bool>;

    fn delete_borrower(&mut self, id: BorrowerId) -> StoreResult<bool>;
}

/// persistence collaborator with core-controlled transaction boundaries
pub trait PersistentStore: Send + Sync {
    /// run `work` holding the locks in `scope`
    ///
    /// Commits when `work` returns `Ok`. When it returns `Err`, or the commit
    /// fails, every write made inside the unit is undone before returning.
    fn unit_of_work<T, E, F>(&self, scope: &[LockKey], work: F) -> std::result::Result<T, UnitError<E>>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> std::result::Result<T, E>;
}
