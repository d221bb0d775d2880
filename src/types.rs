use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Money, Rate};

/// unique identifier for a borrower
pub type BorrowerId = Uuid;

/// unique identifier for a scheduled payment
pub type PaymentId = Uuid;

/// settlement status of one installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

/// approved credit terms; the only successful outcome of a credit decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDecision {
    pub principal: Money,
    pub rate: Rate,
    pub months: u32,
    pub installment: Money,
    pub total: Money,
    pub message: String,
}

/// credit terms attached to a borrower (1:1)
pub type CreditOffer = CreditDecision;

/// persisted borrower row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerRecord {
    pub id: BorrowerId,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub monthly_income: Money,
    pub handle: String,
    /// argon2 PHC string, never the raw credential
    pub credential_hash: String,
}

/// borrower row before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrower {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub monthly_income: Money,
    pub handle: String,
    pub credential_hash: String,
}

/// mutable subset of a borrower row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowerPatch {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub credential_hash: String,
}

/// installment to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: PaymentStatus,
}

/// persisted installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub borrower_id: BorrowerId,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: PaymentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&PaymentStatus::Paid).unwrap(), "\"paid\"");
        assert!(PaymentStatus::Paid.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
    }
}
