use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{BorrowerId, PaymentId};
use crate::validation::FieldError;

/// opaque message surfaced for storage faults
pub const TECHNICAL_FAILURE: &str = "technical failure";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    #[error("invalid borrower fields: {}", format_field_errors(.errors))]
    Validation {
        errors: Vec<FieldError>,
    },

    #[error("login handle already registered: {handle}")]
    DuplicateUser {
        handle: String,
    },

    #[error("invalid amount: {input:?}")]
    InvalidAmount {
        input: String,
    },

    #[error("invalid monthly income: {income}")]
    InvalidIncome {
        income: Decimal,
    },

    #[error("credit denied for monthly income {income}")]
    CreditDenied {
        income: Decimal,
    },

    #[error("borrower {borrower_id} has {pending} unsettled payments")]
    SettlementRequired {
        borrower_id: BorrowerId,
        pending: usize,
    },

    #[error("borrower not found: {id}")]
    BorrowerNotFound {
        id: BorrowerId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("payment reference must be exactly 15 numeric digits")]
    InvalidPaymentReference,

    #[error("invalid login handle or credential")]
    InvalidCredentials,

    #[error("credential error: {message}")]
    Credential {
        message: String,
    },

    #[error("ledger error: {message}")]
    Ledger {
        message: String,
    },

    #[error("lifecycle error: {message}")]
    Lifecycle {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl LendingError {
    pub(crate) fn ledger_fault() -> Self {
        LendingError::Ledger {
            message: TECHNICAL_FAILURE.to_string(),
        }
    }

    pub(crate) fn lifecycle_fault() -> Self {
        LendingError::Lifecycle {
            message: TECHNICAL_FAILURE.to_string(),
        }
    }

    /// rejections a caller can act on: re-prompt, pick another handle, settle, etc
    pub fn is_business_rejection(&self) -> bool {
        !self.is_technical()
    }

    /// storage or hashing faults, surfaced as an opaque technical failure
    pub fn is_technical(&self) -> bool {
        matches!(
            self,
            LendingError::Ledger { .. }
                | LendingError::Lifecycle { .. }
                | LendingError::Credential { .. }
                | LendingError::InvalidConfiguration { .. }
        )
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Field, FieldError};
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_classification() {
        assert!(LendingError::CreditDenied { income: dec!(1799.99) }.is_business_rejection());
        assert!(LendingError::InvalidIncome { income: dec!(0) }.is_business_rejection());
        assert!(LendingError::DuplicateUser { handle: "ana".into() }.is_business_rejection());
        assert!(LendingError::ledger_fault().is_technical());
        assert!(LendingError::lifecycle_fault().is_technical());
    }

    #[test]
    fn test_technical_message_is_opaque() {
        assert_eq!(
            LendingError::ledger_fault().to_string(),
            "ledger error: technical failure"
        );
        assert_eq!(
            LendingError::lifecycle_fault().to_string(),
            "lifecycle error: technical failure"
        );
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = LendingError::Validation {
            errors: vec![
                FieldError::new(Field::Age, "must be between 18 and 65"),
                FieldError::new(Field::Handle, "must not be empty"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid borrower fields: age must be between 18 and 65; handle must not be empty"
        );
    }
}
