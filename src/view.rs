/// serializable views of an account
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{BorrowerId, BorrowerRecord, CreditOffer, Payment};

/// borrower profile without the credential hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerView {
    pub id: BorrowerId,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub monthly_income: Money,
    pub handle: String,
}

/// everything a profile page shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub borrower: BorrowerView,
    pub credit: Option<CreditOffer>,
    pub payments: Vec<Payment>,
    pub outstanding: Money,
    pub settled: bool,
}

impl From<&BorrowerRecord> for BorrowerView {
    fn from(record: &BorrowerRecord) -> Self {
        BorrowerView {
            id: record.id,
            first_name: record.first_name.clone(),
            paternal_surname: record.paternal_surname.clone(),
            maternal_surname: record.maternal_surname.clone(),
            age: record.age,
            monthly_income: record.monthly_income,
            handle: record.handle.clone(),
        }
    }
}

impl AccountView {
    pub fn new(borrower: &BorrowerRecord, credit: Option<CreditOffer>, payments: Vec<Payment>) -> Self {
        let mut outstanding = Money::ZERO;
        for payment in payments.iter().filter(|p| !p.status.is_settled()) {
            outstanding += payment.amount;
        }
        let settled = payments.iter().all(|p| p.status.is_settled());

        AccountView {
            borrower: BorrowerView::from(borrower),
            credit,
            payments,
            outstanding,
            settled,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
