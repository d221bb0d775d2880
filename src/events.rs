use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{BorrowerId, PaymentId};

/// all events that can be emitted by the account lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountEvent {
    // registration events
    BorrowerRegistered {
        borrower_id: BorrowerId,
        handle: String,
        timestamp: DateTime<Utc>,
    },
    CreditApproved {
        borrower_id: BorrowerId,
        principal: Money,
        rate: Rate,
        months: u32,
        installment: Money,
        total: Money,
    },
    ScheduleCreated {
        borrower_id: BorrowerId,
        installments: usize,
        first_due: NaiveDate,
        last_due: NaiveDate,
    },

    // payment events
    PaymentSettled {
        borrower_id: BorrowerId,
        payment_id: PaymentId,
        timestamp: DateTime<Utc>,
    },
    AllPaymentsSettled {
        borrower_id: BorrowerId,
        payments: usize,
        timestamp: DateTime<Utc>,
    },

    // profile events
    ProfileUpdated {
        borrower_id: BorrowerId,
        timestamp: DateTime<Utc>,
    },
    AccountDeleted {
        borrower_id: BorrowerId,
        payments_removed: usize,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<AccountEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: AccountEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<AccountEvent> {
        std::mem::take(&mut self.events)
    }
}
