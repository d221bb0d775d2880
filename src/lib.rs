pub mod config;
pub mod credentials;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod policy;
pub mod store;
pub mod types;
pub mod validation;
pub mod view;

// re-export key types
pub use config::{BorrowerRules, CreditPolicyConfig, LendingConfig, ScheduleConfig};
pub use decimal::{Money, Rate};
pub use errors::{LendingError, Result};
pub use events::{AccountEvent, EventStore};
pub use ledger::{build_schedule, PaymentLedger};
pub use lifecycle::AccountLifecycle;
pub use policy::CreditPolicy;
pub use store::{LockKey, MemoryStore, PersistentStore, StoreError, StoreOp, UnitError, UnitOfWork};
pub use types::{
    BorrowerId, BorrowerRecord, CreditDecision, CreditOffer, Payment, PaymentId, PaymentStatus,
};
pub use validation::{BorrowerFields, FieldError, PaymentReference, ProfileUpdate};
pub use view::{AccountView, BorrowerView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
