use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hourglass_rs::{SafeTimeProvider, TimeSource};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::LendingConfig;
use crate::credentials::{hash_credential, verify_credential};
use crate::errors::{LendingError, Result};
use crate::events::{AccountEvent, EventStore};
use crate::ledger::PaymentLedger;
use crate::policy::CreditPolicy;
use crate::store::{LockKey, PersistentStore, StoreError};
use crate::types::{
    BorrowerId, BorrowerPatch, BorrowerRecord, CreditDecision, CreditOffer, NewBorrower, Payment,
    PaymentId,
};
use crate::validation::{normalize_handle, BorrowerFields, PaymentReference, ProfileUpdate};
use crate::view::AccountView;

/// log the storage cause and replace it with an opaque lifecycle error
fn lifecycle_fault(operation: &'static str) -> impl Fn(StoreError) -> LendingError {
    move |err| {
        error!(operation, error = %err, "lifecycle storage failure");
        LendingError::lifecycle_fault()
    }
}

/// registration, settlement and closure of borrower accounts
pub struct AccountLifecycle<S> {
    store: Arc<S>,
    config: LendingConfig,
    policy: CreditPolicy,
    ledger: PaymentLedger<S>,
    events: Mutex<EventStore>,
}

impl<S: PersistentStore> AccountLifecycle<S> {
    /// create with a validated configuration
    pub fn new(store: Arc<S>, config: LendingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    /// create with the standard product configuration
    pub fn standard(store: Arc<S>) -> Self {
        Self::build(store, LendingConfig::standard())
    }

    fn build(store: Arc<S>, config: LendingConfig) -> Self {
        Self {
            policy: CreditPolicy::new(config.credit_policy.clone()),
            ledger: PaymentLedger::new(store.clone(), config.schedule.clone()),
            store,
            config,
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PaymentLedger<S> {
        &self.ledger
    }

    /// quote credit terms without registering anyone
    pub fn decide_credit(&self, income: Decimal) -> Result<CreditDecision> {
        self.policy.decide(income)
    }

    /// quote from user-entered text such as "18,500.00"
    pub fn decide_credit_str(&self, income: &str) -> Result<CreditDecision> {
        self.policy.decide_str(income)
    }

    /// register with system time
    pub fn register_now(&self, fields: &BorrowerFields) -> Result<BorrowerId> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.register(fields, &time)
    }

    /// register a borrower, their credit offer and installment schedule as one unit
    ///
    /// Nothing is persisted unless all of it is.
    pub fn register(&self, fields: &BorrowerFields, time_provider: &SafeTimeProvider) -> Result<BorrowerId> {
        let valid = fields.validated(&self.config.borrower_rules)?;
        let credential_hash = hash_credential(&valid.credential)?;
        let handle = valid.handle.clone();
        let income = valid.monthly_income;
        let start_date = time_provider.now().date_naive();
        let fault = lifecycle_fault("register");
        let duplicate = || LendingError::DuplicateUser {
            handle: handle.clone(),
        };

        let (borrower_id, decision, payments) = self
            .store
            .unit_of_work(&[LockKey::Handle(handle.clone())], |uow| {
                if uow.find_borrower_by_handle(&handle).map_err(&fault)?.is_some() {
                    return Err(duplicate());
                }

                let borrower_id = uow
                    .insert_borrower(NewBorrower {
                        first_name: valid.first_name,
                        paternal_surname: valid.paternal_surname,
                        maternal_surname: valid.maternal_surname,
                        age: valid.age,
                        monthly_income: income,
                        handle: handle.clone(),
                        credential_hash,
                    })
                    .map_err(|err| match err {
                        StoreError::UniqueViolation { .. } => duplicate(),
                        other => fault(other),
                    })?;

                let decision = self.policy.decide(income.as_decimal())?;
                uow.insert_credit_offer(borrower_id, &decision).map_err(&fault)?;
                let payments = self
                    .ledger
                    .initialize_schedule(uow, borrower_id, &decision, start_date)
                    .map_err(&fault)?;

                Ok((borrower_id, decision, payments))
            })
            .map_err(|e| e.into_inner(&fault))
            .map_err(|err| {
                if err.is_business_rejection() {
                    warn!(%handle, error = %err, "registration rejected");
                }
                err
            })?;

        info!(%borrower_id, %handle, months = decision.months, installment = %decision.installment, "borrower registered");

        let mut events = self.events_guard();
        events.emit(AccountEvent::BorrowerRegistered {
            borrower_id,
            handle,
            timestamp: time_provider.now(),
        });
        events.emit(AccountEvent::CreditApproved {
            borrower_id,
            principal: decision.principal,
            rate: decision.rate,
            months: decision.months,
            installment: decision.installment,
            total: decision.total,
        });
        if let (Some(first), Some(last)) = (payments.first(), payments.last()) {
            events.emit(AccountEvent::ScheduleCreated {
                borrower_id,
                installments: payments.len(),
                first_due: first.due_date,
                last_due: last.due_date,
            });
        }

        Ok(borrower_id)
    }

    /// mark one installment paid with system time
    pub fn mark_paid_now(&self, payment_id: PaymentId) -> Result<()> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.mark_paid(payment_id, &time)
    }

    pub fn mark_paid(&self, payment_id: PaymentId, time_provider: &SafeTimeProvider) -> Result<()> {
        let borrower_id = self.ledger.mark_paid(payment_id)?;
        self.events_guard().emit(AccountEvent::PaymentSettled {
            borrower_id,
            payment_id,
            timestamp: time_provider.now(),
        });
        Ok(())
    }

    /// mark every installment paid with system time
    pub fn mark_all_paid_now(&self, borrower_id: BorrowerId) -> Result<usize> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.mark_all_paid(borrower_id, &time)
    }

    pub fn mark_all_paid(&self, borrower_id: BorrowerId, time_provider: &SafeTimeProvider) -> Result<usize> {
        let payments = self.ledger.mark_all_paid(borrower_id)?;
        self.events_guard().emit(AccountEvent::AllPaymentsSettled {
            borrower_id,
            payments,
            timestamp: time_provider.now(),
        });
        Ok(payments)
    }

    /// pay one installment quoting its capture line
    pub fn pay_installment(
        &self,
        payment_id: PaymentId,
        reference: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let reference = PaymentReference::parse(reference, &self.config.borrower_rules)?;
        info!(%payment_id, %reference, "installment payment received");
        self.mark_paid(payment_id, time_provider)
    }

    /// pay off every installment quoting one capture line
    pub fn pay_in_full(
        &self,
        borrower_id: BorrowerId,
        reference: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<usize> {
        let reference = PaymentReference::parse(reference, &self.config.borrower_rules)?;
        info!(%borrower_id, %reference, "full payoff received");
        self.mark_all_paid(borrower_id, time_provider)
    }

    pub fn all_settled(&self, borrower_id: BorrowerId) -> Result<bool> {
        self.ledger.all_settled(borrower_id)
    }

    pub fn list_payments(&self, borrower_id: BorrowerId) -> Result<Vec<Payment>> {
        self.ledger.list_payments(borrower_id)
    }

    /// delete with system time
    pub fn delete_cascade_now(&self, borrower_id: BorrowerId) -> Result<()> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.delete_cascade(borrower_id, &time)
    }

    /// remove a fully settled borrower with their offer and installments
    ///
    /// The settlement check and the deletes run under the same borrower lock,
    /// so no installment can change status in between.
    pub fn delete_cascade(&self, borrower_id: BorrowerId, time_provider: &SafeTimeProvider) -> Result<()> {
        let fault = lifecycle_fault("delete_cascade");
        let check_fault = |err: StoreError| {
            error!(%borrower_id, error = %err, "settlement check failed");
            LendingError::ledger_fault()
        };

        // handles are immutable, so it is safe to read it before locking
        let handle = self.borrower(borrower_id)?.handle;

        let payments_removed = self
            .store
            .unit_of_work(
                &[LockKey::Borrower(borrower_id), LockKey::Handle(handle)],
                |uow| {
                    if uow.find_borrower_by_id(borrower_id).map_err(&fault)?.is_none() {
                        return Err(LendingError::BorrowerNotFound { id: borrower_id });
                    }

                    let pending = self.ledger.unsettled_in(uow, borrower_id).map_err(check_fault)?;
                    if pending > 0 {
                        return Err(LendingError::SettlementRequired {
                            borrower_id,
                            pending,
                        });
                    }

                    let removed = uow.delete_payments(borrower_id).map_err(&fault)?;
                    uow.delete_credit_offer(borrower_id).map_err(&fault)?;
                    uow.delete_borrower(borrower_id).map_err(&fault)?;
                    Ok(removed)
                },
            )
            .map_err(|e| e.into_inner(&fault))
            .map_err(|err| {
                if let LendingError::SettlementRequired { pending, .. } = &err {
                    warn!(%borrower_id, pending, "deletion refused until payments are settled");
                }
                err
            })?;

        info!(%borrower_id, payments_removed, "account deleted");
        self.events_guard().emit(AccountEvent::AccountDeleted {
            borrower_id,
            payments_removed,
            timestamp: time_provider.now(),
        });
        Ok(())
    }

    /// replace names, age and credential; income and handle never change
    pub fn update_profile(
        &self,
        borrower_id: BorrowerId,
        update: &ProfileUpdate,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let valid = update.validated(&self.config.borrower_rules)?;
        let credential_hash = hash_credential(&valid.credential)?;
        let fault = lifecycle_fault("update_profile");

        let patch = BorrowerPatch {
            first_name: valid.first_name,
            paternal_surname: valid.paternal_surname,
            maternal_surname: valid.maternal_surname,
            age: valid.age,
            credential_hash,
        };

        let updated = self
            .store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                uow.update_borrower_fields(borrower_id, patch).map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))?;
        if !updated {
            return Err(LendingError::BorrowerNotFound { id: borrower_id });
        }

        info!(%borrower_id, "profile updated");
        self.events_guard().emit(AccountEvent::ProfileUpdated {
            borrower_id,
            timestamp: time_provider.now(),
        });
        Ok(())
    }

    /// check a login; unknown handles and wrong credentials are indistinguishable
    pub fn verify_credentials(&self, handle: &str, credential: &str) -> Result<BorrowerId> {
        let borrower = self
            .find_by_handle(handle)?
            .ok_or(LendingError::InvalidCredentials)?;

        if verify_credential(credential, &borrower.credential_hash)? {
            Ok(borrower.id)
        } else {
            warn!(handle = %borrower.handle, "credential mismatch");
            Err(LendingError::InvalidCredentials)
        }
    }

    pub fn find_by_handle(&self, handle: &str) -> Result<Option<BorrowerRecord>> {
        let handle = normalize_handle(handle);
        let fault = lifecycle_fault("find_by_handle");

        self.store
            .unit_of_work(&[LockKey::Handle(handle.clone())], |uow| {
                uow.find_borrower_by_handle(&handle).map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))
    }

    pub fn borrower(&self, borrower_id: BorrowerId) -> Result<BorrowerRecord> {
        let fault = lifecycle_fault("borrower");

        self.store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                uow.find_borrower_by_id(borrower_id).map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))?
            .ok_or(LendingError::BorrowerNotFound { id: borrower_id })
    }

    pub fn credit_offer(&self, borrower_id: BorrowerId) -> Result<Option<CreditOffer>> {
        let fault = lifecycle_fault("credit_offer");

        self.store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                uow.find_credit_offer(borrower_id).map_err(&fault)
            })
            .map_err(|e| e.into_inner(&fault))
    }

    /// consistent snapshot of profile, offer and installments
    pub fn account_view(&self, borrower_id: BorrowerId) -> Result<AccountView> {
        let fault = lifecycle_fault("account_view");

        self.store
            .unit_of_work(&[LockKey::Borrower(borrower_id)], |uow| {
                let borrower = uow
                    .find_borrower_by_id(borrower_id)
                    .map_err(&fault)?
                    .ok_or(LendingError::BorrowerNotFound { id: borrower_id })?;
                let credit = uow.find_credit_offer(borrower_id).map_err(&fault)?;
                let payments = uow.list_payments(borrower_id).map_err(&fault)?;
                Ok(AccountView::new(&borrower, credit, payments))
            })
            .map_err(|e| e.into_inner(&fault))
    }

    pub fn take_events(&self) -> Vec<AccountEvent> {
        self.events_guard().take_events()
    }

    fn events_guard(&self) -> MutexGuard<'_, EventStore> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
