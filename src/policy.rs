use rust_decimal::Decimal;
use tracing::debug;

use crate::config::CreditPolicyConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::types::CreditDecision;

/// turns a declared monthly income into approved credit terms
///
/// Stateless apart from its configuration; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct CreditPolicy {
    config: CreditPolicyConfig,
}

impl CreditPolicy {
    pub fn new(config: CreditPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CreditPolicyConfig {
        &self.config
    }

    /// parse user input such as "18,500.00" and decide
    pub fn decide_str(&self, income: &str) -> Result<CreditDecision> {
        let income = Money::parse_amount(income)?;
        self.decide(income)
    }

    /// decide credit terms for a monthly income
    pub fn decide(&self, income: Decimal) -> Result<CreditDecision> {
        if income <= Decimal::ZERO {
            return Err(LendingError::InvalidIncome { income });
        }

        let income = Money::from_decimal(income);
        if !self.is_eligible(income) {
            debug!(%income, "income outside eligibility window");
            return Err(LendingError::CreditDenied {
                income: income.as_decimal(),
            });
        }

        let rate = self.rate_for(income);
        let max_installment = income.portion(self.config.installment_ratio);
        let principal = max_installment * self.config.nominal_months;
        let total = principal.with_rate(rate);
        let (months, installment) = self.search_term(total, max_installment);

        debug!(%income, %rate, %principal, %total, months, %installment, "credit approved");

        Ok(CreditDecision {
            principal,
            rate,
            months,
            installment,
            total,
            message: self.config.approval_message.clone(),
        })
    }

    /// floor exclusive, ceiling inclusive
    pub fn is_eligible(&self, income: Money) -> bool {
        income > self.config.income_floor && income <= self.config.income_ceiling
    }

    /// monthly rate tier for a quantized income
    pub fn rate_for(&self, income: Money) -> Rate {
        if income < self.config.low_tier_limit {
            self.config.low_income_rate
        } else if income <= self.config.mid_tier_limit {
            self.config.mid_income_rate
        } else {
            self.config.high_income_rate
        }
    }

    /// shortest term whose installment fits under the cap, else the longest term
    fn search_term(&self, total: Money, max_installment: Money) -> (u32, Money) {
        let max_term = self.config.max_term_months;
        (1..=max_term)
            .map(|months| (months, total.split(months)))
            .find(|(_, installment)| *installment <= max_installment)
            .unwrap_or_else(|| (max_term, total.split(max_term)))
    }
}

impl CreditDecision {
    /// amount that settles the balance on the last installment
    pub fn final_installment(&self) -> Money {
        self.total - self.installment * self.months.saturating_sub(1)
    }
}
