use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

/// top-level lending configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LendingConfig {
    pub credit_policy: CreditPolicyConfig,
    pub schedule: ScheduleConfig,
    pub borrower_rules: BorrowerRules,
}

/// credit decision parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditPolicyConfig {
    /// incomes at or below this are denied
    pub income_floor: Money,
    /// incomes above this are denied
    pub income_ceiling: Money,
    /// incomes below this get `low_income_rate`
    pub low_tier_limit: Money,
    /// incomes up to and including this get `mid_income_rate`
    pub mid_tier_limit: Money,
    pub low_income_rate: Rate,
    pub mid_income_rate: Rate,
    pub high_income_rate: Rate,
    /// share of monthly income used both for the base amount and the installment cap
    pub installment_ratio: Decimal,
    /// months the base amount is multiplied over
    pub nominal_months: u32,
    /// longest term the search may settle on
    pub max_term_months: u32,
    pub approval_message: String,
}

impl Default for CreditPolicyConfig {
    fn default() -> Self {
        Self {
            income_floor: Money::from_decimal(dec!(1799.99)),
            income_ceiling: Money::from_decimal(dec!(99999.99)),
            low_tier_limit: Money::from_decimal(dec!(10000.00)),
            mid_tier_limit: Money::from_decimal(dec!(20000.00)),
            low_income_rate: Rate::from_decimal(dec!(0.10)),
            mid_income_rate: Rate::from_decimal(dec!(0.08)),
            high_income_rate: Rate::from_decimal(dec!(0.06)),
            installment_ratio: dec!(0.30),
            nominal_months: 12,
            max_term_months: 12,
            approval_message: "Crédito aprobado".to_string(),
        }
    }
}

/// installment schedule parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// days between consecutive installment dates
    pub spacing_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { spacing_days: 15 }
    }
}

/// field rules enforced before a borrower is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerRules {
    pub max_name_chars: usize,
    pub min_age: u8,
    pub max_age: u8,
    pub max_handle_chars: usize,
    pub credential_digits: usize,
    pub payment_reference_digits: usize,
}

impl Default for BorrowerRules {
    fn default() -> Self {
        Self {
            max_name_chars: 24,
            min_age: 18,
            max_age: 65,
            max_handle_chars: 14,
            credential_digits: 4,
            payment_reference_digits: 15,
        }
    }
}

impl LendingConfig {
    /// the standard micro-lending product
    pub fn standard() -> Self {
        Self::default()
    }

    /// load from a json document, validating the result
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LendingConfig =
            serde_json::from_str(json).map_err(|e| LendingError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// reject configurations the credit policy cannot run with
    pub fn validate(&self) -> Result<()> {
        let policy = &self.credit_policy;
        let invalid = |message: &str| {
            Err(LendingError::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if policy.income_floor.is_negative() || policy.income_floor >= policy.income_ceiling {
            return invalid("income floor must be non-negative and below the ceiling");
        }
        if policy.low_tier_limit > policy.mid_tier_limit {
            return invalid("rate tier limits must be ascending");
        }
        if [policy.low_income_rate, policy.mid_income_rate, policy.high_income_rate]
            .iter()
            .any(|r| r.as_decimal().is_sign_negative())
        {
            return invalid("interest rates must not be negative");
        }
        if policy.installment_ratio <= Decimal::ZERO || policy.installment_ratio > Decimal::ONE {
            return invalid("installment ratio must be in (0, 1]");
        }
        if policy.nominal_months == 0 || policy.max_term_months == 0 {
            return invalid("month counts must be positive");
        }
        if self.schedule.spacing_days == 0 {
            return invalid("installment spacing must be at least one day");
        }
        let rules = &self.borrower_rules;
        if rules.min_age > rules.max_age {
            return invalid("minimum age exceeds maximum age");
        }
        if rules.max_name_chars == 0 || rules.max_handle_chars == 0 {
            return invalid("length limits must be positive");
        }
        if rules.credential_digits == 0 || rules.payment_reference_digits == 0 {
            return invalid("digit counts must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_config_is_valid() {
        let config = LendingConfig::standard();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.spacing_days, 15);
        assert_eq!(config.credit_policy.max_term_months, 12);
        assert_eq!(config.credit_policy.approval_message, "Crédito aprobado");
    }

    #[test]
    fn test_json_round_trip_preserves_policy() {
        let config = LendingConfig::standard();
        let json = config.to_json_pretty().unwrap();
        let loaded = LendingConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_inverted_income_window() {
        let mut config = LendingConfig::standard();
        config.credit_policy.income_floor = Money::from_major(200_000);
        assert!(matches!(
            config.validate(),
            Err(LendingError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_spacing() {
        let mut config = LendingConfig::standard();
        config.schedule.spacing_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_loaded_amounts_are_quantized_to_cents() {
        let json = LendingConfig::standard()
            .to_json_pretty()
            .unwrap()
            .replace("\"1799.99\"", "\"1799.994\"");
        let loaded = LendingConfig::from_json(&json).unwrap();
        assert_eq!(loaded.credit_policy.income_floor, Money::from_str_exact("1799.99").unwrap());
        assert_eq!(loaded.credit_policy.income_floor.to_string(), "1799.99");
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        let err = LendingConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, LendingError::InvalidConfiguration { .. }));
    }
}
