//! Field validation that runs before anything is persisted.
//!
//! Validation returns every failing field at once so a presentation layer can
//! re-prompt for all of them together.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BorrowerRules;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};

const ACCENTED_LETTERS: &str = "ÁÉÍÓÚÑáéíóúñ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FirstName,
    PaternalSurname,
    MaternalSurname,
    Age,
    MonthlyIncome,
    Handle,
    Credential,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::FirstName => "first name",
            Field::PaternalSurname => "paternal surname",
            Field::MaternalSurname => "maternal surname",
            Field::Age => "age",
            Field::MonthlyIncome => "monthly income",
            Field::Handle => "handle",
            Field::Credential => "credential",
        };
        f.write_str(name)
    }
}

/// one rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

/// raw registration input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerFields {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: i64,
    pub monthly_income: Decimal,
    pub handle: String,
    pub credential: String,
}

/// registration input that passed every rule; credential still in clear text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBorrower {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub monthly_income: Money,
    pub handle: String,
    pub credential: String,
}

/// editable profile fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: i64,
    pub credential: String,
}

/// profile update that passed every rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProfile {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub age: u8,
    pub credential: String,
}

impl BorrowerFields {
    /// check every field, collecting all failures
    pub fn validate(&self, rules: &BorrowerRules) -> std::result::Result<ValidatedBorrower, Vec<FieldError>> {
        let mut errors = Vec::new();

        let first_name = check_name(Field::FirstName, &self.first_name, rules, &mut errors);
        let paternal = check_name(Field::PaternalSurname, &self.paternal_surname, rules, &mut errors);
        let maternal = check_name(Field::MaternalSurname, &self.maternal_surname, rules, &mut errors);
        let age = check_age(self.age, rules, &mut errors);

        if self.monthly_income <= Decimal::ZERO {
            errors.push(FieldError::new(Field::MonthlyIncome, "must be positive"));
        }

        let handle = normalize_handle(&self.handle);
        check_handle(&handle, rules, &mut errors);
        check_credential(&self.credential, rules, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidatedBorrower {
            first_name,
            paternal_surname: paternal,
            maternal_surname: maternal,
            age: age.unwrap_or_default(),
            monthly_income: Money::from_decimal(self.monthly_income),
            handle,
            credential: self.credential.clone(),
        })
    }

    /// validate and convert failures into `LendingError::Validation`
    pub fn validated(&self, rules: &BorrowerRules) -> Result<ValidatedBorrower> {
        self.validate(rules)
            .map_err(|errors| LendingError::Validation { errors })
    }
}

impl ProfileUpdate {
    pub fn validate(&self, rules: &BorrowerRules) -> std::result::Result<ValidatedProfile, Vec<FieldError>> {
        let mut errors = Vec::new();

        let first_name = check_name(Field::FirstName, &self.first_name, rules, &mut errors);
        let paternal = check_name(Field::PaternalSurname, &self.paternal_surname, rules, &mut errors);
        let maternal = check_name(Field::MaternalSurname, &self.maternal_surname, rules, &mut errors);
        let age = check_age(self.age, rules, &mut errors);
        check_credential(&self.credential, rules, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidatedProfile {
            first_name,
            paternal_surname: paternal,
            maternal_surname: maternal,
            age: age.unwrap_or_default(),
            credential: self.credential.clone(),
        })
    }

    pub fn validated(&self, rules: &BorrowerRules) -> Result<ValidatedProfile> {
        self.validate(rules)
            .map_err(|errors| LendingError::Validation { errors })
    }
}

/// handles are stored trimmed and lower-cased
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().to_lowercase()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == ' ' || ACCENTED_LETTERS.contains(c)
}

fn check_name(field: Field, value: &str, rules: &BorrowerRules, errors: &mut Vec<FieldError>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    } else if trimmed.chars().count() > rules.max_name_chars {
        errors.push(FieldError::new(
            field,
            format!("must be at most {} characters", rules.max_name_chars),
        ));
    } else if !trimmed.chars().all(is_name_char) {
        errors.push(FieldError::new(field, "may only contain letters and spaces"));
    }
    trimmed.to_string()
}

fn check_age(age: i64, rules: &BorrowerRules, errors: &mut Vec<FieldError>) -> Option<u8> {
    if age < i64::from(rules.min_age) || age > i64::from(rules.max_age) {
        errors.push(FieldError::new(
            Field::Age,
            format!("must be between {} and {}", rules.min_age, rules.max_age),
        ));
        return None;
    }
    u8::try_from(age).ok()
}

fn check_handle(handle: &str, rules: &BorrowerRules, errors: &mut Vec<FieldError>) {
    if handle.is_empty() {
        errors.push(FieldError::new(Field::Handle, "must not be empty"));
    } else if handle.chars().count() > rules.max_handle_chars {
        errors.push(FieldError::new(
            Field::Handle,
            format!("must be at most {} characters", rules.max_handle_chars),
        ));
    } else if !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        errors.push(FieldError::new(
            Field::Handle,
            "may only contain letters, digits and underscores",
        ));
    }
}

fn check_credential(credential: &str, rules: &BorrowerRules, errors: &mut Vec<FieldError>) {
    if !is_digits(credential, rules.credential_digits) {
        errors.push(FieldError::new(
            Field::Credential,
            format!("must be exactly {} digits", rules.credential_digits),
        ));
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// capture line quoted when paying an installment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn parse(value: &str, rules: &BorrowerRules) -> Result<Self> {
        if is_digits(value, rules.payment_reference_digits) {
            Ok(PaymentReference(value.to_string()))
        } else {
            Err(LendingError::InvalidPaymentReference)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn fields() -> BorrowerFields {
        BorrowerFields {
            first_name: "José".to_string(),
            paternal_surname: "Núñez".to_string(),
            maternal_surname: "De la Cruz".to_string(),
            age: 30,
            monthly_income: dec!(18500.00),
            handle: "Jose_Nunez".to_string(),
            credential: "1234".to_string(),
        }
    }

    fn rules() -> BorrowerRules {
        BorrowerRules::default()
    }

    fn failing_fields(f: &BorrowerFields) -> Vec<Field> {
        f.validate(&rules())
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn test_valid_fields_are_normalized() {
        let valid = fields().validate(&rules()).unwrap();
        assert_eq!(valid.handle, "jose_nunez");
        assert_eq!(valid.age, 30);
        assert_eq!(valid.monthly_income, Money::from_decimal(dec!(18500.00)));
        assert_eq!(valid.maternal_surname, "De la Cruz");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("Juan2")]
    #[case("O'Brien")]
    #[case("Abcdefghijklmnopqrstuvwxy")]
    fn test_rejects_bad_names(#[case] name: &str) {
        let mut f = fields();
        f.first_name = name.to_string();
        assert_eq!(failing_fields(&f), vec![Field::FirstName]);
    }

    #[test]
    fn test_name_length_counts_characters_not_bytes() {
        let mut f = fields();
        f.paternal_surname = "Ñ".repeat(24);
        assert!(f.validate(&rules()).is_ok());
    }

    #[rstest]
    #[case(17, false)]
    #[case(18, true)]
    #[case(65, true)]
    #[case(66, false)]
    #[case(-1, false)]
    fn test_age_bounds(#[case] age: i64, #[case] ok: bool) {
        let mut f = fields();
        f.age = age;
        assert_eq!(f.validate(&rules()).is_ok(), ok);
    }

    #[rstest]
    #[case("abcdefghijklmn", true)]
    #[case("abcdefghijklmno", false)]
    #[case("bad-handle", false)]
    #[case("", false)]
    fn test_handle_rules(#[case] handle: &str, #[case] ok: bool) {
        let mut f = fields();
        f.handle = handle.to_string();
        assert_eq!(f.validate(&rules()).is_ok(), ok);
    }

    #[rstest]
    #[case("0000", true)]
    #[case("123", false)]
    #[case("12345", false)]
    #[case("12a4", false)]
    #[case("١٢٣٤", false)]
    fn test_credential_rules(#[case] credential: &str, #[case] ok: bool) {
        let mut f = fields();
        f.credential = credential.to_string();
        assert_eq!(f.validate(&rules()).is_ok(), ok);
    }

    #[test]
    fn test_collects_every_failure() {
        let f = BorrowerFields {
            first_name: String::new(),
            paternal_surname: "Lopez".to_string(),
            maternal_surname: "Diaz".to_string(),
            age: 70,
            monthly_income: dec!(0),
            handle: "a b".to_string(),
            credential: "12".to_string(),
        };
        assert_eq!(
            failing_fields(&f),
            vec![
                Field::FirstName,
                Field::Age,
                Field::MonthlyIncome,
                Field::Handle,
                Field::Credential
            ]
        );
        assert!(matches!(
            f.validated(&rules()),
            Err(LendingError::Validation { errors }) if errors.len() == 5
        ));
    }

    #[test]
    fn test_profile_update_validation() {
        let update = ProfileUpdate {
            first_name: "Ana".to_string(),
            paternal_surname: "Ruiz".to_string(),
            maternal_surname: "Soto".to_string(),
            age: 40,
            credential: "9876".to_string(),
        };
        assert_eq!(update.validate(&rules()).unwrap().age, 40);

        let bad = ProfileUpdate { age: 12, ..update };
        assert!(matches!(bad.validated(&rules()), Err(LendingError::Validation { .. })));
    }

    #[rstest]
    #[case("123456789012345", true)]
    #[case("", false)]
    #[case("1234567", false)]
    #[case("1234567890123456", false)]
    #[case("A1B2C3D4E5F6G7H", false)]
    #[case("11111111111111A", false)]
    fn test_payment_reference(#[case] value: &str, #[case] ok: bool) {
        match PaymentReference::parse(value, &rules()) {
            Ok(reference) => {
                assert!(ok);
                assert_eq!(reference.as_str(), value);
            }
            Err(err) => {
                assert!(!ok);
                assert_eq!(err, LendingError::InvalidPaymentReference);
            }
        }
    }
}
