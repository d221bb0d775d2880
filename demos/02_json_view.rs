/// json view - serialization of an account for profile pages and debugging
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use micro_lending_rs::{
    AccountLifecycle, BorrowerFields, Decimal, LendingConfig, MemoryStore, SafeTimeProvider,
    TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== json account view ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
    ));

    // configuration round-trips through json
    let config = LendingConfig::from_json(&LendingConfig::standard().to_json_pretty()?)?;
    let lifecycle = AccountLifecycle::new(Arc::new(MemoryStore::new()), config)?;

    let id = lifecycle.register(
        &BorrowerFields {
            first_name: "Sofía".to_string(),
            paternal_surname: "Navarro".to_string(),
            maternal_surname: "Ibáñez".to_string(),
            age: 52,
            monthly_income: Decimal::new(1_250_050, 2),
            handle: "sofia_n".to_string(),
            credential: "8080".to_string(),
        },
        &time,
    )?;

    let first = lifecycle.list_payments(id)?[0].id;
    lifecycle.mark_paid(first, &time)?;

    println!("{}", lifecycle.account_view(id)?.to_json_pretty()?);

    Ok(())
}
