/// account lifecycle - registration, settlement and closure
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use micro_lending_rs::{
    AccountLifecycle, BorrowerFields, Decimal, LendingError, MemoryStore, SafeTimeProvider,
    TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== account lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let store = Arc::new(MemoryStore::new());
    let lifecycle = AccountLifecycle::standard(store.clone());

    // 1. registration
    println!("1. registration");
    println!("---------------");
    let id = lifecycle.register(
        &BorrowerFields {
            first_name: "Andrés".to_string(),
            paternal_surname: "Vega".to_string(),
            maternal_surname: "Luna".to_string(),
            age: 38,
            monthly_income: Decimal::from(50_000),
            handle: "andres".to_string(),
            credential: "1357".to_string(),
        },
        &time,
    )?;
    let offer = lifecycle.credit_offer(id)?.ok_or("missing offer")?;
    println!("  principal: {}", offer.principal);
    println!("  total due: {} in {} installments of {}", offer.total, offer.months, offer.installment);

    // 2. a login with the wrong credential
    println!("\n2. login");
    println!("--------");
    match lifecycle.verify_credentials("andres", "0000") {
        Err(LendingError::InvalidCredentials) => println!("  ✓ wrong credential refused"),
        other => println!("  unexpected: {other:?}"),
    }
    println!("  ✓ logged in as {}", lifecycle.verify_credentials("andres", "1357")?);

    // 3. closing with pending installments is refused
    println!("\n3. early closure");
    println!("----------------");
    if let Err(err) = lifecycle.delete_cascade(id, &time) {
        println!("  ✗ {err}");
    }

    // 4. pay three installments on their due dates
    println!("\n4. servicing");
    println!("------------");
    let payments = lifecycle.list_payments(id)?;
    for payment in payments.iter().take(3) {
        println!("  {}: paying {}", time.now().format("%Y-%m-%d"), payment.amount);
        lifecycle.pay_installment(payment.id, "100000000000042", &time)?;
        controller.advance(Duration::days(15));
    }
    println!("  settled: {}", lifecycle.all_settled(id)?);

    // 5. pay off the rest and close
    println!("\n5. payoff and closure");
    println!("---------------------");
    let count = lifecycle.pay_in_full(id, "100000000000043", &time)?;
    println!("  ✓ {count} installments marked paid");
    lifecycle.delete_cascade(id, &time)?;
    println!("  ✓ account deleted, {} borrowers remain", store.borrower_count());

    println!("\nevents:");
    for event in lifecycle.take_events() {
        println!("  {event:?}");
    }

    Ok(())
}
