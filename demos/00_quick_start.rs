/// quick start - quote credit terms and register a borrower
use std::sync::Arc;

use micro_lending_rs::{AccountLifecycle, BorrowerFields, Decimal, MemoryStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let lifecycle = AccountLifecycle::standard(Arc::new(MemoryStore::new()));

    // quote before registering
    let quote = lifecycle.decide_credit_str("18,500.00")?;
    println!(
        "{}: {} at {} over {} months, {} per installment",
        quote.message, quote.principal, quote.rate, quote.months, quote.installment
    );

    // register with system time
    let id = lifecycle.register_now(&BorrowerFields {
        first_name: "Lucía".to_string(),
        paternal_surname: "Méndez".to_string(),
        maternal_surname: "Castro".to_string(),
        age: 29,
        monthly_income: Decimal::new(1_850_000, 2),
        handle: "lucia".to_string(),
        credential: "2468".to_string(),
    })?;

    for payment in lifecycle.list_payments(id)? {
        println!("  {}  {}  {}", payment.due_date, payment.amount, payment.status);
    }

    Ok(())
}
