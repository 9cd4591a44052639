//! # Order Pipeline
//!
//! A checkout announces placed orders on a signal. Several parts of the
//! application react to it without the checkout knowing about them:
//! - a declarative receiver that reserves stock (sync, strong)
//! - a mailer bound to a service instance (async, weak on the instance)
//! - a fraud check that rejects large orders from one sender only
//!
//! The same order is then delivered with `send`, which stops at the fraud
//! check, and with `send_robust`, which reports it and keeps going.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use herald::prelude::*;
use herald::{DiagnosticsConfig, RobustResponses, init_diagnostics};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
struct OrderPlaced {
    id: u64,
    customer: String,
    total_cents: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("order {id} over the {limit_cents} cent limit")]
struct FraudSuspected {
    id: u64,
    limit_cents: u64,
}

static ORDER_PLACED: LazyLock<Signal<OrderPlaced, String>> =
    LazyLock::new(|| Signal::with_config(SignalConfig::default().name("order_placed").caching(true)));

static RESERVED_UNITS: AtomicU64 = AtomicU64::new(0);

#[receiver(ORDER_PLACED, dispatch_uid = "inventory")]
fn reserve_stock(event: &Event<OrderPlaced, String>) -> Outcome<String> {
    let units = RESERVED_UNITS.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(format!("reserved stock for order {} ({} total)", event.payload().id, units))
}

#[receiver(ORDER_PLACED, sender = "web", dispatch_uid = "fraud_check")]
fn check_fraud(event: &Event<OrderPlaced, String>) -> Outcome<String> {
    const LIMIT_CENTS: u64 = 100_000;

    let order = event.payload();
    if order.total_cents > LIMIT_CENTS {
        return Err(FraudSuspected {
            id: order.id,
            limit_cents: LIMIT_CENTS,
        }
        .into());
    }
    Ok(format!("order {} looks fine", order.id))
}

struct Mailer {
    from: String,
}

impl Mailer {
    async fn confirm(self: Arc<Self>, event: Event<OrderPlaced, String>) -> Outcome<String> {
        tokio::task::yield_now().await;
        let order = event.payload();
        Ok(format!(
            "{} mailed {} about order {} (sender {})",
            self.from,
            order.customer,
            order.id,
            event.sender()
        ))
    }
}

fn print_responses(label: &str, responses: &RobustResponses<OrderPlaced, String>) {
    println!("{label}:");
    for (receiver, outcome) in responses {
        match outcome {
            Ok(message) => println!("  ok   {message}"),
            Err(err) => println!("  fail {} -> {err}", receiver.name()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), herald::ReceiverFailure> {
    let _guard = init_diagnostics(&DiagnosticsConfig::default());

    connect_reserve_stock()?;
    connect_check_fraud()?;

    let mailer = Arc::new(Mailer {
        from: "shop@example.com".to_string(),
    });
    ORDER_PLACED.connect(&Receiver::async_method(&mailer, Mailer::confirm))?;

    let orders: Vec<OrderPlaced> = serde_json::from_str(
        r#"[
            { "id": 1, "customer": "ada", "total_cents": 4200 },
            { "id": 2, "customer": "grace", "total_cents": 250000 }
        ]"#,
    )?;

    for order in orders {
        match ORDER_PLACED.send("web", order.clone()).await {
            Ok(responses) => {
                for (_, message) in responses {
                    println!("  ok   {message}");
                }
            }
            Err(err) => warn!(order = order.id, error = %err, "checkout aborted"),
        }

        let responses = ORDER_PLACED.send_robust("web", order).await;
        print_responses("robust delivery", &responses);
    }

    // Orders from the back office skip the fraud check
    let responses = ORDER_PLACED
        .send_robust(
            "back_office",
            OrderPlaced {
                id: 3,
                customer: "linus".to_string(),
                total_cents: 900_000,
            },
        )
        .await;
    print_responses("back office", &responses);

    drop(mailer);
    info!(
        receivers = ORDER_PLACED.len(),
        "mailer dropped, its registration expired"
    );

    Ok(())
}
