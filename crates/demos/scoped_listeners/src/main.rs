//! # Scoped Listeners
//!
//! Shows how registrations end:
//! - a weak receiver disappears when its last handle is dropped
//! - a `Connection` disconnects when it goes out of scope, unless detached
//! - a `Receive` handler lives as long as its instance
//! - a payload-only receiver is refused by a debug signal

use std::sync::Arc;

use herald::prelude::*;
use herald::{DiagnosticsConfig, init_diagnostics};

#[derive(Debug)]
struct Tick(u32);

struct Metrics {
    prefix: &'static str,
}

#[async_trait]
impl Receive<Tick> for Metrics {
    async fn receive(&self, event: Event<Tick>) -> Outcome {
        println!("{}: tick {}", self.prefix, event.payload().0);
        Ok(())
    }
}

async fn tick(signal: &Signal<Tick>, n: u32) -> Result<(), herald::ReceiverFailure> {
    let responses = signal.send(Sender::none(), Tick(n)).await?;
    println!("tick {n} reached {} receiver(s)", responses.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), herald::ReceiverFailure> {
    let _guard = init_diagnostics(&DiagnosticsConfig {
        level: "debug".to_string(),
        ..DiagnosticsConfig::default()
    });

    let ticks: Signal<Tick> = Signal::with_config(SignalConfig::default().name("ticks").debug(true));

    let printer = Receiver::new(|event: &Event<Tick>| {
        println!("printer: tick {}", event.payload().0);
        Ok(())
    });
    ticks.connect(&printer)?;
    tick(&ticks, 1).await?;

    drop(printer);
    tick(&ticks, 2).await?;

    let logger = Receiver::from_async(|event: Event<Tick>| async move {
        println!("logger: tick {}", event.payload().0);
        Ok(())
    });
    {
        let _connection = ticks.connect_scoped(&logger, ConnectOptions::default())?;
        tick(&ticks, 3).await?;
    }
    tick(&ticks, 4).await?;

    ticks
        .connect_scoped(&logger, ConnectOptions::default().dispatch_uid("logger"))?
        .detach();
    tick(&ticks, 5).await?;

    let metrics = Arc::new(Metrics { prefix: "metrics" });
    ticks.connect(&Receiver::handler(&metrics))?;
    tick(&ticks, 6).await?;
    drop(metrics);
    tick(&ticks, 7).await?;

    let payload_only = Receiver::payload_only(|tick: &Tick| {
        println!("payload only: {}", tick.0);
        Ok(())
    });
    match ticks.connect(&payload_only) {
        Ok(()) => println!("payload-only receiver connected"),
        Err(err) => println!("refused: {err}"),
    }
    ticks.connect_with(&payload_only, ConnectOptions::default().dispatch_uid("payload"))?;
    tick(&ticks, 8).await?;

    println!("{} registration(s) left, clearing", ticks.clear());
    Ok(())
}
