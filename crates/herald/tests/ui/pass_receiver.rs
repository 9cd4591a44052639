use std::sync::LazyLock;

use herald::prelude::*;

struct Tick;

static TICKED: LazyLock<Signal<Tick>> = LazyLock::new(Signal::new);

#[receiver(TICKED, sender = 7u64)]
fn on_tick(_event: &Event<Tick>) -> Outcome {
    Ok(())
}

#[receiver([TICKED], dispatch_uid = "async_tick")]
async fn on_tick_async(_event: Event<Tick>) -> Outcome {
    Ok(())
}

fn main() {
    let _sync: Result<Receiver<Tick>, SignalError> = connect_on_tick();
    let _async: Result<Receiver<Tick>, SignalError> = connect_on_tick_async();
}
