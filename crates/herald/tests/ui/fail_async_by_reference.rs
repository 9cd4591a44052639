use std::sync::LazyLock;

use herald::prelude::*;

struct Tick;

static TICKED: LazyLock<Signal<Tick>> = LazyLock::new(Signal::new);

#[receiver(TICKED)]
async fn on_tick(_event: &Event<Tick>) -> Outcome {
    Ok(())
}

fn main() {
    let _ = TICKED.len();
}
