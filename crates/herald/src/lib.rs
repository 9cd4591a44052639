pub use herald_core::{
    Connectable, ConnectOptions, Connection, Event, Outcome, Receive, Receiver, ReceiverFailure,
    ReceiverId, ReceiverPanicked, Registry, Responses, RobustResponses, Sender, SenderFilter,
    Signal, SignalConfig, SignalError, WeakReceiver, async_trait, connect_all,
    diagnostics::{catch_panic, panic_message},
    introspect,
};

#[cfg(feature = "diagnostics")]
pub use herald_core::{DiagnosticsConfig, DiagnosticsGuard, init_diagnostics};

pub use herald_macros::receiver;

pub mod prelude {
    pub use super::{
        ConnectOptions, Event, Outcome, Receive, Receiver, Sender, SenderFilter, Signal,
        SignalConfig, SignalError, async_trait, receiver,
    };
}
