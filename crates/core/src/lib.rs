//! In-process signal dispatch
//!
//! Senders announce events through a [`Signal`]; receivers connected to it,
//! optionally only for a given [`Sender`], are invoked in connection order.
//! Receivers may be sync or async, are held weakly by default and disappear
//! from the registry once the application drops them.

pub mod diagnostics;
pub mod error;
pub mod introspect;
pub mod receiver;
pub mod registry;
pub mod sender;
pub mod signal;

pub use error::{Outcome, ReceiverFailure, ReceiverPanicked, SignalError};
pub use receiver::{Connectable, Event, Receive, Receiver, ReceiverId, WeakReceiver};
pub use registry::{ConnectOptions, Registry};
pub use sender::{Sender, SenderFilter};
pub use signal::{Connection, Responses, RobustResponses, Signal, SignalConfig, connect_all};

#[cfg(feature = "diagnostics")]
pub use diagnostics::{DiagnosticsConfig, DiagnosticsGuard, init_diagnostics};

pub use async_trait::async_trait;
