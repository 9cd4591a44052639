//! Signals and delivery
//!
//! A [`Signal`] decouples the code that announces something from the code that
//! reacts to it. Receivers are connected to a signal, optionally filtered by
//! sender; [`Signal::send`] then invokes every matching receiver one after the
//! other, in connection order, awaiting async receivers before moving on.
//!
//! Two delivery modes are provided:
//! - [`Signal::send`] stops at the first failing receiver and returns its error.
//! - [`Signal::send_robust`] records each failure next to its receiver and
//!   keeps delivering.
//!
//! # Examples
//!
//! ```rust,no_run
//! use herald_core::{ConnectOptions, Event, Receiver, Signal};
//!
//! #[derive(Debug)]
//! struct OrderPlaced {
//!     id: u64,
//! }
//!
//! # async fn example() -> Result<(), herald_core::ReceiverFailure> {
//! let placed: Signal<OrderPlaced> = Signal::named("order_placed");
//!
//! let mailer = Receiver::from_async(|event: Event<OrderPlaced>| async move {
//!     println!("mailing confirmation for order {}", event.payload().id);
//!     Ok(())
//! });
//! placed
//!     .connect_with(&mailer, ConnectOptions::default().sender("checkout"))
//!     .unwrap();
//!
//! let responses = placed.send("checkout", OrderPlaced { id: 7 }).await?;
//! assert_eq!(responses.len(), 1);
//! # Ok(())
//! # }
//! ```


use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::error::{Outcome, ReceiverFailure, SignalError};
use crate::receiver::{Connectable, Event, Receiver};
use crate::registry::{ConnectOptions, LookupKey, Registry};
use crate::sender::{Sender, SenderFilter};

/// Results of a fail-fast delivery, in delivery order
pub type Responses<P, R> = Vec<(Receiver<P, R>, R)>;

/// Results of a robust delivery, failures included, in delivery order
pub type RobustResponses<P, R> = Vec<(Receiver<P, R>, Outcome<R>)>;

static SIGNAL_ID_COUNTER: OnceLock<Mutex<u64>> = OnceLock::new();

/// Get the next unique signal ID
fn next_signal_id() -> u64 {
    let counter = SIGNAL_ID_COUNTER.get_or_init(|| Mutex::new(0));
    let mut id = counter.lock();
    *id += 1;
    *id
}

/// Signal creation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Name used in log records
    pub name: Option<String>,
    /// Validate receivers when they are connected
    pub debug: bool,
    /// Memoize the live receiver list per sender
    pub use_caching: bool,
}

impl SignalConfig {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn caching(mut self, use_caching: bool) -> Self {
        self.use_caching = use_caching;
        self
    }
}

struct SignalInner<P, R> {
    id: u64,
    name: Option<String>,
    registry: Registry<P, R>,
}

/// A dispatch point receivers connect to
///
/// Cloning a signal gives another handle to the same registrations; two
/// signals are equal only when they are handles to the same instance.
pub struct Signal<P, R = ()> {
    inner: Arc<SignalInner<P, R>>,
}

impl<P, R> Signal<P, R> {
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(SignalConfig::default().name(name))
    }

    pub fn with_config(config: SignalConfig) -> Self {
        let id = next_signal_id();
        let label = match &config.name {
            Some(name) => name.clone(),
            None => format!("signal#{}", id),
        };
        Self {
            inner: Arc::new(SignalInner {
                id,
                name: config.name,
                registry: Registry::new(label, config.debug, config.use_caching),
            }),
        }
    }

    /// Process-unique id of this signal
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn is_debug(&self) -> bool {
        self.inner.registry.is_debug()
    }

    pub fn caching(&self) -> bool {
        self.inner.registry.caching()
    }

    pub fn set_caching(&self, use_caching: bool) {
        self.inner.registry.set_caching(use_caching);
    }

    pub fn registry(&self) -> &Registry<P, R> {
        &self.inner.registry
    }

    /// Connect `receiver` weakly, for any sender
    pub fn connect<C>(&self, receiver: &C) -> Result<(), SignalError>
    where
        C: Connectable<P, R> + ?Sized,
    {
        self.connect_with(receiver, ConnectOptions::default())
    }

    pub fn connect_with<C>(&self, receiver: &C, options: ConnectOptions) -> Result<(), SignalError>
    where
        C: Connectable<P, R> + ?Sized,
    {
        self.inner.registry.connect(receiver, &options).map(|_| ())
    }

    /// Connect `receiver` for as long as the returned [`Connection`] lives
    ///
    /// If an equal registration already exists the connection is inert: it
    /// never removes a registration it did not create.
    pub fn connect_scoped<C>(
        &self,
        receiver: &C,
        options: ConnectOptions,
    ) -> Result<Connection<P, R>, SignalError>
    where
        C: Connectable<P, R> + ?Sized,
    {
        let created = self.inner.registry.connect(receiver, &options)?;
        Ok(Connection {
            signal: Arc::downgrade(&self.inner),
            key: created.then(|| options.lookup_key(receiver.receiver_id())),
        })
    }

    /// Undo [`Signal::connect`]; returns whether a registration was removed
    pub fn disconnect<C>(&self, receiver: &C) -> bool
    where
        C: Connectable<P, R> + ?Sized,
    {
        self.disconnect_with(receiver, ConnectOptions::default())
    }

    /// Undo [`Signal::connect_with`]; only `sender` and `dispatch_uid` of `options` matter
    pub fn disconnect_with<C>(&self, receiver: &C, options: ConnectOptions) -> bool
    where
        C: Connectable<P, R> + ?Sized,
    {
        self.inner.registry.disconnect(receiver, &options)
    }

    /// Remove a registration by dispatch_uid alone
    pub fn disconnect_uid(&self, dispatch_uid: &str, sender: SenderFilter) -> bool {
        self.inner.registry.disconnect_uid(dispatch_uid, &sender)
    }

    /// Receivers a delivery from `sender` would reach, in order
    pub fn live_receivers(&self, sender: impl Into<Sender>) -> Vec<Receiver<P, R>> {
        self.inner.registry.live_receivers(&sender.into())
    }

    pub fn has_listeners(&self, sender: impl Into<Sender>) -> bool {
        self.inner.registry.has_listeners(&sender.into())
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    pub fn clear(&self) -> usize {
        self.inner.registry.clear()
    }
}

impl<P, R> Signal<P, R>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Deliver `payload` to every receiver matching `sender`
    ///
    /// Receivers run one at a time, in connection order. The first error a
    /// receiver returns aborts the delivery and is returned as is; receivers
    /// that already ran are not rolled back.
    pub async fn send(
        &self,
        sender: impl Into<Sender>,
        payload: P,
    ) -> Result<Responses<P, R>, ReceiverFailure> {
        let sender = sender.into();
        let receivers = self.inner.registry.live_receivers(&sender);
        if receivers.is_empty() {
            return Ok(Vec::new());
        }

        let event = Event::new(self.clone(), sender, payload);
        let mut responses = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            trace!(signal = %self, receiver = receiver.name(), "delivering");
            let response = receiver.invoke(&event).await?;
            responses.push((receiver, response));
        }
        Ok(responses)
    }

    /// Deliver `payload` to every receiver matching `sender`, whatever fails
    ///
    /// A receiver's error (or panic) becomes its entry in the result and the
    /// remaining receivers still run.
    pub async fn send_robust(&self, sender: impl Into<Sender>, payload: P) -> RobustResponses<P, R> {
        let sender = sender.into();
        let receivers = self.inner.registry.live_receivers(&sender);
        if receivers.is_empty() {
            return Vec::new();
        }

        let event = Event::new(self.clone(), sender, payload);
        let mut responses = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            trace!(signal = %self, receiver = receiver.name(), "delivering");
            let outcome = receiver.invoke_catching(&event).await;
            if let Err(err) = &outcome {
                error!(
                    signal = %self,
                    receiver = receiver.name(),
                    error = %err,
                    "receiver failed during robust delivery"
                );
            }
            responses.push((receiver, outcome));
        }
        responses
    }
}

impl<P, R> Default for Signal<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> Clone for Signal<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P, R> PartialEq for Signal<P, R> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P, R> Eq for Signal<P, R> {}

impl<P, R> fmt::Debug for Signal<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl<P, R> fmt::Display for Signal<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => f.write_str(name),
            None => write!(f, "signal#{}", self.inner.id),
        }
    }
}

/// A registration that ends when dropped
///
/// Returned by [`Signal::connect_scoped`]. It does not keep the signal alive.
#[must_use = "dropping a Connection disconnects its receiver immediately"]
pub struct Connection<P, R = ()> {
    signal: Weak<SignalInner<P, R>>,
    key: Option<LookupKey>,
}

impl<P, R> Connection<P, R> {
    /// Disconnect now; returns whether the registration was still there
    pub fn disconnect(mut self) -> bool {
        self.release()
    }

    /// Keep the registration for the rest of the signal's life
    pub fn detach(mut self) {
        self.key = None;
    }

    fn release(&mut self) -> bool {
        match (self.key.take(), self.signal.upgrade()) {
            (Some(key), Some(inner)) => inner.registry.remove(&key),
            _ => false,
        }
    }
}

impl<P, R> Drop for Connection<P, R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P, R> fmt::Debug for Connection<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("active", &self.key.is_some())
            .finish()
    }
}

/// Connect one receiver to several signals with the same options
///
/// Stops at the first signal that refuses the receiver; signals earlier in
/// the list stay connected.
pub fn connect_all<'a, P, R, C, I>(
    signals: I,
    receiver: &C,
    options: ConnectOptions,
) -> Result<(), SignalError>
where
    P: 'a,
    R: 'a,
    C: Connectable<P, R> + ?Sized,
    I: IntoIterator<Item = &'a Signal<P, R>>,
{
    for signal in signals {
        signal.connect_with(receiver, options.clone())?;
    }
    Ok(())
}
