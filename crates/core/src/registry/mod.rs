//! Receiver registry of a single signal
//!
//! The registry owns the ordered list of registrations, de-duplicates them,
//! prunes the ones whose receiver (or sender object) has been dropped, and
//! memoizes the live receiver list per sender when caching is on.
//!
//! Locking:
//! - One `parking_lot::Mutex` guards both the registrations and the cache.
//! - No receiver code ever runs while the lock is held; registrations removed
//!   by a disconnect or a prune are dropped after the lock is released.
//! - Any mutation clears the whole cache.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::SignalError;
use crate::introspect;
use crate::receiver::{Connectable, Receiver, ReceiverId, WeakReceiver};
use crate::sender::{Sender, SenderFilter, SenderKey, StoredFilter};

/// How a receiver gets connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Which senders the receiver listens to
    pub sender: SenderFilter,
    /// Hold the receiver weakly so dropping it ends the registration
    pub weak: bool,
    /// De-duplication key replacing the receiver's identity
    pub dispatch_uid: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            sender: SenderFilter::Any,
            weak: true,
            dispatch_uid: None,
        }
    }
}

impl ConnectOptions {
    pub fn sender(mut self, sender: impl Into<Sender>) -> Self {
        self.sender = SenderFilter::Exact(sender.into());
        self
    }

    pub fn filter(mut self, filter: SenderFilter) -> Self {
        self.sender = filter;
        self
    }

    pub fn weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }

    /// Keep the receiver alive for as long as it stays connected
    pub fn strong(self) -> Self {
        self.weak(false)
    }

    pub fn dispatch_uid(mut self, uid: impl Into<String>) -> Self {
        self.dispatch_uid = Some(uid.into());
        self
    }

    pub(crate) fn lookup_key(&self, receiver: ReceiverId) -> LookupKey {
        match &self.dispatch_uid {
            Some(uid) => LookupKey::Uid(uid.clone(), self.sender.key()),
            None => LookupKey::Receiver(receiver, self.sender.key()),
        }
    }
}

/// De-duplication key of a registration; `None` is the any-sender filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LookupKey {
    Uid(String, Option<SenderKey>),
    Receiver(ReceiverId, Option<SenderKey>),
}

enum Handle<P, R> {
    Strong(Receiver<P, R>),
    Weak(WeakReceiver<P, R>),
}

impl<P, R> Handle<P, R> {
    fn resolve(&self) -> Option<Receiver<P, R>> {
        match self {
            Handle::Strong(receiver) => Some(receiver.clone()),
            Handle::Weak(receiver) => receiver.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Handle::Strong(_) => true,
            Handle::Weak(receiver) => receiver.is_alive(),
        }
    }
}

struct Registration<P, R> {
    key: LookupKey,
    handle: Handle<P, R>,
    filter: StoredFilter,
}

impl<P, R> Registration<P, R> {
    fn is_alive(&self) -> bool {
        self.handle.is_alive() && self.filter.is_alive()
    }
}

struct RegistryState<P, R> {
    registrations: Vec<Registration<P, R>>,
    /// Indices into `registrations` of the live receivers per sender
    cache: HashMap<SenderKey, Vec<usize>, ahash::RandomState>,
    use_caching: bool,
}

impl<P, R> RegistryState<P, R> {
    /// Remove dead registrations, handing them back to be dropped unlocked
    fn prune(&mut self) -> Vec<Registration<P, R>> {
        if self.registrations.iter().all(Registration::is_alive) {
            return Vec::new();
        }
        let (alive, dead) = std::mem::take(&mut self.registrations)
            .into_iter()
            .partition(Registration::is_alive);
        self.registrations = alive;
        self.cache.clear();
        dead
    }

    /// Cached receivers for `key`
    ///
    /// `None` on a miss. `Some(Err(..))` when an entry no longer resolves; it
    /// carries the handles resolved so far, to be dropped once unlocked.
    fn cached(&self, key: &SenderKey) -> Option<Result<Vec<Receiver<P, R>>, Vec<Receiver<P, R>>>> {
        let indices = self.cache.get(key)?;
        let mut receivers = Vec::with_capacity(indices.len());
        for &index in indices {
            let resolved = self
                .registrations
                .get(index)
                .filter(|registration| registration.filter.matches(key))
                .and_then(|registration| registration.handle.resolve());
            match resolved {
                Some(receiver) => receivers.push(receiver),
                None => return Some(Err(receivers)),
            }
        }
        Some(Ok(receivers))
    }
}

/// Registrations of one signal
pub struct Registry<P, R = ()> {
    label: String,
    debug: bool,
    state: Mutex<RegistryState<P, R>>,
}

impl<P, R> Registry<P, R> {
    /// `label` names the owner in log records
    pub fn new(label: impl Into<String>, debug: bool, use_caching: bool) -> Self {
        Self {
            label: label.into(),
            debug,
            state: Mutex::new(RegistryState {
                registrations: Vec::new(),
                cache: HashMap::default(),
                use_caching,
            }),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn caching(&self) -> bool {
        self.state.lock().use_caching
    }

    /// Turn the sender lookup cache on or off; either way the cache starts empty
    pub fn set_caching(&self, use_caching: bool) {
        let mut state = self.state.lock();
        state.use_caching = use_caching;
        state.cache.clear();
    }

    /// Register `receiver`; returns false when an equal registration already exists
    pub fn connect<C>(&self, receiver: &C, options: &ConnectOptions) -> Result<bool, SignalError>
    where
        C: Connectable<P, R> + ?Sized,
    {
        if self.debug {
            self.validate(receiver, options)?;
        }

        let key = options.lookup_key(receiver.receiver_id());
        let handle = match (options.weak, receiver.to_strong()) {
            (false, Some(strong)) => Handle::Strong(strong),
            _ => Handle::Weak(receiver.to_weak()),
        };
        let registration = Registration {
            key,
            handle,
            filter: StoredFilter::new(&options.sender),
        };

        let (created, expired, rejected) = {
            let mut state = self.state.lock();
            let expired = state.prune();
            if state
                .registrations
                .iter()
                .any(|existing| existing.key == registration.key)
            {
                (false, expired, Some(registration))
            } else {
                state.registrations.push(registration);
                state.cache.clear();
                (true, expired, None)
            }
        };
        drop(rejected);
        self.log_expired(expired);

        debug!(
            signal = %self.label,
            receiver = receiver.receiver_name(),
            weak = options.weak,
            dispatch_uid = options.dispatch_uid.as_deref(),
            created,
            "connected receiver"
        );
        Ok(created)
    }

    fn validate<C>(&self, receiver: &C, options: &ConnectOptions) -> Result<(), SignalError>
    where
        C: Connectable<P, R> + ?Sized,
    {
        if !receiver.is_alive() {
            return Err(SignalError::InvalidReceiver {
                receiver: receiver.receiver_name().to_string(),
            });
        }
        if options.weak && options.dispatch_uid.is_none() && !introspect::accepts_event(receiver)
        {
            return Err(SignalError::InvalidReceiverSignature {
                receiver: receiver.receiver_name().to_string(),
            });
        }
        Ok(())
    }

    /// Remove the registration `receiver` was connected with under `options`
    pub fn disconnect<C>(&self, receiver: &C, options: &ConnectOptions) -> bool
    where
        C: Connectable<P, R> + ?Sized,
    {
        self.remove(&options.lookup_key(receiver.receiver_id()))
    }

    /// Remove the registration made with `dispatch_uid` for `sender`
    pub fn disconnect_uid(&self, dispatch_uid: &str, sender: &SenderFilter) -> bool {
        self.remove(&LookupKey::Uid(dispatch_uid.to_string(), sender.key()))
    }

    pub(crate) fn remove(&self, key: &LookupKey) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let position = state
                .registrations
                .iter()
                .position(|registration| &registration.key == key);
            position.map(|index| {
                state.cache.clear();
                state.registrations.remove(index)
            })
        };
        let found = removed.is_some();
        drop(removed);

        debug!(signal = %self.label, removed = found, "disconnected receiver");
        found
    }

    /// Receivers that fire for `sender`, in connection order
    ///
    /// Weak handles are resolved here, before any receiver runs, so the
    /// returned list is a stable snapshot for one delivery.
    pub fn live_receivers(&self, sender: &Sender) -> Vec<Receiver<P, R>> {
        let key = sender.key();
        let mut stale = Vec::new();
        let (receivers, expired) = {
            let mut state = self.state.lock();
            if state.use_caching {
                match state.cached(&key) {
                    Some(Ok(receivers)) => return receivers,
                    Some(Err(partial)) => stale = partial,
                    None => {}
                }
            }

            let expired = state.prune();
            let mut receivers = Vec::new();
            let mut indices = Vec::new();
            for (index, registration) in state.registrations.iter().enumerate() {
                if !registration.filter.matches(&key) {
                    continue;
                }
                if let Some(receiver) = registration.handle.resolve() {
                    receivers.push(receiver);
                    indices.push(index);
                }
            }
            if state.use_caching {
                state.cache.insert(key, indices);
            }
            (receivers, expired)
        };
        drop(stale);
        self.log_expired(expired);
        receivers
    }

    pub fn has_listeners(&self, sender: &Sender) -> bool {
        !self.live_receivers(sender).is_empty()
    }

    /// Number of registrations, after dropping the dead ones
    pub fn len(&self) -> usize {
        let (len, expired) = {
            let mut state = self.state.lock();
            let expired = state.prune();
            (state.registrations.len(), expired)
        };
        self.log_expired(expired);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration, returning how many there were
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            state.cache.clear();
            std::mem::take(&mut state.registrations)
        };
        let count = removed.len();
        drop(removed);
        debug!(signal = %self.label, count, "cleared receivers");
        count
    }

    fn log_expired(&self, expired: Vec<Registration<P, R>>) {
        if !expired.is_empty() {
            debug!(
                signal = %self.label,
                count = expired.len(),
                "pruned expired receivers"
            );
        }
    }
}
