//! Receivers: the callables a signal delivers to
//!
//! A [`Receiver`] is a strong, cheaply clonable handle over either a
//! synchronous or an asynchronous callable. Registries usually keep only a
//! [`WeakReceiver`], so a registration lives exactly as long as the
//! application holds on to the `Receiver` (or, for bound methods, the instance
//! the method is bound to).
//!
//! # Examples
//!
//! ```rust
//! use herald_core::{Event, Receiver, Sender, Signal};
//!
//! let signal: Signal<String> = Signal::new();
//! let greeter = Receiver::new(|event: &Event<String>| {
//!     println!("hello {}", event.payload());
//!     Ok(())
//! });
//! signal.connect(&greeter).unwrap();
//! assert!(signal.has_listeners(Sender::none()));
//!
//! drop(greeter);
//! assert!(!signal.has_listeners(Sender::none()));
//! ```

#[cfg(test)]
mod tests;

use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::diagnostics::{catch_panic, panic_message};
use crate::error::{Outcome, ReceiverPanicked, SignalError};
use crate::introspect::{Form, FunctionKey};
use crate::sender::Sender;
use crate::signal::Signal;

type Object = dyn Any + Send + Sync;
type SyncFn<P, R> = dyn Fn(&Event<P, R>) -> Outcome<R> + Send + Sync;
type AsyncFn<P, R> = dyn Fn(Event<P, R>) -> BoxFuture<'static, Outcome<R>> + Send + Sync;
type Binder<P, R> = Arc<dyn Fn(Arc<Object>) -> Option<Callable<P, R>> + Send + Sync>;

/// Everything a receiver gets for one delivery
pub struct Event<P, R = ()> {
    signal: Signal<P, R>,
    sender: Sender,
    payload: Arc<P>,
}

impl<P, R> Event<P, R> {
    pub(crate) fn new(signal: Signal<P, R>, sender: Sender, payload: P) -> Self {
        Self {
            signal,
            sender,
            payload: Arc::new(payload),
        }
    }

    /// The signal being delivered
    pub fn signal(&self) -> &Signal<P, R> {
        &self.signal
    }

    /// Who sent it
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

impl<P, R> Clone for Event<P, R> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            sender: self.sender.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<P: fmt::Debug, R> fmt::Debug for Event<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signal", &self.signal)
            .field("sender", &self.sender)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Static capability contract for receiver types
///
/// Implement it on a type and connect an `Arc` of it with
/// [`Receiver::handler`]; the registration is bound to that instance.
///
/// ```rust
/// use herald_core::{Event, Outcome, Receive, async_trait};
///
/// struct Audit;
///
/// #[async_trait]
/// impl Receive<String> for Audit {
///     async fn receive(&self, event: Event<String>) -> Outcome {
///         println!("audit: {}", event.payload());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Receive<P, R = ()>: Send + Sync + 'static {
    async fn receive(&self, event: Event<P, R>) -> Outcome<R>;
}

pub(crate) enum Callable<P, R> {
    Sync(Arc<SyncFn<P, R>>),
    Async(Arc<AsyncFn<P, R>>),
}

impl<P, R> Clone for Callable<P, R> {
    fn clone(&self) -> Self {
        match self {
            Callable::Sync(f) => Callable::Sync(f.clone()),
            Callable::Async(f) => Callable::Async(f.clone()),
        }
    }
}

enum WeakCallable<P, R> {
    Sync(Weak<SyncFn<P, R>>),
    Async(Weak<AsyncFn<P, R>>),
}

impl<P, R> Clone for WeakCallable<P, R> {
    fn clone(&self) -> Self {
        match self {
            WeakCallable::Sync(f) => WeakCallable::Sync(f.clone()),
            WeakCallable::Async(f) => WeakCallable::Async(f.clone()),
        }
    }
}

impl<P, R> Callable<P, R> {
    fn address(&self) -> usize {
        match self {
            Callable::Sync(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Async(f) => Arc::as_ptr(f) as *const () as usize,
        }
    }

    fn downgrade(&self) -> WeakCallable<P, R> {
        match self {
            Callable::Sync(f) => WeakCallable::Sync(Arc::downgrade(f)),
            Callable::Async(f) => WeakCallable::Async(Arc::downgrade(f)),
        }
    }

    async fn call(&self, event: &Event<P, R>) -> Outcome<R> {
        match self {
            Callable::Sync(f) => f(event),
            Callable::Async(f) => f(event.clone()).await,
        }
    }

    /// Like `call`, but a panic comes back as its payload instead of unwinding
    async fn call_catching(&self, event: &Event<P, R>) -> Result<Outcome<R>, Box<dyn Any + Send>> {
        match self {
            Callable::Sync(f) => catch_panic(AssertUnwindSafe(|| f(event))),
            Callable::Async(f) => match catch_panic(AssertUnwindSafe(|| f(event.clone()))) {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(panic) => Err(panic),
            },
        }
    }
}

impl<P, R> WeakCallable<P, R> {
    fn upgrade(&self) -> Option<Callable<P, R>> {
        match self {
            WeakCallable::Sync(f) => f.upgrade().map(Callable::Sync),
            WeakCallable::Async(f) => f.upgrade().map(Callable::Async),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            WeakCallable::Sync(f) => f.strong_count() > 0,
            WeakCallable::Async(f) => f.strong_count() > 0,
        }
    }
}

enum Target<P, R> {
    Function(Callable<P, R>),
    Bound {
        instance: Arc<Object>,
        method: usize,
        bind: Binder<P, R>,
    },
}

enum WeakTarget<P, R> {
    Function {
        callable: WeakCallable<P, R>,
        address: usize,
    },
    Bound {
        instance: Weak<Object>,
        address: usize,
        method: usize,
        bind: Binder<P, R>,
    },
}

struct Meta {
    name: String,
    function: FunctionKey,
    form: Form,
    asynchronous: bool,
}

/// Identity of a receiver within a registry
///
/// Functions are identified by their allocation, bound methods by the pair
/// (instance, method), so re-binding the same method yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId {
    target: usize,
    method: usize,
}

/// A strong handle to a receiver
pub struct Receiver<P, R = ()> {
    target: Target<P, R>,
    meta: Arc<Meta>,
}

/// A receiver handle that does not keep the receiver alive
pub struct WeakReceiver<P, R = ()> {
    target: WeakTarget<P, R>,
    meta: Arc<Meta>,
}

fn address_of(object: &Arc<Object>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl<P, R> Receiver<P, R>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Wrap a synchronous function of the full event
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event<P, R>) -> Outcome<R> + Send + Sync + 'static,
    {
        let callable: Arc<SyncFn<P, R>> = Arc::new(f);
        Self::function(
            Callable::Sync(callable),
            Meta {
                name: type_name::<F>().to_string(),
                function: FunctionKey::of::<F>(),
                form: Form::Function,
                asynchronous: false,
            },
        )
    }

    /// Wrap an async function of the full event
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Event<P, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<R>> + Send + 'static,
    {
        let callable: Arc<AsyncFn<P, R>> = Arc::new(move |event| f(event).boxed());
        Self::function(
            Callable::Async(callable),
            Meta {
                name: type_name::<F>().to_string(),
                function: FunctionKey::of::<F>(),
                form: Form::Function,
                asynchronous: true,
            },
        )
    }

    /// Wrap a synchronous function that only looks at the payload
    ///
    /// Such a receiver ignores `sender` and `signal`; debug-mode signals refuse
    /// to connect it weakly unless a dispatch_uid is given.
    pub fn payload_only<F>(f: F) -> Self
    where
        F: Fn(&P) -> Outcome<R> + Send + Sync + 'static,
    {
        let callable: Arc<SyncFn<P, R>> = Arc::new(move |event: &Event<P, R>| f(event.payload()));
        Self::function(
            Callable::Sync(callable),
            Meta {
                name: type_name::<F>().to_string(),
                function: FunctionKey::of::<F>(),
                form: Form::PayloadOnly,
                asynchronous: false,
            },
        )
    }

    /// Bind a synchronous method to `instance`
    pub fn method<T>(instance: &Arc<T>, method: fn(&T, &Event<P, R>) -> Outcome<R>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let address = method as usize;
        let bind: Binder<P, R> = Arc::new(move |object: Arc<Object>| {
            let instance = object.downcast::<T>().ok()?;
            let callable: Arc<SyncFn<P, R>> =
                Arc::new(move |event: &Event<P, R>| method(&instance, event));
            Some(Callable::Sync(callable))
        });
        Self::bound(
            instance,
            address,
            bind,
            Meta {
                name: format!("{}::<method {:#x}>", type_name::<T>(), address),
                function: FunctionKey::method::<T>(address),
                form: Form::Method,
                asynchronous: false,
            },
        )
    }

    /// Bind an async method to `instance`
    pub fn async_method<T, Fut>(instance: &Arc<T>, method: fn(Arc<T>, Event<P, R>) -> Fut) -> Self
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Outcome<R>> + Send + 'static,
    {
        let address = method as usize;
        let bind: Binder<P, R> = Arc::new(move |object: Arc<Object>| {
            let instance = object.downcast::<T>().ok()?;
            let callable: Arc<AsyncFn<P, R>> =
                Arc::new(move |event| method(instance.clone(), event).boxed());
            Some(Callable::Async(callable))
        });
        Self::bound(
            instance,
            address,
            bind,
            Meta {
                name: format!("{}::<method {:#x}>", type_name::<T>(), address),
                function: FunctionKey::method::<T>(address),
                form: Form::Method,
                asynchronous: true,
            },
        )
    }

    /// Bind a [`Receive`] implementation
    pub fn handler<H>(handler: &Arc<H>) -> Self
    where
        H: Receive<P, R>,
    {
        let bind: Binder<P, R> = Arc::new(|object: Arc<Object>| {
            let handler = object.downcast::<H>().ok()?;
            let callable: Arc<AsyncFn<P, R>> = Arc::new(move |event| {
                let handler = handler.clone();
                async move { handler.receive(event).await }.boxed()
            });
            Some(Callable::Async(callable))
        });
        Self::bound(
            handler,
            0,
            bind,
            Meta {
                name: type_name::<H>().to_string(),
                function: FunctionKey::method::<H>(0),
                form: Form::Method,
                asynchronous: true,
            },
        )
    }

    fn function(callable: Callable<P, R>, meta: Meta) -> Self {
        Self {
            target: Target::Function(callable),
            meta: Arc::new(meta),
        }
    }

    fn bound<T>(instance: &Arc<T>, method: usize, bind: Binder<P, R>, meta: Meta) -> Self
    where
        T: Send + Sync + 'static,
    {
        let instance: Arc<Object> = instance.clone();
        Self {
            target: Target::Bound {
                instance,
                method,
                bind,
            },
            meta: Arc::new(meta),
        }
    }
}

impl<P, R> Receiver<P, R> {
    pub fn id(&self) -> ReceiverId {
        match &self.target {
            Target::Function(callable) => ReceiverId {
                target: callable.address(),
                method: 0,
            },
            Target::Bound {
                instance, method, ..
            } => ReceiverId {
                target: address_of(instance),
                method: *method,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Whether delivery awaits this receiver
    pub fn is_async(&self) -> bool {
        self.meta.asynchronous
    }

    pub fn downgrade(&self) -> WeakReceiver<P, R> {
        let target = match &self.target {
            Target::Function(callable) => WeakTarget::Function {
                callable: callable.downgrade(),
                address: callable.address(),
            },
            Target::Bound {
                instance,
                method,
                bind,
            } => WeakTarget::Bound {
                instance: Arc::downgrade(instance),
                address: address_of(instance),
                method: *method,
                bind: bind.clone(),
            },
        };
        WeakReceiver {
            target,
            meta: self.meta.clone(),
        }
    }

    fn callable(&self) -> Option<Callable<P, R>> {
        match &self.target {
            Target::Function(callable) => Some(callable.clone()),
            Target::Bound { instance, bind, .. } => bind(instance.clone()),
        }
    }

    fn not_callable(&self) -> SignalError {
        SignalError::InvalidReceiver {
            receiver: self.name().to_string(),
        }
    }

    /// Run the receiver for one event, letting panics unwind
    pub(crate) async fn invoke(&self, event: &Event<P, R>) -> Outcome<R> {
        match self.callable() {
            Some(callable) => callable.call(event).await,
            None => Err(Box::new(self.not_callable())),
        }
    }

    /// Run the receiver for one event, turning a panic into a failure
    pub(crate) async fn invoke_catching(&self, event: &Event<P, R>) -> Outcome<R> {
        let Some(callable) = self.callable() else {
            return Err(Box::new(self.not_callable()));
        };
        match callable.call_catching(event).await {
            Ok(outcome) => outcome,
            Err(panic) => Err(Box::new(ReceiverPanicked {
                receiver: self.name().to_string(),
                message: panic_message(panic.as_ref()),
            })),
        }
    }
}

impl<P, R> WeakReceiver<P, R> {
    pub fn id(&self) -> ReceiverId {
        match &self.target {
            WeakTarget::Function { address, .. } => ReceiverId {
                target: *address,
                method: 0,
            },
            WeakTarget::Bound {
                address, method, ..
            } => ReceiverId {
                target: *address,
                method: *method,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Get a strong handle back, unless the receiver (or its instance) is gone
    pub fn upgrade(&self) -> Option<Receiver<P, R>> {
        let target = match &self.target {
            WeakTarget::Function { callable, .. } => Target::Function(callable.upgrade()?),
            WeakTarget::Bound {
                instance,
                method,
                bind,
                ..
            } => Target::Bound {
                instance: instance.upgrade()?,
                method: *method,
                bind: bind.clone(),
            },
        };
        Some(Receiver {
            target,
            meta: self.meta.clone(),
        })
    }

    pub fn is_alive(&self) -> bool {
        match &self.target {
            WeakTarget::Function { callable, .. } => callable.is_alive(),
            WeakTarget::Bound { instance, .. } => instance.strong_count() > 0,
        }
    }
}

impl<P, R> Clone for Receiver<P, R> {
    fn clone(&self) -> Self {
        let target = match &self.target {
            Target::Function(callable) => Target::Function(callable.clone()),
            Target::Bound {
                instance,
                method,
                bind,
            } => Target::Bound {
                instance: instance.clone(),
                method: *method,
                bind: bind.clone(),
            },
        };
        Self {
            target,
            meta: self.meta.clone(),
        }
    }
}

impl<P, R> Clone for WeakReceiver<P, R> {
    fn clone(&self) -> Self {
        let target = match &self.target {
            WeakTarget::Function { callable, address } => WeakTarget::Function {
                callable: callable.clone(),
                address: *address,
            },
            WeakTarget::Bound {
                instance,
                address,
                method,
                bind,
            } => WeakTarget::Bound {
                instance: instance.clone(),
                address: *address,
                method: *method,
                bind: bind.clone(),
            },
        };
        Self {
            target,
            meta: self.meta.clone(),
        }
    }
}

impl<P, R> PartialEq for Receiver<P, R> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<P, R> Eq for Receiver<P, R> {}

impl<P, R> fmt::Debug for Receiver<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("name", &self.meta.name)
            .field("async", &self.meta.asynchronous)
            .finish()
    }
}

impl<P, R> fmt::Debug for WeakReceiver<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakReceiver")
            .field("name", &self.meta.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
}

impl<P, R> sealed::Sealed for Receiver<P, R> {}
impl<P, R> sealed::Sealed for WeakReceiver<P, R> {}

/// Anything a signal can connect or disconnect: a [`Receiver`] or a [`WeakReceiver`]
pub trait Connectable<P, R>: sealed::Sealed {
    fn receiver_id(&self) -> ReceiverId;

    fn receiver_name(&self) -> &str;

    /// Key under which the receiver's parameter list is memoized
    fn function_key(&self) -> FunctionKey;

    fn form(&self) -> Form;

    fn is_alive(&self) -> bool;

    fn to_strong(&self) -> Option<Receiver<P, R>>;

    fn to_weak(&self) -> WeakReceiver<P, R>;
}

impl<P, R> Connectable<P, R> for Receiver<P, R> {
    fn receiver_id(&self) -> ReceiverId {
        self.id()
    }

    fn receiver_name(&self) -> &str {
        self.name()
    }

    fn function_key(&self) -> FunctionKey {
        self.meta.function
    }

    fn form(&self) -> Form {
        self.meta.form
    }

    fn is_alive(&self) -> bool {
        true
    }

    fn to_strong(&self) -> Option<Receiver<P, R>> {
        Some(self.clone())
    }

    fn to_weak(&self) -> WeakReceiver<P, R> {
        self.downgrade()
    }
}

impl<P, R> Connectable<P, R> for WeakReceiver<P, R> {
    fn receiver_id(&self) -> ReceiverId {
        self.id()
    }

    fn receiver_name(&self) -> &str {
        self.name()
    }

    fn function_key(&self) -> FunctionKey {
        self.meta.function
    }

    fn form(&self) -> Form {
        self.meta.form
    }

    fn is_alive(&self) -> bool {
        WeakReceiver::is_alive(self)
    }

    fn to_strong(&self) -> Option<Receiver<P, R>> {
        self.upgrade()
    }

    fn to_weak(&self) -> WeakReceiver<P, R> {
        self.clone()
    }
}
