//! Parameter descriptions of receivers
//!
//! Receivers cannot be reflected on at runtime, so each constructor records
//! the shape of the callable it wraps. These helpers turn that shape into an
//! ordered parameter list and answer whether a receiver takes the full event
//! (payload plus `sender` and `signal`).
//!
//! Parameter lists are memoized per underlying function: the same method
//! bound to many instances is described once.


use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::receiver::Connectable;

/// Memoized parameter lists are dropped wholesale past this many entries
const MAX_CACHED_SIGNATURES: usize = 512;

type CacheKey = (FunctionKey, bool);

static PARAMETER_CACHE: Lazy<DashMap<CacheKey, Arc<[Parameter]>, ahash::RandomState>> =
    Lazy::new(DashMap::default);

/// What a parameter receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// The instance a method is bound to
    Instance,
    /// The whole event: payload, sender and signal
    Event,
    /// The payload alone
    Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParameterKind,
}

impl Parameter {
    pub const fn instance() -> Self {
        Self {
            name: "self",
            kind: ParameterKind::Instance,
        }
    }

    pub const fn event() -> Self {
        Self {
            name: "event",
            kind: ParameterKind::Event,
        }
    }

    pub const fn payload() -> Self {
        Self {
            name: "payload",
            kind: ParameterKind::Payload,
        }
    }
}

/// Identity of the function behind a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    owner: TypeId,
    address: usize,
}

impl FunctionKey {
    /// A closure or function item, identified by its type
    pub fn of<F: 'static>() -> Self {
        Self {
            owner: TypeId::of::<F>(),
            address: 0,
        }
    }

    /// A method of `T`, identified by its address
    pub fn method<T: 'static>(address: usize) -> Self {
        Self {
            owner: TypeId::of::<T>(),
            address,
        }
    }
}

/// Shape of the callable a receiver wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    /// `fn(event)`
    Function,
    /// `fn(payload)`
    PayloadOnly,
    /// `fn(self, event)`, called bound to an instance
    Method,
}

impl Form {
    /// Declared parameters, including the instance of a method
    pub fn parameters(self) -> Vec<Parameter> {
        match self {
            Form::Function => vec![Parameter::event()],
            Form::PayloadOnly => vec![Parameter::payload()],
            Form::Method => vec![Parameter::instance(), Parameter::event()],
        }
    }

    pub fn is_bound(self) -> bool {
        matches!(self, Form::Method)
    }
}

/// Parameters of a function, optionally without its leading one
///
/// `describe` only runs on a cache miss.
pub fn function_parameters<F>(key: FunctionKey, remove_first: bool, describe: F) -> Arc<[Parameter]>
where
    F: FnOnce() -> Vec<Parameter>,
{
    let cache_key = (key, remove_first);
    if let Some(parameters) = PARAMETER_CACHE.get(&cache_key) {
        return parameters.clone();
    }

    let mut parameters = describe();
    if remove_first && !parameters.is_empty() {
        parameters.remove(0);
    }
    let parameters: Arc<[Parameter]> = parameters.into();

    if PARAMETER_CACHE.len() >= MAX_CACHED_SIGNATURES {
        PARAMETER_CACHE.clear();
    }
    PARAMETER_CACHE.insert(cache_key, parameters.clone());
    parameters
}

/// Parameters a receiver is called with; bound methods omit their instance
pub fn callable_parameters<P, R, C>(receiver: &C) -> Arc<[Parameter]>
where
    C: Connectable<P, R> + ?Sized,
{
    let form = receiver.form();
    function_parameters(receiver.function_key(), form.is_bound(), || {
        form.parameters()
    })
}

/// Whether the receiver takes the full event rather than a fixed subset of it
pub fn accepts_event<P, R, C>(receiver: &C) -> bool
where
    C: Connectable<P, R> + ?Sized,
{
    callable_parameters(receiver)
        .iter()
        .any(|parameter| parameter.kind == ParameterKind::Event)
}
