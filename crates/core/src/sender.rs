//! Sender values and the filters receivers subscribe with
//!
//! A [`Sender`] identifies where a `send` call originates. Names and numeric
//! ids compare by value; object senders compare by allocation address, the
//! same way two `Arc` clones point at one object.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

type Object = dyn Any + Send + Sync;

/// The origin of a signal delivery
#[derive(Clone)]
pub struct Sender {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    None,
    Named(Arc<str>),
    Id(u64),
    Object(Arc<Object>),
}

/// Hashable identity of a sender, used for filtering and the lookup cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SenderKey {
    None,
    Named(Arc<str>),
    Id(u64),
    Object(usize),
}

fn address(object: &Arc<Object>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl Sender {
    /// A delivery without a particular origin; only any-sender receivers fire
    pub fn none() -> Self {
        Self { repr: Repr::None }
    }

    /// A sender identified by name
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            repr: Repr::Named(name.into()),
        }
    }

    /// A sender identified by a numeric id
    pub fn id(id: u64) -> Self {
        Self { repr: Repr::Id(id) }
    }

    /// A sender identified by the object behind `object`
    pub fn object<T>(object: &Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        let erased: Arc<Object> = object.clone();
        Self {
            repr: Repr::Object(erased),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.repr, Repr::None)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.repr {
            Repr::Named(name) => Some(&**name),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<u64> {
        match self.repr {
            Repr::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Borrow the sender object as `T`, if this is an object sender of that type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.repr {
            Repr::Object(object) => object.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Get a strong handle to the sender object as `T`
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        match &self.repr {
            Repr::Object(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> SenderKey {
        match &self.repr {
            Repr::None => SenderKey::None,
            Repr::Named(name) => SenderKey::Named(name.clone()),
            Repr::Id(id) => SenderKey::Id(*id),
            Repr::Object(object) => SenderKey::Object(address(object)),
        }
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for Sender {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Sender {}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::None => f.write_str("Sender::None"),
            Repr::Named(name) => f.debug_tuple("Sender::Named").field(name).finish(),
            Repr::Id(id) => f.debug_tuple("Sender::Id").field(id).finish(),
            Repr::Object(object) => write!(f, "Sender::Object({:#x})", address(object)),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::None => f.write_str("<none>"),
            Repr::Named(name) => f.write_str(name),
            Repr::Id(id) => write!(f, "#{}", id),
            Repr::Object(object) => write!(f, "object@{:#x}", address(object)),
        }
    }
}

impl From<&str> for Sender {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Sender {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<u64> for Sender {
    fn from(id: u64) -> Self {
        Self::id(id)
    }
}

impl<T> From<&Arc<T>> for Sender
where
    T: Any + Send + Sync,
{
    fn from(object: &Arc<T>) -> Self {
        Self::object(object)
    }
}

/// Which senders a registration listens to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SenderFilter {
    /// Every delivery, whatever its sender
    #[default]
    Any,
    /// Only deliveries from this exact sender
    Exact(Sender),
}

impl SenderFilter {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn exact(sender: impl Into<Sender>) -> Self {
        Self::Exact(sender.into())
    }

    /// `None` stands for the any-sender sentinel
    pub(crate) fn key(&self) -> Option<SenderKey> {
        match self {
            SenderFilter::Any => None,
            SenderFilter::Exact(sender) => Some(sender.key()),
        }
    }
}

impl From<Sender> for SenderFilter {
    fn from(sender: Sender) -> Self {
        Self::Exact(sender)
    }
}

/// Filter as kept by the registry: object senders are held weakly
pub(crate) enum StoredFilter {
    Any,
    Exact(SenderKey),
    Object { address: usize, anchor: Weak<Object> },
}

impl StoredFilter {
    pub(crate) fn new(filter: &SenderFilter) -> Self {
        match filter {
            SenderFilter::Any => StoredFilter::Any,
            SenderFilter::Exact(Sender {
                repr: Repr::Object(object),
            }) => StoredFilter::Object {
                address: address(object),
                anchor: Arc::downgrade(object),
            },
            SenderFilter::Exact(sender) => StoredFilter::Exact(sender.key()),
        }
    }

    /// False once the sender object this filter waits for has been dropped
    pub(crate) fn is_alive(&self) -> bool {
        match self {
            StoredFilter::Object { anchor, .. } => anchor.strong_count() > 0,
            _ => true,
        }
    }

    pub(crate) fn matches(&self, key: &SenderKey) -> bool {
        match self {
            StoredFilter::Any => true,
            StoredFilter::Exact(expected) => expected == key,
            StoredFilter::Object { address, .. } => {
                self.is_alive() && *key == SenderKey::Object(*address)
            }
        }
    }
}
