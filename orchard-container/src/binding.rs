//! Binding entries: how a single key is produced.
//!
//! Every value flowing through the engine is type-erased as a [`Value`],
//! an `Arc<dyn Any>` around the `Arc<T>` callers see. The double
//! indirection lets unsized types such as `dyn Trait` live in the graph.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{MissingBindingError, OrchardError, Result};
use crate::injector::InjectorInner;
use crate::key::{Key, TypedKey};
use crate::provider::Provider;

/// A type-erased value: an `Arc<dyn Any>` holding an `Arc<T>`.
#[doc(hidden)]
pub type Value = Arc<dyn Any + Send + Sync>;

/// Type alias for constructor functions.
///
/// Receives the resolved dependencies and returns the new value.
pub(crate) type ConstructFn = Arc<dyn Fn(&Args<'_>) -> Result<Value> + Send + Sync>;

/// Converts the value of an alias target into the alias' type.
pub(crate) type UpcastFn = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

pub(crate) fn constructor_fn<T, F>(constructor: F) -> ConstructFn
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Args<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |args: &Args<'_>| constructor(args).map(erase))
}

pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Value {
    Arc::new(value)
}

pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(key: Key, value: &Value) -> Result<Arc<T>> {
    value
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(OrchardError::TypeMismatch {
            key,
            expected: type_name::<T>(),
        })
}

/// Pointer identity of the `Arc<T>` inside a [`Value`].
pub(crate) fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// A dependency of a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dep {
    /// Resolved before the constructor runs.
    Direct(Key),
    /// Handed over as a [`Provider`] and resolved on demand. Lazy
    /// dependencies are not edges of the dependency graph, so they may
    /// close a cycle.
    Lazy(Key),
}

impl Dep {
    pub fn lazy(key: impl Into<Key>) -> Self {
        Self::Lazy(key.into())
    }

    pub fn key(&self) -> Key {
        match self {
            Self::Direct(key) | Self::Lazy(key) => *key,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }
}

impl From<Key> for Dep {
    fn from(key: Key) -> Self {
        Self::Direct(key)
    }
}

impl<T: ?Sized> From<TypedKey<T>> for Dep {
    fn from(key: TypedKey<T>) -> Self {
        Self::Direct(key.into())
    }
}

/// Where a constructor binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Authored with `register_constructor` and friends.
    Explicit,
    /// Advertised by the type itself through `Injectable`.
    SelfDeclared,
}

/// The producer of one key.
#[derive(Clone)]
pub(crate) enum Producer {
    Constructor {
        deps: Vec<Dep>,
        construct: ConstructFn,
        origin: Origin,
    },
    Instance {
        value: Value,
        identity: usize,
    },
    Alias {
        target: Key,
        upcast: UpcastFn,
    },
}

impl Producer {
    /// Keys that must be resolved before this producer can run.
    pub fn direct_dependencies(&self) -> Vec<Key> {
        match self {
            Self::Constructor { deps, .. } => deps
                .iter()
                .filter(|d| !d.is_lazy())
                .map(Dep::key)
                .collect(),
            Self::Instance { .. } => Vec::new(),
            Self::Alias { target, .. } => vec![*target],
        }
    }

    /// Every key this producer needs bound somewhere, lazy or not.
    pub fn needed_keys(&self) -> Vec<Key> {
        match self {
            Self::Constructor { deps, .. } => deps.iter().map(Dep::key).collect(),
            Self::Instance { .. } => Vec::new(),
            Self::Alias { target, .. } => vec![*target],
        }
    }

    pub fn kind(&self) -> ProvisionKind {
        match self {
            Self::Instance { .. } => ProvisionKind::Instance,
            Self::Constructor {
                origin: Origin::SelfDeclared,
                ..
            } => ProvisionKind::SelfDeclared,
            _ => ProvisionKind::Bound,
        }
    }

    /// Whether two producers of the same key are interchangeable.
    ///
    /// Only same-identity instances and self-declared constructors are.
    pub fn is_equivalent(&self, other: &Producer) -> bool {
        match (self, other) {
            (Self::Instance { identity: a, .. }, Self::Instance { identity: b, .. }) => a == b,
            (
                Self::Constructor {
                    origin: Origin::SelfDeclared,
                    ..
                },
                Self::Constructor {
                    origin: Origin::SelfDeclared,
                    ..
                },
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor { deps, origin, .. } => f
                .debug_struct("Constructor")
                .field("deps", deps)
                .field("origin", origin)
                .finish(),
            Self::Instance { identity, .. } => f
                .debug_struct("Instance")
                .field("identity", &format_args!("{identity:#x}"))
                .finish(),
            Self::Alias { target, .. } => f.debug_struct("Alias").field("target", target).finish(),
        }
    }
}

/// How a key is provided, as far as clash detection is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProvisionKind {
    /// Bound to an external instance. Identity is compared at retrieval.
    Instance,
    /// Bound by the type's own constructor.
    SelfDeclared,
    /// Any explicit constructor or alias.
    Bound,
}

impl ProvisionKind {
    /// Whether providing a key twice with these kinds is a build-time clash.
    pub fn clashes_with(self, other: ProvisionKind) -> bool {
        match (self, other) {
            (Self::Instance, _) | (_, Self::Instance) => false,
            (Self::SelfDeclared, Self::SelfDeclared) => false,
            _ => true,
        }
    }

    /// The kind of a key provided by both `self` and `other`.
    pub fn combine(self, other: ProvisionKind) -> ProvisionKind {
        match (self, other) {
            (Self::Bound, _) | (_, Self::Bound) => Self::Bound,
            (Self::SelfDeclared, _) | (_, Self::SelfDeclared) => Self::SelfDeclared,
            _ => Self::Instance,
        }
    }
}

/// One producer registered for a key.
#[derive(Clone)]
pub(crate) struct BindingEntry {
    pub key: Key,
    pub producer: Producer,
}

impl fmt::Debug for BindingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingEntry")
            .field("key", &self.key)
            .field("producer", &self.producer)
            .finish()
    }
}

/// A resolved dependency handed to a constructor.
#[derive(Clone)]
pub(crate) enum Resolved {
    Value(Value),
    Lazy,
}

/// The dependencies of a constructor, resolved.
///
/// Constructors can only read keys they declared.
pub struct Args<'a> {
    key: Key,
    dependencies: &'a [(Dep, Resolved)],
    injector: Weak<InjectorInner>,
}

impl<'a> Args<'a> {
    pub(crate) fn new(
        key: Key,
        dependencies: &'a [(Dep, Resolved)],
        injector: Weak<InjectorInner>,
    ) -> Self {
        Self {
            key,
            dependencies,
            injector,
        }
    }

    /// The key being constructed.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Returns a declared dependency.
    ///
    /// Lazy dependencies are resolved on the spot.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, key: TypedKey<T>) -> Result<Arc<T>> {
        let wanted = key.key();
        match self.find(wanted)? {
            Resolved::Value(value) => downcast::<T>(wanted, value),
            Resolved::Lazy => self.provider(key)?.get(),
        }
    }

    /// Returns a provider for a declared dependency, lazy or not.
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&self, key: TypedKey<T>) -> Result<Provider<T>> {
        self.find(key.key())?;
        Ok(Provider::new(key, self.injector.clone()))
    }

    fn find(&self, wanted: Key) -> Result<&Resolved> {
        self.dependencies
            .iter()
            .find(|(dep, _)| dep.key() == wanted)
            .map(|(_, resolved)| resolved)
            .ok_or_else(|| {
                OrchardError::MissingBinding(MissingBindingError::new(
                    wanted,
                    Some(self.key),
                    self.dependencies.iter().map(|(dep, _)| dep.key()),
                ))
            })
    }
}

impl fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<&Dep> = self.dependencies.iter().map(|(dep, _)| dep).collect();
        f.debug_struct("Args")
            .field("key", &self.key)
            .field("dependencies", &deps)
            .finish()
    }
}
