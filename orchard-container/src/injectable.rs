//! Self-declared bindings.
//!
//! A type can advertise how to construct itself by implementing
//! [`Injectable`] and registering with [`injectable!`](crate::injectable!).
//! When a component needs such a type and nobody binds it, the merge binds
//! the advertised constructor automatically.
//!
//! Registrations are collected at link time with `inventory` and indexed
//! once per process.
//!
//! ```rust
//! use orchard_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Clock;
//!
//! impl Injectable for Clock {
//!     fn inject(_: &Args<'_>) -> Result<Self> {
//!         Ok(Clock)
//!     }
//! }
//!
//! orchard_container::injectable!(Clock);
//!
//! let component = Component::builder().build(Signature::provides([Key::of::<Clock>()]).unwrap());
//! let injector = Injector::new(component).unwrap();
//! let _clock: Arc<Clock> = injector.get().unwrap();
//! ```

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::binding::{Args, ConstructFn, Dep, Origin, Producer, Value, erase};
use crate::error::Result;

/// A type that knows how to construct itself from the graph.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Keys the constructor reads from its [`Args`].
    fn dependencies() -> Vec<Dep> {
        Vec::new()
    }

    fn inject(args: &Args<'_>) -> Result<Self>;
}

/// A registered self-declared constructor.
///
/// Built by [`injectable!`](crate::injectable!); not meant to be
/// constructed by hand.
pub struct SelfBinding {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    dependencies: fn() -> Vec<Dep>,
    construct: fn(&Args<'_>) -> Result<Value>,
}

inventory::collect!(SelfBinding);

impl SelfBinding {
    pub const fn new<T: Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: type_name::<T>,
            dependencies: T::dependencies,
            construct: construct_self::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub(crate) fn producer(&self) -> Producer {
        let construct = self.construct;
        let construct: ConstructFn = Arc::new(move |args: &Args<'_>| construct(args));
        Producer::Constructor {
            deps: (self.dependencies)(),
            construct,
            origin: Origin::SelfDeclared,
        }
    }
}

impl fmt::Debug for SelfBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfBinding")
            .field("type_name", &self.type_name())
            .finish()
    }
}

fn construct_self<T: Injectable>(args: &Args<'_>) -> Result<Value> {
    T::inject(args).map(|value| erase(Arc::new(value)))
}

static SELF_BINDINGS: Lazy<HashMap<TypeId, &'static SelfBinding>> = Lazy::new(|| {
    let index: HashMap<TypeId, &'static SelfBinding> = inventory::iter::<SelfBinding>
        .into_iter()
        .map(|binding| (binding.type_id(), binding))
        .collect();
    debug!(count = index.len(), "Indexed self-declared bindings");
    index
});

/// Looks up the self-declared constructor of a raw type.
pub(crate) fn self_binding(type_id: TypeId) -> Option<&'static SelfBinding> {
    SELF_BINDINGS.get(&type_id).copied()
}

/// Registers types implementing [`Injectable`] as self-declared bindings.
///
/// ```rust,ignore
/// orchard_container::injectable!(Clock, Calendar);
/// ```
#[macro_export]
macro_rules! injectable {
    ($($ty:ty),+ $(,)?) => {
        $(
            $crate::inventory::submit! {
                $crate::injectable::SelfBinding::new::<$ty>()
            }
        )+
    };
}
