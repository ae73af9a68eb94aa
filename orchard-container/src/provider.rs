//! Lazy providers.
//!
//! A [`Provider`] defers resolution of a key until [`Provider::get`] is
//! called. Constructors receive providers for dependencies declared with
//! [`Dep::lazy`](crate::binding::Dep::lazy); this is the only way to break
//! a dependency cycle.
//!
//! # Examples
//! ```rust
//! use orchard_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Parent {
//!     child: Provider<Child>,
//! }
//!
//! struct Child {
//!     parent: Arc<Parent>,
//! }
//!
//! let component = Component::builder()
//!     .register_constructor(
//!         TypedKey::<Parent>::new(),
//!         [Dep::lazy(TypedKey::<Child>::new())],
//!         |args| Ok(Parent { child: args.provider(TypedKey::new())? }),
//!     )
//!     .register_constructor(
//!         TypedKey::<Child>::new(),
//!         [Dep::from(TypedKey::<Parent>::new())],
//!         |args| Ok(Child { parent: args.get(TypedKey::new())? }),
//!     )
//!     .build(Signature::provides([Key::of::<Parent>()]).unwrap());
//!
//! let injector = Injector::new(component).unwrap();
//! let parent: Arc<Parent> = injector.get().unwrap();
//! let child = parent.child.get().unwrap();
//! assert!(Arc::ptr_eq(&child.parent, &parent));
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::binding::downcast;
use crate::error::{OrchardError, Result};
use crate::injector::InjectorInner;
use crate::key::{Key, TypedKey};

/// Resolves a key on demand from the injector that created it.
///
/// Holds a weak reference: a provider never keeps its injector alive.
pub struct Provider<T: ?Sized> {
    key: TypedKey<T>,
    injector: Weak<InjectorInner>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    pub(crate) fn new(key: TypedKey<T>, injector: Weak<InjectorInner>) -> Self {
        Self { key, injector }
    }

    /// Resolves the value, constructing it on first use.
    ///
    /// # Errors
    /// - [`OrchardError::InjectorDropped`] after the injector was shut down
    /// - any error raised while resolving the key
    pub fn get(&self) -> Result<Arc<T>> {
        let key = self.key.key();
        let injector = self
            .injector
            .upgrade()
            .ok_or(OrchardError::InjectorDropped { key })?;
        trace!(key = %key, "Provider resolving");
        let value = injector.resolve(key)?;
        downcast::<T>(key, &value)
    }

    pub fn key(&self) -> Key {
        self.key.key()
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            injector: self.injector.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("key", &self.key).finish()
    }
}
