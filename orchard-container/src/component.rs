//! Components and the component builder.
//!
//! A [`Component`] is an immutable, ordered list of declarations plus a
//! [`Signature`]. Nothing is merged or checked when a component is built:
//! clash detection and completeness run during the final merge, when a
//! [`NormalizedComponent`](crate::normalized::NormalizedComponent) or an
//! [`Injector`](crate::injector::Injector) expands the declarations.
//!
//! # Examples
//! ```rust
//! use orchard_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Engine: Send + Sync {
//!     fn power(&self) -> u32;
//! }
//!
//! struct V8;
//! impl Engine for V8 {
//!     fn power(&self) -> u32 { 400 }
//! }
//!
//! struct Car {
//!     engine: Arc<dyn Engine>,
//! }
//!
//! fn engine_component() -> Component {
//!     Component::builder()
//!         .register_constructor(TypedKey::<V8>::new(), [], |_| Ok(V8))
//!         .bind_interface(TypedKey::<dyn Engine>::new(), TypedKey::<V8>::new(), |v8| v8 as Arc<dyn Engine>)
//!         .build(Signature::provides([Key::of::<dyn Engine>()]).unwrap())
//! }
//!
//! let component = Component::builder()
//!     .install(engine_component)
//!     .register_constructor(
//!         TypedKey::<Car>::new(),
//!         [Dep::from(TypedKey::<dyn Engine>::new())],
//!         |args| Ok(Car { engine: args.get(TypedKey::new())? }),
//!     )
//!     .build(Signature::provides([Key::of::<Car>()]).unwrap());
//!
//! let injector = Injector::new(component).unwrap();
//! let car: Arc<Car> = injector.get().unwrap();
//! assert_eq!(car.engine.power(), 400);
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::binding::{
    Args, BindingEntry, Dep, Origin, Producer, UpcastFn, Value, constructor_fn, downcast, erase,
    identity,
};
use crate::error::Result;
use crate::key::{Key, TypedKey};
use crate::signature::Signature;

/// An immutable declaration unit.
///
/// Built with [`Component::builder`]. Consumed exactly once: by a parent
/// install, a normalized component or an injector.
pub struct Component {
    pub(crate) signature: Signature,
    pub(crate) declarations: Vec<Declaration>,
    deprecations: Vec<Deprecation>,
}

impl Component {
    pub fn builder() -> ComponentBuilder {
        ComponentBuilder::new()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Deprecated operations used while building this component or the
    /// components it installed eagerly.
    pub fn deprecations(&self) -> &[Deprecation] {
        &self.deprecations
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("signature", &self.signature)
            .field("declarations", &self.declarations.len())
            .field("deprecations", &self.deprecations)
            .finish()
    }
}

/// A diagnostic recorded when a deprecated builder operation is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    pub operation: &'static str,
    pub message: String,
}

impl fmt::Display for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is deprecated: {}", self.operation, self.message)
    }
}

pub(crate) enum Declaration {
    Binding(BindingEntry),
    Contribution(BindingEntry),
    Install(Install),
}

pub(crate) enum Install {
    /// Invoked during the final merge, once per identity.
    Deferred {
        identity: InstallIdentity,
        invoke: Box<dyn FnOnce() -> Component + Send>,
    },
    /// An already built component. Never deduplicated.
    Eager(Component),
}

/// Identifies a deferred install: the component function plus its
/// arguments.
///
/// Only functions without captured state (fn items, non-capturing
/// closures) have a stable identity; anything else is unique.
#[derive(Clone)]
pub(crate) struct InstallIdentity {
    function: Option<TypeId>,
    function_name: &'static str,
    args: Option<Arc<dyn InstallArgs>>,
}

impl InstallIdentity {
    fn of<F: 'static>(args: Option<Arc<dyn InstallArgs>>) -> Self {
        let function = (size_of::<F>() == 0).then(TypeId::of::<F>);
        Self {
            function,
            function_name: type_name::<F>(),
            args,
        }
    }

    pub fn function_name(&self) -> &'static str {
        self.function_name
    }
}

impl PartialEq for InstallIdentity {
    fn eq(&self, other: &Self) -> bool {
        let same_function = self.function.is_some() && self.function == other.function;
        let same_args = match (&self.args, &other.args) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_args(b.as_ref()),
            _ => false,
        };
        same_function && same_args
    }
}

impl fmt::Debug for InstallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallIdentity")
            .field("function", &self.function_name)
            .field("args", &self.args)
            .finish()
    }
}

/// Arguments of a deferred install, compared across installs.
pub(crate) trait InstallArgs: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn eq_args(&self, other: &dyn InstallArgs) -> bool;
}

impl<A> InstallArgs for A
where
    A: Any + PartialEq + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_args(&self, other: &dyn InstallArgs) -> bool {
        other
            .as_any()
            .downcast_ref::<A>()
            .is_some_and(|other| other == self)
    }
}

// ═══════════════════════════════════════════
// ComponentBuilder
// ═══════════════════════════════════════════

/// Builds a [`Component`].
///
/// Every method consumes the builder and returns it; previously built
/// components are never touched.
pub struct ComponentBuilder {
    declarations: Vec<Declaration>,
    deprecations: Vec<Deprecation>,
}

impl ComponentBuilder {
    fn new() -> Self {
        Self {
            declarations: Vec::new(),
            deprecations: Vec::new(),
        }
    }

    // ── Constructors ──

    /// Binds `key` to a constructor.
    ///
    /// The constructor runs at most once per injector, the first time the
    /// key is needed. It may only read the keys listed in `deps`.
    pub fn register_constructor<T, F>(
        self,
        key: TypedKey<T>,
        deps: impl IntoIterator<Item = Dep>,
        constructor: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.register_shared(key, deps, move |args| constructor(args).map(Arc::new))
    }

    /// Binds `key` to a constructor returning a shared value.
    ///
    /// Use this for unsized types such as `dyn Trait`.
    pub fn register_shared<T, F>(
        self,
        key: TypedKey<T>,
        deps: impl IntoIterator<Item = Dep>,
        constructor: F,
    ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Args<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let key = key.key();
        trace!(key = %key, "Declaring constructor");
        self.bind(key, Producer::Constructor {
            deps: deps.into_iter().collect(),
            construct: constructor_fn(constructor),
            origin: Origin::Explicit,
        })
    }

    // ── Interfaces ──

    /// Makes `interface` resolve through `implementation`.
    ///
    /// `interface` is provided by this component; `implementation` must be
    /// bound here, required, or self-declared.
    pub fn bind_interface<I, C, F>(
        self,
        interface: TypedKey<I>,
        implementation: TypedKey<C>,
        upcast: F,
    ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    {
        let target = implementation.key();
        trace!(interface = %interface, implementation = %target, "Declaring interface binding");
        let upcast: UpcastFn = Arc::new(move |value: &Value| {
            let concrete = downcast::<C>(target, value)?;
            Ok(erase(upcast(concrete)))
        });
        self.bind(interface.key(), Producer::Alias { target, upcast })
    }

    // ── Instances ──

    /// Binds `key` to a value owned by the caller.
    ///
    /// The injector only keeps a clone of the `Arc` and never drops the
    /// value itself.
    pub fn bind_instance<T>(self, key: TypedKey<T>, instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = key.key();
        trace!(key = %key, "Declaring instance");
        self.bind(key, Producer::Instance {
            identity: identity(&instance),
            value: erase(instance),
        })
    }

    // ── Multibindings ──

    /// Adds a constructed element to the multibinding set of `key`.
    pub fn add_multibinding<T, F>(
        mut self,
        key: TypedKey<T>,
        deps: impl IntoIterator<Item = Dep>,
        constructor: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.key();
        trace!(key = %key, "Declaring multibinding");
        self.declarations.push(Declaration::Contribution(BindingEntry {
            key,
            producer: Producer::Constructor {
                deps: deps.into_iter().collect(),
                construct: constructor_fn(move |args| constructor(args).map(Arc::new)),
                origin: Origin::Explicit,
            },
        }));
        self
    }

    /// Adds an external instance to the multibinding set of `key`.
    pub fn add_instance_multibinding<T>(mut self, key: TypedKey<T>, instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = key.key();
        trace!(key = %key, "Declaring instance multibinding");
        self.declarations.push(Declaration::Contribution(BindingEntry {
            key,
            producer: Producer::Instance {
                identity: identity(&instance),
                value: erase(instance),
            },
        }));
        self
    }

    // ── Installs ──

    /// Installs the component returned by `function`.
    ///
    /// The function is called during the final merge, and only once per
    /// graph even when several components install it.
    pub fn install<F>(mut self, function: F) -> Self
    where
        F: FnOnce() -> Component + Send + 'static,
    {
        let identity = InstallIdentity::of::<F>(None);
        trace!(function = identity.function_name(), "Declaring install");
        self.declarations.push(Declaration::Install(Install::Deferred {
            identity,
            invoke: Box::new(function),
        }));
        self
    }

    /// Installs the component returned by `function(args)`.
    ///
    /// Two installs are the same when both the function and the arguments
    /// are equal.
    pub fn install_with<F, A>(mut self, function: F, args: A) -> Self
    where
        F: FnOnce(A) -> Component + Send + 'static,
        A: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        let identity = InstallIdentity::of::<F>(Some(Arc::new(args.clone())));
        trace!(function = identity.function_name(), args = ?args, "Declaring install");
        self.declarations.push(Declaration::Install(Install::Deferred {
            identity,
            invoke: Box::new(move || function(args)),
        }));
        self
    }

    /// Installs a component that was already built.
    ///
    /// Clashes are detected as for [`install`](Self::install), but the
    /// component is never deduplicated.
    #[deprecated(note = "use `install` or `install_with` so the component is built once per graph")]
    pub fn install_component(mut self, component: Component) -> Self {
        warn!(
            signature = ?component.signature,
            "install_component is deprecated; use install or install_with"
        );
        self.deprecations.push(Deprecation {
            operation: "install_component",
            message: "use `install` or `install_with` so the component is built once per graph"
                .to_string(),
        });
        self.deprecations.extend(component.deprecations.iter().cloned());
        self.declarations
            .push(Declaration::Install(Install::Eager(component)));
        self
    }

    // ── Build ──

    /// Freezes the declarations under `signature`.
    pub fn build(self, signature: Signature) -> Component {
        trace!(
            declarations = self.declarations.len(),
            provided = signature.provided().len(),
            required = signature.required().len(),
            "Built component"
        );
        Component {
            signature,
            declarations: self.declarations,
            deprecations: self.deprecations,
        }
    }

    fn bind(mut self, key: Key, producer: Producer) -> Self {
        self.declarations
            .push(Declaration::Binding(BindingEntry { key, producer }));
        self
    }
}
