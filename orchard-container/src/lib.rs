//! Core engine for Orchard DI.
//!
//! Components declare bindings, installs and signatures; normalized
//! components freeze a validated part of the graph; injectors merge
//! everything and serve wired values.

pub mod binding;
pub mod component;
pub mod error;
mod graph;
pub mod injectable;
pub mod injector;
pub mod key;
mod merge;
pub mod normalized;
pub mod provider;
pub mod signature;

#[doc(hidden)]
pub use inventory;

pub use binding::{Args, Dep};
pub use component::{Component, ComponentBuilder, Deprecation};
pub use error::{ErrorKind, OrchardError, Result};
pub use injectable::Injectable;
pub use injector::{Injector, InjectorBuilder, Phase};
pub use key::{Annotation, Key, TypedKey};
pub use normalized::NormalizedComponent;
pub use provider::Provider;
pub use signature::{Signature, TypeArg};

pub mod prelude {
    pub use crate::binding::{Args, Dep};
    pub use crate::component::{Component, ComponentBuilder};
    pub use crate::error::{ErrorKind, OrchardError, Result};
    pub use crate::injectable::Injectable;
    pub use crate::injector::Injector;
    pub use crate::key::{Key, TypedKey};
    pub use crate::normalized::NormalizedComponent;
    pub use crate::provider::Provider;
    pub use crate::signature::{Signature, TypeArg};
}
