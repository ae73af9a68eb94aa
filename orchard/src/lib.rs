//! # Orchard — component-based dependency injection for Rust
//!
//! Bindings are grouped into [`Component`]s, validated when merged, and
//! served by an [`Injector`]. A [`NormalizedComponent`] validates the
//! shared part of a graph once and reuses it across many injectors.
//!
//! ```rust
//! use orchard::prelude::*;
//! use std::sync::Arc;
//!
//! struct Greeting(String);
//!
//! let component = Component::builder()
//!     .register_constructor(TypedKey::<Greeting>::new(), [], |_| {
//!         Ok(Greeting("hello".into()))
//!     })
//!     .build(Signature::provides([Key::of::<Greeting>()]).unwrap());
//!
//! let injector = Injector::new(component).unwrap();
//! let greeting: Arc<Greeting> = injector.get().unwrap();
//! assert_eq!(greeting.0, "hello");
//! ```

pub use orchard_container::*;
pub use orchard_support::*;
