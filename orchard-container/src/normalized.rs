//! Normalized components.
//!
//! A [`NormalizedComponent`] is a component merged and validated once,
//! except for its remaining requirements. Building injectors from it only
//! checks the boundary: its interior is shared and never re-validated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::binding::Producer;
use crate::component::Component;
use crate::error::Result;
use crate::graph::{Edges, GraphValidator};
use crate::key::Key;
use crate::merge::{ExpandedInstall, Expander, Fragment, Provisions};

/// A merged key → producers view, ready for resolution.
#[derive(Debug, Default)]
pub(crate) struct ResolvedGraph {
    pub provisions: Provisions,
    pub producers: HashMap<Key, Vec<Producer>>,
    /// Multibinding contributions, in merge order per key.
    pub contributions: HashMap<Key, Vec<Producer>>,
    pub contribution_order: Vec<Key>,
    /// Direct dependencies only; lazy ones are left out.
    pub edges: Edges,
    /// Every dependency, lazy ones included.
    pub needs: Edges,
}

impl ResolvedGraph {
    pub fn from_fragment(fragment: Fragment) -> Self {
        let mut graph = ResolvedGraph {
            provisions: fragment.provided,
            ..Self::default()
        };

        for entry in fragment.entries {
            graph
                .edges
                .entry(entry.key)
                .or_default()
                .extend(entry.producer.direct_dependencies());
            graph
                .needs
                .entry(entry.key)
                .or_default()
                .extend(entry.producer.needed_keys());
            graph
                .producers
                .entry(entry.key)
                .or_default()
                .push(entry.producer);
        }

        for contribution in fragment.contributions {
            if !graph.contributions.contains_key(&contribution.key) {
                graph.contribution_order.push(contribution.key);
            }
            graph
                .contributions
                .entry(contribution.key)
                .or_default()
                .push(contribution.producer);
        }

        graph
    }

    /// Direct dependencies of every multibinding contribution.
    pub fn contribution_dependencies(&self) -> Vec<Key> {
        self.contributions
            .values()
            .flatten()
            .flat_map(Producer::direct_dependencies)
            .collect()
    }
}

/// A component merged and validated ahead of time.
///
/// Cheap to clone; clones share the same validated graph.
///
/// # Examples
/// ```rust
/// use orchard_container::prelude::*;
/// use std::sync::Arc;
///
/// struct Config(String);
/// struct Server {
///     config: Arc<Config>,
/// }
///
/// fn server_component() -> Component {
///     Component::builder()
///         .register_constructor(
///             TypedKey::<Server>::new(),
///             [Dep::from(TypedKey::<Config>::new())],
///             |args| Ok(Server { config: args.get(TypedKey::new())? }),
///         )
///         .build(Signature::new([Key::of::<Config>()], [Key::of::<Server>()]).unwrap())
/// }
///
/// let normalized = NormalizedComponent::new(server_component()).unwrap();
///
/// for name in ["a", "b"] {
///     let config = Component::builder()
///         .bind_instance(TypedKey::new(), Arc::new(Config(name.to_string())))
///         .build(Signature::provides([Key::of::<Config>()]).unwrap());
///     let injector = Injector::from_normalized(&normalized, config).unwrap();
///     let server: Arc<Server> = injector.get().unwrap();
///     assert_eq!(server.config.0, name);
/// }
/// ```
#[derive(Clone)]
pub struct NormalizedComponent {
    pub(crate) required: Vec<Key>,
    pub(crate) graph: Arc<ResolvedGraph>,
    pub(crate) installs: Vec<ExpandedInstall>,
}

impl NormalizedComponent {
    /// Expands and validates `component`.
    ///
    /// # Errors
    /// Any build-time error of the merge, and
    /// [`OrchardError::CircularDependency`](crate::error::OrchardError::CircularDependency)
    /// for a cycle among its bindings.
    #[instrument(skip_all, name = "normalize")]
    pub fn new(component: Component) -> Result<Self> {
        let mut expander = Expander::new();
        let fragment = expander.expand(component)?;
        let required = fragment.required.clone();
        let graph = ResolvedGraph::from_fragment(fragment);

        let mut roots: Vec<Key> = graph.provisions.keys().collect();
        roots.extend(graph.contribution_dependencies());
        GraphValidator::new([&graph.edges]).validate(roots)?;

        info!(
            provided = graph.provisions.len(),
            required = required.len(),
            "Normalized component"
        );
        Ok(Self {
            required,
            graph: Arc::new(graph),
            installs: expander.into_expanded(),
        })
    }

    /// Keys that injectors built from this component must provide.
    pub fn required(&self) -> &[Key] {
        &self.required
    }

    /// Every key this component provides, in merge order.
    pub fn provided(&self) -> Vec<Key> {
        self.graph.provisions.keys().collect()
    }
}

impl fmt::Debug for NormalizedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedComponent")
            .field("required", &self.required)
            .field("provided", &self.graph.provisions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Dep;
    use crate::error::OrchardError;
    use crate::key::TypedKey;
    use crate::signature::Signature;

    struct Ping;
    struct Pong;
    struct Table;

    #[test]
    fn keeps_unmet_requirements() {
        let component = Component::builder()
            .register_constructor(
                TypedKey::<Table>::new(),
                [Dep::from(Key::of::<Ping>())],
                |_| Ok(Table),
            )
            .build(Signature::new([Key::of::<Ping>()], [Key::of::<Table>()]).unwrap());

        let normalized = NormalizedComponent::new(component).unwrap();
        assert_eq!(normalized.required(), &[Key::of::<Ping>()]);
        assert_eq!(normalized.provided(), vec![Key::of::<Table>()]);
    }

    #[test]
    fn rejects_interior_cycles() {
        let component = Component::builder()
            .register_constructor(TypedKey::<Ping>::new(), [Dep::from(Key::of::<Pong>())], |_| {
                Ok(Ping)
            })
            .register_constructor(TypedKey::<Pong>::new(), [Dep::from(Key::of::<Ping>())], |_| {
                Ok(Pong)
            })
            .build(Signature::provides([Key::of::<Ping>()]).unwrap());

        match NormalizedComponent::new(component).unwrap_err() {
            OrchardError::CircularDependency(e) => assert_eq!(e.chain.len(), 3),
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn lazy_edges_do_not_cycle() {
        let component = Component::builder()
            .register_constructor(TypedKey::<Ping>::new(), [Dep::lazy(Key::of::<Pong>())], |_| {
                Ok(Ping)
            })
            .register_constructor(TypedKey::<Pong>::new(), [Dep::from(Key::of::<Ping>())], |_| {
                Ok(Pong)
            })
            .build(Signature::provides([Key::of::<Ping>()]).unwrap());

        let normalized = NormalizedComponent::new(component).unwrap();
        assert_eq!(normalized.graph.needs[&Key::of::<Ping>()], vec![Key::of::<Pong>()]);
        assert!(normalized.graph.edges[&Key::of::<Ping>()].is_empty());
    }
}
