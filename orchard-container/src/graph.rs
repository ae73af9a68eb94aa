//! Dependency graph validation.
//!
//! Validates the direct dependency edges of a merged graph:
//! - Detects circular dependencies
//! - Computes the keys reachable from a root set
//!
//! Edges come in layers so that a normalized component's edges can be
//! reused as-is under the edges of the components merged on top of it.
//! A key absent from every layer is a leaf: completeness is checked by
//! the merge, not here.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, OrchardError, Result};
use crate::key::Key;

/// Adjacency list: key → keys it depends on.
pub(crate) type Edges = HashMap<Key, Vec<Key>>;

/// Validates that a layered dependency graph is acyclic.
///
/// # Algorithm
/// Depth-first search from each root. Keeps the current DFS path to report
/// the cycle chain.
pub(crate) struct GraphValidator<'a> {
    layers: Vec<&'a Edges>,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<Key>,
    /// Already validated (cache)
    validated: HashSet<Key>,
    /// Current DFS path (for error reporting)
    path: Vec<Key>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(layers: impl IntoIterator<Item = &'a Edges>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every key reachable from `roots`.
    ///
    /// # Errors
    /// - [`OrchardError::CircularDependency`] with the chain, first key
    ///   repeated at the end
    #[instrument(skip_all, name = "graph_validation")]
    pub fn validate(&mut self, roots: impl IntoIterator<Item = Key>) -> Result<()> {
        let roots: Vec<Key> = roots.into_iter().collect();
        debug!(roots = roots.len(), layers = self.layers.len(), "Validating dependency graph");

        for key in roots {
            self.validate_key(key)?;
        }

        debug!(validated = self.validated.len(), "Dependency graph is acyclic");
        Ok(())
    }

    fn validate_key(&mut self, key: Key) -> Result<()> {
        if self.validated.contains(&key) {
            return Ok(());
        }

        if self.visiting.contains(&key) {
            let cycle_start = self.path.iter().position(|k| *k == key).unwrap_or(0);
            let mut chain = self.path[cycle_start..].to_vec();
            chain.push(key);

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(OrchardError::CircularDependency(CircularDependencyError {
                chain,
            }));
        }

        self.visiting.insert(key);
        self.path.push(key);

        for dep in dependencies_of(&self.layers, &key) {
            self.validate_key(dep)?;
        }

        self.path.pop();
        self.visiting.remove(&key);
        self.validated.insert(key);
        Ok(())
    }
}

/// Every key reachable from `roots`, roots included.
pub(crate) fn reachable(layers: &[&Edges], roots: impl IntoIterator<Item = Key>) -> HashSet<Key> {
    let mut seen = HashSet::new();
    let mut stack: Vec<Key> = roots.into_iter().collect();
    while let Some(key) = stack.pop() {
        if seen.insert(key) {
            stack.extend(dependencies_of(layers, &key));
        }
    }
    seen
}

fn dependencies_of(layers: &[&Edges], key: &Key) -> Vec<Key> {
    layers
        .iter()
        .filter_map(|edges| edges.get(key))
        .flatten()
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;
    struct UserRepo;
    struct UserService;

    fn edges(pairs: Vec<(Key, Vec<Key>)>) -> Edges {
        pairs.into_iter().collect()
    }

    #[test]
    fn valid_simple_graph() {
        let graph = edges(vec![
            (Key::of::<Database>(), vec![]),
            (Key::of::<UserRepo>(), vec![Key::of::<Database>()]),
            (Key::of::<UserService>(), vec![Key::of::<UserRepo>()]),
        ]);

        let mut validator = GraphValidator::new([&graph]);
        assert!(validator.validate(graph.keys().copied()).is_ok());
    }

    #[test]
    fn detect_circular_dependency() {
        // A → B → C → A
        struct A;
        struct B;
        struct C;

        let graph = edges(vec![
            (Key::of::<A>(), vec![Key::of::<B>()]),
            (Key::of::<B>(), vec![Key::of::<C>()]),
            (Key::of::<C>(), vec![Key::of::<A>()]),
        ]);

        let mut validator = GraphValidator::new([&graph]);
        match validator.validate([Key::of::<A>()]).unwrap_err() {
            OrchardError::CircularDependency(err) => {
                assert_eq!(
                    err.chain,
                    vec![Key::of::<A>(), Key::of::<B>(), Key::of::<C>(), Key::of::<A>()]
                );
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn detect_self_dependency() {
        struct A;

        let graph = edges(vec![(Key::of::<A>(), vec![Key::of::<A>()])]);
        let mut validator = GraphValidator::new([&graph]);
        assert!(validator.validate([Key::of::<A>()]).is_err());
    }

    #[test]
    fn cycle_across_layers() {
        // base: Repo → Service (required, bound by the overlay)
        // overlay: Service → Repo
        let base = edges(vec![(Key::of::<UserRepo>(), vec![Key::of::<UserService>()])]);
        let overlay = edges(vec![(Key::of::<UserService>(), vec![Key::of::<UserRepo>()])]);

        let mut validator = GraphValidator::new([&base, &overlay]);
        assert!(validator.validate(overlay.keys().copied()).is_err());
    }

    #[test]
    fn unknown_keys_are_leaves() {
        let graph = edges(vec![(Key::of::<UserRepo>(), vec![Key::of::<Database>()])]);
        let mut validator = GraphValidator::new([&graph]);
        assert!(validator.validate([Key::of::<UserRepo>()]).is_ok());
    }

    #[test]
    fn diamond_dependency_ok() {
        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        struct A;
        struct B;
        struct C;
        struct D;

        let graph = edges(vec![
            (Key::of::<D>(), vec![]),
            (Key::of::<B>(), vec![Key::of::<D>()]),
            (Key::of::<C>(), vec![Key::of::<D>()]),
            (Key::of::<A>(), vec![Key::of::<B>(), Key::of::<C>()]),
        ]);

        let mut validator = GraphValidator::new([&graph]);
        assert!(validator.validate([Key::of::<A>()]).is_ok());
    }

    #[test]
    fn reachable_follows_all_layers() {
        let base = edges(vec![(Key::of::<UserRepo>(), vec![Key::of::<Database>()])]);
        let overlay = edges(vec![(Key::of::<UserService>(), vec![Key::of::<UserRepo>()])]);

        let seen = reachable(&[&base, &overlay], [Key::of::<UserService>()]);
        assert_eq!(seen.len(), 3);
        assert!(seen.contains(&Key::of::<Database>()));
        assert!(!reachable(&[&base], [Key::of::<UserRepo>()]).contains(&Key::of::<UserService>()));
    }
}
