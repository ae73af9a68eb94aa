//! The merge algebra.
//!
//! Expanding a [`Component`] walks its declarations in order and folds
//! them into a [`Fragment`]: the keys it provides, the keys it still
//! requires, and the binding entries behind them.
//!
//! A binding declared directly on an already provided key is a
//! [`TypeAlreadyBound`](OrchardError::TypeAlreadyBound) clash. An installed
//! component whose provided keys overlap the running provided set is a
//! [`DuplicateTypesInComponent`](OrchardError::DuplicateTypesInComponent)
//! clash. Which of the two is reported depends only on declaration order.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::binding::{BindingEntry, ProvisionKind};
use crate::component::{Component, Declaration, Install, InstallIdentity};
use crate::error::{MissingBindingError, OrchardError, Result};
use crate::injectable::self_binding;
use crate::key::Key;
use crate::signature::Signature;

/// The keys provided by a fragment, in first-provision order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Provisions {
    order: Vec<Key>,
    kinds: HashMap<Key, ProvisionKind>,
}

impl Provisions {
    pub fn insert(&mut self, key: Key, kind: ProvisionKind) {
        match self.kinds.get_mut(&key) {
            Some(existing) => *existing = existing.combine(kind),
            None => {
                self.order.push(key);
                self.kinds.insert(key, kind);
            }
        }
    }

    pub fn get(&self, key: &Key) -> Option<ProvisionKind> {
        self.kinds.get(key).copied()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.kinds.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Keys of `incoming` that clash with these provisions, in `incoming`'s
    /// order.
    pub fn overlapping(&self, incoming: &Provisions) -> Vec<Key> {
        incoming
            .order
            .iter()
            .filter(|key| {
                match (self.get(key), incoming.get(key)) {
                    (Some(mine), Some(theirs)) => mine.clashes_with(theirs),
                    _ => false,
                }
            })
            .copied()
            .collect()
    }
}

/// The result of expanding one component.
#[derive(Debug, Default)]
pub(crate) struct Fragment {
    pub provided: Provisions,
    /// Keys provided by installs that were skipped because an identical
    /// install was expanded elsewhere in the graph.
    pub shared: Vec<Key>,
    pub required: Vec<Key>,
    pub entries: Vec<BindingEntry>,
    pub contributions: Vec<BindingEntry>,
}

impl Fragment {
    /// Adds a directly declared binding.
    pub fn bind(&mut self, entry: BindingEntry) -> Result<()> {
        let kind = entry.producer.kind();
        if let Some(existing) = self.provided.get(&entry.key) {
            if existing.clashes_with(kind) {
                warn!(key = %entry.key, "Key bound twice in one component");
                return Err(OrchardError::TypeAlreadyBound { key: entry.key });
            }
            if self.is_redundant(&entry) {
                trace!(key = %entry.key, "Dropping redundant self-declared binding");
                return Ok(());
            }
        }
        trace!(key = %entry.key, ?kind, "Bound");
        self.provided.insert(entry.key, kind);
        self.entries.push(entry);
        Ok(())
    }

    /// Merges an installed component's fragment.
    pub fn absorb(&mut self, other: Fragment) -> Result<()> {
        let overlap = self.provided.overlapping(&other.provided);
        if !overlap.is_empty() {
            warn!(keys = ?overlap, "Installed component provides keys already provided");
            return Err(OrchardError::DuplicateTypesInComponent { keys: overlap });
        }

        for entry in other.entries {
            if self.is_redundant(&entry) {
                continue;
            }
            self.provided.insert(entry.key, entry.producer.kind());
            self.entries.push(entry);
        }
        self.contributions.extend(other.contributions);
        extend_unique(&mut self.shared, other.shared);
        extend_unique(&mut self.required, other.required);
        Ok(())
    }

    /// Whether `key` is available to this fragment's entries.
    pub fn satisfies(&self, key: &Key) -> bool {
        self.provided.contains(key) || self.shared.contains(key)
    }

    fn is_redundant(&self, entry: &BindingEntry) -> bool {
        entry.producer.kind() == ProvisionKind::SelfDeclared
            && self.entries.iter().any(|existing| {
                existing.key == entry.key && existing.producer.is_equivalent(&entry.producer)
            })
    }
}

fn extend_unique(target: &mut Vec<Key>, keys: impl IntoIterator<Item = Key>) {
    for key in keys {
        if !target.contains(&key) {
            target.push(key);
        }
    }
}

/// An install that was expanded, with the keys it ended up providing.
#[derive(Debug, Clone)]
pub(crate) struct ExpandedInstall {
    identity: InstallIdentity,
    provided: Vec<Key>,
}

/// Expands components into fragments, running each deferred install once.
#[derive(Debug, Default)]
pub(crate) struct Expander {
    expanded: Vec<ExpandedInstall>,
}

impl Expander {
    pub fn new() -> Self {
        Self::default()
    }

    /// An expander that treats `expanded` as already merged elsewhere.
    pub fn with_expanded(expanded: Vec<ExpandedInstall>) -> Self {
        Self { expanded }
    }

    pub fn into_expanded(self) -> Vec<ExpandedInstall> {
        self.expanded
    }

    pub fn expand(&mut self, component: Component) -> Result<Fragment> {
        let Component {
            signature,
            declarations,
            ..
        } = component;

        let mut fragment = Fragment::default();
        for declaration in declarations {
            match declaration {
                Declaration::Binding(entry) => fragment.bind(entry)?,
                Declaration::Contribution(entry) => fragment.contributions.push(entry),
                Declaration::Install(Install::Deferred { identity, invoke }) => {
                    if let Some(seen) = self.expanded.iter().find(|seen| seen.identity == identity) {
                        trace!(function = identity.function_name(), "Install already expanded");
                        extend_unique(&mut fragment.shared, seen.provided.iter().copied());
                        continue;
                    }
                    debug!(function = identity.function_name(), "Expanding install");
                    let slot = self.expanded.len();
                    self.expanded.push(ExpandedInstall {
                        identity,
                        provided: Vec::new(),
                    });
                    let child = self.expand(invoke())?;
                    self.expanded[slot].provided = child.provided.keys().collect();
                    fragment.absorb(child)?;
                }
                Declaration::Install(Install::Eager(child)) => {
                    let child = self.expand(child)?;
                    fragment.absorb(child)?;
                }
            }
        }

        complete(&mut fragment, &signature)?;
        Ok(fragment)
    }
}

/// Checks that every key the fragment needs is provided, required, or
/// self-declared, auto-binding the self-declared ones.
fn complete(fragment: &mut Fragment, signature: &Signature) -> Result<()> {
    let mut pending: Vec<(Key, Option<Key>)> = Vec::new();
    pending.extend(signature.provided().iter().map(|key| (*key, None)));
    for entry in fragment.entries.iter().chain(&fragment.contributions) {
        pending.extend(
            entry
                .producer
                .needed_keys()
                .into_iter()
                .map(|dep| (dep, Some(entry.key))),
        );
    }
    pending.extend(fragment.required.iter().map(|key| (*key, None)));
    pending.reverse();

    while let Some((key, required_by)) = pending.pop() {
        if fragment.satisfies(&key) || signature.is_required(&key) {
            continue;
        }
        let Some(binding) = self_binding(key.raw_type_id()) else {
            warn!(key = %key, "No binding for needed key");
            return Err(OrchardError::MissingBinding(MissingBindingError::new(
                key,
                required_by,
                fragment.provided.keys(),
            )));
        };

        debug!(key = %key, "Binding self-declared constructor");
        let producer = binding.producer();
        let needed = producer.needed_keys();
        fragment.bind(BindingEntry { key, producer })?;
        pending.extend(needed.into_iter().rev().map(|dep| (dep, Some(key))));
    }

    fragment.required = signature
        .required()
        .iter()
        .filter(|key| !fragment.satisfies(key))
        .copied()
        .collect();
    Ok(())
}
