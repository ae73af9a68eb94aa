//! # The Injector
//!
//! Merges an optional [`NormalizedComponent`] with one or more
//! [`Component`]s, validates the result, and serves fully wired values.
//!
//! # Architecture
//! ```text
//! Component ──┐
//! Component ──┼── InjectorBuilder::build() ──> Injector ──get()──> Arc<T>
//! Normalized ─┘        Unmerged → Merging → Validated → Ready
//! ```
//!
//! Values are constructed on first retrieval and cached for the injector's
//! lifetime. Concurrent first retrievals of the same key construct it once.
//! A lazy cycle entered from two threads at once fails with
//! [`OrchardError::CircularDependency`] instead of blocking both.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::binding::{Args, Dep, Producer, Resolved, Value, downcast};
use crate::component::Component;
use crate::error::{CircularDependencyError, MissingBindingError, OrchardError, Result};
use crate::graph::{Edges, GraphValidator, reachable};
use crate::key::{Key, TypedKey};
use crate::merge::{Expander, Fragment};
use crate::normalized::{NormalizedComponent, ResolvedGraph};
use crate::provider::Provider;

/// Build phases of an injector, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unmerged,
    Merging,
    Validated,
    Ready,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unmerged => "unmerged",
            Self::Merging => "merging",
            Self::Validated => "validated",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════
// InjectorBuilder
// ═══════════════════════════════════════════

/// Builds an [`Injector`].
///
/// # Examples
/// ```rust,ignore
/// let injector = Injector::builder()
///     .normalized(&normalized)
///     .component(request_component())
///     .expose([Key::of::<Handler>()])
///     .build()?;
/// ```
#[derive(Default)]
pub struct InjectorBuilder {
    normalized: Option<NormalizedComponent>,
    components: Vec<Component>,
    exposed: Option<Vec<Key>>,
}

impl InjectorBuilder {
    /// Uses `normalized` as the pre-validated base of the graph.
    pub fn normalized(mut self, normalized: &NormalizedComponent) -> Self {
        self.normalized = Some(normalized.clone());
        self
    }

    /// Adds a component merged on top of the normalized base.
    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Restricts retrieval to `keys` and what they depend on.
    pub fn expose<K: Into<Key>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.exposed
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Merges and validates every source.
    ///
    /// # Errors
    /// - [`OrchardError::DuplicateTypesInComponent`] when sources provide
    ///   the same key
    /// - [`OrchardError::UnsatisfiedRequirementsInNormalizedComponent`]
    ///   when requirements of the normalized component are left unmet
    /// - [`OrchardError::UnsatisfiedRequirements`] for any other unmet
    ///   requirement
    /// - [`OrchardError::CircularDependency`] for a direct dependency cycle
    /// - [`OrchardError::MissingBinding`] when an exposed key is not provided
    /// - any error raised while merging a component
    #[instrument(skip_all, name = "injector_build")]
    pub fn build(self) -> Result<Injector> {
        let mut phase = Phase::Unmerged;
        info!(
            %phase,
            normalized = self.normalized.is_some(),
            components = self.components.len(),
            "Building injector"
        );

        phase = Phase::Merging;
        debug!(%phase, "Merging sources");
        let base = self.normalized.as_ref().map(|nc| nc.graph.clone());
        let mut expander = Expander::with_expanded(
            self.normalized
                .as_ref()
                .map(|nc| nc.installs.clone())
                .unwrap_or_default(),
        );
        let mut overlay = Fragment::default();
        for component in self.components {
            let fragment = expander.expand(component)?;
            if let Some(base) = &base {
                let overlap = base.provisions.overlapping(&fragment.provided);
                if !overlap.is_empty() {
                    warn!(keys = ?overlap, "Component provides keys of the normalized component");
                    return Err(OrchardError::DuplicateTypesInComponent { keys: overlap });
                }
            }
            overlay.absorb(fragment)?;
        }

        let provided_by_base = |key: &Key| {
            base.as_ref()
                .is_some_and(|base| base.provisions.contains(key))
        };

        let owed_to_base: Vec<Key> = self
            .normalized
            .as_ref()
            .map(|nc| nc.required.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|key| !overlay.satisfies(key))
            .collect();
        if !owed_to_base.is_empty() {
            warn!(keys = ?owed_to_base, "Normalized component requirements unmet");
            return Err(OrchardError::UnsatisfiedRequirementsInNormalizedComponent {
                keys: owed_to_base,
            });
        }

        let unmet: Vec<Key> = overlay
            .required
            .iter()
            .filter(|key| !overlay.satisfies(key) && !provided_by_base(key))
            .copied()
            .collect();
        if !unmet.is_empty() {
            warn!(keys = ?unmet, "Requirements unmet");
            return Err(OrchardError::UnsatisfiedRequirements { keys: unmet });
        }

        let overlay = ResolvedGraph::from_fragment(overlay);
        let empty = Edges::new();
        let base_edges = base.as_ref().map_or(&empty, |base| &base.edges);
        let mut roots: Vec<Key> = overlay.provisions.keys().collect();
        roots.extend(overlay.contribution_dependencies());
        GraphValidator::new([base_edges, &overlay.edges]).validate(roots)?;
        phase = Phase::Validated;
        debug!(%phase, "Graph validated");

        let exposed = match self.exposed {
            Some(keys) => {
                for key in &keys {
                    if !overlay.provisions.contains(key) && !provided_by_base(key) {
                        return Err(OrchardError::MissingBinding(MissingBindingError::new(
                            *key,
                            None,
                            overlay.provisions.keys().chain(
                                base.iter().flat_map(|base| base.provisions.keys()),
                            ),
                        )));
                    }
                }
                let base_needs = base.as_ref().map_or(&empty, |base| &base.needs);
                let mut seen = reachable(&[base_needs, &overlay.needs], keys.iter().copied());
                seen.retain(|key| overlay.provisions.contains(key) || provided_by_base(key));
                debug!(exposed = keys.len(), reachable = seen.len(), "Restricted exposure");
                Some(seen)
            }
            None => None,
        };

        let inner = InjectorInner {
            base,
            overlay,
            exposed,
            cache: DashMap::new(),
            multi_cache: DashMap::new(),
            constructed: Mutex::new(Vec::new()),
            resolution: Mutex::new(Resolution::default()),
        };
        phase = Phase::Ready;
        info!(%phase, provided = inner.provided_keys().len(), "Injector built successfully");
        Ok(Injector {
            inner: Arc::new(inner),
        })
    }
}

// ═══════════════════════════════════════════
// Injector
// ═══════════════════════════════════════════

/// The retrieval-ready object graph.
///
/// Thread-safe: share it behind an `Arc` or a reference.
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    /// An injector over a single component.
    pub fn new(component: Component) -> Result<Self> {
        Self::builder().component(component).build()
    }

    /// An injector over a normalized component and one component.
    pub fn from_normalized(normalized: &NormalizedComponent, component: Component) -> Result<Self> {
        Self::builder()
            .normalized(normalized)
            .component(component)
            .build()
    }

    /// Retrieves the unannotated `T`.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = injector.get()?;
    /// ```
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_key(TypedKey::<T>::new())
    }

    /// Retrieves `T` annotated with `A`.
    pub fn get_annotated<A: ?Sized + 'static, T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<T>> {
        self.get_key(TypedKey::<T>::annotated::<A>())
    }

    /// Retrieves the value bound to `key`.
    ///
    /// # Errors
    /// - [`OrchardError::MissingBinding`] for a key that is not exposed
    /// - [`OrchardError::InconsistentBindings`] when the key was provided
    ///   more than once with different bindings
    /// - any error raised by a constructor
    pub fn get_key<T: ?Sized + Send + Sync + 'static>(&self, key: TypedKey<T>) -> Result<Arc<T>> {
        let key = key.key();
        trace!(key = %key, "Retrieving");
        self.inner.check_exposed(key)?;
        let value = self.inner.resolve(key)?;
        downcast::<T>(key, &value)
    }

    /// A lazy provider for `key`.
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&self, key: TypedKey<T>) -> Result<Provider<T>> {
        self.inner.check_exposed(key.key())?;
        Ok(Provider::new(key, Arc::downgrade(&self.inner)))
    }

    /// Every element contributed to the multibinding set of `key`.
    ///
    /// Elements come in merge order: the normalized component's first. An
    /// unknown key yields an empty set.
    pub fn get_multibindings<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: TypedKey<T>,
    ) -> Result<Arc<Vec<Arc<T>>>> {
        self.inner.resolve_multibindings(key)
    }

    /// Constructs every exposed key and multibinding now.
    #[instrument(skip_all, name = "eager_injection")]
    pub fn eagerly_inject_all(&self) -> Result<()> {
        let keys = self.exposed_keys();
        debug!(keys = keys.len(), "Eagerly injecting");
        for key in keys {
            self.inner.resolve(key)?;
        }
        for key in self.inner.multibinding_keys() {
            self.inner.resolve_contributions(key)?;
        }
        Ok(())
    }

    /// Keys that can be retrieved, in merge order.
    pub fn exposed_keys(&self) -> Vec<Key> {
        self.inner
            .provided_keys()
            .into_iter()
            .filter(|key| self.inner.is_exposed(key))
            .collect()
    }

    /// Drops every constructed value in reverse construction order.
    ///
    /// Call it once no provider of this injector is in use on another
    /// thread. A provider resolving during shutdown may still construct
    /// values; those are dropped with the provider's last handle, outside
    /// the reverse order.
    pub fn shutdown(self) {
        info!("Shutting down injector");
        self.inner.teardown();
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("provided", &self.inner.provided_keys().len())
            .field("constructed", &self.inner.constructed.lock().len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// InjectorInner
// ═══════════════════════════════════════════

/// Which thread constructs which key, and what each thread waits for.
///
/// A thread about to block on a key another thread is constructing
/// follows the waits-for edges first. If they lead back to a key it is
/// constructing itself, it reports the cycle instead of blocking.
#[derive(Default)]
struct Resolution {
    /// Keys under construction, per thread, outermost first.
    stacks: HashMap<ThreadId, Vec<Key>>,
    owners: HashMap<Key, ThreadId>,
    waiting: HashMap<ThreadId, Key>,
}

impl Resolution {
    fn stack(&self, thread: ThreadId) -> &[Key] {
        self.stacks.get(&thread).map_or(&[], Vec::as_slice)
    }

    /// The cycle `thread` would close by waiting for `key`, if any.
    fn cycle(&self, thread: ThreadId, key: Key) -> Option<Vec<Key>> {
        let own = self.stack(thread);
        if let Some(start) = own.iter().position(|k| *k == key) {
            let mut chain = own[start..].to_vec();
            chain.push(key);
            return Some(chain);
        }

        let mut hops = vec![key];
        let mut owner = *self.owners.get(&key)?;
        let mut visited = HashSet::new();
        while owner != thread {
            if !visited.insert(owner) {
                return None;
            }
            let held = self.stack(owner);
            let entered = *hops.last()?;
            if let Some(at) = held.iter().position(|k| *k == entered) {
                hops.extend_from_slice(&held[at + 1..]);
            }
            let next = *self.waiting.get(&owner)?;
            hops.push(next);
            owner = *self.owners.get(&next)?;
        }

        let closing = *hops.last()?;
        let start = own.iter().position(|k| *k == closing)?;
        let mut chain = own[start..].to_vec();
        chain.extend(hops);
        Some(chain)
    }
}

/// Registered wait of the current thread, cleared on drop.
struct Waiting<'a> {
    resolution: &'a Mutex<Resolution>,
    thread: ThreadId,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.resolution.lock().waiting.remove(&self.thread);
    }
}

/// Ownership of a key under construction, released on drop.
struct Claim<'a> {
    resolution: &'a Mutex<Resolution>,
    thread: ThreadId,
    key: Key,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut resolution = self.resolution.lock();
        resolution.owners.remove(&self.key);
        if let Some(stack) = resolution.stacks.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                resolution.stacks.remove(&self.thread);
            }
        }
    }
}

/// The shared state behind an [`Injector`] and its providers.
pub(crate) struct InjectorInner {
    base: Option<Arc<ResolvedGraph>>,
    overlay: ResolvedGraph,
    exposed: Option<HashSet<Key>>,
    cache: DashMap<Key, Arc<OnceCell<Value>>>,
    multi_cache: DashMap<Key, Arc<OnceCell<Arc<Vec<Value>>>>>,
    constructed: Mutex<Vec<(Key, Value)>>,
    resolution: Mutex<Resolution>,
}

impl InjectorInner {
    fn graphs(&self) -> impl Iterator<Item = &ResolvedGraph> {
        self.base.as_deref().into_iter().chain([&self.overlay])
    }

    fn provided_keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        for graph in self.graphs() {
            for key in graph.provisions.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    fn multibinding_keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        for graph in self.graphs() {
            for key in &graph.contribution_order {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }
        keys
    }

    fn is_exposed(&self, key: &Key) -> bool {
        self.exposed.as_ref().is_none_or(|exposed| exposed.contains(key))
    }

    fn check_exposed(&self, key: Key) -> Result<()> {
        if self.is_exposed(&key) && self.graphs().any(|g| g.provisions.contains(&key)) {
            return Ok(());
        }
        let candidates: Vec<Key> = self
            .provided_keys()
            .into_iter()
            .filter(|k| self.is_exposed(k))
            .collect();
        Err(OrchardError::MissingBinding(MissingBindingError::new(
            key, None, candidates,
        )))
    }

    /// All producers of `key`, normalized base first.
    fn producers(&self, key: &Key) -> Vec<&Producer> {
        self.graphs()
            .filter_map(|graph| graph.producers.get(key))
            .flatten()
            .collect()
    }

    pub(crate) fn resolve(self: &Arc<Self>, key: Key) -> Result<Value> {
        let producers = self.producers(&key);
        let Some((first, rest)) = producers.split_first() else {
            return Err(OrchardError::MissingBinding(MissingBindingError::new(
                key,
                None,
                self.provided_keys(),
            )));
        };
        if !rest.iter().all(|other| first.is_equivalent(other)) {
            warn!(key = %key, producers = producers.len(), "Key provided with different bindings");
            return Err(OrchardError::InconsistentBindings { key });
        }

        if let Producer::Instance { value, .. } = first {
            trace!(key = %key, "Resolved instance");
            return Ok(value.clone());
        }

        let cell = self.cache.entry(key).or_default().value().clone();
        if let Some(value) = cell.get() {
            trace!(key = %key, "Resolved from cache");
            return Ok(value.clone());
        }

        let _waiting = self.wait_for(key)?;
        cell.get_or_try_init(|| {
            let _claim = self.claim(key);
            self.produce(key, first)
        })
        .cloned()
    }

    /// Registers the current thread as waiting for `key`.
    ///
    /// Fails when `key` is already under construction on this thread, or
    /// when the thread constructing it is itself waiting, possibly through
    /// other threads, on a key this thread constructs.
    fn wait_for(&self, key: Key) -> Result<Waiting<'_>> {
        let thread = thread::current().id();
        let mut resolution = self.resolution.lock();
        if let Some(chain) = resolution.cycle(thread, key) {
            warn!(cycle = ?chain, "Re-entrant resolution");
            return Err(OrchardError::CircularDependency(CircularDependencyError {
                chain,
            }));
        }
        resolution.waiting.insert(thread, key);
        Ok(Waiting {
            resolution: &self.resolution,
            thread,
        })
    }

    /// Marks `key` as under construction on the current thread.
    fn claim(&self, key: Key) -> Claim<'_> {
        let thread = thread::current().id();
        let mut resolution = self.resolution.lock();
        resolution.waiting.remove(&thread);
        resolution.owners.insert(key, thread);
        resolution.stacks.entry(thread).or_default().push(key);
        Claim {
            resolution: &self.resolution,
            thread,
            key,
        }
    }

    fn produce(self: &Arc<Self>, key: Key, producer: &Producer) -> Result<Value> {
        match producer {
            Producer::Instance { value, .. } => Ok(value.clone()),
            Producer::Alias { target, upcast } => {
                trace!(key = %key, target = %target, "Resolving through alias");
                let value = self.resolve(*target)?;
                upcast(&value)
            }
            Producer::Constructor { deps, construct, .. } => {
                let mut resolved: Vec<(Dep, Resolved)> = Vec::with_capacity(deps.len());
                for dep in deps {
                    let value = match dep {
                        Dep::Direct(dep_key) => Resolved::Value(self.resolve(*dep_key)?),
                        Dep::Lazy(_) => Resolved::Lazy,
                    };
                    resolved.push((*dep, value));
                }

                let args = Args::new(key, &resolved, Arc::downgrade(self));
                let value = construct(&args)?;
                debug!(key = %key, "Constructed");
                self.constructed.lock().push((key, value.clone()));
                Ok(value)
            }
        }
    }

    /// The values of every contribution to `key`, built once.
    fn resolve_contributions(self: &Arc<Self>, key: Key) -> Result<Arc<Vec<Value>>> {
        let cell = self.multi_cache.entry(key).or_default().value().clone();
        cell.get_or_try_init(|| {
            let contributions: Vec<&Producer> = self
                .graphs()
                .filter_map(|graph| graph.contributions.get(&key))
                .flatten()
                .collect();
            let mut values = Vec::with_capacity(contributions.len());
            for producer in contributions {
                values.push(self.produce(key, producer)?);
            }
            trace!(key = %key, elements = values.len(), "Resolved multibindings");
            Ok::<_, OrchardError>(Arc::new(values))
        })
        .cloned()
    }

    fn resolve_multibindings<T: ?Sized + Send + Sync + 'static>(
        self: &Arc<Self>,
        key: TypedKey<T>,
    ) -> Result<Arc<Vec<Arc<T>>>> {
        let key = key.key();
        let values = self.resolve_contributions(key)?;
        let elements = values
            .iter()
            .map(|value| downcast::<T>(key, value))
            .collect::<Result<Vec<Arc<T>>>>()?;
        Ok(Arc::new(elements))
    }

    /// Clears the caches, then drops constructed values newest first.
    ///
    /// Assumes no provider is resolving concurrently: a provider that
    /// upgraded its handle before the teardown may repopulate the cache,
    /// and those values are then dropped with the last handle instead.
    fn teardown(&self) {
        self.cache.clear();
        self.multi_cache.clear();
        let mut constructed = std::mem::take(&mut *self.constructed.lock());
        debug!(values = constructed.len(), "Tearing down");
        while let Some((key, value)) = constructed.pop() {
            trace!(key = %key, "Dropping");
            drop(value);
        }
    }
}

impl Drop for InjectorInner {
    fn drop(&mut self) {
        self.teardown();
    }
}
