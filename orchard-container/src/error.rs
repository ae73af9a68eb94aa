//! Error types for Orchard.
//!
//! Build-time errors (clashes, repeats, malformed signatures, unmet
//! requirements) come from key-set arithmetic and never require
//! constructing a value. Runtime errors surface while the injector
//! resolves values.

use std::fmt;

use orchard_support::rendering::{render_chain, render_list, suggest_similar};

use crate::key::Key;

/// Main error type for all Orchard operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchardError {
    /// A key was bound twice by declarations of the same component.
    #[error(
        "TypeAlreadyBoundError<{key}>: Trying to bind {key} but it is already bound."
    )]
    TypeAlreadyBound { key: Key },

    /// An installed component provides keys the current component already provides.
    #[error(
        "DuplicateTypesInComponentError<{}>: The installed component provides some types that are already provided by the current component.",
        render_keys(.keys)
    )]
    DuplicateTypesInComponent { keys: Vec<Key> },

    /// The injector sources leave requirements of the normalized component unmet.
    #[error(
        "UnsatisfiedRequirementsInNormalizedComponentError<{}>: The requirements in UnsatisfiedRequirements are required by the NormalizedComponent but are not provided by the Component.",
        render_keys(.keys)
    )]
    UnsatisfiedRequirementsInNormalizedComponent { keys: Vec<Key> },

    /// The injector sources leave component requirements unmet.
    #[error(
        "UnsatisfiedRequirementsError<{}>: The injector requires these types but no component provides them.",
        render_keys(.keys)
    )]
    UnsatisfiedRequirements { keys: Vec<Key> },

    /// A signature lists the same key more than once.
    #[error(
        "RepeatedTypesError<{}>: A type was specified more than once.",
        render_keys(.keys)
    )]
    RepeatedTypes { keys: Vec<Key> },

    /// A `Required<...>` list appears after the first signature argument.
    #[error(
        "RequiredTypesInComponentArgumentsError<Required<{}>>: A Required<...> list was passed as argument {position} of a component signature, but it may only be the first argument.",
        render_keys(.keys)
    )]
    RequiredTypesInComponentArguments { position: usize, keys: Vec<Key> },

    /// A needed key has no binding.
    #[error("{}", .0)]
    MissingBinding(MissingBindingError),

    /// Direct dependencies form a cycle.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// The same key has several producers that are not interchangeable.
    #[error(
        "Fatal injection error: the type {key} was provided more than once, with different bindings."
    )]
    InconsistentBindings { key: Key },

    /// A constructor returned an error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: Key,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stored value is not of the requested Rust type.
    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: Key, expected: &'static str },

    /// A lazy provider outlived its injector.
    #[error("Cannot provide {key}: the injector has been shut down")]
    InjectorDropped { key: Key },
}

impl OrchardError {
    /// Wraps a foreign error raised while constructing `key`.
    pub fn construction(
        key: impl Into<Key>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConstructionFailed {
            key: key.into(),
            source: source.into(),
        }
    }

    /// The stable kind tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeAlreadyBound { .. } => ErrorKind::TypeAlreadyBound,
            Self::DuplicateTypesInComponent { .. } => ErrorKind::DuplicateTypesInComponent,
            Self::UnsatisfiedRequirementsInNormalizedComponent { .. } => {
                ErrorKind::UnsatisfiedRequirementsInNormalizedComponent
            }
            Self::UnsatisfiedRequirements { .. } => ErrorKind::UnsatisfiedRequirements,
            Self::RepeatedTypes { .. } => ErrorKind::RepeatedTypes,
            Self::RequiredTypesInComponentArguments { .. } => {
                ErrorKind::RequiredTypesInComponentArguments
            }
            Self::MissingBinding(_) => ErrorKind::MissingBinding,
            Self::CircularDependency(_) => ErrorKind::CircularDependency,
            Self::InconsistentBindings { .. } => ErrorKind::InconsistentBindings,
            Self::ConstructionFailed { .. } => ErrorKind::ConstructionFailed,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::InjectorDropped { .. } => ErrorKind::InjectorDropped,
        }
    }

    /// The keys this error is about, in reporting order.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Self::TypeAlreadyBound { key }
            | Self::InconsistentBindings { key }
            | Self::ConstructionFailed { key, .. }
            | Self::TypeMismatch { key, .. }
            | Self::InjectorDropped { key } => vec![*key],
            Self::DuplicateTypesInComponent { keys }
            | Self::UnsatisfiedRequirementsInNormalizedComponent { keys }
            | Self::UnsatisfiedRequirements { keys }
            | Self::RepeatedTypes { keys }
            | Self::RequiredTypesInComponentArguments { keys, .. } => keys.clone(),
            Self::MissingBinding(e) => vec![e.requested],
            Self::CircularDependency(e) => e.chain.clone(),
        }
    }

    /// Whether the error was detected while assembling the graph, before
    /// any value was constructed.
    pub fn is_build_time(&self) -> bool {
        self.kind().is_build_time()
    }
}

/// Stable identifiers for every [`OrchardError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeAlreadyBound,
    DuplicateTypesInComponent,
    UnsatisfiedRequirementsInNormalizedComponent,
    UnsatisfiedRequirements,
    RepeatedTypes,
    RequiredTypesInComponentArguments,
    MissingBinding,
    CircularDependency,
    InconsistentBindings,
    ConstructionFailed,
    TypeMismatch,
    InjectorDropped,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeAlreadyBound => "TypeAlreadyBoundError",
            Self::DuplicateTypesInComponent => "DuplicateTypesInComponentError",
            Self::UnsatisfiedRequirementsInNormalizedComponent => {
                "UnsatisfiedRequirementsInNormalizedComponentError"
            }
            Self::UnsatisfiedRequirements => "UnsatisfiedRequirementsError",
            Self::RepeatedTypes => "RepeatedTypesError",
            Self::RequiredTypesInComponentArguments => "RequiredTypesInComponentArgumentsError",
            Self::MissingBinding => "MissingBindingError",
            Self::CircularDependency => "CircularDependencyError",
            Self::InconsistentBindings => "FatalInjectionError",
            Self::ConstructionFailed => "ConstructionFailedError",
            Self::TypeMismatch => "TypeMismatchError",
            Self::InjectorDropped => "InjectorDroppedError",
        }
    }

    /// Runtime kinds can only be detected once values are compared or built.
    pub fn is_build_time(&self) -> bool {
        !matches!(
            self,
            Self::InconsistentBindings
                | Self::ConstructionFailed
                | Self::TypeMismatch
                | Self::InjectorDropped
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when a needed key has no binding.
///
/// Includes the key that needed it and similarly named bound keys.
#[derive(Debug)]
pub struct MissingBindingError {
    /// The key that has no binding
    pub requested: Key,
    /// The key whose producer depends on it, if any
    pub required_by: Option<Key>,
    /// Bound keys with similar type names
    pub suggestions: Vec<Key>,
}

impl MissingBindingError {
    /// Builds the error, picking suggestions among `candidates`.
    pub fn new(
        requested: Key,
        required_by: Option<Key>,
        candidates: impl IntoIterator<Item = Key>,
    ) -> Self {
        let candidates: Vec<Key> = candidates.into_iter().filter(|k| *k != requested).collect();
        let names: Vec<&str> = candidates.iter().map(|k| k.type_name()).collect();
        let picked = suggest_similar(requested.type_name(), &names, 3);
        let mut suggestions = Vec::new();
        for name in picked {
            for key in candidates.iter().filter(|k| k.type_name() == name) {
                if !suggestions.contains(key) {
                    suggestions.push(*key);
                }
            }
        }
        Self {
            requested,
            required_by,
            suggestions,
        }
    }
}

impl fmt::Display for MissingBindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No binding found for {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: bind {} in a component, declare it in Required<...>, or make it Injectable",
            self.requested.short_name()
        )
    }
}

/// Error when direct dependencies form a cycle.
///
/// The chain starts and ends with the same key.
#[derive(Debug)]
pub struct CircularDependencyError {
    pub chain: Vec<Key>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(Key::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: depend on one of these through Dep::lazy and a Provider"
        )
    }
}

fn render_keys(keys: &[Key]) -> String {
    let names: Vec<String> = keys.iter().map(Key::to_string).collect();
    render_list(&names)
}

/// Convenient Result type for Orchard operations.
pub type Result<T> = std::result::Result<T, OrchardError>;
