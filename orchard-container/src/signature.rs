//! Component signatures.
//!
//! A signature is the declared type list of a component: an optional
//! leading `Required<...>` list followed by the provided keys. Signatures
//! are validated when parsed, before any merge runs.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{OrchardError, Result};
use crate::key::Key;

/// One argument of a component signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    /// A `Required<...>` list. Only legal as the first argument.
    Required(Vec<Key>),
    /// A provided key.
    Provided(Key),
}

impl TypeArg {
    pub fn required<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self::Required(keys.into_iter().map(Into::into).collect())
    }

    pub fn provided(key: impl Into<Key>) -> Self {
        Self::Provided(key.into())
    }
}

/// The validated declaration of what a component requires and provides.
///
/// # Examples
/// ```
/// use orchard_container::key::Key;
/// use orchard_container::signature::{Signature, TypeArg};
///
/// struct Engine;
/// struct Car;
///
/// let signature = Signature::parse([
///     TypeArg::required([Key::of::<Engine>()]),
///     TypeArg::provided(Key::of::<Car>()),
/// ])
/// .unwrap();
/// assert_eq!(signature.required(), &[Key::of::<Engine>()]);
/// assert_eq!(signature.provided(), &[Key::of::<Car>()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    required: Vec<Key>,
    provided: Vec<Key>,
}

impl Signature {
    /// The signature that requires and provides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses an ordered list of signature arguments.
    ///
    /// # Errors
    /// - [`OrchardError::RequiredTypesInComponentArguments`] when a
    ///   `Required<...>` list is not the first argument
    /// - [`OrchardError::RepeatedTypes`] when a key appears twice, including
    ///   once as required and once as provided
    pub fn parse(args: impl IntoIterator<Item = TypeArg>) -> Result<Self> {
        let mut required = Vec::new();
        let mut provided = Vec::new();

        for (position, arg) in args.into_iter().enumerate() {
            match arg {
                TypeArg::Required(keys) if position == 0 => required = keys,
                TypeArg::Required(keys) => {
                    warn!(position, "Required<...> list in non-leading position");
                    return Err(OrchardError::RequiredTypesInComponentArguments {
                        position: position + 1,
                        keys,
                    });
                }
                TypeArg::Provided(key) => provided.push(key),
            }
        }

        let mut seen = HashSet::new();
        for key in required.iter().chain(provided.iter()) {
            if !seen.insert(*key) {
                return Err(OrchardError::RepeatedTypes {
                    keys: vec![*key, *key],
                });
            }
        }

        Ok(Self { required, provided })
    }

    /// A signature with a leading required list and provided keys.
    pub fn new<R, P>(
        required: impl IntoIterator<Item = R>,
        provided: impl IntoIterator<Item = P>,
    ) -> Result<Self>
    where
        R: Into<Key>,
        P: Into<Key>,
    {
        let required: Vec<Key> = required.into_iter().map(Into::into).collect();
        let leading = (!required.is_empty()).then(|| TypeArg::Required(required));
        let provided = provided.into_iter().map(|key| TypeArg::Provided(key.into()));
        Self::parse(leading.into_iter().chain(provided))
    }

    /// A signature that only provides keys.
    pub fn provides<P: Into<Key>>(provided: impl IntoIterator<Item = P>) -> Result<Self> {
        Self::parse(provided.into_iter().map(|key| TypeArg::Provided(key.into())))
    }

    pub fn required(&self) -> &[Key] {
        &self.required
    }

    pub fn provided(&self) -> &[Key] {
        &self.provided
    }

    pub fn is_required(&self, key: &Key) -> bool {
        self.required.contains(key)
    }
}
