//! Binding keys.
//!
//! A [`Key`] identifies a bindable slot: a raw Rust type plus an optional
//! annotation type. Annotations let two otherwise identical types (two
//! `u32`s meaning different things) occupy independent slots in the same
//! graph. [`TypedKey`] carries the raw type at compile time so builder and
//! retrieval APIs stay type-checked.

use std::any::{TypeId, type_name};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use orchard_support::rendering::{render_annotated, shorten_type_name};

/// An annotation type tagging a [`Key`].
///
/// Annotation types are usually empty marker structs; only their identity
/// matters.
#[derive(Clone, Copy)]
pub struct Annotation {
    type_id: TypeId,
    type_name: &'static str,
}

impl Annotation {
    /// Creates the annotation for marker type `A`.
    #[inline]
    pub fn of<A: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: type_name::<A>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Annotation {}

impl Hash for Annotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Annotation({})", self.type_name)
    }
}

/// Identifies a bindable slot in a component or injector.
///
/// Two keys are equal iff both the raw type and the annotation match. There
/// is no partial matching: an annotated key never satisfies a request for
/// the unannotated key, and vice versa.
///
/// # Examples
/// ```
/// use orchard_container::key::Key;
///
/// struct Primary;
///
/// let plain = Key::of::<u32>();
/// let primary = Key::annotated::<Primary, u32>();
/// assert_ne!(plain, primary);
/// assert_eq!(primary.raw_type_id(), plain.raw_type_id());
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    annotation: Option<Annotation>,
}

impl Key {
    /// Creates the unannotated key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            annotation: None,
        }
    }

    /// Creates the key for type `T` tagged with annotation type `A`.
    #[inline]
    pub fn annotated<A: ?Sized + 'static, T: ?Sized + 'static>() -> Self {
        Self {
            annotation: Some(Annotation::of::<A>()),
            ..Self::of::<T>()
        }
    }

    /// Returns the same raw type under `annotation`.
    #[inline]
    pub fn with_annotation(self, annotation: Option<Annotation>) -> Self {
        Self { annotation, ..self }
    }

    /// The [`TypeId`] of the raw type, ignoring the annotation.
    #[inline]
    pub fn raw_type_id(&self) -> TypeId {
        self.type_id
    }

    /// The full name of the raw type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn annotation(&self) -> Option<Annotation> {
        self.annotation
    }

    #[inline]
    pub fn is_annotated(&self) -> bool {
        self.annotation.is_some()
    }

    /// Renders the key with module paths stripped, for compact messages.
    pub fn short_name(&self) -> String {
        match self.annotation {
            Some(annotation) => render_annotated(
                &shorten_type_name(annotation.type_name),
                &shorten_type_name(self.type_name),
            ),
            None => shorten_type_name(self.type_name),
        }
    }

    fn annotation_id(&self) -> Option<TypeId> {
        self.annotation.map(|a| a.type_id)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.annotation == other.annotation
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.annotation.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id
            .cmp(&other.type_id)
            .then_with(|| self.annotation_id().cmp(&other.annotation_id()))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.annotation {
            Some(a) => write!(f, "Key({}, annotation={})", self.type_name, a.type_name),
            None => write!(f, "Key({})", self.type_name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.annotation {
            Some(a) => f.write_str(&render_annotated(a.type_name, self.type_name)),
            None => f.write_str(self.type_name),
        }
    }
}

/// A [`Key`] that remembers the Rust type it is bound to.
///
/// ```
/// use orchard_container::key::{Key, TypedKey};
///
/// struct Replica;
///
/// let key = TypedKey::<String>::annotated::<Replica>();
/// assert_eq!(Key::from(key), Key::annotated::<Replica, String>());
/// ```
pub struct TypedKey<T: ?Sized> {
    key: Key,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> TypedKey<T> {
    /// The unannotated key for `T`.
    #[inline]
    pub fn new() -> Self {
        Self {
            key: Key::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// The key for `T` tagged with annotation `A`.
    #[inline]
    pub fn annotated<A: ?Sized + 'static>() -> Self {
        Self {
            key: Key::annotated::<A, T>(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }
}

impl<T: ?Sized + 'static> Default for TypedKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for TypedKey<T> {}

impl<T: ?Sized> PartialEq for TypedKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: ?Sized> Eq for TypedKey<T> {}

impl<T: ?Sized> From<TypedKey<T>> for Key {
    fn from(typed: TypedKey<T>) -> Self {
        typed.key
    }
}

impl<T: ?Sized> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.key, f)
    }
}

impl<T: ?Sized> fmt::Display for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}
