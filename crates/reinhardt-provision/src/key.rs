//! Binding keys and dependencies
//!
//! A [`Key`] names what is being provisioned: a Rust type plus an optional
//! [`Qualifier`] that distinguishes several bindings of the same type.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// String qualifier distinguishing bindings of the same type.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::Qualifier;
///
/// let primary = Qualifier::new("primary");
/// assert_eq!(primary.as_str(), "primary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier(Arc<str>);

impl Qualifier {
	/// Creates a qualifier from any string-like value.
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self(name.into())
	}

	/// Returns the qualifier text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identifies a binding by type and optional qualifier.
///
/// Keys compare by value: two keys built for the same type and qualifier are
/// equal regardless of where they were created.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::Key;
///
/// let plain = Key::of::<String>();
/// let named = Key::named::<String>("greeting");
///
/// assert_eq!(plain, Key::of::<String>());
/// assert_ne!(plain, named);
/// assert_eq!(named.qualifier().map(|q| q.as_str()), Some("greeting"));
/// ```
#[derive(Clone)]
pub struct Key {
	type_id: TypeId,
	type_name: &'static str,
	qualifier: Option<Qualifier>,
}

impl Key {
	/// Creates an unqualified key for `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			type_id: TypeId::of::<T>(),
			type_name: std::any::type_name::<T>(),
			qualifier: None,
		}
	}

	/// Creates a key for `T` qualified by `name`.
	pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
		Self::of::<T>().with_qualifier(Qualifier::new(name))
	}

	/// Returns a copy of this key carrying `qualifier`.
	pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
		self.qualifier = Some(qualifier);
		self
	}

	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn qualifier(&self) -> Option<&Qualifier> {
		self.qualifier.as_ref()
	}

	/// Returns `true` if this key was created for `T`.
	pub fn is<T: ?Sized + 'static>(&self) -> bool {
		self.type_id == TypeId::of::<T>()
	}
}

// type_name is derived from type_id, so it takes no part in equality.
impl PartialEq for Key {
	fn eq(&self, other: &Self) -> bool {
		self.type_id == other.type_id && self.qualifier == other.qualifier
	}
}

impl Eq for Key {}

impl std::hash::Hash for Key {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.type_id.hash(state);
		self.qualifier.hash(state);
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.qualifier {
			Some(qualifier) => write!(f, "Key[type={}, qualifier={}]", self.type_name, qualifier),
			None => write!(f, "Key[type={}]", self.type_name),
		}
	}
}

/// A request for the value bound to a key.
///
/// Carries the key plus an optional description of the injection point that
/// asked for it, used only in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
	key: Key,
	injection_point: Option<Arc<str>>,
}

impl Dependency {
	pub fn new(key: Key) -> Self {
		Self {
			key,
			injection_point: None,
		}
	}

	/// Records the injection point requesting this dependency.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_provision::{Dependency, Key};
	///
	/// let dependency = Dependency::new(Key::of::<u32>()).at("Server::port");
	/// assert_eq!(dependency.injection_point(), Some("Server::port"));
	/// ```
	pub fn at(mut self, injection_point: impl Into<Arc<str>>) -> Self {
		self.injection_point = Some(injection_point.into());
		self
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn injection_point(&self) -> Option<&str> {
		self.injection_point.as_deref()
	}
}

impl From<Key> for Dependency {
	fn from(key: Key) -> Self {
		Self::new(key)
	}
}

impl fmt::Display for Dependency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.injection_point {
			Some(point) => write!(f, "{} for {}", self.key, point),
			None => write!(f, "{}", self.key),
		}
	}
}
