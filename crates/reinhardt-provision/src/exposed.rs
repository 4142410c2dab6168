//! Exposed bindings
//!
//! A private environment keeps its bindings to itself. Exposing a key binds
//! it in the enclosing environment to an [`ExposedKeyFactory`], which forwards
//! each provision into the private environment once the finalize pass has
//! resolved it.

use crate::binding::InternalFactory;
use crate::context::InternalContext;
use crate::error::{ConfigurationError, ErrorId, Errors, ProvisionError, ProvisionResult};
use crate::key::{Dependency, Key};
use crate::lifecycle::CreationListener;
use crate::scope::BindingLookup;
use crate::source::Source;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Resolution progress of an [`ExposedKeyFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureState {
	/// The finalize pass has not reached this binding yet.
	Unresolved,
	/// Provisions are forwarded to the private binding.
	Resolved,
	/// The private environment never bound the key.
	Misconfigured,
}

enum Resolution<T> {
	Resolved(Arc<dyn InternalFactory<T>>),
	Misconfigured(ConfigurationError),
}

/// Forwards an exposed key to the binding inside a private environment.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{
///     Binding, BindingLookup, BindingTable, Dependency, Errors, ExposedKeyFactory,
///     ExposureState, InstanceFactory, InternalContext, InternalFactory, Key, Registration,
///     Source,
/// };
/// use std::sync::Arc;
///
/// let parent = BindingTable::new();
/// let private = BindingTable::child(&parent);
/// private
///     .bind(Binding::new(
///         Registration::new(Key::of::<u32>(), Source::declared("PrivateModule")),
///         Arc::new(InstanceFactory::new(7u32)),
///     ))
///     .unwrap();
///
/// let exposed = ExposedKeyFactory::<u32>::new(
///     Key::of::<u32>(),
///     Source::declared("PrivateModule.expose"),
///     private as Arc<dyn BindingLookup>,
/// );
/// let mut errors = Errors::new();
/// exposed.resolve(&mut errors);
/// assert_eq!(exposed.state(), ExposureState::Resolved);
///
/// let mut ctx = InternalContext::default();
/// let value = exposed.get(&mut ctx, &Dependency::new(Key::of::<u32>()), false).unwrap();
/// assert_eq!(value, 7);
/// ```
pub struct ExposedKeyFactory<T> {
	key: Key,
	source: Source,
	private_scope: Arc<dyn BindingLookup>,
	state: OnceCell<Resolution<T>>,
}

impl<T: 'static> ExposedKeyFactory<T> {
	/// Creates an unresolved factory exposing `key` from `private_scope`.
	///
	/// `source` is where the key was exposed.
	pub fn new(key: Key, source: Source, private_scope: Arc<dyn BindingLookup>) -> Self {
		Self {
			key,
			source,
			private_scope,
			state: OnceCell::new(),
		}
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn source(&self) -> &Source {
		&self.source
	}

	pub fn state(&self) -> ExposureState {
		match self.state.get() {
			None => ExposureState::Unresolved,
			Some(Resolution::Resolved(_)) => ExposureState::Resolved,
			Some(Resolution::Misconfigured(_)) => ExposureState::Misconfigured,
		}
	}

	/// Looks up the private binding for the exposed key.
	///
	/// Only the first call does any work. If the private environment has no
	/// binding of its own for the key (the lookup finds nothing, or falls
	/// through to this factory), an [`ErrorId::ExposedButNotBound`] error
	/// attributed to the exposing source is reported into `errors` and kept
	/// for every later provision.
	pub fn resolve(&self, errors: &mut Errors) {
		if self.state.get().is_some() {
			return;
		}

		let delegate = self
			.private_scope
			.explicit_binding::<T>(&self.key)
			.map(|binding| Arc::clone(binding.factory()))
			.filter(|factory| !std::ptr::addr_eq(Arc::as_ptr(factory), self as *const Self));

		let resolution = match delegate {
			Some(factory) => {
				tracing::debug!(key = %self.key, source = %self.source, "resolved exposed binding");
				Resolution::Resolved(factory)
			}
			None => {
				tracing::warn!(
					key = %self.key,
					source = %self.source,
					"exposed key has no binding in its private environment"
				);
				let message = errors
					.with_source(self.source.clone())
					.exposed_but_not_bound(&self.key);
				Resolution::Misconfigured(ConfigurationError::from(message))
			}
		};
		// A concurrent resolve may have won; its outcome is equivalent.
		let _ = self.state.set(resolution);
	}
}

impl<T: Send + Sync + 'static> InternalFactory<T> for ExposedKeyFactory<T> {
	fn get(
		&self,
		context: &mut InternalContext,
		dependency: &Dependency,
		linked: bool,
	) -> ProvisionResult<T> {
		match self.state.get() {
			Some(Resolution::Resolved(delegate)) => delegate
				.get(context, dependency, linked)
				.map_err(|err| err.add_source(self.source.clone())),
			Some(Resolution::Misconfigured(err)) => Err(ProvisionError::from(err.clone())),
			None => Err(ProvisionError::new(
				ErrorId::InjectorNotFinalized,
				format!("{} was provisioned before the injector was finalized.", self.key),
			)
			.add_source(self.source.clone())),
		}
	}
}

impl<T: Send + Sync + 'static> CreationListener for ExposedKeyFactory<T> {
	fn notify(&self, errors: &mut Errors) {
		self.resolve(errors);
	}
}

impl<T: 'static> fmt::Debug for ExposedKeyFactory<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ExposedKeyFactory")
			.field("key", &self.key)
			.field("source", &self.source)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}
