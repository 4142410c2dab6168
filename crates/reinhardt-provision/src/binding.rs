//! Bindings and the factories that satisfy them

use crate::context::InternalContext;
use crate::error::{ProvisionError, ProvisionResult};
use crate::key::{Dependency, Key};
use crate::source::Source;
use crate::stack::ProvisionListenerStack;
use std::fmt;
use std::sync::Arc;

/// Key and declaration source of a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
	key: Key,
	source: Source,
}

impl Registration {
	pub fn new(key: Key, source: Source) -> Self {
		Self { key, source }
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn source(&self) -> &Source {
		&self.source
	}
}

impl fmt::Display for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} at {}", self.key, self.source)
	}
}

/// Produces values for one binding.
///
/// `linked` is `true` when the request arrives through another binding that
/// links to this one rather than directly from a caller.
pub trait InternalFactory<T>: Send + Sync {
	fn get(
		&self,
		context: &mut InternalContext,
		dependency: &Dependency,
		linked: bool,
	) -> ProvisionResult<T>;
}

/// A registration together with the factory that satisfies it.
pub struct Binding<T> {
	registration: Registration,
	factory: Arc<dyn InternalFactory<T>>,
}

impl<T> Binding<T> {
	pub fn new(registration: Registration, factory: Arc<dyn InternalFactory<T>>) -> Self {
		Self {
			registration,
			factory,
		}
	}

	pub fn registration(&self) -> &Registration {
		&self.registration
	}

	pub fn key(&self) -> &Key {
		self.registration.key()
	}

	pub fn source(&self) -> &Source {
		self.registration.source()
	}

	pub fn factory(&self) -> &Arc<dyn InternalFactory<T>> {
		&self.factory
	}
}

impl<T> Clone for Binding<T> {
	fn clone(&self) -> Self {
		Self {
			registration: self.registration.clone(),
			factory: Arc::clone(&self.factory),
		}
	}
}

impl<T> fmt::Debug for Binding<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("registration", &self.registration)
			.finish_non_exhaustive()
	}
}

type ProviderFn<T> =
	dyn Fn(&mut InternalContext, &Dependency) -> anyhow::Result<T> + Send + Sync;

/// Factory backed by a user provider function.
///
/// Provider failures become [`ErrorId::ErrorInCustomProvider`](crate::ErrorId)
/// errors attributed to the binding's source. A [`ProvisionError`] returned by
/// the provider (typically from a nested provision) keeps its identity and
/// only gains the source. When listeners are attached, every provision runs
/// through them.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{Dependency, InternalContext, InternalFactory, Key, ProviderFactory, Source};
///
/// let factory = ProviderFactory::new(Source::declared("ConfigModule"), |_, _| Ok(8080u16));
/// let mut ctx = InternalContext::default();
/// let port = factory.get(&mut ctx, &Dependency::new(Key::of::<u16>()), false).unwrap();
/// assert_eq!(port, 8080);
/// ```
pub struct ProviderFactory<T> {
	source: Source,
	provider: Box<ProviderFn<T>>,
	listeners: Arc<ProvisionListenerStack>,
}

impl<T: Send + Sync + 'static> ProviderFactory<T> {
	pub fn new<F>(source: Source, provider: F) -> Self
	where
		F: Fn(&mut InternalContext, &Dependency) -> anyhow::Result<T> + Send + Sync + 'static,
	{
		Self {
			source,
			provider: Box::new(provider),
			listeners: ProvisionListenerStack::empty(),
		}
	}

	/// Attaches the listener stack that observes this factory's provisions.
	pub fn with_listeners(mut self, listeners: Arc<ProvisionListenerStack>) -> Self {
		self.listeners = listeners;
		self
	}

	pub fn source(&self) -> &Source {
		&self.source
	}

	pub fn listeners(&self) -> &Arc<ProvisionListenerStack> {
		&self.listeners
	}

	fn provide(&self, context: &mut InternalContext, dependency: &Dependency) -> ProvisionResult<T> {
		(self.provider)(context, dependency).map_err(|cause| {
			// A nested provision failure propagated with `?` is re-raised as is.
			let err = match cause.downcast::<ProvisionError>() {
				Ok(err) => err,
				Err(cause) => ProvisionError::error_in_provider(cause),
			};
			err.add_source(self.source.clone())
		})
	}
}

impl<T: Send + Sync + 'static> InternalFactory<T> for ProviderFactory<T> {
	fn get(
		&self,
		context: &mut InternalContext,
		dependency: &Dependency,
		_linked: bool,
	) -> ProvisionResult<T> {
		context.enter(dependency, |context| {
			if !self.listeners.has_listeners() {
				return self.provide(context, dependency);
			}
			self.listeners
				.provision(context, dependency, |context, dependency| {
					self.provide(context, dependency)
				})
		})
	}
}

/// Factory returning clones of one prebuilt instance.
#[derive(Debug, Clone)]
pub struct InstanceFactory<T> {
	instance: T,
}

impl<T> InstanceFactory<T> {
	pub fn new(instance: T) -> Self {
		Self { instance }
	}
}

impl<T: Clone + Send + Sync> InternalFactory<T> for InstanceFactory<T> {
	fn get(&self, _: &mut InternalContext, _: &Dependency, _: bool) -> ProvisionResult<T> {
		Ok(self.instance.clone())
	}
}
