//! Finalize pass
//!
//! Some bindings can only be wired up once every binding is known. They
//! register as [`CreationListener`]s and are notified exactly once by
//! [`Finalizer::finalize`], which collects every problem they report before
//! failing.

use crate::error::{ConfigurationError, Errors};
use std::sync::Arc;

/// Notified once all bindings have been registered.
pub trait CreationListener: Send + Sync {
	/// Completes setup, reporting configuration problems into `errors`.
	fn notify(&self, errors: &mut Errors);
}

/// Runs the finalize pass over registered [`CreationListener`]s.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{CreationListener, Errors, Finalizer};
/// use std::sync::Arc;
///
/// struct Noop;
///
/// impl CreationListener for Noop {
///     fn notify(&self, _: &mut Errors) {}
/// }
///
/// let mut finalizer = Finalizer::new();
/// finalizer.register(Arc::new(Noop));
/// assert!(finalizer.finalize().is_ok());
/// ```
#[derive(Default)]
pub struct Finalizer {
	listeners: Vec<Arc<dyn CreationListener>>,
}

impl Finalizer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, listener: Arc<dyn CreationListener>) {
		self.listeners.push(listener);
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}

	/// Notifies every listener in registration order.
	///
	/// All listeners run even when earlier ones report errors; the collected
	/// messages are returned together.
	pub fn finalize(self) -> Result<(), ConfigurationError> {
		let mut errors = Errors::new();
		for listener in &self.listeners {
			listener.notify(&mut errors);
		}

		tracing::debug!(
			listeners = self.listeners.len(),
			errors = errors.len(),
			"finalized bindings"
		);
		errors.into_result()
	}
}

impl std::fmt::Debug for Finalizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Finalizer")
			.field("listeners", &self.listeners.len())
			.finish()
	}
}
