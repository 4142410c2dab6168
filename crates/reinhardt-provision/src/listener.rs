//! Provision listener traits
//!
//! A [`ProvisionListener`] observes every provision of the bindings it is
//! attached to. It receives a [`ProvisionInvocation`] handle and may call
//! [`ProvisionInvocation::provision`] to run the rest of the chain, doing work
//! before and after. A listener that never calls `provision` is continued
//! automatically once it returns, so the value is always produced exactly once.
//!
//! # Examples
//!
//! ```
//! use reinhardt_provision::{ProvisionInvocation, ProvisionListener};
//! use std::time::Instant;
//!
//! struct Timing;
//!
//! impl ProvisionListener for Timing {
//!     fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
//!         let started = Instant::now();
//!         invocation.provision()?;
//!         println!("{} took {:?}", invocation.registration().key(), started.elapsed());
//!         Ok(())
//!     }
//! }
//! ```

use crate::binding::Registration;
use crate::error::ProceedError;
use crate::key::Dependency;
use std::any::Any;

/// Observer invoked around the provision of a binding.
///
/// Listeners are compared by `Arc` identity when a chain is built, so the same
/// listener instance attached twice runs once.
pub trait ProvisionListener: Send + Sync {
	/// Name used when reporting a failure of this listener.
	///
	/// Defaults to the type name, which for a closure is only its defining
	/// path followed by `{{closure}}`. Wrap closures in [`NamedListener`] to
	/// give them a readable name.
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}

	/// Called for each provision of an observed binding.
	///
	/// Returning an error reports a fault of this listener: the provision
	/// fails with [`ErrorId::ErrorNotifyingListener`](crate::ErrorId).
	/// Errors returned by [`ProvisionInvocation::provision`] may be
	/// propagated with `?`; the pipeline still reports the original failure.
	fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()>;
}

impl<F> ProvisionListener for F
where
	F: Fn(&mut dyn ProvisionInvocation) -> anyhow::Result<()> + Send + Sync,
{
	fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
		self(invocation)
	}
}

/// A listener function reported under an explicit name.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{NamedListener, ProvisionInvocation, ProvisionListener};
///
/// let audit = NamedListener::new("audit", |invocation: &mut dyn ProvisionInvocation| {
///     invocation.provision()?;
///     Ok(())
/// });
/// assert_eq!(audit.name(), "audit");
/// ```
pub struct NamedListener<F> {
	name: String,
	listener: F,
}

impl<F> NamedListener<F>
where
	F: Fn(&mut dyn ProvisionInvocation) -> anyhow::Result<()> + Send + Sync,
{
	pub fn new(name: impl Into<String>, listener: F) -> Self {
		Self {
			name: name.into(),
			listener,
		}
	}
}

impl<F> ProvisionListener for NamedListener<F>
where
	F: Fn(&mut dyn ProvisionInvocation) -> anyhow::Result<()> + Send + Sync,
{
	fn name(&self) -> &str {
		&self.name
	}

	fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
		(self.listener)(invocation)
	}
}

impl<F> std::fmt::Debug for NamedListener<F> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NamedListener").field("name", &self.name).finish()
	}
}

/// Handle to one in-flight provision, passed to each listener.
pub trait ProvisionInvocation {
	/// The binding being provisioned.
	fn registration(&self) -> &Registration;

	/// The dependency that requested the value.
	fn dependency(&self) -> &Dependency;

	/// Runs the remaining listeners and the binding's factory.
	///
	/// May be called at most once per listener; a second call after the
	/// invocation completed returns [`ProceedError::AlreadyProvisioned`].
	fn provision(&mut self) -> Result<&(dyn Any + Send + Sync), ProceedError>;

	/// The provisioned value, once the factory has produced it.
	fn result(&self) -> Option<&(dyn Any + Send + Sync)>;
}

impl dyn ProvisionInvocation + '_ {
	/// Runs [`provision`](ProvisionInvocation::provision) and downcasts the value.
	///
	/// Returns `Ok(None)` when the value is not a `T`.
	pub fn provision_as<T: Any>(&mut self) -> Result<Option<&T>, ProceedError> {
		Ok(self.provision()?.downcast_ref::<T>())
	}

	/// Downcasts the already provisioned value, if any.
	pub fn result_as<T: Any>(&self) -> Option<&T> {
		self.result()?.downcast_ref::<T>()
	}
}
