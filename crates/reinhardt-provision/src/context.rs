//! Per-request provisioning context

use crate::error::{ErrorId, ProvisionError, ProvisionResult};
use crate::key::Dependency;
use crate::settings::ProvisionSettings;
use std::sync::Arc;

/// Context threaded through every factory during one top-level request.
///
/// The context records which dependencies are currently being provisioned so
/// that nested provisions (a provider asking for another key) can be traced
/// and bounded. It is owned by a single thread of control and passed by
/// `&mut`; it is never shared between concurrent requests.
#[derive(Debug)]
pub struct InternalContext {
	settings: Arc<ProvisionSettings>,
	dependency_stack: Vec<Dependency>,
}

impl InternalContext {
	/// Creates a new context with the given settings.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_provision::{InternalContext, ProvisionSettings};
	/// use std::sync::Arc;
	///
	/// let settings = Arc::new(ProvisionSettings::default());
	/// let ctx = InternalContext::new(settings);
	/// assert_eq!(ctx.depth(), 0);
	/// ```
	pub fn new(settings: Arc<ProvisionSettings>) -> Self {
		Self {
			settings,
			dependency_stack: Vec::new(),
		}
	}

	pub fn settings(&self) -> &ProvisionSettings {
		&self.settings
	}

	/// Number of provisions currently in progress on this context.
	pub fn depth(&self) -> usize {
		self.dependency_stack.len()
	}

	/// Dependencies being provisioned, outermost first.
	pub fn dependency_chain(&self) -> &[Dependency] {
		&self.dependency_stack
	}

	/// The innermost dependency being provisioned.
	pub fn current_dependency(&self) -> Option<&Dependency> {
		self.dependency_stack.last()
	}

	/// Runs `f` with `dependency` pushed onto the dependency chain.
	///
	/// The chain is restored when `f` returns, whether it succeeded or not.
	/// Entering beyond `max_provision_depth` fails without running `f`.
	pub fn enter<R>(
		&mut self,
		dependency: &Dependency,
		f: impl FnOnce(&mut Self) -> ProvisionResult<R>,
	) -> ProvisionResult<R> {
		let limit = self.settings.max_provision_depth;
		if self.dependency_stack.len() >= limit {
			return Err(ProvisionError::new(
				ErrorId::ProvisionDepthExceeded,
				format!(
					"Provisioning {} exceeded the maximum depth of {}.\n Path: {}",
					dependency,
					limit,
					self.render_chain()
				),
			));
		}

		self.dependency_stack.push(dependency.clone());
		let result = f(self);
		self.dependency_stack.pop();
		result
	}

	fn render_chain(&self) -> String {
		self.dependency_stack
			.iter()
			.map(|dependency| dependency.key().type_name())
			.collect::<Vec<_>>()
			.join(" -> ")
	}
}

impl Default for InternalContext {
	fn default() -> Self {
		Self::new(Arc::new(ProvisionSettings::default()))
	}
}
