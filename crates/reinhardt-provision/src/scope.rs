//! Binding scopes

use crate::binding::Binding;
use crate::context::InternalContext;
use crate::error::{ConfigurationError, Errors, ErrorId, ProvisionError, ProvisionResult};
use crate::key::{Dependency, Key};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Read access to the explicit bindings of a scope.
///
/// Bindings are stored type-erased; [`explicit_binding`](Self::explicit_binding)
/// recovers the typed [`Binding`].
pub trait BindingLookup: Send + Sync {
	/// Returns the binding registered for `key`, as stored.
	fn lookup_erased(&self, key: &Key) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl dyn BindingLookup + '_ {
	/// Typed lookup of the binding registered for `key`.
	///
	/// Returns `None` when nothing is bound or the stored binding does not
	/// produce a `T`.
	pub fn explicit_binding<T: 'static>(&self, key: &Key) -> Option<Binding<T>> {
		self.lookup_erased(key)?.downcast_ref::<Binding<T>>().cloned()
	}
}

/// Table of explicit bindings, optionally backed by a parent table.
///
/// Lookups that miss fall through to the parent. A child table models a
/// private environment whose bindings are hidden from the parent unless
/// exposed. The parent is held weakly, since exposed bindings in the parent
/// refer back to the child.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{
///     Binding, BindingTable, InstanceFactory, InternalContext, Key, Registration, Source,
/// };
/// use std::sync::Arc;
///
/// let table = BindingTable::new();
/// let key = Key::named::<u16>("port");
/// table
///     .bind(Binding::new(
///         Registration::new(key.clone(), Source::declared("ServerModule")),
///         Arc::new(InstanceFactory::new(8080u16)),
///     ))
///     .unwrap();
///
/// let mut ctx = InternalContext::default();
/// assert_eq!(table.get_instance::<u16>(&mut ctx, &key).unwrap(), 8080);
/// ```
#[derive(Default)]
pub struct BindingTable {
	bindings: RwLock<HashMap<Key, Arc<dyn Any + Send + Sync>>>,
	parent: Option<Weak<BindingTable>>,
}

impl BindingTable {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Creates a table whose misses fall through to `parent`.
	pub fn child(parent: &Arc<Self>) -> Arc<Self> {
		Arc::new(Self {
			bindings: RwLock::new(HashMap::new()),
			parent: Some(Arc::downgrade(parent)),
		})
	}

	pub fn parent(&self) -> Option<Arc<BindingTable>> {
		self.parent.as_ref()?.upgrade()
	}

	/// Registers `binding` in this table.
	///
	/// Fails with [`ErrorId::BindingTypeMismatch`] if the key names a type
	/// other than `T`, and with [`ErrorId::BindingAlreadySet`] if this table
	/// already holds a binding for the same key. Bindings in the parent are
	/// not considered.
	pub fn bind<T: 'static>(&self, binding: Binding<T>) -> Result<(), ConfigurationError> {
		if !binding.key().is::<T>() {
			let mut errors = Errors::new();
			errors
				.with_source(binding.source().clone())
				.binding_type_mismatch(binding.key(), std::any::type_name::<T>());
			return errors.into_result();
		}

		let mut bindings = self.bindings.write();
		if bindings.contains_key(binding.key()) {
			let mut errors = Errors::new();
			errors
				.with_source(binding.source().clone())
				.binding_already_set(binding.key());
			return errors.into_result();
		}

		tracing::debug!(key = %binding.key(), source = %binding.source(), "bound");
		bindings.insert(binding.key().clone(), Arc::new(binding));
		Ok(())
	}

	/// Whether `key` is bound in this table, ignoring the parent.
	pub fn contains(&self, key: &Key) -> bool {
		self.bindings.read().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.bindings.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.read().is_empty()
	}

	/// Typed lookup through this table and its ancestors.
	pub fn explicit_binding<T: 'static>(&self, key: &Key) -> Option<Binding<T>> {
		(self as &dyn BindingLookup).explicit_binding(key)
	}

	/// Provisions the value bound to `key`.
	pub fn get_instance<T: 'static>(
		&self,
		context: &mut InternalContext,
		key: &Key,
	) -> ProvisionResult<T> {
		let binding = self.explicit_binding::<T>(key).ok_or_else(|| {
			ProvisionError::new(
				ErrorId::MissingImplementation,
				format!("No implementation for {} was bound.", key),
			)
		})?;
		binding
			.factory()
			.get(context, &Dependency::new(key.clone()), false)
	}
}

impl BindingLookup for BindingTable {
	fn lookup_erased(&self, key: &Key) -> Option<Arc<dyn Any + Send + Sync>> {
		if let Some(binding) = self.bindings.read().get(key) {
			return Some(Arc::clone(binding));
		}
		self.parent()?.lookup_erased(key)
	}
}

impl std::fmt::Debug for BindingTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindingTable")
			.field("keys", &self.bindings.read().keys().collect::<Vec<_>>())
			.field("has_parent", &self.parent.is_some())
			.finish()
	}
}
