//! # Reinhardt Inject
//!
//! Provisioning pipeline for the Reinhardt injector.
//!
//! This facade re-exports [`reinhardt_provision`], which routes every request
//! for a bound value through the provision listeners attached to its binding
//! and forwards keys exposed from private environments to the bindings that
//! produce them.
//!
//! ## Quick Example
//!
//! ```
//! use reinhardt_inject::prelude::*;
//! use std::sync::Arc;
//!
//! let parent = BindingTable::new();
//! let private = BindingTable::child(&parent);
//! private
//!     .bind(Binding::new(
//!         Registration::new(Key::of::<u32>(), Source::declared("WorkerModule")),
//!         Arc::new(InstanceFactory::new(4u32)),
//!     ))
//!     .unwrap();
//!
//! // Expose the private binding to the parent table.
//! let exposed = Arc::new(ExposedKeyFactory::<u32>::new(
//!     Key::of::<u32>(),
//!     Source::declared("WorkerModule.expose"),
//!     private.clone(),
//! ));
//! parent
//!     .bind(Binding::new(
//!         Registration::new(Key::of::<u32>(), Source::declared("WorkerModule.expose")),
//!         exposed.clone(),
//!     ))
//!     .unwrap();
//!
//! let mut finalizer = Finalizer::new();
//! finalizer.register(exposed);
//! finalizer.finalize().unwrap();
//!
//! let mut ctx = InternalContext::default();
//! assert_eq!(parent.get_instance::<u32>(&mut ctx, &Key::of::<u32>()).unwrap(), 4);
//! ```

pub use reinhardt_provision::{
	Binding, BindingLookup, BindingTable, ConfigurationError, CreationListener,
	DEFAULT_MAX_PROVISION_DEPTH, Dependency, ErrorId, Errors, ExposedKeyFactory, ExposureState,
	Finalizer, InstanceFactory, InternalContext, InternalFactory, Key, Message, NamedListener,
	ProceedError, ProviderFactory, ProvisionError, ProvisionInvocation, ProvisionListener,
	ProvisionListenerStack, ProvisionResult, ProvisionSettings, Qualifier, Registration,
	SettingsError, Source, SourcedErrors,
};

/// Provisioning modules, re-exported by path.
pub mod provision {
	pub use reinhardt_provision::{
		binding, context, error, exposed, key, lifecycle, listener, scope, settings, source, stack,
	};
}

/// Re-export commonly used types.
pub mod prelude {
	pub use reinhardt_provision::prelude::*;
}
