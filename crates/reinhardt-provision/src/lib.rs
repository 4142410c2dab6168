//! Provision - Provisioning pipeline for the Reinhardt injector
//!
//! This crate runs every request for a bound value through the provision
//! listeners attached to its binding, and forwards keys exposed from private
//! environments to the bindings that actually produce them.
//!
//! # Features
//!
//! - **Listener stacks**: ordered, deduplicated listeners wrap each provision;
//!   the binding's factory runs exactly once whatever the listeners do
//! - **Error attribution**: provider failures keep their original sources and
//!   gain one entry per forwarding boundary they cross
//! - **Exposed bindings**: keys bound in a private environment can be exposed
//!   to its parent, and are resolved once during the finalize pass
//! - **Settings**: depth limits and fault logging, configurable from TOML or
//!   the environment
//!
//! # Quick Start
//!
//! ```
//! use reinhardt_provision::prelude::*;
//! use std::sync::Arc;
//!
//! let audit: Arc<dyn ProvisionListener> = Arc::new(
//!     |invocation: &mut dyn ProvisionInvocation| -> anyhow::Result<()> {
//!         let key = invocation.registration().key().clone();
//!         invocation.provision()?;
//!         println!("provisioned {}", key);
//!         Ok(())
//!     },
//! );
//!
//! let key = Key::named::<u16>("port");
//! let source = Source::declared("ServerModule");
//! let listeners = ProvisionListenerStack::new(
//!     Registration::new(key.clone(), source.clone()),
//!     vec![audit],
//! );
//!
//! let table = BindingTable::new();
//! table
//!     .bind(Binding::new(
//!         Registration::new(key.clone(), source.clone()),
//!         Arc::new(ProviderFactory::new(source, |_, _| Ok(8080u16)).with_listeners(listeners)),
//!     ))
//!     .unwrap();
//!
//! let mut ctx = InternalContext::default();
//! assert_eq!(table.get_instance::<u16>(&mut ctx, &key).unwrap(), 8080);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │          BindingTable            │
//! │    - Explicit bindings           │
//! │    - Parent fallback             │
//! └────────────────┬─────────────────┘
//!                  │
//!     ┌────────────┴────────────┐
//!     │                         │
//! ┌───▼─────────────┐   ┌───────▼──────────┐
//! │ProviderFactory  │   │ExposedKeyFactory │
//! │ + listener stack│   │ -> private scope │
//! └─────────────────┘   └──────────────────┘
//! ```

pub mod binding;
pub mod context;
pub mod error;
pub mod exposed;
pub mod key;
pub mod lifecycle;
pub mod listener;
pub mod scope;
pub mod settings;
pub mod source;
pub mod stack;

pub use binding::{Binding, InstanceFactory, InternalFactory, ProviderFactory, Registration};
pub use context::InternalContext;
pub use error::{
	ConfigurationError, ErrorId, Errors, Message, ProceedError, ProvisionError, ProvisionResult,
	SourcedErrors,
};
pub use exposed::{ExposedKeyFactory, ExposureState};
pub use key::{Dependency, Key, Qualifier};
pub use lifecycle::{CreationListener, Finalizer};
pub use listener::{NamedListener, ProvisionInvocation, ProvisionListener};
pub use scope::{BindingLookup, BindingTable};
pub use settings::{DEFAULT_MAX_PROVISION_DEPTH, ProvisionSettings, SettingsError};
pub use source::Source;
pub use stack::ProvisionListenerStack;

/// Re-export commonly used types.
pub mod prelude {
	pub use crate::binding::{
		Binding, InstanceFactory, InternalFactory, ProviderFactory, Registration,
	};
	pub use crate::context::InternalContext;
	pub use crate::error::{ConfigurationError, ErrorId, Errors, ProvisionError, ProvisionResult};
	pub use crate::exposed::{ExposedKeyFactory, ExposureState};
	pub use crate::key::{Dependency, Key, Qualifier};
	pub use crate::lifecycle::{CreationListener, Finalizer};
	pub use crate::listener::{NamedListener, ProvisionInvocation, ProvisionListener};
	pub use crate::scope::{BindingLookup, BindingTable};
	pub use crate::settings::ProvisionSettings;
	pub use crate::source::Source;
	pub use crate::stack::ProvisionListenerStack;
}
