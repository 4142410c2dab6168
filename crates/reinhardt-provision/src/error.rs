//! Provisioning and configuration error types.
//!
//! Failures are modeled as data rather than as nested causes: every error is a
//! list of [`Message`]s, and a [`ProvisionError`] additionally carries an
//! append-only trail of [`Source`]s collected as it crosses forwarding
//! boundaries, deepest first.

use crate::key::Key;
use crate::source::Source;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use thiserror::Error;

/// Result type for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Stable identifier for each kind of reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorId {
	/// A user provider returned an error.
	ErrorInCustomProvider,
	/// A provision listener failed while observing a provision.
	ErrorNotifyingListener,
	/// A provision listener continued the same invocation twice.
	AlreadyProvisioned,
	/// A key was exposed from a nested scope that never bound it.
	ExposedButNotBound,
	/// A key was bound twice in the same table.
	BindingAlreadySet,
	/// A binding was registered under a key for a different type.
	BindingTypeMismatch,
	/// No binding exists for the requested key.
	MissingImplementation,
	/// Nested provisioning went deeper than the configured limit.
	ProvisionDepthExceeded,
	/// An exposed binding was provisioned before the finalize pass.
	InjectorNotFinalized,
	Other,
}

impl ErrorId {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ErrorInCustomProvider => "ErrorInCustomProvider",
			Self::ErrorNotifyingListener => "ErrorNotifyingListener",
			Self::AlreadyProvisioned => "AlreadyProvisioned",
			Self::ExposedButNotBound => "ExposedButNotBound",
			Self::BindingAlreadySet => "BindingAlreadySet",
			Self::BindingTypeMismatch => "BindingTypeMismatch",
			Self::MissingImplementation => "MissingImplementation",
			Self::ProvisionDepthExceeded => "ProvisionDepthExceeded",
			Self::InjectorNotFinalized => "InjectorNotFinalized",
			Self::Other => "Other",
		}
	}
}

impl fmt::Display for ErrorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single reported problem.
#[derive(Debug, Clone)]
pub struct Message {
	id: ErrorId,
	text: String,
	sources: Vec<Source>,
	cause: Option<Arc<anyhow::Error>>,
}

impl Message {
	pub fn new(id: ErrorId, text: impl Into<String>) -> Self {
		Self {
			id,
			text: text.into(),
			sources: Vec::new(),
			cause: None,
		}
	}

	/// Attributes the message to `source`. Unknown sources are dropped.
	pub fn with_source(mut self, source: Source) -> Self {
		if !source.is_unknown() {
			self.sources.push(source);
		}
		self
	}

	pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
		self.cause = Some(Arc::new(cause));
		self
	}

	pub fn id(&self) -> ErrorId {
		self.id
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn sources(&self) -> &[Source] {
		&self.sources
	}

	pub fn cause(&self) -> Option<&Arc<anyhow::Error>> {
		self.cause.as_ref()
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.id, self.text)
	}
}

/// Renders numbered messages followed by their sources and the shared trail.
fn render_report(heading: &str, messages: &[Message], trail: &[Source]) -> String {
	let mut out = format!("{}, see the following errors:\n", heading);
	for (index, message) in messages.iter().enumerate() {
		let _ = write!(out, "\n{}) {}\n", index + 1, message);
		for source in message.sources.iter().chain(trail) {
			let _ = writeln!(out, "  at {}", source);
		}
	}
	match messages.len() {
		1 => out.push_str("\n1 error"),
		count => {
			let _ = write!(out, "\n{} errors", count);
		}
	}
	out
}

/// Error raised while provisioning a value.
///
/// Re-raising a `ProvisionError` never wraps it: boundaries only append to
/// the attribution trail with [`ProvisionError::add_source`].
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{ErrorId, ProvisionError, Source};
///
/// let err = ProvisionError::new(ErrorId::Other, "database unavailable")
///     .add_source(Source::declared("DatabaseModule"))
///     .add_source(Source::declared("AppModule"));
///
/// assert_eq!(err.id(), ErrorId::Other);
/// assert_eq!(
///     err.sources(),
///     &[Source::declared("DatabaseModule"), Source::declared("AppModule")]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionError {
	messages: Vec<Message>,
	sources: Vec<Source>,
}

impl ProvisionError {
	pub fn new(id: ErrorId, text: impl Into<String>) -> Self {
		Self::from_message(Message::new(id, text))
	}

	pub fn from_message(message: Message) -> Self {
		Self {
			messages: vec![message],
			sources: Vec::new(),
		}
	}

	/// Wraps a failure returned by user provider code.
	pub fn error_in_provider(cause: anyhow::Error) -> Self {
		let text = format!("Error in custom provider, {}", cause);
		Self::from_message(Message::new(ErrorId::ErrorInCustomProvider, text).with_cause(cause))
	}

	/// Wraps a failure raised by a provision listener's own logic.
	pub fn listener_fault(listener: &str, key: &Key, cause: anyhow::Error) -> Self {
		let text = format!(
			"Error notifying provision listener {} of {}.\n Reason: {}",
			listener, key, cause
		);
		Self::from_message(Message::new(ErrorId::ErrorNotifyingListener, text).with_cause(cause))
	}

	/// Reports a listener that continued the same invocation twice.
	pub fn already_provisioned(listener: &str, key: &Key, cause: anyhow::Error) -> Self {
		let text = format!(
			"Provision listener {} continued the provision of {} after it had already completed",
			listener, key
		);
		Self::from_message(Message::new(ErrorId::AlreadyProvisioned, text).with_cause(cause))
	}

	/// Appends `source` to the attribution trail.
	///
	/// Unknown sources are ignored, and a source equal to the most recently
	/// appended one is not repeated.
	pub fn add_source(mut self, source: Source) -> Self {
		if source.is_unknown() || self.sources.last() == Some(&source) {
			return self;
		}
		self.sources.push(source);
		self
	}

	/// Identifier of the first reported message.
	pub fn id(&self) -> ErrorId {
		self.messages
			.first()
			.map(Message::id)
			.unwrap_or(ErrorId::Other)
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	/// Attribution trail, deepest source first.
	pub fn sources(&self) -> &[Source] {
		&self.sources
	}
}

impl fmt::Display for ProvisionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&render_report(
			"Unable to provision",
			&self.messages,
			&self.sources,
		))
	}
}

impl std::error::Error for ProvisionError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		let cause = self.messages.iter().find_map(Message::cause)?;
		let cause: &(dyn std::error::Error + 'static) = &***cause;
		Some(cause)
	}
}

impl From<ConfigurationError> for ProvisionError {
	fn from(err: ConfigurationError) -> Self {
		Self {
			messages: err.messages,
			sources: Vec::new(),
		}
	}
}

/// Problems found while finalizing bindings.
#[derive(Debug, Clone, Error)]
#[error("{}", render_report("Unable to create injector", .messages, &[]))]
pub struct ConfigurationError {
	messages: Vec<Message>,
}

impl ConfigurationError {
	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn id(&self) -> ErrorId {
		self.messages
			.first()
			.map(Message::id)
			.unwrap_or(ErrorId::Other)
	}
}

impl From<Message> for ConfigurationError {
	fn from(message: Message) -> Self {
		Self {
			messages: vec![message],
		}
	}
}

/// Sink collecting configuration problems during the finalize pass.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{ErrorId, Errors, Key, Source};
///
/// let mut errors = Errors::new();
/// errors
///     .with_source(Source::declared("PrivateModule"))
///     .exposed_but_not_bound(&Key::of::<u32>());
///
/// let err = errors.into_result().unwrap_err();
/// assert_eq!(err.id(), ErrorId::ExposedButNotBound);
/// ```
#[derive(Debug, Default)]
pub struct Errors {
	messages: Vec<Message>,
}

impl Errors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a view that attributes every message it records to `source`.
	pub fn with_source(&mut self, source: Source) -> SourcedErrors<'_> {
		SourcedErrors {
			errors: self,
			source,
		}
	}

	pub fn add_message(&mut self, message: Message) {
		self.messages.push(message);
	}

	pub fn has_errors(&self) -> bool {
		!self.messages.is_empty()
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn into_result(self) -> Result<(), ConfigurationError> {
		if self.messages.is_empty() {
			Ok(())
		} else {
			Err(ConfigurationError {
				messages: self.messages,
			})
		}
	}
}

/// [`Errors`] view bound to one source.
///
/// Each reporting method records the message and returns a copy of it so the
/// caller can keep it for later reuse.
pub struct SourcedErrors<'a> {
	errors: &'a mut Errors,
	source: Source,
}

impl SourcedErrors<'_> {
	pub fn add_message(self, id: ErrorId, text: impl Into<String>) -> Message {
		let message = Message::new(id, text).with_source(self.source);
		self.errors.add_message(message.clone());
		message
	}

	pub fn exposed_but_not_bound(self, key: &Key) -> Message {
		let text = format!("Could not expose() {}, it must be explicitly bound.", key);
		self.add_message(ErrorId::ExposedButNotBound, text)
	}

	pub fn binding_already_set(self, key: &Key) -> Message {
		let text = format!("A binding to {} was already configured.", key);
		self.add_message(ErrorId::BindingAlreadySet, text)
	}

	pub fn binding_type_mismatch(self, key: &Key, provided: &str) -> Message {
		let text = format!(
			"A binding to {} was configured with a factory producing {}.",
			key, provided
		);
		self.add_message(ErrorId::BindingTypeMismatch, text)
	}
}

/// Returned to a listener when continuing an invocation fails.
///
/// These are signals for unwinding listener frames; the provisioning outcome
/// reported to the original caller is decided by the pipeline itself.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ProceedError {
	/// The terminal provision failed with a domain error.
	#[error("provisioning {key} failed: {reason}")]
	Aborted {
		/// Key being provisioned.
		key: Key,
		/// Rendered domain error.
		reason: String,
	},

	/// A downstream listener failed.
	#[error("provision listener {listener} failed")]
	ListenerFailed {
		/// Name of the failing listener.
		listener: String,
	},

	/// The invocation has already completed.
	#[error("already provisioned in this listener")]
	AlreadyProvisioned,
}
