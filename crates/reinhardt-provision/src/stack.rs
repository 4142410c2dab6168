//! Provision listener stacks
//!
//! A [`ProvisionListenerStack`] is the ordered, deduplicated set of listeners
//! attached to one binding. [`ProvisionListenerStack::provision`] drives a
//! single provision through those listeners and into the binding's factory:
//!
//! - the factory callback runs exactly once per provision, whether or not the
//!   listeners call [`ProvisionInvocation::provision`] themselves;
//! - a domain error from the factory reaches the caller unchanged;
//! - an error raised by a listener's own logic is reported as a fault of that
//!   listener, naming it and the binding's key.
//!
//! Listeners that do not continue the invocation are handled in a loop rather
//! than by recursion, so only listeners that actively wrap the rest of the
//! chain add stack frames.

use crate::binding::Registration;
use crate::context::InternalContext;
use crate::error::{ErrorId, ProceedError, ProvisionError, ProvisionResult};
use crate::key::Dependency;
use crate::listener::{ProvisionInvocation, ProvisionListener};
use once_cell::sync::Lazy;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

static EMPTY_STACK: Lazy<Arc<ProvisionListenerStack>> = Lazy::new(|| {
	Arc::new(ProvisionListenerStack {
		registration: None,
		listeners: Box::new([]),
	})
});

/// Immutable chain of listeners bound to one registration.
///
/// # Examples
///
/// ```
/// use reinhardt_provision::{
///     Dependency, InternalContext, Key, ProvisionInvocation, ProvisionListener,
///     ProvisionListenerStack, Registration, Source,
/// };
/// use std::sync::Arc;
///
/// let audit: Arc<dyn ProvisionListener> =
///     Arc::new(|_: &mut dyn ProvisionInvocation| -> anyhow::Result<()> { Ok(()) });
/// let registration = Registration::new(Key::of::<u32>(), Source::declared("AppModule"));
///
/// // The same listener attached twice runs once.
/// let stack = ProvisionListenerStack::new(registration, vec![audit.clone(), audit]);
/// assert_eq!(stack.len(), 1);
///
/// let mut ctx = InternalContext::default();
/// let dependency = Dependency::new(Key::of::<u32>());
/// let value = stack.provision(&mut ctx, &dependency, |_, _| Ok(42u32)).unwrap();
/// assert_eq!(value, 42);
/// ```
pub struct ProvisionListenerStack {
	registration: Option<Registration>,
	listeners: Box<[Arc<dyn ProvisionListener>]>,
}

impl ProvisionListenerStack {
	/// The shared stack with no listeners.
	///
	/// Every call returns the same allocation.
	pub fn empty() -> Arc<Self> {
		Arc::clone(&EMPTY_STACK)
	}

	/// Builds the stack for `registration`.
	///
	/// Duplicate listeners (the same `Arc` allocation) are dropped, keeping
	/// the position of their first occurrence. An empty list yields
	/// [`ProvisionListenerStack::empty`].
	pub fn new(registration: Registration, listeners: Vec<Arc<dyn ProvisionListener>>) -> Arc<Self> {
		if listeners.is_empty() {
			return Self::empty();
		}

		let requested = listeners.len();
		let mut seen = HashSet::with_capacity(requested);
		let listeners: Box<[_]> = listeners
			.into_iter()
			.filter(|listener| seen.insert(Arc::as_ptr(listener) as *const ()))
			.collect();

		tracing::debug!(
			key = %registration.key(),
			listeners = listeners.len(),
			duplicates = requested - listeners.len(),
			"built provision listener stack"
		);

		Arc::new(Self {
			registration: Some(registration),
			listeners,
		})
	}

	pub fn has_listeners(&self) -> bool {
		!self.listeners.is_empty()
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}

	pub fn listeners(&self) -> &[Arc<dyn ProvisionListener>] {
		&self.listeners
	}

	/// The registration this stack observes; `None` for the shared empty stack.
	pub fn registration(&self) -> Option<&Registration> {
		self.registration.as_ref()
	}

	/// Provisions a value through every listener and then `callback`.
	///
	/// `callback` is the binding's construction logic and runs at most once.
	/// With no listeners it is called directly.
	pub fn provision<T, F>(
		&self,
		context: &mut InternalContext,
		dependency: &Dependency,
		callback: F,
	) -> ProvisionResult<T>
	where
		T: Any + Send + Sync,
		F: FnOnce(&mut InternalContext, &Dependency) -> ProvisionResult<T>,
	{
		let registration = match &self.registration {
			Some(registration) if self.has_listeners() => registration,
			_ => return callback(context, dependency),
		};

		let log_faults = context.settings().log_listener_faults;
		let mut invocation = Provision {
			listeners: &self.listeners,
			registration,
			context,
			dependency,
			callback: Some(callback),
			next: 0,
			result: None,
			error_during_provision: None,
			fault: None,
		};
		// The outcome is read back from the invocation state below.
		let _ = invocation.advance();

		if let Some(err) = invocation.error_during_provision {
			return Err(err);
		}
		if let Some(fault) = invocation.fault {
			if log_faults {
				tracing::warn!(
					listener = %fault.listener,
					key = %registration.key(),
					error = %fault.error,
					"provision listener failed"
				);
			}
			return Err(fault.into_provision_error(registration));
		}
		invocation.result.ok_or_else(|| {
			ProvisionError::new(
				ErrorId::Other,
				format!("No value was provisioned for {}", registration.key()),
			)
		})
	}
}

impl fmt::Debug for ProvisionListenerStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProvisionListenerStack")
			.field("registration", &self.registration)
			.field(
				"listeners",
				&self
					.listeners
					.iter()
					.map(|listener| listener.name())
					.collect::<Vec<_>>(),
			)
			.finish()
	}
}

/// Fault raised by a listener's own logic.
struct ListenerFault {
	listener: String,
	error: anyhow::Error,
}

impl ListenerFault {
	fn into_provision_error(self, registration: &Registration) -> ProvisionError {
		let reentered = matches!(
			self.error.downcast_ref::<ProceedError>(),
			Some(ProceedError::AlreadyProvisioned)
		);
		if reentered {
			ProvisionError::already_provisioned(&self.listener, registration.key(), self.error)
		} else {
			ProvisionError::listener_fault(&self.listener, registration.key(), self.error)
		}
	}
}

/// State of one provision moving through a listener stack.
struct Provision<'a, T, F> {
	listeners: &'a [Arc<dyn ProvisionListener>],
	registration: &'a Registration,
	context: &'a mut InternalContext,
	dependency: &'a Dependency,
	callback: Option<F>,
	/// Index of the next stage; `listeners.len()` is the callback.
	next: usize,
	result: Option<T>,
	error_during_provision: Option<ProvisionError>,
	fault: Option<ListenerFault>,
}

impl<T, F> Provision<'_, T, F>
where
	T: Any + Send + Sync,
	F: FnOnce(&mut InternalContext, &Dependency) -> ProvisionResult<T>,
{
	fn advance(&mut self) -> Result<(), ProceedError> {
		let listeners = self.listeners;
		loop {
			let stage = self.next;
			self.next += 1;

			match stage.cmp(&listeners.len()) {
				Ordering::Equal => return self.run_callback(),
				Ordering::Greater => return Err(ProceedError::AlreadyProvisioned),
				Ordering::Less => {
					let listener = &listeners[stage];
					if let Err(error) = listener.on_provision(self) {
						return Err(self.record_fault(listener.as_ref(), error));
					}
					if self.next == stage + 1 {
						// The listener did not continue; do it on its behalf.
						continue;
					}
					return Ok(());
				}
			}
		}
	}

	fn run_callback(&mut self) -> Result<(), ProceedError> {
		let callback = self
			.callback
			.take()
			.ok_or(ProceedError::AlreadyProvisioned)?;
		match callback(self.context, self.dependency) {
			Ok(value) => {
				self.result = Some(value);
				Ok(())
			}
			Err(err) => {
				let signal = ProceedError::Aborted {
					key: self.registration.key().clone(),
					reason: err.to_string(),
				};
				self.error_during_provision = Some(err);
				Err(signal)
			}
		}
	}

	/// Records `error` from `listener` unless it merely carries a failure
	/// already captured further down the chain.
	fn record_fault(&mut self, listener: &dyn ProvisionListener, error: anyhow::Error) -> ProceedError {
		if self.error_during_provision.is_none() && self.fault.is_none() {
			self.fault = Some(ListenerFault {
				listener: listener.name().to_string(),
				error,
			});
		}
		self.pending_failure()
	}

	fn pending_failure(&self) -> ProceedError {
		if let Some(err) = &self.error_during_provision {
			return ProceedError::Aborted {
				key: self.registration.key().clone(),
				reason: err.to_string(),
			};
		}
		if let Some(fault) = &self.fault {
			return ProceedError::ListenerFailed {
				listener: fault.listener.clone(),
			};
		}
		ProceedError::Aborted {
			key: self.registration.key().clone(),
			reason: "no value was provisioned".to_string(),
		}
	}
}

impl<T, F> ProvisionInvocation for Provision<'_, T, F>
where
	T: Any + Send + Sync,
	F: FnOnce(&mut InternalContext, &Dependency) -> ProvisionResult<T>,
{
	fn registration(&self) -> &Registration {
		self.registration
	}

	fn dependency(&self) -> &Dependency {
		self.dependency
	}

	fn provision(&mut self) -> Result<&(dyn Any + Send + Sync), ProceedError> {
		self.advance()?;
		match &self.result {
			Some(value) => Ok(value as &(dyn Any + Send + Sync)),
			None => Err(self.pending_failure()),
		}
	}

	fn result(&self) -> Option<&(dyn Any + Send + Sync)> {
		self.result.as_ref().map(|value| value as &(dyn Any + Send + Sync))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::Key;
	use crate::listener::NamedListener;
	use crate::source::Source;
	use rstest::{fixture, rstest};
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

	type Log = Arc<Mutex<Vec<String>>>;

	/// Records entry and exit around an explicit `provision()` call.
	struct Wrapping {
		label: &'static str,
		log: Log,
	}

	impl ProvisionListener for Wrapping {
		fn name(&self) -> &str {
			self.label
		}

		fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
			self.log.lock().unwrap().push(format!("{}-before", self.label));
			invocation.provision()?;
			self.log.lock().unwrap().push(format!("{}-after", self.label));
			Ok(())
		}
	}

	/// Observes without ever continuing the invocation.
	struct Passive {
		calls: AtomicUsize,
	}

	impl ProvisionListener for Passive {
		fn on_provision(&self, _: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
			self.calls.fetch_add(1, AtomicOrdering::SeqCst);
			Ok(())
		}
	}

	struct Failing;

	impl ProvisionListener for Failing {
		fn name(&self) -> &str {
			"Failing"
		}

		fn on_provision(&self, _: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
			anyhow::bail!("listener exploded")
		}
	}

	struct Twice;

	impl ProvisionListener for Twice {
		fn name(&self) -> &str {
			"Twice"
		}

		fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
			invocation.provision()?;
			invocation.provision()?;
			Ok(())
		}
	}

	#[fixture]
	fn registration() -> Registration {
		Registration::new(Key::of::<u32>(), Source::declared("AppModule"))
	}

	fn dependency() -> Dependency {
		Dependency::new(Key::of::<u32>())
	}

	fn passive() -> Arc<Passive> {
		Arc::new(Passive {
			calls: AtomicUsize::new(0),
		})
	}

	#[rstest]
	fn test_empty_list_yields_shared_stack(registration: Registration) {
		// Act
		let first = ProvisionListenerStack::new(registration.clone(), Vec::new());
		let second = ProvisionListenerStack::new(registration, Vec::new());

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert!(Arc::ptr_eq(&first, &ProvisionListenerStack::empty()));
		assert!(!first.has_listeners());
		assert!(first.registration().is_none());
	}

	#[rstest]
	fn test_duplicates_keep_first_occurrence_order(registration: Registration) {
		// Arrange
		let a: Arc<dyn ProvisionListener> = passive();
		let b: Arc<dyn ProvisionListener> = passive();

		// Act
		let stack = ProvisionListenerStack::new(
			registration,
			vec![a.clone(), a.clone(), b.clone(), a.clone()],
		);

		// Assert
		assert_eq!(stack.len(), 2);
		assert!(Arc::ptr_eq(&stack.listeners()[0], &a));
		assert!(Arc::ptr_eq(&stack.listeners()[1], &b));
	}

	#[rstest]
	fn test_empty_stack_calls_callback_once() {
		// Arrange
		let stack = ProvisionListenerStack::empty();
		let calls = AtomicUsize::new(0);
		let mut ctx = InternalContext::default();

		// Act
		let value = stack
			.provision(&mut ctx, &dependency(), |_, _| {
				calls.fetch_add(1, AtomicOrdering::SeqCst);
				Ok(5u32)
			})
			.unwrap();

		// Assert
		assert_eq!(value, 5);
		assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
	}

	#[rstest]
	fn test_passive_listeners_are_continued_automatically(registration: Registration) {
		// Arrange
		let first = passive();
		let second = passive();
		let third = passive();
		let stack = ProvisionListenerStack::new(
			registration,
			vec![first.clone(), second.clone(), third.clone()],
		);
		let calls = AtomicUsize::new(0);
		let mut ctx = InternalContext::default();

		// Act
		let value = stack
			.provision(&mut ctx, &dependency(), |_, _| {
				calls.fetch_add(1, AtomicOrdering::SeqCst);
				Ok(9u32)
			})
			.unwrap();

		// Assert
		assert_eq!(value, 9);
		assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
		for listener in [&first, &second, &third] {
			assert_eq!(listener.calls.load(AtomicOrdering::SeqCst), 1);
		}
	}

	#[rstest]
	fn test_wrapping_listeners_nest_around_callback(registration: Registration) {
		// Arrange
		let log: Log = Arc::new(Mutex::new(Vec::new()));
		let a = Arc::new(Wrapping {
			label: "A",
			log: log.clone(),
		});
		let b = Arc::new(Wrapping {
			label: "B",
			log: log.clone(),
		});
		let stack = ProvisionListenerStack::new(registration, vec![a, b]);
		let mut ctx = InternalContext::default();

		// Act
		let value = stack
			.provision(&mut ctx, &dependency(), |_, _| {
				log.lock().unwrap().push("callback".to_string());
				Ok(1u32)
			})
			.unwrap();

		// Assert
		assert_eq!(value, 1);
		assert_eq!(
			*log.lock().unwrap(),
			vec!["A-before", "B-before", "callback", "B-after", "A-after"]
		);
	}

	#[rstest]
	fn test_listener_reads_result_after_provision(registration: Registration) {
		// Arrange
		let observed = Arc::new(Mutex::new(None));
		let reader = {
			let observed = observed.clone();
			move |invocation: &mut dyn ProvisionInvocation| -> anyhow::Result<()> {
				assert!(invocation.result().is_none());
				invocation.provision()?;
				*observed.lock().unwrap() = invocation.result_as::<u32>().copied();
				Ok(())
			}
		};
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(reader)]);
		let mut ctx = InternalContext::default();

		// Act
		let value = stack.provision(&mut ctx, &dependency(), |_, _| Ok(33u32)).unwrap();

		// Assert
		assert_eq!(value, 33);
		assert_eq!(*observed.lock().unwrap(), Some(33));
	}

	#[rstest]
	fn test_callback_error_is_returned_unwrapped(registration: Registration) {
		// Arrange
		let log: Log = Arc::new(Mutex::new(Vec::new()));
		let wrapping = Arc::new(Wrapping {
			label: "A",
			log: log.clone(),
		});
		let stack = ProvisionListenerStack::new(registration, vec![wrapping, passive()]);
		let original = ProvisionError::error_in_provider(anyhow::anyhow!("no database"))
			.add_source(Source::declared("DatabaseModule"));
		let cause = original.messages()[0].cause().unwrap().clone();
		let mut ctx = InternalContext::default();

		// Act
		let err = stack
			.provision::<u32, _>(&mut ctx, &dependency(), |_, _| Err(original))
			.unwrap_err();

		// Assert
		assert_eq!(err.id(), ErrorId::ErrorInCustomProvider);
		assert_eq!(err.messages().len(), 1);
		assert!(Arc::ptr_eq(err.messages()[0].cause().unwrap(), &cause));
		assert_eq!(err.sources(), &[Source::declared("DatabaseModule")]);
		// The wrapping listener unwound without reaching its "after" step.
		assert_eq!(*log.lock().unwrap(), vec!["A-before"]);
	}

	#[rstest]
	fn test_listener_fault_names_listener_and_key(registration: Registration) {
		// Arrange
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(Failing)]);
		let calls = AtomicUsize::new(0);
		let mut ctx = InternalContext::default();

		// Act
		let err = stack
			.provision(&mut ctx, &dependency(), |_, _| {
				calls.fetch_add(1, AtomicOrdering::SeqCst);
				Ok(1u32)
			})
			.unwrap_err();

		// Assert
		assert_eq!(err.id(), ErrorId::ErrorNotifyingListener);
		let text = err.messages()[0].text();
		assert!(text.contains("Failing"));
		assert!(text.contains("Key[type=u32]"));
		assert_eq!(
			err.messages()[0].cause().unwrap().to_string(),
			"listener exploded"
		);
		assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
	}

	#[rstest]
	fn test_named_closure_fault_reports_given_name(registration: Registration) {
		// Arrange
		let audit = NamedListener::new("audit", |_: &mut dyn ProvisionInvocation| {
			anyhow::bail!("audit log unavailable")
		});
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(audit)]);
		let mut ctx = InternalContext::default();

		// Act
		let err = stack
			.provision(&mut ctx, &dependency(), |_, _| Ok(1u32))
			.unwrap_err();

		// Assert
		assert_eq!(err.id(), ErrorId::ErrorNotifyingListener);
		let text = err.messages()[0].text();
		assert!(text.contains("audit"));
		assert!(!text.contains("{{closure}}"));
	}

	#[rstest]
	fn test_inner_listener_is_reported_as_culprit(registration: Registration) {
		// Arrange
		let log: Log = Arc::new(Mutex::new(Vec::new()));
		let outer = Arc::new(Wrapping {
			label: "Outer",
			log: log.clone(),
		});
		let stack = ProvisionListenerStack::new(registration, vec![outer, Arc::new(Failing)]);
		let mut ctx = InternalContext::default();

		// Act
		let err = stack
			.provision(&mut ctx, &dependency(), |_, _| Ok(1u32))
			.unwrap_err();

		// Assert
		let text = err.messages()[0].text();
		assert!(text.contains("Failing"));
		assert!(!text.contains("Outer"));
		assert_eq!(
			err.messages()[0].cause().unwrap().to_string(),
			"listener exploded"
		);
	}

	#[rstest]
	fn test_second_provision_is_rejected(registration: Registration) {
		// Arrange
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(Twice)]);
		let calls = AtomicUsize::new(0);
		let mut ctx = InternalContext::default();

		// Act
		let err = stack
			.provision(&mut ctx, &dependency(), |_, _| {
				calls.fetch_add(1, AtomicOrdering::SeqCst);
				Ok(1u32)
			})
			.unwrap_err();

		// Assert
		assert_eq!(err.id(), ErrorId::AlreadyProvisioned);
		assert!(err.messages()[0].text().contains("Twice"));
		assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
	}

	#[rstest]
	fn test_swallowed_reentry_keeps_result(registration: Registration) {
		// Arrange
		let tolerant = |invocation: &mut dyn ProvisionInvocation| -> anyhow::Result<()> {
			invocation.provision()?;
			let again = invocation.provision().map(|_| ());
			assert!(matches!(again, Err(ProceedError::AlreadyProvisioned)));
			Ok(())
		};
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(tolerant)]);
		let mut ctx = InternalContext::default();

		// Act
		let value = stack.provision(&mut ctx, &dependency(), |_, _| Ok(4u32)).unwrap();

		// Assert
		assert_eq!(value, 4);
	}

	#[rstest]
	fn test_listener_sees_registration_and_dependency(registration: Registration) {
		// Arrange
		let expected = registration.clone();
		let checker = move |invocation: &mut dyn ProvisionInvocation| -> anyhow::Result<()> {
			assert_eq!(invocation.registration(), &expected);
			assert_eq!(invocation.dependency().injection_point(), Some("Server::port"));
			Ok(())
		};
		let stack = ProvisionListenerStack::new(registration, vec![Arc::new(checker)]);
		let mut ctx = InternalContext::default();
		let dependency = Dependency::new(Key::of::<u32>()).at("Server::port");

		// Act
		let result = stack.provision(&mut ctx, &dependency, |_, _| Ok(2u32));

		// Assert
		assert!(result.is_ok());
	}

	#[rstest]
	fn test_nested_provision_gets_fresh_state(registration: Registration) {
		// Arrange
		let inner_stack = ProvisionListenerStack::new(
			Registration::new(Key::of::<u64>(), Source::declared("InnerModule")),
			vec![Arc::new(Twice)],
		);
		let outer_stack = ProvisionListenerStack::new(registration, vec![passive()]);
		let mut ctx = InternalContext::default();

		// Act
		let outer = outer_stack.provision(&mut ctx, &dependency(), |ctx, _| {
			let inner = inner_stack.provision(
				ctx,
				&Dependency::new(Key::of::<u64>()),
				|_, _| Ok(10u64),
			);
			assert_eq!(inner.unwrap_err().id(), ErrorId::AlreadyProvisioned);
			Ok(20u32)
		});

		// Assert
		assert_eq!(outer.unwrap(), 20);
	}
}
