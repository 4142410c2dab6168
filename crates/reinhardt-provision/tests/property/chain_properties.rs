//! Property-based tests for provision listener stacks
//!
//! Uses proptest to verify invariants of listener stacks:
//! 1. Deduplication - each listener appears once, in first-occurrence order
//! 2. Exactly once - the provider runs once whatever the listeners do
//! 3. Ordering - wrapping listeners nest around the provider in stack order

use proptest::prelude::*;
use reinhardt_provision::{
	Dependency, InternalContext, Key, ProvisionInvocation, ProvisionListener,
	ProvisionListenerStack, Registration, Source,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Listener that either wraps the rest of the stack or just observes it
struct Probe {
	id: usize,
	wraps: bool,
	log: Arc<Mutex<Vec<String>>>,
}

impl ProvisionListener for Probe {
	fn on_provision(&self, invocation: &mut dyn ProvisionInvocation) -> anyhow::Result<()> {
		self.log.lock().unwrap().push(format!("enter {}", self.id));
		if self.wraps {
			invocation.provision()?;
			self.log.lock().unwrap().push(format!("exit {}", self.id));
		}
		Ok(())
	}
}

fn registration() -> Registration {
	Registration::new(Key::of::<u64>(), Source::declared("PropertyModule"))
}

fn probes(wraps: &[bool], log: &Arc<Mutex<Vec<String>>>) -> Vec<Arc<dyn ProvisionListener>> {
	wraps
		.iter()
		.enumerate()
		.map(|(id, &wraps)| {
			Arc::new(Probe {
				id,
				wraps,
				log: log.clone(),
			}) as Arc<dyn ProvisionListener>
		})
		.collect()
}

// Property 1: Deduplication
// Building a stack from any sequence of picks keeps one entry per distinct
// listener, ordered by first occurrence
#[test]
fn prop_stack_deduplicates_in_first_occurrence_order() {
	proptest!(|(pool_size in 1usize..6, picks in prop::collection::vec(0usize..6, 0..24))| {
		let log = Arc::new(Mutex::new(Vec::new()));
		let pool = probes(&vec![false; pool_size], &log);
		let requested: Vec<_> = picks
			.iter()
			.map(|&pick| pool[pick % pool_size].clone())
			.collect();

		let stack = ProvisionListenerStack::new(registration(), requested);

		let mut expected: Vec<usize> = Vec::new();
		for pick in picks.iter().map(|&pick| pick % pool_size) {
			if !expected.contains(&pick) {
				expected.push(pick);
			}
		}
		prop_assert_eq!(stack.len(), expected.len());
		for (listener, &index) in stack.listeners().iter().zip(&expected) {
			prop_assert!(Arc::ptr_eq(listener, &pool[index]));
		}
		if picks.is_empty() {
			prop_assert!(Arc::ptr_eq(&stack, &ProvisionListenerStack::empty()));
		}
	});
}

// Property 2: Exactly once
// Any mix of wrapping and observing listeners runs each listener once and
// the provider once, returning the provider's value
#[test]
fn prop_provider_runs_exactly_once() {
	proptest!(|(wraps in prop::collection::vec(any::<bool>(), 0..10), value in any::<u64>())| {
		let log = Arc::new(Mutex::new(Vec::new()));
		let stack = ProvisionListenerStack::new(registration(), probes(&wraps, &log));
		let calls = AtomicUsize::new(0);
		let mut ctx = InternalContext::default();

		let result = stack
			.provision(&mut ctx, &Dependency::new(Key::of::<u64>()), |_, _| {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(value)
			})
			.unwrap();

		prop_assert_eq!(result, value);
		prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
		let entered = log
			.lock()
			.unwrap()
			.iter()
			.filter(|event| event.starts_with("enter"))
			.count();
		prop_assert_eq!(entered, wraps.len());
	});
}

// Property 3: Ordering
// Listeners are entered in stack order, and wrapping listeners exit in
// reverse order after every listener has been entered
#[test]
fn prop_wrapping_listeners_nest() {
	proptest!(|(wraps in prop::collection::vec(any::<bool>(), 1..10))| {
		let log = Arc::new(Mutex::new(Vec::new()));
		let stack = ProvisionListenerStack::new(registration(), probes(&wraps, &log));
		let mut ctx = InternalContext::default();

		stack
			.provision(&mut ctx, &Dependency::new(Key::of::<u64>()), |_, _| Ok(0u64))
			.unwrap();

		let mut expected: Vec<String> = (0..wraps.len()).map(|id| format!("enter {}", id)).collect();
		expected.extend(
			wraps
				.iter()
				.enumerate()
				.rev()
				.filter(|(_, wraps)| **wraps)
				.map(|(id, _)| format!("exit {}", id)),
		);
		prop_assert_eq!(&*log.lock().unwrap(), &expected);
	});
}
