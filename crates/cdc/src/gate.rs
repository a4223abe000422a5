// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
	arrived: usize,
	opened: bool,
	aborted: bool,
}

/// Start line shared by the workers of a capture.
///
/// Behaves like [`std::sync::Barrier`]: [`StartGate::wait`] blocks until
/// `parties` threads have arrived. Unlike a barrier it can be aborted, which
/// releases every waiting and every future party without opening the gate.
#[derive(Debug)]
pub struct StartGate {
	parties: usize,
	state: Mutex<GateState>,
	condvar: Condvar,
}

impl StartGate {
	pub fn new(parties: usize) -> Self {
		Self {
			parties,
			state: Mutex::new(GateState::default()),
			condvar: Condvar::new(),
		}
	}

	/// Blocks until all parties arrived or the gate was aborted. Returns
	/// `true` when the gate opened.
	pub fn wait(&self) -> bool {
		let mut state = self.state.lock();
		state.arrived += 1;
		if state.arrived >= self.parties && !state.aborted {
			state.opened = true;
			self.condvar.notify_all();
		}

		while !state.opened && !state.aborted {
			self.condvar.wait(&mut state);
		}
		state.opened
	}

	/// Releases all parties without opening. No effect once opened.
	pub fn abort(&self) {
		let mut state = self.state.lock();
		if !state.opened {
			state.aborted = true;
			self.condvar.notify_all();
		}
	}

	/// Parties that reached the gate so far.
	pub fn arrived(&self) -> usize {
		self.state.lock().arrived
	}
}

#[cfg(test)]
pub mod tests {
	use std::{sync::Arc, thread};

	use tidepool_testing::util::wait_for;

	use super::*;

	#[test]
	fn test_opens_when_all_parties_arrived() {
		let gate = Arc::new(StartGate::new(3));
		let handles: Vec<_> = (0..2)
			.map(|_| {
				let gate = Arc::clone(&gate);
				thread::spawn(move || gate.wait())
			})
			.collect();

		wait_for(|| gate.arrived() == 2, "workers did not arrive");
		assert!(gate.wait());
		for handle in handles {
			assert!(handle.join().unwrap());
		}
	}

	#[test]
	fn test_abort_releases_waiting_parties() {
		let gate = Arc::new(StartGate::new(3));
		let waiting = {
			let gate = Arc::clone(&gate);
			thread::spawn(move || gate.wait())
		};

		wait_for(|| gate.arrived() == 1, "worker did not arrive");
		gate.abort();
		assert!(!waiting.join().unwrap());

		// late arrivals are not held either
		assert!(!gate.wait());
	}

	#[test]
	fn test_abort_after_open_is_ignored() {
		let gate = StartGate::new(1);
		assert!(gate.wait());
		gate.abort();
		assert!(gate.wait());
	}
}
