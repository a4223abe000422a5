// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Periodic resource and throughput reporting.

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use sysinfo::System;
use tracing::{Dispatch, debug, dispatcher, info};

use crate::WorkerStats;

pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Background thread logging host CPU/memory usage and per-collection
/// counters every `interval`.
pub struct TelemetryReporter {
	stop: Sender<()>,
	handle: Option<JoinHandle<()>>,
}

impl TelemetryReporter {
	/// Starts the reporter. It logs through the subscriber that is current on
	/// the calling thread.
	pub fn spawn(interval: Duration, workers: Vec<(String, Arc<WorkerStats>)>) -> Self {
		let (stop, stopped) = bounded::<()>(1);
		let dispatch = dispatcher::get_default(Dispatch::clone);

		let handle = thread::Builder::new()
			.name("telemetry".to_string())
			.spawn(move || {
				dispatcher::with_default(&dispatch, || {
					debug!(interval = ?interval, "telemetry reporter started");
					let mut system = System::new();
					system.refresh_cpu_usage();

					loop {
						match stopped.recv_timeout(interval) {
							Err(RecvTimeoutError::Timeout) => report(&mut system, &workers),
							Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
						}
					}
					debug!("telemetry reporter stopped");
				})
			})
			.expect("Failed to spawn telemetry reporter");

		Self {
			stop,
			handle: Some(handle),
		}
	}

	pub fn shutdown(mut self) {
		self.stop_and_join();
	}

	fn stop_and_join(&mut self) {
		let _ = self.stop.try_send(());
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

impl Drop for TelemetryReporter {
	fn drop(&mut self) {
		self.stop_and_join();
	}
}

fn report(system: &mut System, workers: &[(String, Arc<WorkerStats>)]) {
	system.refresh_cpu_usage();
	system.refresh_memory();

	let total = system.total_memory();
	let used = system.used_memory();
	let memory_percent = if total == 0 {
		0.0
	} else {
		used as f64 * 100.0 / total as f64
	};

	info!(
		cpu_percent = system.global_cpu_usage(),
		memory_used = used,
		memory_total = total,
		memory_percent,
		"host usage"
	);

	for (collection, stats) in workers {
		let snapshot = stats.snapshot();
		info!(
			collection = %collection,
			events = snapshot.events,
			malformed = snapshot.malformed,
			records_flushed = snapshot.records_flushed,
			flushes = snapshot.flushes,
			flush_failures = snapshot.flush_failures,
			checkpoint_failures = snapshot.checkpoint_failures,
			reconnects = snapshot.reconnects,
			"capture progress"
		);
	}
}

#[cfg(test)]
pub mod tests {
	use std::{
		io::{self, Write},
		time::Instant,
	};

	use parking_lot::Mutex;
	use tidepool_testing::util::wait_for;

	use super::*;

	#[test]
	fn test_shutdown_interrupts_wait() {
		let reporter = TelemetryReporter::spawn(Duration::from_secs(3600), vec![]);
		let start = Instant::now();
		reporter.shutdown();
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[derive(Clone, Default)]
	struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

	impl CapturedLogs {
		fn text(&self) -> String {
			String::from_utf8_lossy(&self.0.lock()).into_owned()
		}
	}

	impl Write for CapturedLogs {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn test_reports_while_running() {
		let logs = CapturedLogs::default();
		let writer = logs.clone();
		let subscriber = tracing_subscriber::fmt().with_ansi(false).with_writer(move || writer.clone()).finish();

		let stats = Arc::new(WorkerStats::default());
		stats.record_event();
		stats.record_event();

		tracing::subscriber::with_default(subscriber, || {
			let reporter = TelemetryReporter::spawn(Duration::from_millis(5), vec![("Orders".to_string(), stats)]);
			wait_for(|| logs.text().contains("capture progress"), "no progress was reported");
			reporter.shutdown();
		});

		let text = logs.text();
		assert!(text.contains("host usage"));
		assert!(text.contains("collection=Orders"));
		assert!(text.contains("events=2"));
	}
}
