// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Capture orchestration.
//!
//! Discovers the collections of a source, starts one [`CollectionWorker`]
//! thread per collection that is not deny-listed and releases them together
//! once every worker has subscribed.

use std::{
	collections::BTreeSet,
	io,
	sync::Arc,
	thread::{self, JoinHandle},
};

use tracing::{error, info, instrument, warn};

use crate::{
	CaptureContext, CdcError, CdcResult, CollectionWorker, StartGate, WorkerConfig, WorkerReport, WorkerState,
	WorkerStats,
};

/// Collection that holds the checkpoints of the source-side deployment.
pub const DEFAULT_DENY_LIST: &[&str] = &["resume_tokens"];

#[derive(Debug, Clone)]
pub struct CaptureOptions {
	/// Collections that are never captured.
	pub deny_list: BTreeSet<String>,
	pub worker: WorkerConfig,
}

impl Default for CaptureOptions {
	fn default() -> Self {
		Self {
			deny_list: DEFAULT_DENY_LIST.iter().map(|name| name.to_string()).collect(),
			worker: WorkerConfig::default(),
		}
	}
}

pub struct Capture;

impl Capture {
	/// Starts a worker for every eligible collection.
	///
	/// Returns once all workers have subscribed (or failed to), which is the
	/// moment they start consuming.
	#[instrument(name = "cdc::capture::start", level = "info", skip_all)]
	pub fn start(context: CaptureContext, options: CaptureOptions) -> CdcResult<CaptureHandle> {
		let collections: Vec<String> = context
			.source
			.collections()?
			.into_iter()
			.filter(|collection| !options.deny_list.contains(collection))
			.collect();
		info!(collections = ?collections, "starting capture");

		options.worker.validate()?;
		let workers = collections
			.into_iter()
			.map(|collection| CollectionWorker::new(collection, context.clone(), options.worker.clone()))
			.collect::<CdcResult<Vec<_>>>()?;

		launch(workers, spawn_worker)
	}
}

fn spawn_worker(worker: CollectionWorker, gate: Arc<StartGate>) -> io::Result<JoinHandle<WorkerReport>> {
	thread::Builder::new().name(format!("cdc-{}", worker.collection())).spawn(move || worker.run(&gate))
}

/// Spawns every worker and opens the gate. When a spawn fails the gate is
/// aborted and the workers already running are joined before returning.
fn launch<S>(workers: Vec<CollectionWorker>, mut spawn: S) -> CdcResult<CaptureHandle>
where
	S: FnMut(CollectionWorker, Arc<StartGate>) -> io::Result<JoinHandle<WorkerReport>>,
{
	let gate = Arc::new(StartGate::new(workers.len() + 1));
	let mut running = Vec::with_capacity(workers.len());

	for worker in workers {
		let collection = worker.collection().to_string();
		let stats = worker.stats();

		match spawn(worker, Arc::clone(&gate)) {
			Ok(handle) => running.push(RunningWorker {
				collection,
				stats,
				handle,
			}),
			Err(err) => {
				error!(collection = %collection, error = %err, "failed to spawn worker, aborting capture");
				gate.abort();
				for worker in running {
					if worker.handle.join().is_err() {
						warn!(collection = %worker.collection, "worker panicked while aborting");
					}
				}
				return Err(CdcError::Spawn {
					collection,
					reason: err.to_string(),
				});
			}
		}
	}

	gate.wait();
	info!(workers = running.len(), "all change streams opened");

	Ok(CaptureHandle {
		workers: running,
	})
}

struct RunningWorker {
	collection: String,
	stats: Arc<WorkerStats>,
	handle: JoinHandle<WorkerReport>,
}

/// Running capture; [`CaptureHandle::join`] waits for all workers.
pub struct CaptureHandle {
	workers: Vec<RunningWorker>,
}

impl CaptureHandle {
	pub fn collections(&self) -> Vec<&str> {
		self.workers.iter().map(|worker| worker.collection.as_str()).collect()
	}

	pub fn stats(&self) -> Vec<(String, Arc<WorkerStats>)> {
		self.workers.iter().map(|worker| (worker.collection.clone(), Arc::clone(&worker.stats))).collect()
	}

	pub fn is_finished(&self) -> bool {
		self.workers.iter().all(|worker| worker.handle.is_finished())
	}

	/// Waits for every worker to end. A panicked worker counts as faulted.
	pub fn join(self) -> Vec<WorkerReport> {
		self.workers
			.into_iter()
			.map(|worker| {
				worker.handle.join().unwrap_or_else(|_| {
					error!(collection = %worker.collection, "worker panicked");
					WorkerReport {
						collection: worker.collection,
						state: WorkerState::Faulted,
						stats: worker.stats.snapshot(),
						error: Some("worker panicked".to_string()),
						pending: 0,
					}
				})
			})
			.collect()
	}
}
