// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-collection capture worker.
//!
//! A worker owns the whole pipeline of one collection: it resumes from the
//! stored checkpoint, normalizes events, buffers them per time window, flushes
//! due windows through the shared [`ParquetWriter`] and only then advances the
//! checkpoint. A restart therefore replays whatever was not flushed.

use std::{
	fmt::{self, Display, Formatter},
	sync::Arc,
	thread,
	time::Duration,
};

use tidepool_checkpoint::CheckpointStore;
use tidepool_core::{ChangeEvent, Clock, ResumeToken};
use tidepool_sink::{MIN_FLUSH_INTERVAL, ParquetWriter, SchemaTracker};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
	BatchBuffer, CdcError, CdcResult, NormalizeOptions, ReconnectPolicy, StartGate, WorkerStats,
	normalize::normalize,
	source::{ChangeSource, ChangeStream},
	stats::StatsSnapshot,
};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1200);

/// Collaborators shared by every worker of a capture.
#[derive(Clone)]
pub struct CaptureContext {
	pub source: Arc<dyn ChangeSource>,
	pub checkpoints: Arc<dyn CheckpointStore>,
	pub writer: Arc<ParquetWriter>,
	pub clock: Clock,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
	/// Length of a buffering window.
	pub flush_interval: Duration,
	pub normalize: NormalizeOptions,
	pub reconnect: ReconnectPolicy,
}

impl WorkerConfig {
	pub fn validate(&self) -> CdcResult<()> {
		if self.flush_interval < MIN_FLUSH_INTERVAL {
			return Err(CdcError::Config(format!(
				"flush interval {:?} is shorter than {:?}",
				self.flush_interval, MIN_FLUSH_INTERVAL
			)));
		}
		Ok(())
	}
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			flush_interval: DEFAULT_FLUSH_INTERVAL,
			normalize: NormalizeOptions::default(),
			reconnect: ReconnectPolicy::default(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	Init,
	Subscribing,
	Streaming,
	Flushing,
	Stopped,
	Faulted,
}

impl Display for WorkerState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let name = match self {
			WorkerState::Init => "init",
			WorkerState::Subscribing => "subscribing",
			WorkerState::Streaming => "streaming",
			WorkerState::Flushing => "flushing",
			WorkerState::Stopped => "stopped",
			WorkerState::Faulted => "faulted",
		};
		f.write_str(name)
	}
}

/// Outcome of a finished worker.
#[derive(Debug, Clone)]
pub struct WorkerReport {
	pub collection: String,
	/// Either [`WorkerState::Stopped`] or [`WorkerState::Faulted`].
	pub state: WorkerState,
	pub stats: StatsSnapshot,
	pub error: Option<String>,
	/// Records still buffered when the worker ended; they are replayed on
	/// the next start.
	pub pending: usize,
}

impl WorkerReport {
	pub fn is_faulted(&self) -> bool {
		self.state == WorkerState::Faulted
	}
}

pub struct CollectionWorker {
	collection: String,
	context: CaptureContext,
	config: WorkerConfig,
	state: WorkerState,
	buffer: BatchBuffer,
	schema: SchemaTracker,
	stats: Arc<WorkerStats>,
	/// Token of the last event taken off the stream.
	position: Option<ResumeToken>,
}

impl CollectionWorker {
	pub fn new(collection: impl Into<String>, context: CaptureContext, config: WorkerConfig) -> CdcResult<Self> {
		config.validate()?;
		let now = context.clock.now_millis();
		Ok(Self {
			collection: collection.into(),
			buffer: BatchBuffer::new(config.flush_interval, now),
			context,
			config,
			state: WorkerState::Init,
			schema: SchemaTracker::new(),
			stats: Arc::new(WorkerStats::default()),
			position: None,
		})
	}

	pub fn collection(&self) -> &str {
		&self.collection
	}

	pub fn stats(&self) -> Arc<WorkerStats> {
		Arc::clone(&self.stats)
	}

	/// Subscribes, waits on `gate` and then consumes until the stream ends.
	///
	/// The gate is always reached, also when subscribing fails, so one broken
	/// collection never holds back the others. An aborted gate ends the worker
	/// without consuming anything.
	pub fn run(mut self, gate: &StartGate) -> WorkerReport {
		let subscription = self.subscribe();
		if !gate.wait() {
			debug!(collection = %self.collection, "capture aborted before start");
			return WorkerReport {
				collection: self.collection,
				state: WorkerState::Stopped,
				stats: self.stats.snapshot(),
				error: Some("capture aborted before start".to_string()),
				pending: 0,
			};
		}

		let result = subscription.and_then(|stream| {
			info!(collection = %self.collection, resume_token = ?self.position, "change stream started");
			self.consume(stream)
		});

		let error = match result {
			Ok(()) => {
				self.state = WorkerState::Stopped;
				if self.buffer.is_empty() {
					info!(collection = %self.collection, "change stream closed");
				} else {
					warn!(
						collection = %self.collection,
						pending = self.buffer.len(),
						"change stream closed with unflushed records, they will be replayed on restart"
					);
				}
				None
			}
			Err(err) => {
				self.state = WorkerState::Faulted;
				error!(collection = %self.collection, error = %err, "worker faulted");
				Some(err.to_string())
			}
		};

		WorkerReport {
			collection: self.collection,
			state: self.state,
			stats: self.stats.snapshot(),
			error,
			pending: self.buffer.len(),
		}
	}

	#[instrument(name = "cdc::worker::subscribe", level = "debug", skip(self), fields(collection = %self.collection))]
	fn subscribe(&mut self) -> CdcResult<Box<dyn ChangeStream>> {
		let checkpoint = self.context.checkpoints.fetch(&self.collection)?;
		debug!(checkpoint = ?checkpoint, "loaded checkpoint");
		self.schema = self.context.writer.load_schema(&self.collection)?;

		self.state = WorkerState::Subscribing;
		let stream = self.context.source.subscribe(&self.collection, checkpoint.as_ref())?;
		self.position = checkpoint;
		Ok(stream)
	}

	fn consume(&mut self, mut stream: Box<dyn ChangeStream>) -> CdcResult<()> {
		self.state = WorkerState::Streaming;
		loop {
			match stream.next_event() {
				Ok(Some(event)) => self.process(event),
				Ok(None) => return Ok(()),
				Err(err) => stream = self.reconnect(err)?,
			}
		}
	}

	fn process(&mut self, event: ChangeEvent) {
		self.stats.record_event();
		let token = event.resume_token.clone();

		match normalize(&event, &self.config.normalize) {
			Ok(record) => {
				trace!(
					collection = %self.collection,
					operation = %event.operation,
					id = record.id(),
					token = %token,
					"change detected"
				);
				self.buffer.append(record, token.clone());
			}
			Err(err) => {
				self.stats.record_malformed();
				warn!(collection = %self.collection, error = %err, "skipping malformed change event");
				self.buffer.observe(token.clone());
			}
		}
		self.position = Some(token);

		let now = self.context.clock.now_millis();
		if self.buffer.should_flush(now) {
			self.flush(now);
		}
	}

	/// Closes the current window. Failures never end the worker: a failed
	/// upload keeps the records for the next window, a failed checkpoint
	/// write only widens the replay after a restart.
	fn flush(&mut self, now: u64) {
		self.state = WorkerState::Flushing;
		let batch = self.buffer.drain(now);

		if batch.is_empty() {
			// skipped events can still move the checkpoint
			if let Some(token) = &batch.resume_token {
				self.checkpoint(token);
			}
			self.state = WorkerState::Streaming;
			return;
		}

		let flushed_at = self.context.clock.now_utc();
		match self.context.writer.write_batch(&self.collection, &batch, &mut self.schema, flushed_at) {
			Ok(path) => {
				self.stats.record_flush(batch.len());
				info!(collection = %self.collection, path = %path, records = batch.len(), "window flushed");
				if let Some(token) = &batch.resume_token {
					self.checkpoint(token);
				}
			}
			Err(err) => {
				self.stats.record_flush_failure();
				error!(
					collection = %self.collection,
					records = batch.len(),
					error = %err,
					"flush failed, records kept for the next window"
				);
				self.buffer.restore(batch);
			}
		}
		self.state = WorkerState::Streaming;
	}

	fn checkpoint(&mut self, token: &ResumeToken) {
		match self.context.checkpoints.persist(&self.collection, token) {
			Ok(()) => debug!(collection = %self.collection, token = %token, "checkpoint saved"),
			Err(err) => {
				self.stats.record_checkpoint_failure();
				error!(
					collection = %self.collection,
					token = %token,
					error = %err,
					"failed to save checkpoint, a restart replays from the previous one"
				);
			}
		}
	}

	fn reconnect(&mut self, mut cause: CdcError) -> CdcResult<Box<dyn ChangeStream>> {
		let policy = self.config.reconnect;
		let mut attempt = 0;

		while let Some(delay) = policy.backoff(attempt) {
			attempt += 1;
			warn!(
				collection = %self.collection,
				error = %cause,
				attempt,
				delay = ?delay,
				"change stream failed, resubscribing"
			);
			thread::sleep(delay);
			self.stats.record_reconnect();

			self.state = WorkerState::Subscribing;
			match self.context.source.subscribe(&self.collection, self.position.as_ref()) {
				Ok(stream) => {
					self.state = WorkerState::Streaming;
					return Ok(stream);
				}
				Err(err) => cause = err,
			}
		}

		Err(cause)
	}
}
