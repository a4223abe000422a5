// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use arrow_schema::DataType;
use serde_json::json;
use tidepool_cdc::{Capture, CaptureContext, CaptureOptions, MemorySource, WorkerState};
use tidepool_checkpoint::{CheckpointBackend, CheckpointStore, MemoryCheckpointStore, SqliteConfig};
use tidepool_core::MockClock;
use tidepool_sink::{MemorySink, NullPolicy, ObjectSink, ParquetWriter};
use tidepool_testing::{
	checkpoint::FlakyCheckpointStore,
	columnar::{read_batches, utf8_column},
	sink::FlakySink,
	tempdir::temp_dir,
	util::wait_for,
};

const WINDOW: Duration = Duration::from_secs(1200);

fn context(
	source: &MemorySource,
	checkpoints: Arc<dyn CheckpointStore>,
	sink: Arc<dyn ObjectSink>,
	clock: &MockClock,
) -> CaptureContext {
	CaptureContext {
		source: Arc::new(source.clone()),
		checkpoints,
		writer: Arc::new(ParquetWriter::new(sink, NullPolicy::Nullable)),
		clock: clock.clock(),
	}
}

fn ids(sink: &FlakySink) -> Vec<Vec<String>> {
	sink.files()
		.iter()
		.map(|key| {
			utf8_column(sink.memory().get(key).unwrap(), "_id").into_iter().map(Option::unwrap_or_default).collect()
		})
		.collect()
}

#[test]
fn test_crash_after_flush_before_checkpoint_replays_window() {
	let source = MemorySource::with_collections(["Orders"]);
	let checkpoints = FlakyCheckpointStore::new(MemoryCheckpointStore::new());
	let sink = FlakySink::new();
	let clock = MockClock::new(1_700_000_000_000);

	// first run: one clean window, then a window whose checkpoint is lost
	let handle = Capture::start(
		context(&source, Arc::new(checkpoints.clone()), Arc::new(sink.clone()), &clock),
		CaptureOptions::default(),
	)
	.unwrap();
	let (_, stats) = handle.stats().remove(0);

	source.insert("Orders", json!({"_id": "a1"}));
	source.insert("Orders", json!({"_id": "a2"}));
	wait_for(|| stats.snapshot().events == 2, "first run did not consume");
	clock.advance(WINDOW);
	let a3 = source.insert("Orders", json!({"_id": "a3"}));
	wait_for(|| stats.snapshot().flushes == 1, "first window not flushed");
	assert_eq!(checkpoints.fetch("Orders").unwrap(), Some(a3.clone()));

	checkpoints.fail_persist(true);
	source.insert("Orders", json!({"_id": "a4"}));
	wait_for(|| stats.snapshot().events == 4, "second window not consumed");
	clock.advance(WINDOW);
	source.insert("Orders", json!({"_id": "a5"}));
	wait_for(|| stats.snapshot().checkpoint_failures == 1, "checkpoint write did not fail");
	assert_eq!(checkpoints.fetch("Orders").unwrap(), Some(a3));

	source.inject_fault("Orders", "process killed");
	assert!(handle.join()[0].is_faulted());
	checkpoints.fail_persist(false);

	// second run resumes after a3 and replays a4, a5
	let handle = Capture::start(
		context(&source, Arc::new(checkpoints.clone()), Arc::new(sink.clone()), &clock),
		CaptureOptions::default(),
	)
	.unwrap();
	let (_, stats) = handle.stats().remove(0);
	wait_for(|| stats.snapshot().events == 2, "second run did not replay");

	clock.advance(WINDOW);
	let a6 = source.insert("Orders", json!({"_id": "a6"}));
	wait_for(|| stats.snapshot().flushes == 1, "replayed window not flushed");
	assert_eq!(checkpoints.fetch("Orders").unwrap(), Some(a6));

	source.close("Orders");
	assert_eq!(handle.join()[0].state, WorkerState::Stopped);

	let files = ids(&sink);
	assert_eq!(files, vec![vec!["a1", "a2", "a3"], vec!["a4", "a5"], vec!["a4", "a5", "a6"]]);

	let seen: BTreeSet<&str> = files.iter().flatten().map(String::as_str).collect();
	assert_eq!(seen.len(), 6);
}

#[test]
fn test_restart_resumes_from_sqlite_checkpoint() {
	temp_dir(|dir| {
		let source = MemorySource::with_collections(["Orders"]);
		let sink = Arc::new(MemorySink::new());
		let clock = MockClock::new(1_700_000_000_000);

		let checkpoints = Arc::new(CheckpointBackend::sqlite(SqliteConfig::new(dir)).unwrap());
		let handle = Capture::start(context(&source, checkpoints, sink.clone(), &clock), CaptureOptions::default())
			.unwrap();
		let (_, stats) = handle.stats().remove(0);

		source.insert("Orders", json!({"_id": "a1"}));
		wait_for(|| stats.snapshot().events == 1, "insert not consumed");
		clock.advance(WINDOW);
		let a2 = source.insert("Orders", json!({"_id": "a2"}));
		wait_for(|| stats.snapshot().flushes == 1, "window not flushed");
		source.insert("Orders", json!({"_id": "a3"}));
		source.close("Orders");

		let report = handle.join().remove(0);
		assert_eq!(report.pending, 1);

		let reopened = CheckpointBackend::sqlite(SqliteConfig::new(dir)).unwrap();
		assert_eq!(reopened.fetch("Orders").unwrap(), Some(a2));

		let handle = Capture::start(context(&source, Arc::new(reopened), sink, &clock), CaptureOptions::default())
			.unwrap();
		let report = handle.join().remove(0);
		assert_eq!(report.stats.events, 1);
		assert_eq!(report.pending, 1);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_column_types_survive_restart() {
	let source = MemorySource::with_collections(["Orders"]);
	let checkpoints = Arc::new(MemoryCheckpointStore::new());
	let sink = FlakySink::new();
	let clock = MockClock::new(1_700_000_000_000);

	let handle = Capture::start(
		context(&source, checkpoints.clone(), Arc::new(sink.clone()), &clock),
		CaptureOptions::default(),
	)
	.unwrap();
	let (_, stats) = handle.stats().remove(0);

	source.insert("Orders", json!({"_id": "a1", "stage": "3b"}));
	wait_for(|| stats.snapshot().events == 1, "first run did not consume");
	clock.advance(WINDOW);
	source.insert("Orders", json!({"_id": "a2"}));
	wait_for(|| stats.snapshot().flushes == 1, "first window not flushed");
	source.inject_fault("Orders", "process killed");
	handle.join();

	let handle = Capture::start(
		context(&source, checkpoints, Arc::new(sink.clone()), &clock),
		CaptureOptions::default(),
	)
	.unwrap();
	let (_, stats) = handle.stats().remove(0);

	source.insert("Orders", json!({"_id": "a3", "stage": 5}));
	wait_for(|| stats.snapshot().events == 1, "second run did not consume");
	clock.advance(WINDOW);
	source.insert("Orders", json!({"_id": "a4"}));
	wait_for(|| stats.snapshot().flushes == 1, "second window not flushed");
	source.close("Orders");
	handle.join();

	let stage_types: Vec<DataType> = sink
		.files()
		.iter()
		.map(|key| {
			let batches = read_batches(sink.memory().get(key).unwrap());
			batches[0].schema().field_with_name("stage").unwrap().data_type().clone()
		})
		.collect();
	assert_eq!(stage_types, vec![DataType::Utf8, DataType::Utf8]);
}
