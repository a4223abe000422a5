// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use serde_json::json;
use tidepool_cdc::{CaptureContext, CaptureOptions, Capture, MemorySource, WorkerState, WorkerStats};
use tidepool_checkpoint::{CheckpointStore, MemoryCheckpointStore};
use tidepool_core::{MockClock, ResumeToken};
use tidepool_sink::{NullPolicy, ParquetWriter};
use tidepool_testing::{
	columnar::{row_count, utf8_column},
	sink::FlakySink,
	util::wait_for,
};

const WINDOW: Duration = Duration::from_secs(1200);

struct Fixture {
	source: MemorySource,
	checkpoints: MemoryCheckpointStore,
	sink: FlakySink,
	clock: MockClock,
}

impl Fixture {
	fn new(collections: &[&str]) -> Self {
		Self {
			source: MemorySource::with_collections(collections),
			checkpoints: MemoryCheckpointStore::new(),
			sink: FlakySink::new(),
			clock: MockClock::new(1_700_000_000_000),
		}
	}

	fn context(&self) -> CaptureContext {
		CaptureContext {
			source: Arc::new(self.source.clone()),
			checkpoints: Arc::new(self.checkpoints.clone()),
			writer: Arc::new(ParquetWriter::new(Arc::new(self.sink.clone()), NullPolicy::Nullable)),
			clock: self.clock.clock(),
		}
	}
}

fn stats_of(stats: &[(String, Arc<WorkerStats>)], collection: &str) -> Arc<WorkerStats> {
	stats.iter().find(|(name, _)| name == collection).map(|(_, stats)| Arc::clone(stats)).unwrap()
}

#[test]
fn test_three_inserts_flushed_as_one_file() {
	let fixture = Fixture::new(&["Orders"]);
	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();
	let orders = stats_of(&handle.stats(), "Orders");

	fixture.source.insert("Orders", json!({"_id": "a1", "qty": 1}));
	fixture.source.insert("Orders", json!({"_id": "a2", "qty": 2}));
	wait_for(|| orders.snapshot().events == 2, "first inserts not consumed");

	fixture.clock.advance(WINDOW);
	let a3 = fixture.source.insert("Orders", json!({"_id": "a3", "qty": 3}));
	wait_for(|| orders.snapshot().flushes == 1, "window not flushed");

	let files = fixture.sink.files();
	assert_eq!(files.len(), 1);
	assert!(files[0].starts_with("Orders/Orders_"));
	assert!(files[0].ends_with(".parquet"));

	let body = fixture.sink.memory().get(&files[0]).unwrap();
	assert_eq!(row_count(body.clone()), 3);
	assert_eq!(
		utf8_column(body.clone(), "_id"),
		vec![Some("a1".to_string()), Some("a2".to_string()), Some("a3".to_string())]
	);
	assert_eq!(utf8_column(body, "operationType"), vec![Some("insert".to_string()); 3]);
	assert_eq!(fixture.checkpoints.fetch("Orders").unwrap(), Some(a3));

	fixture.source.close("Orders");
	let reports = handle.join();
	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].state, WorkerState::Stopped);
}

#[test]
fn test_default_deny_list_skips_checkpoint_collection() {
	let fixture = Fixture::new(&["Orders", "Pads", "resume_tokens"]);
	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();

	assert_eq!(handle.collections(), vec!["Orders", "Pads"]);
	assert_eq!(fixture.source.subscriptions("resume_tokens"), 0);

	fixture.source.close("Orders");
	fixture.source.close("Pads");
	assert!(handle.join().iter().all(|report| report.state == WorkerState::Stopped));
}

#[test]
fn test_custom_deny_list() {
	let fixture = Fixture::new(&["Orders", "Pads"]);
	let options = CaptureOptions {
		deny_list: BTreeSet::from(["Pads".to_string()]),
		..CaptureOptions::default()
	};
	let handle = Capture::start(fixture.context(), options).unwrap();
	assert_eq!(handle.collections(), vec!["Orders"]);

	fixture.source.close("Orders");
	handle.join();
}

#[test]
fn test_start_returns_after_every_worker_subscribed() {
	let collections = ["A", "B", "C", "D"];
	let fixture = Fixture::new(&collections);
	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();

	for collection in collections {
		assert_eq!(fixture.source.subscriptions(collection), 1);
	}

	for collection in collections {
		fixture.source.close(collection);
	}
	assert_eq!(handle.join().len(), 4);
}

#[test]
fn test_failing_collection_does_not_block_others() {
	let fixture = Fixture::new(&["Orders", "Pads"]);
	fixture.source.fail_next_subscribe("Pads", "unauthorized");

	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();
	let orders = stats_of(&handle.stats(), "Orders");

	fixture.source.insert("Orders", json!({"_id": "a1"}));
	fixture.clock.advance(WINDOW);
	fixture.source.insert("Orders", json!({"_id": "a2"}));
	wait_for(|| orders.snapshot().flushes == 1, "healthy collection not flushed");

	fixture.source.close("Orders");
	let reports = handle.join();
	let pads = reports.iter().find(|report| report.collection == "Pads").unwrap();
	let orders = reports.iter().find(|report| report.collection == "Orders").unwrap();
	assert!(pads.is_faulted());
	assert_eq!(orders.state, WorkerState::Stopped);
}

#[test]
fn test_collections_are_flushed_independently() {
	let fixture = Fixture::new(&["Orders", "Pads"]);
	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();
	let stats = handle.stats();
	let orders = stats_of(&stats, "Orders");
	let pads = stats_of(&stats, "Pads");

	fixture.source.insert("Orders", json!({"_id": "o1"}));
	fixture.source.insert("Pads", json!({"_id": "p1", "PadNumber": 4}));
	wait_for(|| orders.snapshot().events == 1 && pads.snapshot().events == 1, "events not consumed");

	fixture.clock.advance(WINDOW);
	let o2 = fixture.source.insert("Orders", json!({"_id": "o2"}));
	wait_for(|| orders.snapshot().flushes == 1, "orders not flushed");

	assert_eq!(fixture.sink.files().len(), 1);
	assert!(fixture.sink.files()[0].starts_with("Orders/"));
	assert_eq!(fixture.checkpoints.fetch("Orders").unwrap(), Some(o2));
	assert_eq!(fixture.checkpoints.fetch("Pads").unwrap(), None::<ResumeToken>);

	fixture.source.close("Orders");
	fixture.source.close("Pads");
	let reports = handle.join();
	let pads = reports.iter().find(|report| report.collection == "Pads").unwrap();
	assert_eq!(pads.pending, 1);
}

#[test]
fn test_empty_source_starts_no_workers() {
	let fixture = Fixture::new(&[]);
	let handle = Capture::start(fixture.context(), CaptureOptions::default()).unwrap();
	assert!(handle.collections().is_empty());
	assert!(handle.join().is_empty());
}
