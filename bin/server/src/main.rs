// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Tidepool server: captures every collection of a change feed into windowed
//! Parquet files until all change streams have ended.

mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tidepool_cdc::{Capture, CaptureContext, FileSource, TelemetryReporter};
use tidepool_checkpoint::{CheckpointBackend, SqliteConfig};
use tidepool_core::Clock;
use tidepool_sink::{ObjectSink, ObjectStoreSink, ParquetWriter};
use tidepool_sub_tracing::{LogFormat, TracingFactory};
use tracing::{error, info};

use crate::config::{CaptureConfig, CheckpointConfig, StoreConfig};

#[derive(Parser)]
#[command(name = "tidepool-server")]
#[command(about = "Captures collection change streams into windowed Parquet files")]
struct Args {
	/// Configuration file (JSON)
	#[arg(short, long, env = "TIDEPOOL_CONFIG")]
	config: Option<PathBuf>,

	/// Directory holding the `{collection}.jsonl` change feeds
	#[arg(long, env = "TIDEPOOL_SOURCE_DIR")]
	source_dir: Option<PathBuf>,

	/// Write to this S3 bucket instead of the configured store
	#[arg(long, env = "TIDEPOOL_BUCKET")]
	bucket: Option<String>,

	/// Checkpoint database
	#[arg(long, env = "TIDEPOOL_CHECKPOINT_PATH")]
	checkpoint_path: Option<PathBuf>,

	/// Window length, e.g. `20m`
	#[arg(long, env = "TIDEPOOL_FLUSH_INTERVAL", value_parser = humantime_serde::re::humantime::parse_duration)]
	flush_interval: Option<Duration>,

	/// Log filter directives, e.g. `info,tidepool_sink=debug`
	#[arg(long, env = "TIDEPOOL_LOG_LEVEL")]
	log_level: Option<String>,

	/// Emit logs as JSON lines
	#[arg(long, env = "TIDEPOOL_JSON_LOGS")]
	json_logs: bool,
}

impl Args {
	fn apply(self, config: &mut CaptureConfig) {
		if let Some(dir) = self.source_dir {
			config.source.dir = dir;
		}
		if let Some(bucket) = self.bucket {
			config.store = StoreConfig::S3 {
				bucket,
			};
		}
		if let Some(path) = self.checkpoint_path {
			config.checkpoint = CheckpointConfig::Sqlite {
				path,
			};
		}
		if let Some(interval) = self.flush_interval {
			config.flush_interval = interval;
		}
		if let Some(level) = self.log_level {
			config.log.level = level;
		}
		if self.json_logs {
			config.log.format = LogFormat::Json;
		}
	}
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let mut config = match &args.config {
		Some(path) => CaptureConfig::from_file(path)?,
		None => CaptureConfig::default(),
	};
	args.apply(&mut config);
	config.validate()?;

	let log = config.log.clone();
	TracingFactory::with_configurator(move |builder| builder.level(log.level).format(log.format).ansi(log.ansi))
		.init()?;

	// drives the object store client; workers block on it from their own threads
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.worker_threads(2)
		.thread_name("tidepool-io")
		.enable_all()
		.build()?;
	let handle = runtime.handle().clone();

	let sink: Arc<dyn ObjectSink> = match &config.store {
		StoreConfig::S3 {
			bucket,
		} => Arc::new(ObjectStoreSink::s3(bucket, handle)?),
		StoreConfig::Local {
			root,
		} => Arc::new(ObjectStoreSink::local(root, handle)?),
		StoreConfig::Memory => Arc::new(ObjectStoreSink::memory(handle)),
	};

	let checkpoints = match &config.checkpoint {
		CheckpointConfig::Sqlite {
			path,
		} => CheckpointBackend::sqlite(SqliteConfig::new(path))?,
		CheckpointConfig::Memory => CheckpointBackend::memory(),
	};

	let source = FileSource::new(&config.source.dir).poll_interval(config.source.poll_interval);

	let context = CaptureContext {
		source: Arc::new(source),
		checkpoints: Arc::new(checkpoints),
		writer: Arc::new(ParquetWriter::new(sink, config.null_policy)),
		clock: Clock::System,
	};

	let capture = Capture::start(context, config.capture_options())?;
	let telemetry = TelemetryReporter::spawn(config.telemetry_interval, capture.stats());

	let reports = capture.join();
	telemetry.shutdown();

	for report in &reports {
		info!(
			collection = %report.collection,
			state = %report.state,
			events = report.stats.events,
			records_flushed = report.stats.records_flushed,
			pending = report.pending,
			"worker finished"
		);
	}

	let faulted: Vec<&str> =
		reports.iter().filter(|report| report.is_faulted()).map(|report| report.collection.as_str()).collect();
	if !faulted.is_empty() {
		error!(faulted = ?faulted, "capture finished with faulted workers");
		anyhow::bail!("faulted collections: {}", faulted.join(", "));
	}

	info!("capture finished");
	Ok(())
}
