// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change capture for Tidepool.
//!
//! One [`CollectionWorker`] per collection turns a change stream into
//! windowed Parquet files and keeps a resume checkpoint that only moves after
//! a window has been published. [`Capture`] discovers the collections and runs
//! the workers.

mod buffer;
mod error;
mod gate;
pub mod normalize;
mod orchestrator;
mod reconnect;
pub mod source;
mod stats;
mod telemetry;
mod worker;

pub use buffer::BatchBuffer;
pub use error::{CdcError, CdcResult};
pub use gate::StartGate;
pub use normalize::{DEFAULT_LOOSE_FIELDS, NormalizeOptions, normalize};
pub use orchestrator::{Capture, CaptureHandle, CaptureOptions, DEFAULT_DENY_LIST};
pub use reconnect::ReconnectPolicy;
pub use source::{ChangeSource, ChangeStream, FileSource, MemorySource};
pub use stats::{StatsSnapshot, WorkerStats};
pub use telemetry::{DEFAULT_TELEMETRY_INTERVAL, TelemetryReporter};
pub use worker::{
	CaptureContext, CollectionWorker, DEFAULT_FLUSH_INTERVAL, WorkerConfig, WorkerReport, WorkerState,
};
