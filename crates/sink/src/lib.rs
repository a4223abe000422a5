// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Columnar sink for closed batches.
//!
//! A batch is resolved to an Arrow schema, encoded as a single Parquet file in
//! memory and uploaded to `{collection}/{collection}_{YYYYMMDDHHMMSS}.parquet`.
//! The collection's namespace marker `{collection}/` is created on first use.

#![cfg_attr(not(debug_assertions), deny(warnings))]

mod encode;
mod error;
mod object;
mod schema;
mod writer;

pub use encode::{NUMERIC_SENTINEL, NullPolicy, ParquetEncoder, STRING_SENTINEL};
pub use error::{SinkError, SinkResult};
pub use object::{MemorySink, ObjectSink, ObjectStoreSink};
pub use schema::{COLUMN_TYPES_KEY, SchemaTracker};
pub use writer::{FILE_EXTENSION, MIN_FLUSH_INTERVAL, ParquetWriter, namespace_path, object_path};
