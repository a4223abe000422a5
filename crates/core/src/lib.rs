// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Shared data model for Tidepool.
//!
//! - [`ChangeEvent`] as delivered by a change stream, with its opaque [`ResumeToken`]
//! - [`NormalizedRecord`] and [`Value`], the flat, type-stabilized form of an event
//! - [`Batch`], the records of one flush window
//! - [`Clock`], wall-clock time that tests can pin

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub mod batch;
pub mod clock;
pub mod event;
pub mod record;

pub use batch::Batch;
pub use clock::{Clock, MockClock};
pub use event::{ChangeEvent, OperationType, ResumeToken};
pub use record::{NormalizedRecord, Value};

/// Column holding the change operation of a record.
pub const OPERATION_COLUMN: &str = "operationType";

/// Column holding the document identifier of a record.
pub const ID_COLUMN: &str = "_id";
