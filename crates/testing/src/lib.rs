// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Test fixtures shared across the Tidepool crates.

pub mod checkpoint;
pub mod columnar;
pub mod sink;
pub mod tempdir;
pub mod util;
