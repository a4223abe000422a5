// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Process-wide tracing setup.

pub mod builder;
mod error;
pub mod factory;

pub use builder::{LogFormat, TracingBuilder};
pub use error::{TracingError, TracingResult};
pub use factory::{TracingConfigurator, TracingFactory};
