// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Builder for the global tracing subscriber

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{TracingError, TracingResult};

pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	/// Human readable lines
	#[default]
	Text,
	/// One JSON object per line, for log shippers
	Json,
}

/// Builder for configuring the tracing subscriber
#[derive(Debug, Clone)]
pub struct TracingBuilder {
	level: String,
	format: LogFormat,
	ansi: bool,
	thread_names: bool,
	target: bool,
}

impl TracingBuilder {
	pub fn new() -> Self {
		Self {
			level: DEFAULT_LEVEL.to_string(),
			format: LogFormat::Text,
			ansi: true,
			thread_names: true,
			target: false,
		}
	}

	/// Filter directives used when `RUST_LOG` is not set, e.g.
	/// `info,tidepool_sink=debug`.
	pub fn level(mut self, directives: impl Into<String>) -> Self {
		self.level = directives.into();
		self
	}

	pub fn format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	/// Colored output; only applies to [`LogFormat::Text`].
	pub fn ansi(mut self, ansi: bool) -> Self {
		self.ansi = ansi;
		self
	}

	/// Worker threads are named after their collection.
	pub fn thread_names(mut self, enabled: bool) -> Self {
		self.thread_names = enabled;
		self
	}

	pub fn target(mut self, enabled: bool) -> Self {
		self.target = enabled;
		self
	}

	fn filter(&self) -> TracingResult<EnvFilter> {
		match EnvFilter::try_from_default_env() {
			Ok(filter) => Ok(filter),
			Err(_) => parse_filter(&self.level),
		}
	}

	/// Installs the subscriber for the whole process. Fails if one is
	/// already installed.
	pub fn init(self) -> TracingResult<()> {
		let filter = self.filter()?;
		let registry = tracing_subscriber::registry().with(filter);

		let result = match self.format {
			LogFormat::Text => registry
				.with(fmt::layer()
					.with_ansi(self.ansi)
					.with_thread_names(self.thread_names)
					.with_target(self.target))
				.try_init(),
			LogFormat::Json => registry
				.with(fmt::layer().json().with_thread_names(self.thread_names).with_target(self.target))
				.try_init(),
		};

		result.map_err(|err| TracingError::Init(err.to_string()))
	}
}

impl Default for TracingBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn parse_filter(directives: &str) -> TracingResult<EnvFilter> {
	EnvFilter::try_new(directives).map_err(|err| TracingError::Filter {
		directives: directives.to_string(),
		reason: err.to_string(),
	})
}
