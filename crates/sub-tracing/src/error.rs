// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
	#[error("invalid log filter '{directives}': {reason}")]
	Filter {
		directives: String,
		reason: String,
	},

	#[error("failed to install tracing subscriber: {0}")]
	Init(String),
}

pub type TracingResult<T> = Result<T, TracingError>;
