// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Server configuration, read from a JSON file.

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tidepool_cdc::{
	CaptureOptions, DEFAULT_DENY_LIST, DEFAULT_FLUSH_INTERVAL, DEFAULT_LOOSE_FIELDS, DEFAULT_TELEMETRY_INTERVAL,
	NormalizeOptions, ReconnectPolicy, WorkerConfig, source::DEFAULT_POLL_INTERVAL,
};
use tidepool_sink::{MIN_FLUSH_INTERVAL, NullPolicy};
use tidepool_sub_tracing::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Read {
		path: String,
		source: std::io::Error,
	},

	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("invalid configuration for {field}: {reason}")]
	Invalid {
		field: &'static str,
		reason: String,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
	pub source: SourceConfig,
	pub store: StoreConfig,
	pub checkpoint: CheckpointConfig,
	/// Collections that are never captured.
	pub deny_list: Vec<String>,
	#[serde(with = "humantime_serde")]
	pub flush_interval: Duration,
	/// Fields always written as strings.
	pub loose_fields: Vec<String>,
	pub null_policy: NullPolicy,
	pub reconnect: ReconnectPolicy,
	#[serde(with = "humantime_serde")]
	pub telemetry_interval: Duration,
	pub log: LogConfig,
}

impl Default for CaptureConfig {
	fn default() -> Self {
		Self {
			source: SourceConfig::default(),
			store: StoreConfig::default(),
			checkpoint: CheckpointConfig::default(),
			deny_list: DEFAULT_DENY_LIST.iter().map(|name| name.to_string()).collect(),
			flush_interval: DEFAULT_FLUSH_INTERVAL,
			loose_fields: DEFAULT_LOOSE_FIELDS.iter().map(|name| name.to_string()).collect(),
			null_policy: NullPolicy::default(),
			reconnect: ReconnectPolicy::default(),
			telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
			log: LogConfig::default(),
		}
	}
}

/// Directory of `{collection}.jsonl` change feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
	pub dir: PathBuf,
	#[serde(with = "humantime_serde")]
	pub poll_interval: Duration,
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self {
			dir: PathBuf::from("changes"),
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
	/// Credentials and region come from the `AWS_*` environment.
	S3 {
		bucket: String,
	},
	Local {
		root: PathBuf,
	},
	Memory,
}

impl Default for StoreConfig {
	fn default() -> Self {
		StoreConfig::Local {
			root: PathBuf::from("data"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CheckpointConfig {
	Sqlite {
		path: PathBuf,
	},
	Memory,
}

impl Default for CheckpointConfig {
	fn default() -> Self {
		CheckpointConfig::Sqlite {
			path: PathBuf::from("checkpoint.db"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
	/// Filter directives; `RUST_LOG` takes precedence.
	pub level: String,
	pub format: LogFormat,
	pub ansi: bool,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Text,
			ansi: true,
		}
	}
}

impl CaptureConfig {
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		Self::from_json(&content)
	}

	pub fn from_json(content: &str) -> Result<Self, ConfigError> {
		Ok(serde_json::from_str(content)?)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.flush_interval < MIN_FLUSH_INTERVAL {
			return Err(ConfigError::Invalid {
				field: "flush_interval",
				reason: format!("must be at least {:?}", MIN_FLUSH_INTERVAL),
			});
		}

		if self.source.poll_interval.is_zero() {
			return Err(ConfigError::Invalid {
				field: "source.poll_interval",
				reason: "must be greater than zero".to_string(),
			});
		}

		if self.telemetry_interval.is_zero() {
			return Err(ConfigError::Invalid {
				field: "telemetry_interval",
				reason: "must be greater than zero".to_string(),
			});
		}

		if let StoreConfig::S3 {
			bucket,
		} = &self.store
		{
			if bucket.trim().is_empty() {
				return Err(ConfigError::Invalid {
					field: "store.bucket",
					reason: "bucket name must not be empty".to_string(),
				});
			}
		}

		if self.reconnect.max_attempts > 0 && self.reconnect.initial_backoff > self.reconnect.max_backoff {
			return Err(ConfigError::Invalid {
				field: "reconnect",
				reason: "initial_backoff exceeds max_backoff".to_string(),
			});
		}

		Ok(())
	}

	pub fn capture_options(&self) -> CaptureOptions {
		CaptureOptions {
			deny_list: self.deny_list.iter().cloned().collect(),
			worker: WorkerConfig {
				flush_interval: self.flush_interval,
				normalize: NormalizeOptions::new(self.loose_fields.iter().cloned()),
				reconnect: self.reconnect,
			},
		}
	}
}
