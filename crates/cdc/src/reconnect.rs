// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resubscription after a stream fault.
///
/// With `max_attempts == 0` a fault ends the worker immediately. Otherwise
/// the worker resubscribes after the last event it consumed, waiting
/// `initial_backoff` doubled per attempt and capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
	pub max_attempts: u32,
	#[serde(with = "humantime_serde")]
	pub initial_backoff: Duration,
	#[serde(with = "humantime_serde")]
	pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 0,
			initial_backoff: Duration::from_secs(1),
			max_backoff: Duration::from_secs(60),
		}
	}
}

impl ReconnectPolicy {
	pub fn disabled() -> Self {
		Self::default()
	}

	pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
		Self {
			max_attempts,
			initial_backoff,
			max_backoff,
		}
	}

	/// Delay before the zero-based `attempt`, or `None` once attempts are used up.
	pub fn backoff(&self, attempt: u32) -> Option<Duration> {
		if attempt >= self.max_attempts {
			return None;
		}
		let factor = 2u32.saturating_pow(attempt);
		Some(self.initial_backoff.saturating_mul(factor).min(self.max_backoff))
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_disabled_never_retries() {
		assert_eq!(ReconnectPolicy::disabled().backoff(0), None);
	}

	#[test]
	fn test_backoff_doubles_up_to_cap() {
		let policy = ReconnectPolicy::new(6, Duration::from_millis(100), Duration::from_secs(1));
		let delays: Vec<Duration> = (0..).map_while(|attempt| policy.backoff(attempt)).collect();
		assert_eq!(
			delays,
			vec![
				Duration::from_millis(100),
				Duration::from_millis(200),
				Duration::from_millis(400),
				Duration::from_millis(800),
				Duration::from_secs(1),
				Duration::from_secs(1),
			]
		);
	}

	#[test]
	fn test_large_attempts_saturate() {
		let policy = ReconnectPolicy::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
		assert_eq!(policy.backoff(100), Some(Duration::from_secs(30)));
	}

	#[test]
	fn test_deserialize_humantime() {
		let policy: ReconnectPolicy =
			serde_json::from_str(r#"{"max_attempts": 3, "initial_backoff": "500ms"}"#).unwrap();
		assert_eq!(policy.max_attempts, 3);
		assert_eq!(policy.initial_backoff, Duration::from_millis(500));
		assert_eq!(policy.max_backoff, Duration::from_secs(60));
	}
}
