// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry budget and backoff delay calculation.
//!
//! Callers own the retry loop; this module only answers "how many retries"
//! and "how long to wait before retry N".

use std::time::Duration;

/// How the delay grows between successive retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
	/// `base_delay * (attempt + 1)`: 1s, 2s, 3s, ...
	Linear,
	/// `base_delay * factor^attempt`.
	Exponential { factor: f64 },
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Retries allowed after the initial attempt.
	pub max_retries: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff: Backoff,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::from_millis(1000),
			max_delay: Duration::from_secs(30),
			backoff: Backoff::Linear,
			jitter: false,
		}
	}
}

impl RetryConfig {
	/// Returns true if the attempt with index `attempt` (0 = initial send) may
	/// be followed by another one.
	pub fn can_retry(&self, attempt: u32) -> bool {
		attempt < self.max_retries
	}

	/// Returns true if the backoff produces non-negative finite delays.
	pub fn is_valid(&self) -> bool {
		match self.backoff {
			Backoff::Linear => true,
			Backoff::Exponential { factor } => factor.is_finite() && factor > 0.0,
		}
	}
}

/// Delay to wait after the attempt with index `attempt` failed.
pub fn delay_for_retry(cfg: &RetryConfig, attempt: u32) -> Duration {
	let base = cfg.base_delay.as_secs_f64();
	let raw = match cfg.backoff {
		Backoff::Linear => base * f64::from(attempt + 1),
		Backoff::Exponential { factor } => base * factor.powi(attempt as i32),
	};
	let capped = raw.min(cfg.max_delay.as_secs_f64());

	let final_delay = if cfg.jitter {
		let jitter_factor = 0.5 + fastrand::f64();
		capped * jitter_factor
	} else {
		capped
	};

	Duration::try_from_secs_f64(final_delay).unwrap_or(cfg.max_delay)
}
