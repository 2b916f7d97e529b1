// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of drained batches with bounded retry.
//!
//! Each batch runs through an explicit state machine:
//!
//! ```text
//! Idle -> Sending -> Delivered
//!            |   \-> Dropped
//!            v
//!         Retrying -> Sending
//! ```
//!
//! Only one chain is active at a time. The [`FlightGuard`] returned by
//! [`DeliveryEngine::try_begin`] marks the chain active until it is dropped,
//! covering every retry of the batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_analytics_core::CapturePayload;
use beacon_common_http::{delay_for_retry, RetryConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// Where a batch is in its delivery chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
	Idle,
	/// Attempt `attempt` (0 = initial send) is in progress.
	Sending { attempt: u32 },
	/// Attempt `attempt` failed; the next one starts after `delay`.
	Retrying { attempt: u32, delay: Duration },
	Delivered { attempts: u32 },
	Dropped { attempts: u32 },
}

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
	Status(u16),
	Failed(String),
}

impl AttemptOutcome {
	/// Only 200 and 202 count as accepted.
	pub fn is_success(&self) -> bool {
		matches!(self, AttemptOutcome::Status(200 | 202))
	}
}

/// How a chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
	Delivered { attempts: u32 },
	Dropped { attempts: u32 },
	/// The client was torn down during a backoff wait.
	Cancelled { attempts: u32 },
}

/// Transition taken after attempt `attempt` produced `outcome`.
///
/// Server rejections and transport failures are treated identically.
pub fn next_state(retry: &RetryConfig, attempt: u32, outcome: &AttemptOutcome) -> DeliveryState {
	if outcome.is_success() {
		DeliveryState::Delivered {
			attempts: attempt + 1,
		}
	} else if retry.can_retry(attempt) {
		DeliveryState::Retrying {
			attempt,
			delay: delay_for_retry(retry, attempt),
		}
	} else {
		DeliveryState::Dropped {
			attempts: attempt + 1,
		}
	}
}

pub struct DeliveryEngine {
	transport: Arc<dyn Transport>,
	retry: RetryConfig,
	in_flight: AtomicBool,
	completed: watch::Sender<u64>,
}

impl std::fmt::Debug for DeliveryEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeliveryEngine")
			.field("retry", &self.retry)
			.field("in_flight", &self.is_in_flight())
			.finish_non_exhaustive()
	}
}

impl DeliveryEngine {
	pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
		let (completed, _) = watch::channel(0);
		Self {
			transport,
			retry,
			in_flight: AtomicBool::new(false),
			completed,
		}
	}

	/// Claims the single in-flight slot. Returns `None` if a chain is active.
	pub fn try_begin(self: &Arc<Self>) -> Option<FlightGuard> {
		self
			.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| FlightGuard {
				engine: Arc::clone(self),
			})
	}

	pub fn is_in_flight(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Receiver that changes every time a chain ends.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.completed.subscribe()
	}

	/// Runs one batch through the state machine until it is delivered,
	/// dropped, or the backoff is cancelled.
	///
	/// A send already in progress is not interrupted by `shutdown`.
	pub async fn deliver(&self, payload: &CapturePayload, shutdown: &CancellationToken) -> ChainOutcome {
		let count = payload.len();
		let mut state = DeliveryState::Idle;

		loop {
			state = match state {
				DeliveryState::Idle => DeliveryState::Sending { attempt: 0 },
				DeliveryState::Sending { attempt } => {
					let outcome = match self.transport.send(payload).await {
						Ok(status) => AttemptOutcome::Status(status),
						Err(e) => AttemptOutcome::Failed(e.to_string()),
					};
					match &outcome {
						AttemptOutcome::Status(status) => {
							debug!(status, attempt, count, "Capture request completed")
						}
						AttemptOutcome::Failed(error) => {
							debug!(error = %error, attempt, count, "Capture request failed")
						}
					}
					next_state(&self.retry, attempt, &outcome)
				}
				DeliveryState::Retrying { attempt, delay } => {
					debug!(
						attempt,
						delay_ms = delay.as_millis() as u64,
						"Retrying capture request after backoff"
					);
					tokio::select! {
						_ = shutdown.cancelled() => {
							debug!(attempt, count, "Delivery cancelled during backoff");
							return ChainOutcome::Cancelled { attempts: attempt + 1 };
						}
						_ = tokio::time::sleep(delay) => {}
					}
					DeliveryState::Sending {
						attempt: attempt + 1,
					}
				}
				DeliveryState::Delivered { attempts } => {
					info!(count, attempts, "Analytics batch delivered");
					return ChainOutcome::Delivered { attempts };
				}
				DeliveryState::Dropped { attempts } => {
					warn!(count, attempts, "Dropping analytics batch after exhausting retries");
					return ChainOutcome::Dropped { attempts };
				}
			};
		}
	}

	fn finish(&self) {
		self.in_flight.store(false, Ordering::Release);
		self.completed.send_modify(|n| *n = n.wrapping_add(1));
	}
}

/// Holds the in-flight slot; releasing it wakes `flush_and_wait` callers.
#[derive(Debug)]
pub struct FlightGuard {
	engine: Arc<DeliveryEngine>,
}

impl FlightGuard {
	pub fn engine(&self) -> &Arc<DeliveryEngine> {
		&self.engine
	}
}

impl Drop for FlightGuard {
	fn drop(&mut self) {
		self.engine.finish();
	}
}
