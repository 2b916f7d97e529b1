// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush scheduling: size threshold plus a debounced one-shot timer.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// What the scheduler decided after an event was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
	/// The batch threshold was reached; flush now.
	Immediate,
	/// A new timer was armed for the flush interval.
	Deferred,
	/// A timer is already pending and will cover this event.
	AlreadyPending,
}

/// Decides when queued events are flushed.
///
/// Holds at most one pending timer. The timer is not re-armed by later
/// events and is not cancelled by an immediate flush; when it fires it
/// flushes whatever is queued at that point.
#[derive(Debug)]
pub struct FlushScheduler {
	batch_size: usize,
	interval: Duration,
	pending: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
	pub fn new(batch_size: usize, interval: Duration) -> Self {
		Self {
			batch_size,
			interval,
			pending: Mutex::new(None),
		}
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// Called with the queue length after an enqueue.
	///
	/// `arm` spawns the timer task for the given delay. It runs under the
	/// scheduler lock, so a timer that fires immediately still observes its
	/// own handle when it calls [`FlushScheduler::timer_fired`].
	pub fn on_event_added<F>(&self, queue_len: usize, arm: F) -> Trigger
	where
		F: FnOnce(Duration) -> JoinHandle<()>,
	{
		if queue_len >= self.batch_size {
			debug!(queue_len, batch_size = self.batch_size, "Batch threshold reached");
			return Trigger::Immediate;
		}

		let mut pending = self.lock();
		if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
			return Trigger::AlreadyPending;
		}

		*pending = Some(arm(self.interval));
		debug!(
			queue_len,
			interval_ms = self.interval.as_millis() as u64,
			"Flush timer armed"
		);
		Trigger::Deferred
	}

	/// Clears the pending handle. Called by the timer task when it fires.
	pub fn timer_fired(&self) {
		self.lock().take();
	}

	/// Aborts a pending timer, if any.
	pub fn cancel(&self) {
		if let Some(handle) = self.lock().take() {
			handle.abort();
			debug!("Pending flush timer cancelled");
		}
	}

	pub fn has_pending_timer(&self) -> bool {
		self.lock().is_some()
	}

	fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
		self.pending.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl Drop for FlushScheduler {
	fn drop(&mut self) {
		self.cancel();
	}
}
