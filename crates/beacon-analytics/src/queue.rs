// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory FIFO of events awaiting delivery.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use beacon_analytics_core::EventRecord;

/// Ordered, unbounded buffer of pending events.
///
/// Uses a blocking mutex because `capture` is synchronous. Critical sections
/// never await.
#[derive(Debug, Default)]
pub struct EventQueue {
	events: Mutex<VecDeque<EventRecord>>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an event and returns the queue length after the append.
	pub fn enqueue(&self, record: EventRecord) -> usize {
		let mut events = self.lock();
		events.push_back(record);
		events.len()
	}

	/// Removes and returns up to `max` events from the head.
	pub fn drain(&self, max: usize) -> Vec<EventRecord> {
		let mut events = self.lock();
		let count = max.min(events.len());
		events.drain(..count).collect()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	// A panic while holding the lock cannot leave the deque half-updated.
	fn lock(&self) -> MutexGuard<'_, VecDeque<EventRecord>> {
		self.events.lock().unwrap_or_else(|e| e.into_inner())
	}
}
