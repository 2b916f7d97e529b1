// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring between the queue, the flush scheduler and the delivery engine.

use std::sync::{Arc, Weak};

use beacon_analytics_core::{CapturePayload, EventRecord};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::delivery::{ChainOutcome, DeliveryEngine};
use crate::queue::EventQueue;
use crate::scheduler::{FlushScheduler, Trigger};

/// Owns the event path from enqueue to delivery.
///
/// Spawned timers and deliveries only hold a [`Weak`] reference, so a torn
/// down client is never kept alive by its own background work.
#[derive(Debug)]
pub(crate) struct Pipeline {
	queue: EventQueue,
	scheduler: FlushScheduler,
	engine: Arc<DeliveryEngine>,
	project_id: Option<String>,
	shutdown: CancellationToken,
	runtime: Handle,
}

impl Pipeline {
	pub fn new(
		scheduler: FlushScheduler,
		engine: Arc<DeliveryEngine>,
		project_id: Option<String>,
		shutdown: CancellationToken,
		runtime: Handle,
	) -> Arc<Self> {
		Arc::new(Self {
			queue: EventQueue::new(),
			scheduler,
			engine,
			project_id,
			shutdown,
			runtime,
		})
	}

	pub fn queue(&self) -> &EventQueue {
		&self.queue
	}

	pub fn engine(&self) -> &Arc<DeliveryEngine> {
		&self.engine
	}

	pub fn enqueue(self: &Arc<Self>, record: EventRecord) {
		trace!(event = %record.event, "Event queued");
		let queue_len = self.queue.enqueue(record);
		self.schedule_for(queue_len);
	}

	/// Re-evaluates the flush trigger for the current queue length.
	pub fn schedule(self: &Arc<Self>) {
		self.schedule_for(self.queue.len());
	}

	fn schedule_for(self: &Arc<Self>, queue_len: usize) {
		if self.shutdown.is_cancelled() {
			return;
		}

		let trigger = self.scheduler.on_event_added(queue_len, |delay| {
			let pipeline = Arc::downgrade(self);
			let shutdown = self.shutdown.clone();
			self.runtime.spawn(async move {
				tokio::select! {
					_ = shutdown.cancelled() => {}
					_ = tokio::time::sleep(delay) => on_timer(pipeline),
				}
			})
		});

		if trigger == Trigger::Immediate {
			self.flush();
		}
	}

	/// Drains one batch and starts its delivery chain.
	///
	/// Returns `false` without draining when the queue is empty, a chain is
	/// already active, or the client is shutting down.
	pub fn flush(self: &Arc<Self>) -> bool {
		if self.shutdown.is_cancelled() || self.queue.is_empty() {
			return false;
		}
		let Some(guard) = self.engine.try_begin() else {
			debug!(queued = self.queue.len(), "Delivery in flight; flush deferred");
			return false;
		};

		let events = self.queue.drain(self.scheduler.batch_size());
		let Some(payload) = CapturePayload::from_batch(events, self.project_id.clone()) else {
			return false;
		};

		debug!(count = payload.len(), "Flushing analytics batch");
		let pipeline = Arc::downgrade(self);
		let shutdown = self.shutdown.clone();
		self.runtime.spawn(async move {
			let outcome = guard.engine().deliver(&payload, &shutdown).await;
			drop(guard);
			if !matches!(outcome, ChainOutcome::Cancelled { .. }) {
				after_chain(pipeline);
			}
		});
		true
	}

	/// Aborts the pending timer. Queued events stay where they are.
	pub fn cancel_timer(&self) {
		self.scheduler.cancel();
	}
}

fn on_timer(pipeline: Weak<Pipeline>) {
	if let Some(pipeline) = pipeline.upgrade() {
		pipeline.scheduler.timer_fired();
		trace!(queued = pipeline.queue.len(), "Flush timer fired");
		pipeline.flush();
	}
}

fn after_chain(pipeline: Weak<Pipeline>) {
	if let Some(pipeline) = pipeline.upgrade() {
		if !pipeline.queue.is_empty() {
			pipeline.schedule();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::RecordingTransport;
	use beacon_common_http::RetryConfig;
	use serde_json::json;
	use std::time::Duration;

	fn pipeline(transport: Arc<RecordingTransport>, batch_size: usize) -> Arc<Pipeline> {
		Pipeline::new(
			FlushScheduler::new(batch_size, Duration::from_secs(5)),
			Arc::new(DeliveryEngine::new(transport, RetryConfig::default())),
			Some("proj".to_string()),
			CancellationToken::new(),
			Handle::current(),
		)
	}

	fn record(name: &str) -> EventRecord {
		EventRecord::new(name, "dev", json!({}))
	}

	async fn settle() {
		tokio::time::sleep(Duration::from_millis(1)).await;
	}

	#[tokio::test(start_paused = true)]
	async fn flush_on_empty_queue_is_noop() {
		let transport = Arc::new(RecordingTransport::with_status(200));
		let pipeline = pipeline(transport.clone(), 10);
		assert!(!pipeline.flush());
		settle().await;
		assert_eq!(transport.send_count(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn threshold_drains_exactly_one_batch() {
		let transport = Arc::new(RecordingTransport::with_status(200).with_latency(Duration::from_secs(1)));
		let pipeline = pipeline(transport.clone(), 2);

		pipeline.enqueue(record("a"));
		pipeline.enqueue(record("b"));
		pipeline.enqueue(record("c"));
		settle().await;

		let sent = transport.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].names(), vec!["a", "b"]);
		assert_eq!(pipeline.queue().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn remaining_events_are_rescheduled_after_chain() {
		let transport = Arc::new(RecordingTransport::with_status(200).with_latency(Duration::from_secs(1)));
		let pipeline = pipeline(transport.clone(), 2);

		for name in ["a", "b", "c", "d", "e"] {
			pipeline.enqueue(record(name));
		}

		tokio::time::sleep(Duration::from_millis(2500)).await;
		let sent = transport.sent();
		assert_eq!(sent.len(), 2);
		assert_eq!(sent[1].names(), vec!["c", "d"]);

		// "e" stays below the threshold and goes out with the timer.
		tokio::time::sleep(Duration::from_secs(10)).await;
		let sent = transport.sent();
		assert_eq!(sent.len(), 3);
		assert_eq!(sent[2].names(), vec!["e"]);
		assert!(pipeline.queue().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn remaining_events_are_rescheduled_after_dropped_chain() {
		let transport = Arc::new(RecordingTransport::with_status(500));
		let pipeline = pipeline(transport.clone(), 1);
		let start = tokio::time::Instant::now();

		pipeline.enqueue(record("a"));
		pipeline.enqueue(record("b"));
		assert_eq!(pipeline.queue().len(), 1);

		tokio::time::sleep(Duration::from_millis(6500)).await;
		let sent = transport.sent();
		assert_eq!(sent.len(), 5);

		let offsets: Vec<Duration> = sent.iter().map(|s| s.at - start).collect();
		assert_eq!(
			offsets,
			vec![
				Duration::ZERO,
				Duration::from_secs(1),
				Duration::from_secs(3),
				Duration::from_secs(6),
				Duration::from_secs(6),
			]
		);
		for attempt in &sent[..4] {
			assert_eq!(attempt.names(), vec!["a"]);
		}
		assert_eq!(sent[4].names(), vec!["b"]);
		assert!(pipeline.queue().is_empty());

		tokio::time::sleep(Duration::from_secs(30)).await;
		let sent = transport.sent();
		assert_eq!(sent.iter().filter(|s| s.names() == ["a"]).count(), 4);
		assert_eq!(sent.iter().filter(|s| s.names() == ["b"]).count(), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_pipeline_stops_scheduling() {
		let transport = Arc::new(RecordingTransport::with_status(200));
		let shutdown = CancellationToken::new();
		let pipeline = Pipeline::new(
			FlushScheduler::new(10, Duration::from_secs(5)),
			Arc::new(DeliveryEngine::new(transport.clone(), RetryConfig::default())),
			None,
			shutdown.clone(),
			Handle::current(),
		);

		pipeline.enqueue(record("a"));
		shutdown.cancel();
		tokio::time::sleep(Duration::from_secs(10)).await;

		assert_eq!(transport.send_count(), 0);
		assert!(!pipeline.flush());
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_pipeline_does_not_fire() {
		let transport = Arc::new(RecordingTransport::with_status(200));
		let pipeline = pipeline(transport.clone(), 10);
		pipeline.enqueue(record("a"));
		drop(pipeline);

		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(transport.send_count(), 0);
	}
}
