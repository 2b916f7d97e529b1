// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for Beacon product analytics.
//!
//! This crate captures events on the client side, queues them in memory and
//! delivers them to a Beacon ingestion host in batches. `capture()` never
//! blocks on the network and never fails; delivery problems are retried and
//! eventually dropped without surfacing to the caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use beacon_analytics::{AnalyticsClient, Properties};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnalyticsClient::builder()
//!         .host("https://events.example.com")
//!         .api_key("key_123")
//!         .project_id("default")
//!         .flush_interval(Duration::from_secs(5))
//!         .build()?;
//!
//!     client.capture("button_clicked", Properties::new()
//!         .insert("button_name", "checkout")
//!         .insert("page", "/cart")
//!     );
//!
//!     // Send what is queued before exiting.
//!     client.flush_and_wait().await;
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Event Batching
//!
//! Events are flushed when `batch_size` of them are queued, or `flush_interval`
//! after the first event of a quiet period, whichever comes first. A single
//! event is sent as a bare object; two or more are wrapped in
//! `{"batch": [...]}`. Only one batch is in flight at a time, including its
//! retries.
//!
//! # Retries
//!
//! Any response other than 200 or 202, and any transport error, is retried up
//! to three times with 1s, 2s and 3s delays by default. See
//! [`RetryConfig`] to change the schedule.
//!
//! # Device Identity
//!
//! Each client resolves a device id at build time: the configured one, else
//! the one found in [`DeviceStorage`], else a freshly generated one. It is
//! used as `distinct_id` unless [`CaptureOptions`] overrides it.
//!
//! # Autocapture
//!
//! Hosts with a UI can feed clicks and navigations through an
//! [`EventSource`] passed to [`AnalyticsClient::start`].

pub mod autocapture;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod identity;
mod pipeline;
pub mod properties;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use autocapture::{ChannelSource, ClickTarget, EventSource, PageView, UiSignal};
pub use client::{AnalyticsClient, AnalyticsClientBuilder, CaptureOptions, SDK_NAME, SDK_VERSION};
pub use config::{ClientConfig, ConfigError};
pub use delivery::{ChainOutcome, DeliveryState};
pub use error::{AnalyticsError, Result};
pub use properties::Properties;
pub use storage::{DeviceStorage, FileStorage, MemoryStorage, StorageError};
pub use transport::{HttpTransport, Transport};

pub use beacon_analytics_core::{CapturePayload, EventRecord};
pub use beacon_common_http::{Backoff, RetryConfig};
