// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Beacon product analytics.
//!
//! This crate holds the data shared between the SDK and anything that speaks
//! the capture wire format: event records, the single/batch payload, event
//! name validation, and the anonymous device id generator. It performs no I/O.
//!
//! # Example
//!
//! ```
//! use beacon_analytics_core::{CapturePayload, EventRecord};
//!
//! let events = vec![
//!     EventRecord::new("a", "device-1", serde_json::json!({})),
//!     EventRecord::new("b", "device-1", serde_json::json!({})),
//! ];
//! let payload = CapturePayload::from_batch(events, Some("default".to_string())).unwrap();
//! assert_eq!(payload.len(), 2);
//! ```

pub mod device_id;
pub mod event;
pub mod payload;

pub use device_id::{generate_device_id, is_device_id_shaped};
pub use event::{
	format_timestamp, normalize_properties, special_events, special_properties,
	validate_event_name, EventRecord, MAX_EVENT_NAME_LENGTH,
};
pub use payload::CapturePayload;
