// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire payload for `POST /capture`.
//!
//! A batch of one event is sent as the bare event object. Two or more events
//! are wrapped as `{"batch": [...], "project_id": ...}`.

use serde::{Deserialize, Serialize};

use crate::event::EventRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapturePayload {
	Batch {
		batch: Vec<EventRecord>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		project_id: Option<String>,
	},
	Single(EventRecord),
}

impl CapturePayload {
	/// Builds the payload for a drained batch. Returns `None` for an empty batch.
	pub fn from_batch(mut events: Vec<EventRecord>, project_id: Option<String>) -> Option<Self> {
		match events.len() {
			0 => None,
			1 => events.pop().map(CapturePayload::Single),
			_ => Some(CapturePayload::Batch {
				batch: events,
				project_id,
			}),
		}
	}

	/// Number of events carried by this payload.
	pub fn len(&self) -> usize {
		match self {
			CapturePayload::Single(_) => 1,
			CapturePayload::Batch { batch, .. } => batch.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Iterates over the events in send order.
	pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
		let slice: &[EventRecord] = match self {
			CapturePayload::Single(event) => std::slice::from_ref(event),
			CapturePayload::Batch { batch, .. } => batch,
		};
		slice.iter()
	}
}
