// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builder for event properties.

use serde_json::{Map, Value};

/// A builder for an event's `properties` object.
///
/// `capture` accepts anything convertible into a `serde_json::Value`; this
/// type is a convenience for building the object fluently.
///
/// # Example
///
/// ```
/// use beacon_analytics::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("price", 99.99)
///     .insert_opt("coupon", None::<String>);
///
/// assert_eq!(props.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, replacing any previous value for the key.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts the value only when it is `Some`.
	pub fn insert_opt<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(value) => self.insert(key, value),
			None => self,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(inner: Map<String, Value>) -> Self {
		Self { inner }
	}
}
