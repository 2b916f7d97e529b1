// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automatic capture of clicks and page views from a host UI.
//!
//! The SDK has no UI dependency. Hosts implement [`EventSource`] (or feed a
//! [`ChannelSource`]) and hand it to [`AnalyticsClient::start`], which turns
//! each signal into a `$autocapture_click` or `$pageview` event.
//!
//! [`AnalyticsClient::start`]: crate::AnalyticsClient::start

use beacon_analytics_core::{special_events, special_properties};
use tokio::sync::mpsc;

use crate::properties::Properties;

/// Maximum number of characters of element text kept in `$text`.
pub const MAX_CLICK_TEXT_CHARS: usize = 200;

/// The element a click landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
	pub tag_name: String,
	pub text: String,
	pub href: Option<String>,
}

impl ClickTarget {
	pub fn new(tag_name: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			tag_name: tag_name.into(),
			text: text.into(),
			href: None,
		}
	}

	pub fn with_href(mut self, href: impl Into<String>) -> Self {
		self.href = Some(href.into());
		self
	}

	/// `$tag` lower-cased, `$text` truncated, `$href` only when present.
	pub fn properties(&self) -> Properties {
		Properties::new()
			.insert(special_properties::TAG, self.tag_name.to_lowercase())
			.insert(
				special_properties::TEXT,
				truncate_chars(&self.text, MAX_CLICK_TEXT_CHARS),
			)
			.insert_opt(
				special_properties::HREF,
				self.href.clone().filter(|href| !href.is_empty()),
			)
	}
}

/// The page (or screen) currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
	pub path: String,
	pub url: String,
	pub title: String,
}

impl PageView {
	pub fn new(path: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			url: url.into(),
			title: title.into(),
		}
	}

	pub fn properties(&self) -> Properties {
		Properties::new()
			.insert(special_properties::PATH, self.path.as_str())
			.insert(special_properties::URL, self.url.as_str())
			.insert(special_properties::TITLE, self.title.as_str())
	}
}

/// A user interaction reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiSignal {
	Click(ClickTarget),
	Navigation(PageView),
}

impl UiSignal {
	/// Event name and properties for this signal.
	///
	/// Clicks on targets without a tag name produce nothing.
	pub fn to_event(&self) -> Option<(&'static str, Properties)> {
		match self {
			UiSignal::Click(target) if target.tag_name.is_empty() => None,
			UiSignal::Click(target) => Some((special_events::AUTOCAPTURE_CLICK, target.properties())),
			UiSignal::Navigation(page) => Some((special_events::PAGEVIEW, page.properties())),
		}
	}
}

/// Producer of UI signals.
#[async_trait::async_trait]
pub trait EventSource: Send {
	/// The page shown when autocapture starts, captured as the initial
	/// `$pageview`.
	fn current_page(&self) -> Option<PageView> {
		None
	}

	/// Waits for the next signal. `None` ends the source.
	async fn next_signal(&mut self) -> Option<UiSignal>;
}

/// [`EventSource`] fed through a Tokio channel.
///
/// ```
/// use beacon_analytics::{ChannelSource, ClickTarget, UiSignal};
///
/// let (tx, source) = ChannelSource::channel(16);
/// tx.try_send(UiSignal::Click(ClickTarget::new("BUTTON", "Sign up"))).unwrap();
/// # drop(source);
/// ```
#[derive(Debug)]
pub struct ChannelSource {
	rx: mpsc::Receiver<UiSignal>,
	initial_page: Option<PageView>,
}

impl ChannelSource {
	pub fn new(rx: mpsc::Receiver<UiSignal>) -> Self {
		Self {
			rx,
			initial_page: None,
		}
	}

	/// Creates a bounded channel and the source reading from it.
	pub fn channel(buffer: usize) -> (mpsc::Sender<UiSignal>, Self) {
		let (tx, rx) = mpsc::channel(buffer);
		(tx, Self::new(rx))
	}

	pub fn with_initial_page(mut self, page: PageView) -> Self {
		self.initial_page = Some(page);
		self
	}
}

#[async_trait::async_trait]
impl EventSource for ChannelSource {
	fn current_page(&self) -> Option<PageView> {
		self.initial_page.clone()
	}

	async fn next_signal(&mut self) -> Option<UiSignal> {
		self.rx.recv().await
	}
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => text[..byte_idx].to_string(),
		None => text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::{json, Value};

	#[test]
	fn click_properties_lowercase_tag_and_keep_href() {
		let signal = UiSignal::Click(
			ClickTarget::new("BUTTON", "Sign up").with_href("https://example.com/signup"),
		);
		let (event, props) = signal.to_event().unwrap();
		assert_eq!(event, "$autocapture_click");
		assert_eq!(
			props.into_value(),
			json!({
				"$tag": "button",
				"$text": "Sign up",
				"$href": "https://example.com/signup",
			})
		);
	}

	#[test]
	fn click_without_href_omits_key() {
		let (_, props) = UiSignal::Click(ClickTarget::new("div", "x")).to_event().unwrap();
		assert!(props.get("$href").is_none());

		let mut target = ClickTarget::new("a", "x");
		target.href = Some(String::new());
		assert!(target.properties().get("$href").is_none());
	}

	#[test]
	fn click_text_is_truncated_to_200_chars() {
		let long = "é".repeat(250);
		let props = ClickTarget::new("p", long).properties();
		let text = props.get("$text").and_then(Value::as_str).unwrap();
		assert_eq!(text.chars().count(), MAX_CLICK_TEXT_CHARS);
	}

	#[test]
	fn click_without_tag_is_ignored() {
		assert!(UiSignal::Click(ClickTarget::new("", "text")).to_event().is_none());
	}

	#[test]
	fn navigation_becomes_pageview() {
		let page = PageView::new("/pricing", "https://example.com/pricing", "Pricing");
		let (event, props) = UiSignal::Navigation(page).to_event().unwrap();
		assert_eq!(event, "$pageview");
		assert_eq!(
			props.into_value(),
			json!({
				"$path": "/pricing",
				"$url": "https://example.com/pricing",
				"$title": "Pricing",
			})
		);
	}

	#[tokio::test]
	async fn channel_source_yields_until_senders_drop() {
		let page = PageView::new("/", "https://example.com/", "Home");
		let (tx, source) = ChannelSource::channel(4);
		let mut source = source.with_initial_page(page.clone());
		assert_eq!(source.current_page(), Some(page));

		tx.send(UiSignal::Click(ClickTarget::new("a", "x"))).await.unwrap();
		drop(tx);

		assert!(matches!(source.next_signal().await, Some(UiSignal::Click(_))));
		assert!(source.next_signal().await.is_none());
	}

	proptest! {
		#[test]
		fn truncation_never_exceeds_limit(text in ".{0,400}") {
			let truncated = truncate_chars(&text, MAX_CLICK_TEXT_CHARS);
			prop_assert!(truncated.chars().count() <= MAX_CLICK_TEXT_CHARS);
			prop_assert!(text.starts_with(&truncated));
		}
	}
}
