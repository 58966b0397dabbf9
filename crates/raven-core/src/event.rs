// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event body and identifiers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::exception::ExceptionReport;
use crate::level::Level;

/// Keys every event body must carry before it is handed to the transport.
pub const REQUIRED_KEYS: &[&str] = &[
	"event_id",
	"level",
	"timestamp",
	"culprit",
	"server_name",
	"logger",
	"platform",
];

/// String tags attached to an event.
pub type Tags = BTreeMap<String, String>;

/// Unique identifier for an event.
///
/// Rendered as 32 lowercase hex characters with no hyphens or braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = CoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|_| CoreError::InvalidEventId(s.to_string()))
	}
}

/// A single event destined for the collector.
///
/// The body starts as a snapshot of the client template plus the baseline
/// keys. Tags are kept apart and only merged under `tags` by
/// [`Event::into_body`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	id: EventId,
	body: Map<String, Value>,
	tags: Tags,
}

impl Event {
	/// Creates an event from copies of the template body and tags.
	pub fn new(
		level: Level,
		culprit: impl Into<String>,
		template: &Map<String, Value>,
		tags: &Tags,
	) -> Self {
		let id = EventId::new();
		let mut body = template.clone();
		body.insert("event_id".to_string(), Value::String(id.to_string()));
		body.insert("level".to_string(), Value::String(level.to_string()));
		body.insert(
			"timestamp".to_string(),
			Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
		);
		body.insert("culprit".to_string(), Value::String(culprit.into()));

		Self {
			id,
			body,
			tags: tags.clone(),
		}
	}

	pub fn id(&self) -> EventId {
		self.id
	}

	pub fn body(&self) -> &Map<String, Value> {
		&self.body
	}

	pub fn tags(&self) -> &Tags {
		&self.tags
	}

	pub fn set_message(&mut self, message: impl Into<String>) {
		self.body
			.insert("message".to_string(), Value::String(message.into()));
	}

	pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
		self.body.insert(key.into(), value);
	}

	pub fn insert_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.tags.insert(key.into(), value.into());
	}

	/// Sets `message` to the report's value and `exception` to a
	/// one-element array holding the report.
	pub fn set_exception(&mut self, report: ExceptionReport) {
		self.set_message(report.value.clone());
		self.body.insert("exception".to_string(), json!([report]));
	}

	/// Consumes the event, returning the body with tags merged under `tags`.
	pub fn into_body(self) -> Map<String, Value> {
		let mut body = self.body;
		let tags = self
			.tags
			.into_iter()
			.map(|(k, v)| (k, Value::String(v)))
			.collect();
		body.insert("tags".to_string(), Value::Object(tags));
		body
	}
}

/// Checks that `body` carries every key in [`REQUIRED_KEYS`].
pub fn check_required(body: &Map<String, Value>) -> Result<()> {
	for key in REQUIRED_KEYS {
		if !body.contains_key(*key) {
			return Err(CoreError::MissingRequiredField(*key));
		}
	}
	Ok(())
}

/// Formats a source location as `"file in function at line"`.
pub fn location_info(file: &str, function: &str, line: u32) -> String {
	format!("{file} in {function} at {line}")
}
