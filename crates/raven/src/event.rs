// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fluent construction of events.

use std::error::Error;

use raven_core::{Event, EventId};
use serde_json::Value;

use crate::backtrace::enrich;
use crate::client::RavenClient;

/// An event being built. Consumed by [`EventBuilder::send`].
#[must_use = "an event is only delivered once `send` is called"]
pub struct EventBuilder {
	client: RavenClient,
	event: Event,
}

impl EventBuilder {
	pub(crate) fn new(client: RavenClient, event: Event) -> Self {
		Self { client, event }
	}

	pub fn message(mut self, text: impl Into<String>) -> Self {
		self.event.set_message(text);
		self
	}

	/// Adds a tag to this event only.
	pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.event.insert_tag(key, value);
		self
	}

	/// Sets an arbitrary body key.
	///
	/// Baseline keys can be overwritten; the event still has to carry every
	/// required key to be sent.
	pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.event.set_field(key, value.into());
		self
	}

	/// Attaches `error` with a stack trace of the current thread.
	pub fn exception<E: Error + ?Sized>(self, error: &E) -> Self {
		self.exception_parts(std::any::type_name::<E>(), error.to_string())
	}

	/// Attaches an exception given by type name and description.
	pub fn exception_parts(mut self, ty: impl AsRef<str>, value: impl AsRef<str>) -> Self {
		let report = enrich(self.client.inner.walker(), ty.as_ref(), value.as_ref());
		self.event.set_exception(report);
		self
	}

	pub fn id(&self) -> EventId {
		self.event.id()
	}

	pub fn event(&self) -> &Event {
		&self.event
	}

	/// Returns the event without sending it.
	pub fn into_event(self) -> Event {
		self.event
	}

	/// Hands the event to the client for delivery.
	pub fn send(self) -> EventId {
		let id = self.event.id();
		self.client.capture(self.event);
		id
	}
}
