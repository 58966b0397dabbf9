// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook that stores panics as fatal events.

use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::Weak;

use raven_core::{location_info, Level};

use crate::backtrace::enrich;
use crate::client::RavenClientInner;
use crate::error::Result;
use crate::transport::encode;

/// Exception type reported for panics.
pub const PANIC_TYPE: &str = "panic";

/// Chains a hook in front of the current one.
///
/// The process may be unwinding or about to abort, so the event is written
/// to disk synchronously instead of being sent; the next replay delivers it.
pub(crate) fn install(client: Weak<RavenClientInner>) {
	let previous = std::panic::take_hook();

	std::panic::set_hook(Box::new(move |info| {
		if let Some(client) = client.upgrade() {
			if client.is_initialized() {
				if let Err(e) = persist_panic(&client, info) {
					eprintln!("raven: failed to store panic event: {e}");
				}
			}
		}
		previous(info);
	}));
}

fn persist_panic(client: &RavenClientInner, info: &PanicHookInfo<'_>) -> Result<PathBuf> {
	let message = panic_message(info);
	let thread = std::thread::current();
	let thread_name = thread.name().unwrap_or("<unnamed>");
	let culprit = match info.location() {
		Some(location) => location_info(location.file(), thread_name, location.line()),
		None => thread_name.to_string(),
	};

	let mut event = client.new_event(Level::Fatal, culprit);
	event.set_exception(enrich(client.walker(), PANIC_TYPE, &message));
	event.insert_tag("thread", thread_name);

	let (event_id, body) = encode(&event.into_body())?;
	client.store().save_blocking(&event_id, &body)
}

/// Extracts the panic message from the payload.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
	if let Some(s) = info.payload().downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = info.payload().downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
