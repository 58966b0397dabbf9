// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the raven event reporting client.
//!
//! This crate holds the pieces of the client that do no I/O:
//! - DSN parsing into an [`EndpointConfig`] (collector URL and credentials)
//! - The [`Event`] body with its required baseline keys
//! - Severity [`Level`]s
//! - Structured [`ExceptionReport`]s attached to captured errors
//!
//! The delivery pipeline (transport, pending registry, on-disk spool and
//! replay) lives in the `raven` crate.

pub mod dsn;
pub mod error;
pub mod event;
pub mod exception;
pub mod level;

pub use dsn::EndpointConfig;
pub use error::{CoreError, Result};
pub use event::{check_required, location_info, Event, EventId, Tags, REQUIRED_KEYS};
pub use exception::{ExceptionReport, StackFrame, Stacktrace};
pub use level::Level;

/// Client name reported in the auth header and `User-Agent`.
pub const CLIENT_NAME: &str = "raven-rust";
/// Client version reported in the auth header and `User-Agent`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Collector protocol version sent as `sentry_version`.
pub const PROTOCOL_VERSION: u32 = 5;

/// Returns `{name}/{version}`, used as `sentry_client` and `User-Agent`.
pub fn client_info() -> String {
	format!("{CLIENT_NAME}/{CLIENT_VERSION}")
}
