// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the raven client.

use std::path::PathBuf;

use raven_core::CoreError;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, RavenError>;

/// Errors that can occur inside the client.
///
/// None of these reach callers of `capture`/`send`: delivery failures are
/// persisted, and everything else is logged.
#[derive(Debug, Error)]
pub enum RavenError {
	/// The client has been shut down.
	#[error("raven client has been shut down")]
	ClientShutdown,

	/// An enabled client was built outside a tokio runtime.
	#[error("raven client must be built inside a tokio runtime")]
	NoRuntime,

	/// HTTP request failed before a response was received.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector answered with a non-success status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body.
		message: String,
	},

	/// Redirect chain exceeded the configured limit.
	#[error("too many redirects ({0})")]
	TooManyRedirects(usize),

	/// Event could not be written to or removed from local storage.
	#[error("persistence error at {path}: {source}")]
	Persistence {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// A stored event is not a valid event body.
	#[error("could not parse stored event {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// No local data directory could be determined.
	#[error("could not determine local data directory")]
	DataDirNotFound,

	/// Failed to serialize an event.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Core(#[from] CoreError),
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// TOML parsing error for in-memory contents
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	/// Create an invalid value error
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
