// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core event model.

use thiserror::Error;

/// Errors raised while parsing configuration or validating events.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("DSN is empty")]
	EmptyDsn,

	#[error("DSN is not valid: {0}")]
	InvalidDsn(String),

	#[error("DSN has no project id")]
	MissingProjectId,

	#[error("event is missing required field: {0}")]
	MissingRequiredField(&'static str),

	#[error("invalid event id: {0}")]
	InvalidEventId(String),

	#[error("invalid level: {0}")]
	InvalidLevel(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
