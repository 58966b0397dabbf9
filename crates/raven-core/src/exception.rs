// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured exception data attached to events.

use serde::{Deserialize, Serialize};

/// A single resolved stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
	/// Demangled function name, or the raw symbol when demangling fails.
	pub function: String,
	/// Module (binary, library or crate path) owning the frame.
	pub module: String,
	/// Always false: frames are not attributed to application code.
	pub in_app: bool,
}

/// Ordered list of frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stacktrace {
	pub frames: Vec<StackFrame>,
}

/// One entry of an event's `exception` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionReport {
	#[serde(rename = "type")]
	pub ty: String,
	pub value: String,
	/// Module of the frame where the stack walk started.
	pub module: String,
	pub stacktrace: Stacktrace,
}

impl ExceptionReport {
	/// Creates a report without any frames.
	pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			ty: ty.into(),
			value: value.into(),
			..Self::default()
		}
	}
}
