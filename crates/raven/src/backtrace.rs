// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack walking and symbol demangling for captured errors.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use raven_core::{ExceptionReport, StackFrame, Stacktrace};
use rustc_demangle::try_demangle;
use tracing::warn;

/// Maximum number of frames walked per capture.
pub const MAX_FRAMES: usize = 128;

/// A frame as produced by a [`StackWalker`], before demangling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
	/// Raw (possibly mangled) symbol name. `None` if unresolved.
	pub symbol: Option<String>,
	/// Owning module, if the walker knows it.
	pub module: Option<String>,
}

/// Captures the current call stack.
///
/// Implementations must return at most `limit` frames, innermost first.
pub trait StackWalker: Send + Sync {
	fn capture(&self, limit: usize) -> Vec<RawFrame>;
}

/// Walks the stack with the `backtrace` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceWalker;

impl StackWalker for BacktraceWalker {
	fn capture(&self, limit: usize) -> Vec<RawFrame> {
		let mut frames = Vec::new();
		if limit == 0 {
			return frames;
		}

		::backtrace::trace(|frame| {
			let mut raw = RawFrame::default();
			::backtrace::resolve_frame(frame, |symbol| {
				if raw.symbol.is_none() {
					raw.symbol = symbol
						.name()
						.map(|name| String::from_utf8_lossy(name.as_bytes()).into_owned());
				}
			});
			frames.push(raw);
			frames.len() < limit
		});

		frames
	}
}

/// Walker for targets without stack introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWalker;

impl StackWalker for NoopWalker {
	fn capture(&self, _limit: usize) -> Vec<RawFrame> {
		Vec::new()
	}
}

/// Walker used when none is configured.
#[cfg(not(target_family = "wasm"))]
pub fn default_walker() -> BacktraceWalker {
	BacktraceWalker
}

/// Walker used when none is configured.
#[cfg(target_family = "wasm")]
pub fn default_walker() -> NoopWalker {
	NoopWalker
}

/// Frames belonging to stack walking, enrichment and panic dispatch.
///
/// Matched against demangled names with any leading `<` removed.
const INTERNAL_PREFIXES: &[&str] = &[
	"backtrace::",
	"raven::backtrace::enrich",
	"raven::backtrace::BacktraceWalker",
	"raven::event::EventBuilder",
	"raven::panic_hook::",
	"std::panicking::",
	"std::panic::",
	"core::panicking::",
	"core::panic::unwind_safe::",
	"core::ops::function::",
	"std::sys::backtrace::",
	"std::sys_common::backtrace::",
	"rust_begin_unwind",
	"__rust_",
	"_Unwind_Backtrace",
];

fn is_internal(function: &str) -> bool {
	let name = function.trim_start_matches('<');
	INTERNAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
		|| name.contains(" as core::ops::function::Fn")
}

/// Builds an exception report for `ty`/`value` from the current stack.
///
/// Leading frames from the walker, this module, event building and panic
/// dispatch are dropped. The next resolvable frame is the capture site: its
/// module becomes the report's `module` and the frame itself is dropped.
/// Unresolved frames are skipped. A walker that panics yields a report
/// without frames.
pub fn enrich(walker: &dyn StackWalker, ty: &str, value: &str) -> ExceptionReport {
	let raw = match catch_unwind(AssertUnwindSafe(|| walker.capture(MAX_FRAMES))) {
		Ok(frames) => frames,
		Err(_) => {
			warn!("stack walk failed, reporting exception without frames");
			Vec::new()
		}
	};

	let mut resolved = raw
		.into_iter()
		.take(MAX_FRAMES)
		.filter_map(resolve_frame)
		.skip_while(|frame| is_internal(&frame.function));
	let module = resolved.next().map(|frame| frame.module).unwrap_or_default();
	let frames = resolved.collect();

	ExceptionReport {
		ty: ty.to_string(),
		value: value.to_string(),
		module,
		stacktrace: Stacktrace { frames },
	}
}

fn resolve_frame(raw: RawFrame) -> Option<StackFrame> {
	let symbol = raw.symbol.filter(|s| !s.is_empty())?;
	let function = demangle_symbol(&symbol);
	let module = raw
		.module
		.or_else(|| module_of(&function))
		.unwrap_or_else(|| executable_path().to_string());

	Some(StackFrame {
		function,
		module,
		in_app: false,
	})
}

/// Demangles a Rust symbol, returning the input unchanged if it is not one.
///
/// The trailing hash of legacy symbols is dropped.
pub fn demangle_symbol(symbol: &str) -> String {
	match try_demangle(symbol) {
		Ok(demangled) => format!("{demangled:#}"),
		Err(_) => symbol.to_string(),
	}
}

/// Module path of a demangled function name.
///
/// e.g., "raven::client::RavenClient::event" -> "raven::client::RavenClient"
fn module_of(function: &str) -> Option<String> {
	function
		.rfind("::")
		.map(|idx| &function[..idx])
		.filter(|module| !module.is_empty())
		.map(str::to_string)
}

fn executable_path() -> &'static str {
	static EXE: OnceLock<String> = OnceLock::new();
	EXE.get_or_init(|| {
		std::env::current_exe()
			.map(|p| p.display().to_string())
			.unwrap_or_default()
	})
}
