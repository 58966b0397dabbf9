// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Disk storage for events that could not be delivered.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use raven_core::{check_required, CoreError};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{RavenError, Result};

/// Name of the directory holding undelivered events.
pub const MESSAGES_DIR: &str = "messages";

const TMP_SUFFIX: &str = ".tmp";

/// An undelivered event read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
	pub path: PathBuf,
	pub event_id: String,
	/// File contents, byte for byte.
	pub body: Bytes,
}

/// One file per undelivered event, named by event id.
#[derive(Debug, Clone)]
pub struct MessageStore {
	dir: PathBuf,
}

impl MessageStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Store under `<local data dir>/<app_name>/messages`.
	pub fn from_app_name(app_name: &str) -> Result<Self> {
		let data_dir = dirs::data_local_dir().ok_or(RavenError::DataDirNotFound)?;
		Ok(Self::new(data_dir.join(app_name).join(MESSAGES_DIR)))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the file for `event_id`.
	pub fn message_path(&self, event_id: &str) -> Result<PathBuf> {
		validate_id(event_id)?;
		Ok(self.dir.join(event_id))
	}

	/// Writes `body` verbatim, replacing any existing file for the id.
	pub async fn save(&self, event_id: &str, body: &[u8]) -> Result<PathBuf> {
		let path = self.message_path(event_id)?;
		let tmp_path = self.tmp_path(event_id);

		tokio::fs::create_dir_all(&self.dir)
			.await
			.map_err(|source| persistence(&self.dir, source))?;
		tokio::fs::write(&tmp_path, body)
			.await
			.map_err(|source| persistence(&tmp_path, source))?;
		tokio::fs::rename(&tmp_path, &path)
			.await
			.map_err(|source| persistence(&path, source))?;

		debug!(event_id = %event_id, path = %path.display(), "saved event to disk");
		Ok(path)
	}

	/// Synchronous [`MessageStore::save`] for contexts without a runtime.
	pub fn save_blocking(&self, event_id: &str, body: &[u8]) -> Result<PathBuf> {
		let path = self.message_path(event_id)?;
		let tmp_path = self.tmp_path(event_id);

		std::fs::create_dir_all(&self.dir).map_err(|source| persistence(&self.dir, source))?;
		std::fs::write(&tmp_path, body).map_err(|source| persistence(&tmp_path, source))?;
		std::fs::rename(&tmp_path, &path).map_err(|source| persistence(&path, source))?;

		Ok(path)
	}

	/// Reads every stored event.
	///
	/// Files that cannot be read or are not event bodies are logged and
	/// left in place. A missing directory holds no events.
	pub async fn load_all(&self) -> Result<Vec<StoredMessage>> {
		let mut entries = match tokio::fs::read_dir(&self.dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(source) => return Err(persistence(&self.dir, source)),
		};

		let mut messages = Vec::new();
		loop {
			let entry = match entries.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => break,
				Err(source) => return Err(persistence(&self.dir, source)),
			};

			let path = entry.path();
			if path.to_string_lossy().ends_with(TMP_SUFFIX) || !path.is_file() {
				continue;
			}

			match read_message(&path).await {
				Ok(message) => messages.push(message),
				Err(e) => warn!(path = %path.display(), error = %e, "skipping stored event"),
			}
		}

		messages.sort_by(|a, b| a.path.cmp(&b.path));
		debug!(count = messages.len(), dir = %self.dir.display(), "loaded stored events");
		Ok(messages)
	}

	pub async fn remove(&self, path: &Path) -> Result<()> {
		tokio::fs::remove_file(path)
			.await
			.map_err(|source| persistence(path, source))?;
		debug!(path = %path.display(), "removed stored event");
		Ok(())
	}

	fn tmp_path(&self, event_id: &str) -> PathBuf {
		self.dir.join(format!("{event_id}{TMP_SUFFIX}"))
	}
}

async fn read_message(path: &Path) -> Result<StoredMessage> {
	let body = tokio::fs::read(path)
		.await
		.map_err(|source| persistence(path, source))?;
	let parsed: Map<String, Value> =
		serde_json::from_slice(&body).map_err(|source| RavenError::Parse {
			path: path.to_path_buf(),
			source,
		})?;

	check_required(&parsed)?;
	let event_id = parsed
		.get("event_id")
		.and_then(Value::as_str)
		.ok_or(CoreError::MissingRequiredField("event_id"))?;
	validate_id(event_id)?;

	Ok(StoredMessage {
		path: path.to_path_buf(),
		event_id: event_id.to_string(),
		body: Bytes::from(body),
	})
}

/// Event ids become file names, so only plain identifiers are accepted.
fn validate_id(event_id: &str) -> Result<()> {
	let valid = !event_id.is_empty()
		&& event_id
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
	if valid {
		Ok(())
	} else {
		Err(CoreError::InvalidEventId(event_id.to_string()).into())
	}
}

fn persistence(path: &Path, source: std::io::Error) -> RavenError {
	RavenError::Persistence {
		path: path.to_path_buf(),
		source,
	}
}
