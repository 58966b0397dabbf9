// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-flight delivery registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

/// Insert/remove counters of a [`PendingRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
	pub inserted: u64,
	pub removed: u64,
}

/// Serialized bodies of deliveries that have not reached a terminal outcome,
/// keyed by event id.
///
/// The lock is only held for the map operation itself, never across a
/// network call.
#[derive(Debug, Default)]
pub struct PendingRegistry {
	entries: Mutex<HashMap<String, Bytes>>,
	inserted: AtomicU64,
	removed: AtomicU64,
	drained: Notify,
}

impl PendingRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a body. Returns `false` if the id was already pending, in
	/// which case the existing entry is kept.
	pub(crate) fn insert(&self, event_id: &str, body: Bytes) -> bool {
		let mut entries = self.lock();
		if entries.contains_key(event_id) {
			return false;
		}
		entries.insert(event_id.to_string(), body);
		self.inserted.fetch_add(1, Ordering::SeqCst);
		true
	}

	/// Removes an entry, waking drain waiters once the registry is empty.
	pub(crate) fn remove(&self, event_id: &str) -> Option<Bytes> {
		let (body, now_empty) = {
			let mut entries = self.lock();
			let body = entries.remove(event_id);
			(body, entries.is_empty())
		};

		if body.is_some() {
			self.removed.fetch_add(1, Ordering::SeqCst);
		}
		if now_empty {
			self.drained.notify_waiters();
		}
		body
	}

	pub fn get(&self, event_id: &str) -> Option<Bytes> {
		self.lock().get(event_id).cloned()
	}

	pub fn contains(&self, event_id: &str) -> bool {
		self.lock().contains_key(event_id)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn stats(&self) -> PendingStats {
		PendingStats {
			inserted: self.inserted.load(Ordering::SeqCst),
			removed: self.removed.load(Ordering::SeqCst),
		}
	}

	/// Resolves once no delivery is pending.
	pub async fn wait_until_empty(&self) {
		loop {
			let notified = self.drained.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			if self.is_empty() {
				return;
			}
			notified.await;
		}
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::time::Duration;

	#[test]
	fn insert_and_remove_update_stats() {
		let registry = PendingRegistry::new();

		assert!(registry.insert("a", Bytes::from_static(b"{}")));
		assert!(registry.insert("b", Bytes::from_static(b"{}")));
		assert_eq!(registry.len(), 2);

		assert_eq!(registry.remove("a"), Some(Bytes::from_static(b"{}")));
		assert_eq!(registry.remove("a"), None);

		assert_eq!(
			registry.stats(),
			PendingStats {
				inserted: 2,
				removed: 1
			}
		);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn duplicate_insert_keeps_first_body() {
		let registry = PendingRegistry::new();

		assert!(registry.insert("a", Bytes::from_static(b"first")));
		assert!(!registry.insert("a", Bytes::from_static(b"second")));

		assert_eq!(registry.get("a"), Some(Bytes::from_static(b"first")));
		assert_eq!(registry.stats().inserted, 1);
	}

	#[tokio::test]
	async fn wait_until_empty_returns_immediately_when_empty() {
		let registry = PendingRegistry::new();
		tokio::time::timeout(Duration::from_secs(1), registry.wait_until_empty())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn wait_until_empty_wakes_on_last_removal() {
		let registry = Arc::new(PendingRegistry::new());
		registry.insert("a", Bytes::new());
		registry.insert("b", Bytes::new());

		let waiter = {
			let registry = Arc::clone(&registry);
			tokio::spawn(async move { registry.wait_until_empty().await })
		};

		tokio::time::sleep(Duration::from_millis(10)).await;
		registry.remove("a");
		assert!(!waiter.is_finished());
		registry.remove("b");

		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_inserts_and_removes_balance() {
		let registry = Arc::new(PendingRegistry::new());

		let tasks: Vec<_> = (0..64)
			.map(|i| {
				let registry = Arc::clone(&registry);
				tokio::spawn(async move {
					let id = format!("event-{i}");
					registry.insert(&id, Bytes::from(id.clone()));
					tokio::task::yield_now().await;
					registry.remove(&id);
				})
			})
			.collect();

		for task in tasks {
			task.await.unwrap();
		}

		assert!(registry.is_empty());
		assert_eq!(
			registry.stats(),
			PendingStats {
				inserted: 64,
				removed: 64
			}
		);
	}
}
