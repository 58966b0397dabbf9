// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background delivery worker.
//!
//! A single task owns the command queue and every in-flight request.
//! Commands are handled in the order they were queued; requests complete in
//! any order.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{RavenError, Result};
use crate::pending::PendingRegistry;
use crate::store::MessageStore;
use crate::transport::{
	classify, encode, Completion, DeliveryOutcome, Disposition, HttpResponse, Transport,
};

/// Work handed to the worker.
#[derive(Debug)]
pub(crate) enum Command {
	/// Deliver a finalized event body.
	Capture(Map<String, Value>),
	/// Re-deliver every stored event.
	Replay,
	/// Answer once everything queued before it reached a terminal outcome.
	Flush(oneshot::Sender<()>),
}

/// Where a delivery came from.
#[derive(Debug, Clone)]
enum Origin {
	Capture,
	Replay(PathBuf),
}

/// A finished request, ready to be classified.
struct Attempt {
	seq: u64,
	event_id: String,
	origin: Origin,
	hops: usize,
	url: String,
	result: Result<HttpResponse>,
}

pub(crate) struct Worker {
	transport: Transport,
	registry: Arc<PendingRegistry>,
	store: MessageStore,
	completions: broadcast::Sender<Completion>,
	keep_replayed: bool,
	in_flight: FuturesUnordered<BoxFuture<'static, Attempt>>,
	/// Sequence numbers of deliveries without a terminal outcome.
	outstanding: BTreeSet<u64>,
	next_seq: u64,
	waiters: Vec<(u64, oneshot::Sender<()>)>,
}

impl Worker {
	pub(crate) fn new(
		transport: Transport,
		registry: Arc<PendingRegistry>,
		store: MessageStore,
		completions: broadcast::Sender<Completion>,
		keep_replayed: bool,
	) -> Self {
		Self {
			transport,
			registry,
			store,
			completions,
			keep_replayed,
			in_flight: FuturesUnordered::new(),
			outstanding: BTreeSet::new(),
			next_seq: 0,
			waiters: Vec::new(),
		}
	}

	/// Spawns the worker on the current runtime.
	pub(crate) fn spawn(self) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let handle = tokio::spawn(self.run(rx));
		(tx, handle)
	}

	/// Runs until the queue is closed and nothing is in flight.
	async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
		debug!(store_url = %self.transport.endpoint().store_url(), "delivery worker started");
		let mut open = true;

		loop {
			self.answer_waiters();
			if !open && self.in_flight.is_empty() {
				break;
			}

			tokio::select! {
				command = rx.recv(), if open => match command {
					Some(Command::Capture(body)) => self.capture(body),
					Some(Command::Replay) => self.replay().await,
					Some(Command::Flush(tx)) => self.waiters.push((self.next_seq, tx)),
					None => open = false,
				},
				Some(attempt) = self.in_flight.next(), if !self.in_flight.is_empty() => {
					self.complete(attempt).await;
				}
			}
		}

		self.answer_waiters();
		info!("delivery worker stopped");
	}

	fn capture(&mut self, body: Map<String, Value>) {
		let (event_id, bytes) = match encode(&body) {
			Ok(encoded) => encoded,
			Err(e) => {
				let event_id = body
					.get("event_id")
					.and_then(Value::as_str)
					.unwrap_or_default()
					.to_string();
				error!(event_id = %event_id, error = %e, "refusing to send malformed event");
				self.notify(event_id, DeliveryOutcome::Dropped);
				return;
			}
		};

		if !self.start(event_id.clone(), bytes, Origin::Capture) {
			warn!(event_id = %event_id, "event is already being delivered, dropping duplicate");
			self.notify(event_id, DeliveryOutcome::Dropped);
		}
	}

	async fn replay(&mut self) {
		let messages = match self.store.load_all().await {
			Ok(messages) => messages,
			Err(e) => {
				warn!(error = %e, "could not read stored events");
				return;
			}
		};

		if !messages.is_empty() {
			info!(count = messages.len(), dir = %self.store.dir().display(), "replaying stored events");
		}

		for message in messages {
			if self.registry.contains(&message.event_id) {
				debug!(event_id = %message.event_id, "stored event already in flight, skipping");
				continue;
			}
			self.start(message.event_id, message.body, Origin::Replay(message.path));
		}
	}

	/// Registers and dispatches a delivery. Returns `false` if the id was
	/// already pending.
	fn start(&mut self, event_id: String, body: Bytes, origin: Origin) -> bool {
		if !self.registry.insert(&event_id, body.clone()) {
			return false;
		}

		let seq = self.next_seq;
		self.next_seq += 1;
		self.outstanding.insert(seq);

		let url = self.transport.endpoint().store_url();
		debug!(event_id = %event_id, url = %url, "dispatching event");
		let attempt = self.dispatch(seq, event_id, origin, 0, url, body);
		self.in_flight.push(attempt);
		true
	}

	fn dispatch(
		&self,
		seq: u64,
		event_id: String,
		origin: Origin,
		hops: usize,
		url: String,
		body: Bytes,
	) -> BoxFuture<'static, Attempt> {
		let request = self.transport.request_to(url, &event_id, body);
		let sender = self.transport.sender();
		async move {
			let result = sender.post(&request).await;
			Attempt {
				seq,
				event_id,
				origin,
				hops,
				url: request.url,
				result,
			}
		}
		.boxed()
	}

	async fn complete(&mut self, attempt: Attempt) {
		let Attempt {
			seq,
			event_id,
			origin,
			hops,
			url,
			result,
		} = attempt;

		match classify(&url, result) {
			Disposition::Redirect(target) if hops < self.transport.max_redirects() => {
				match self.registry.get(&event_id) {
					Some(body) => {
						debug!(event_id = %event_id, from = %url, to = %target, "following redirect");
						let attempt = self.dispatch(seq, event_id, origin, hops + 1, target, body);
						self.in_flight.push(attempt);
					}
					None => {
						error!(event_id = %event_id, "redirected event is no longer pending");
						self.finish(seq, event_id, DeliveryOutcome::Dropped);
					}
				}
			}
			Disposition::Redirect(_) => {
				let error = RavenError::TooManyRedirects(hops + 1);
				self.fail(seq, event_id, origin, error).await;
			}
			Disposition::Delivered => {
				if let Origin::Replay(path) = &origin {
					if !self.keep_replayed {
						if let Err(e) = self.store.remove(path).await {
							warn!(event_id = %event_id, error = %e, "could not remove replayed event");
						}
					}
				}
				self.registry.remove(&event_id);
				debug!(event_id = %event_id, "event delivered");
				self.finish(seq, event_id, DeliveryOutcome::Delivered);
			}
			Disposition::Failed(error) => self.fail(seq, event_id, origin, error).await,
		}
	}

	/// Persists the body of a failed delivery, then releases it.
	async fn fail(&mut self, seq: u64, event_id: String, origin: Origin, error: RavenError) {
		warn!(event_id = %event_id, error = %error, "delivery failed, storing event");

		let outcome = match self.registry.get(&event_id) {
			Some(body) => match self.store.save(&event_id, &body).await {
				Ok(path) => {
					if let Origin::Replay(previous) = &origin {
						if *previous != path {
							if let Err(e) = self.store.remove(previous).await {
								warn!(event_id = %event_id, error = %e, "could not remove superseded event file");
							}
						}
					}
					DeliveryOutcome::Persisted
				}
				Err(e) => {
					error!(event_id = %event_id, error = %e, "could not store event, dropping it");
					DeliveryOutcome::Dropped
				}
			},
			None => DeliveryOutcome::Dropped,
		};

		self.registry.remove(&event_id);
		self.finish(seq, event_id, outcome);
	}

	fn finish(&mut self, seq: u64, event_id: String, outcome: DeliveryOutcome) {
		self.outstanding.remove(&seq);
		self.notify(event_id, outcome);
	}

	fn notify(&self, event_id: String, outcome: DeliveryOutcome) {
		// No receivers is fine.
		let _ = self.completions.send(Completion { event_id, outcome });
	}

	fn answer_waiters(&mut self) {
		let oldest = self.outstanding.first().copied();
		let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
			.into_iter()
			.partition(|(bound, _)| oldest.map_or(true, |seq| seq >= *bound));
		self.waiters = waiting;
		for (_, tx) in ready {
			let _ = tx.send(());
		}
	}
}
