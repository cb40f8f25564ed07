// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of snapshots to live subscribers.
//!
//! [`SnapshotBroadcaster`] holds the current snapshot and a set of subscribers. Publishing and
//! subscribing take the same lock, so a new subscriber sees either the snapshot before a publish
//! (and then receives the publish) or the one after, never both and never neither.

use crate::snapshot::DashboardSnapshot;
use futures::Stream;
use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

#[derive(Debug)]
struct BroadcasterState {
    current: Arc<DashboardSnapshot>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<Arc<DashboardSnapshot>>,
}

/// A publish/subscribe hub for [`DashboardSnapshot`]s.
#[derive(Debug)]
pub struct SnapshotBroadcaster {
    state: Mutex<BroadcasterState>,
}

impl SnapshotBroadcaster {
    /// Creates a broadcaster whose current snapshot is `initial`.
    pub fn new(initial: DashboardSnapshot) -> Self {
        Self {
            state: Mutex::new(BroadcasterState {
                current: Arc::new(initial),
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Makes `snapshot` current and pushes it to every subscriber.
    ///
    /// Subscribers whose receiving side has gone away are dropped.
    pub fn publish(&self, snapshot: DashboardSnapshot) {
        let snapshot = Arc::new(snapshot);
        let mut state = self.lock();
        state.current = snapshot.clone();
        state.subscribers.retain(|subscriber| {
            let delivered = subscriber.sender.send(snapshot.clone()).is_ok();
            if !delivered {
                debug!(subscriber = subscriber.id, "dropping disconnected subscriber");
            }
            delivered
        });
    }

    /// Registers a new subscriber.
    ///
    /// The returned [`Subscription`] holds the current snapshot and a stream of every snapshot
    /// published afterwards.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(Subscriber { id, sender });
        debug!(subscriber = id, "registered subscriber");

        Subscription {
            initial: state.current.clone(),
            updates: UnboundedReceiverStream::new(receiver),
        }
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> Arc<DashboardSnapshot> {
        self.lock().current.clone()
    }

    /// Returns the number of registered subscribers.
    ///
    /// Subscribers that disconnected are only noticed, and removed, on the next publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BroadcasterState> {
        // Sends never panic, so the state is consistent even if poisoned.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A live subscription to a [`SnapshotBroadcaster`].
///
/// Dropping the subscription disconnects it.
#[derive(Debug)]
pub struct Subscription {
    initial: Arc<DashboardSnapshot>,
    updates: UnboundedReceiverStream<Arc<DashboardSnapshot>>,
}

impl Subscription {
    /// The snapshot that was current when the subscription was created.
    pub fn initial(&self) -> &Arc<DashboardSnapshot> {
        &self.initial
    }

    /// Splits the subscription into its initial snapshot and the stream of later ones.
    pub fn into_parts(self) -> (Arc<DashboardSnapshot>, SnapshotStream) {
        (self.initial, SnapshotStream(self.updates))
    }
}

/// The stream of snapshots published after a [`Subscription`] was created.
#[derive(Debug)]
pub struct SnapshotStream(UnboundedReceiverStream<Arc<DashboardSnapshot>>);

impl Stream for SnapshotStream {
    type Item = Arc<DashboardSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.0).poll_next(cx)
    }
}
