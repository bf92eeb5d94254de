// ── Reactive state stream ──
//
// Subscription type for consuming `DeviceStateMap` changes from a session.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::DeviceStateMap;

/// A subscription to the per-device state map.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct StateStream {
    current: Arc<DeviceStateMap>,
    receiver: watch::Receiver<Arc<DeviceStateMap>>,
}

impl StateStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<DeviceStateMap>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The map captured at creation (or at the last `changed`).
    pub fn current(&self) -> &Arc<DeviceStateMap> {
        &self.current
    }

    /// The latest map, which may be newer than `current`.
    pub fn latest(&self) -> Arc<DeviceStateMap> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<Arc<DeviceStateMap>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> StateWatchStream {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding the map each time it is replaced.
pub struct StateWatchStream {
    inner: WatchStream<Arc<DeviceStateMap>>,
}

impl Stream for StateWatchStream {
    type Item = Arc<DeviceStateMap>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
