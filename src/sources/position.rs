use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PositionError;
use crate::models::Position;

const SUBSCRIPTION_BUFFER: usize = 64;

pub type PositionUpdate = Result<Position, PositionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }
}

pub trait PositionSource: Send + Sync {
    /// Start delivering updates. Updates stop once the returned subscription
    /// is unsubscribed or dropped.
    fn watch(&self, options: WatchOptions) -> PositionSubscription;
}

/// Live stream of position updates.
pub struct PositionSubscription {
    updates: mpsc::Receiver<PositionUpdate>,
    cancel: CancellationToken,
}

impl PositionSubscription {
    pub fn new(updates: mpsc::Receiver<PositionUpdate>, cancel: CancellationToken) -> Self {
        Self { updates, cancel }
    }

    /// Next update, or `None` once the source has gone away.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.updates.recv().await
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        self.updates.close();
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Watcher {
    sender: mpsc::Sender<PositionUpdate>,
    cancel: CancellationToken,
}

/// Position source fed by the host through a [`PositionFeed`]. Each `watch`
/// gets its own channel; updates fan out to every live subscription.
#[derive(Clone, Default)]
pub struct ChannelPositionSource {
    watchers: Arc<Mutex<Vec<Watcher>>>,
}

/// Producer half of a [`ChannelPositionSource`].
#[derive(Clone)]
pub struct PositionFeed {
    watchers: Arc<Mutex<Vec<Watcher>>>,
}

impl ChannelPositionSource {
    pub fn new() -> (Self, PositionFeed) {
        let source = Self::default();
        let feed = PositionFeed {
            watchers: Arc::clone(&source.watchers),
        };
        (source, feed)
    }
}

impl PositionSource for ChannelPositionSource {
    fn watch(&self, _options: WatchOptions) -> PositionSubscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        let mut guard = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(Watcher {
            sender,
            cancel: cancel.clone(),
        });
        PositionSubscription::new(receiver, cancel)
    }
}

impl PositionFeed {
    /// Deliver an update to every live subscription. Returns how many received it.
    pub fn push(&self, update: PositionUpdate) -> usize {
        let mut guard = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|watcher| !watcher.cancel.is_cancelled() && !watcher.sender.is_closed());

        let mut delivered = 0;
        for watcher in guard.iter() {
            match watcher.sender.try_send(update.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("position subscriber lagging; dropping update");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    pub fn push_position(&self, position: Position) -> usize {
        self.push(Ok(position))
    }

    pub fn push_error(&self, error: PositionError) -> usize {
        self.push(Err(error))
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .iter()
            .filter(|watcher| !watcher.cancel.is_cancelled() && !watcher.sender.is_closed())
            .count()
    }
}
