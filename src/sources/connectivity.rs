use tokio::sync::watch;

pub trait ConnectivitySource: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every online/offline change after subscribing.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state pushed by the host's OS callbacks.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            log::info!("connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }
}

impl ConnectivitySource for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();
        assert!(!monitor.is_online());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn repeated_state_is_not_a_change() {
        let monitor = ConnectivityMonitor::new(true);
        let rx = monitor.subscribe();
        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
