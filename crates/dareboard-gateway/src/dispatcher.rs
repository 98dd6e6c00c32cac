use std::sync::Arc;

use tokio::sync::broadcast;

use dareboard_types::events::ChangeNotice;

/// Fans committed changes out to every live-query connection.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every notice and filters by its own user.
    broadcast_tx: broadcast::Sender<ChangeNotice>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish a committed change. Nobody listening is fine.
    pub fn broadcast(&self, notice: ChangeNotice) {
        let _ = self.inner.broadcast_tx.send(notice);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_see_notices_sent_after_subscribing() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(ChangeNotice::Profiles {
            user: Uuid::new_v4(),
            audience: Vec::new(),
        });

        let mut rx = dispatcher.subscribe();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        dispatcher.broadcast(ChangeNotice::Relationships { users: [a, b] });

        let notice = rx.recv().await.unwrap();
        assert!(notice.touches(a) && notice.touches(b));
        assert!(rx.try_recv().is_err());
    }
}
