//! Fan-out of [`ClientEvent`]s to UI observers.
//!
//! The connection driver is the only publisher. Observers call
//! [`EventBus::subscribe`] (through `RealtimeClient::events`) and get a
//! change hint for every lifecycle transition and projection update made
//! after they subscribed. Past events are not replayed; the projection is
//! the source of truth for current state.

use tokio::sync::broadcast;

use super::ClientEvent;

/// Cloneable handle to the client's event stream.
///
/// Backed by a bounded [`broadcast`] ring. An observer that falls more than
/// `capacity` events behind gets [`broadcast::error::RecvError::Lagged`] and
/// should re-read the projection instead of trying to catch up.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per observer
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hands `event` to every current observer and returns how many got
    /// it. With nobody listening the event is discarded.
    pub fn publish(&self, event: ClientEvent) -> usize {
        match self.sender.send(event) {
            Ok(observers) => observers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event = event.event_type_str(), "no event observers");
                0
            }
        }
    }

    /// Starts observing events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    fn replaced(count: usize) -> ClientEvent {
        ClientEvent::NotificationsReplaced { count }
    }

    #[test]
    fn events_without_observers_are_discarded() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(replaced(1)), 0);
    }

    #[tokio::test]
    async fn observers_only_see_later_events() {
        let bus = EventBus::new(4);
        bus.publish(replaced(1));
        let mut early = bus.subscribe();
        bus.publish(replaced(2));
        let mut late = bus.subscribe();

        assert_eq!(bus.publish(replaced(3)), 2);
        let Ok(ClientEvent::NotificationsReplaced { count }) = early.recv().await else {
            panic!("early observer should see the second event");
        };
        assert_eq!(count, 2);
        let Ok(ClientEvent::NotificationsReplaced { count }) = late.recv().await else {
            panic!("late observer should see the third event");
        };
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn slow_observer_is_told_it_lagged() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for count in 0..5 {
            bus.publish(replaced(count));
        }

        let Err(RecvError::Lagged(skipped)) = rx.recv().await else {
            panic!("observer should have lagged");
        };
        assert_eq!(skipped, 3);
        let Ok(ClientEvent::NotificationsReplaced { count }) = rx.recv().await else {
            panic!("observer should resume with the oldest retained event");
        };
        assert_eq!(count, 3);
    }
}
