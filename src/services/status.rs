use tokio::sync::broadcast;

/// Event pushed to web clients whenever a printer's observable state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatusEvent {
    pub printer_id: i64,
}

/// Fan-out of printer status changes to connected web clients.
///
/// Sending never blocks and never fails from the caller's point of view:
/// with no subscribers the event is dropped, and slow subscribers lose the
/// oldest events once the channel is full.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn notify(&self, printer_id: i64) {
        let receivers = self.tx.send(StatusEvent { printer_id }).unwrap_or(0);
        tracing::debug!(printer_id, receivers, "Printer status change broadcast");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let notifier = StatusNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.notify(42);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.printer_id, 42);
    }

    #[test]
    fn notify_without_subscribers_is_a_no_op() {
        let notifier = StatusNotifier::default();
        notifier.notify(1);
    }

    #[tokio::test]
    async fn lagging_subscriber_sees_lag_then_latest() {
        let notifier = StatusNotifier::new(2);
        let mut rx = notifier.subscribe();

        for id in 1..=4 {
            notifier.notify(id);
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().printer_id, 3);
        assert_eq!(rx.recv().await.unwrap().printer_id, 4);
    }
}
