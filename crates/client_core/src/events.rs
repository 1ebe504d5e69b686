//! Typed publish/subscribe between the client core and its screens.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Warning,
            message: message.into(),
        }
    }
}

/// Lists a screen may be asked to reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefetchTopic {
    HomeFeed,
    /// Every home list, after something that hides content everywhere.
    HomeAll,
    ClubListScrollToTop,
    ClubNotifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    SessionReplaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Logout { reason: LogoutReason },
    Refetch(RefetchTopic),
    Toast(Toast),
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: AppEvent) {
        // No receivers is fine: nobody is on screen to care.
        if self.tx.send(event).is_err() {
            tracing::trace!("events: published with no subscribers");
        }
    }

    pub fn toast(&self, toast: Toast) {
        self.publish(AppEvent::Toast(toast));
    }

    pub fn refetch(&self, topic: RefetchTopic) {
        self.publish(AppEvent::Refetch(topic));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_typed_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.refetch(RefetchTopic::HomeFeed);
        bus.toast(Toast::warning("boom"));

        assert_eq!(
            rx.recv().await.expect("event"),
            AppEvent::Refetch(RefetchTopic::HomeFeed)
        );
        assert_eq!(
            rx.recv().await.expect("event"),
            AppEvent::Toast(Toast::warning("boom"))
        );
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new(0);
        bus.publish(AppEvent::Logout {
            reason: LogoutReason::UserRequested,
        });
    }
}
