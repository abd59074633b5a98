use crate::request::ReadValueId;
use tokio::sync::mpsc;

/// Signals a subscription emits to its owner.
///
/// Delivery is edge-triggered over a channel: handlers never run inside the
/// subscription's own operations, so they cannot re-enter it.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// Start of a tick, before notification assembly; owners may poke data
    /// sources so freshly sampled values make the next cycle.
    PerformUpdate,
    /// At least one assembled message is pending and publishing is enabled.
    Notification,
    /// A keep-alive announcing the given upcoming sequence number was handed
    /// to the publish engine.
    KeepAlive { future_sequence_number: u32 },
    /// The life-time counter ran out; termination cleanup follows.
    Expired,
    /// The subscription reached its terminal state.
    Terminated,
    /// Fired after the item is registered, before its monitoring mode is
    /// applied, so samplers can be wired first.
    MonitoredItemCreated {
        monitored_item_id: u32,
        item_to_monitor: ReadValueId,
    },
}

/// Best-effort sender of subscription events. A disconnected or absent
/// receiver never fails the emitting operation.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SubscriptionEvent>>,
}

impl EventSink {
    /// A sink with a live receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything; for owners that do not observe events.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: SubscriptionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
