use crate::notification::{ItemNotification, NotificationMessage};
use crate::request::MonitoredItemSpec;
use crate::types::{MonitoringMode, NodeClass, NodeId};

/// A notification message ready to be paired with a parked publish request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingNotification {
    pub subscription_id: u32,
    pub message: NotificationMessage,
    /// Sequence numbers still available for republish: the retransmission
    /// queue first, then the not-yet-sent pending queue.
    pub available_sequence_numbers: Vec<u32>,
    /// True when the subscription has further messages queued.
    pub more_notifications: bool,
}

/// The slice of the session publish engine a subscription consumes.
///
/// The engine is shared across the subscriptions of a session; all methods
/// must return promptly and implementations use interior mutability. Sends
/// consume one parked client publish request each.
pub trait PublishEngine: Send + Sync {
    /// Client publish requests currently parked, waiting for a subscription
    /// that has something to say.
    fn pending_publish_request_count(&self) -> usize;

    /// Consume one parked request and emit this message. Callers check
    /// [`Self::pending_publish_request_count`] first; the engine drops the
    /// message if no request is actually left.
    fn send_notification_message(&self, notification: OutgoingNotification);

    /// Consume one parked request to emit a keep-alive announcing the next
    /// sequence number. Returns false when no request could be consumed.
    fn send_keep_alive_response(&self, subscription_id: u32, future_sequence_number: u32) -> bool;

    /// Invoked at the start of every subscription tick.
    fn on_tick(&self) {}
}

/// The capability set a subscription needs from each of its monitored items.
/// Sampling and queueing internals stay behind this trait.
pub trait MonitoredItem: Send {
    fn client_handle(&self) -> u32;
    fn sampling_interval(&self) -> f64;
    fn queue_size(&self) -> u32;
    fn monitoring_mode(&self) -> MonitoringMode;
    fn node_id(&self) -> &NodeId;

    fn set_monitoring_mode(&mut self, mode: MonitoringMode);

    /// Drain the notifications queued since the last call, oldest first.
    fn extract_notifications(&mut self) -> Vec<ItemNotification>;

    /// Release sampling resources; the item is dropped right after.
    fn terminate(&mut self);
}

/// Constructs the opaque monitored item from validated, revised parameters.
/// Owners wire samplers to the item when the created signal fires.
pub trait MonitoredItemFactory: Send + Sync {
    fn create(&self, spec: &MonitoredItemSpec) -> Box<dyn MonitoredItem>;
}

/// What monitored-item validation needs to know about a resolved node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub node_class: NodeClass,
    /// Data type of the value, for Variable nodes.
    pub data_type: Option<NodeId>,
    /// The node's MinimumSamplingInterval attribute in milliseconds, when it
    /// reports one. 0 means exception-based reporting.
    pub minimum_sampling_interval: Option<f64>,
}

/// Read-only view of the address space used by the creation path.
pub trait AddressSpace: Send + Sync {
    fn find_node(&self, node_id: &NodeId) -> Option<NodeInfo>;

    /// Whether `data_type` equals `super_type` or derives from it.
    fn is_subtype_of(&self, data_type: &NodeId, super_type: &NodeId) -> bool;
}

/// Process-wide view of live subscriptions, injected rather than global.
pub trait SubscriptionRegistry: Send + Sync {
    /// Called once the periodic ticker is armed.
    fn register(&self, subscription_id: u32);
    /// Called once the subscription is closed.
    fn unregister(&self, subscription_id: u32);
}
