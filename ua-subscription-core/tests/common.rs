//! Shared fakes for driving a subscription deterministically: a scripted
//! publish engine, an in-memory address space, and a factory producing
//! monitored items whose notification queues the tests feed by hand.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::Level;
use ua_subscription_core::{Subscription, SubscriptionOptions};
use ua_subscription_sdk::{
    data_type_ids, AddressSpace, DataValue, EventFieldList, EventSink, Identifier,
    ItemNotification, MonitoredItem, MonitoredItemCreateRequest, MonitoredItemFactory,
    MonitoredItemNotification, MonitoredItemSpec, MonitoringMode, MonitoringParameters, NodeClass,
    NodeId, NodeInfo, OutgoingNotification, PublishEngine, ReadValueId, SubscriptionEvent,
    Variant,
};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

/// Publish engine fake holding a scripted number of parked requests.
#[derive(Default)]
pub struct TestEngine {
    pending: AtomicUsize,
    notifications: Mutex<Vec<OutgoingNotification>>,
    keep_alives: Mutex<Vec<(u32, u32)>>,
}

impl TestEngine {
    pub fn with_requests(count: usize) -> Arc<Self> {
        let engine = Arc::new(Self::default());
        engine.park_requests(count);
        engine
    }

    pub fn park_requests(&self, count: usize) {
        self.pending.fetch_add(count, Ordering::SeqCst);
    }

    fn consume_request(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }

    pub fn notifications(&self) -> Vec<OutgoingNotification> {
        self.notifications.lock().unwrap().clone()
    }

    /// (subscription_id, future_sequence_number) pairs, in send order.
    pub fn keep_alives(&self) -> Vec<(u32, u32)> {
        self.keep_alives.lock().unwrap().clone()
    }
}

impl PublishEngine for TestEngine {
    fn pending_publish_request_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn send_notification_message(&self, notification: OutgoingNotification) {
        if self.consume_request() {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    fn send_keep_alive_response(&self, subscription_id: u32, future_sequence_number: u32) -> bool {
        if !self.consume_request() {
            return false;
        }
        self.keep_alives
            .lock()
            .unwrap()
            .push((subscription_id, future_sequence_number));
        true
    }
}

pub struct TestMonitoredItem {
    client_handle: u32,
    sampling_interval: f64,
    queue_size: u32,
    mode: MonitoringMode,
    node_id: NodeId,
    queue: Arc<Mutex<Vec<ItemNotification>>>,
    terminated: Arc<AtomicBool>,
}

impl MonitoredItem for TestMonitoredItem {
    fn client_handle(&self) -> u32 {
        self.client_handle
    }

    fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    fn queue_size(&self) -> u32 {
        self.queue_size
    }

    fn monitoring_mode(&self) -> MonitoringMode {
        self.mode
    }

    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn set_monitoring_mode(&mut self, mode: MonitoringMode) {
        self.mode = mode;
    }

    fn extract_notifications(&mut self) -> Vec<ItemNotification> {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }

    fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Factory keeping a handle onto every created item's queue so tests can
/// feed notifications after the fact.
#[derive(Default)]
pub struct TestItemFactory {
    queues: Mutex<HashMap<u32, Arc<Mutex<Vec<ItemNotification>>>>>,
    terminated: Mutex<HashMap<u32, Arc<AtomicBool>>>,
}

impl TestItemFactory {
    pub fn push(&self, monitored_item_id: u32, notification: ItemNotification) {
        let queues = self.queues.lock().unwrap();
        let queue = queues
            .get(&monitored_item_id)
            .expect("unknown monitored item id");
        queue.lock().unwrap().push(notification);
    }

    pub fn push_data_change(&self, monitored_item_id: u32, client_handle: u32, value: u32) {
        self.push(
            monitored_item_id,
            ItemNotification::DataChange(MonitoredItemNotification {
                client_handle,
                value: DataValue::new_now(Variant::UInt32(value)),
            }),
        );
    }

    pub fn push_event(&self, monitored_item_id: u32, client_handle: u32) {
        self.push(
            monitored_item_id,
            ItemNotification::Event(EventFieldList {
                client_handle,
                event_fields: vec![Variant::String("alarm".into())],
            }),
        );
    }

    pub fn is_terminated(&self, monitored_item_id: u32) -> bool {
        self.terminated
            .lock()
            .unwrap()
            .get(&monitored_item_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl MonitoredItemFactory for TestItemFactory {
    fn create(&self, spec: &MonitoredItemSpec) -> Box<dyn MonitoredItem> {
        let queue = Arc::new(Mutex::new(Vec::new()));
        let terminated = Arc::new(AtomicBool::new(false));
        self.queues
            .lock()
            .unwrap()
            .insert(spec.id, Arc::clone(&queue));
        self.terminated
            .lock()
            .unwrap()
            .insert(spec.id, Arc::clone(&terminated));
        Box::new(TestMonitoredItem {
            client_handle: spec.client_handle,
            sampling_interval: spec.sampling_interval,
            queue_size: spec.queue_size,
            mode: spec.monitoring_mode,
            node_id: spec.item_to_monitor.node_id.clone(),
            queue,
            terminated,
        })
    }
}

/// In-memory address space with a type hierarchy just deep enough for
/// deadband validation.
#[derive(Default)]
pub struct TestAddressSpace {
    nodes: HashMap<NodeId, NodeInfo>,
}

impl TestAddressSpace {
    pub fn add_variable(
        &mut self,
        node_id: NodeId,
        data_type: u32,
        minimum_sampling_interval: Option<f64>,
    ) {
        self.nodes.insert(
            node_id.clone(),
            NodeInfo {
                node_id,
                node_class: NodeClass::Variable,
                data_type: Some(NodeId::numeric(0, data_type)),
                minimum_sampling_interval,
            },
        );
    }

    pub fn add_object(&mut self, node_id: NodeId) {
        self.nodes.insert(
            node_id.clone(),
            NodeInfo {
                node_id,
                node_class: NodeClass::Object,
                data_type: None,
                minimum_sampling_interval: None,
            },
        );
    }
}

impl AddressSpace for TestAddressSpace {
    fn find_node(&self, node_id: &NodeId) -> Option<NodeInfo> {
        self.nodes.get(node_id).cloned()
    }

    fn is_subtype_of(&self, data_type: &NodeId, super_type: &NodeId) -> bool {
        if data_type == super_type {
            return true;
        }
        let (Identifier::Numeric(dt), Identifier::Numeric(st)) =
            (&data_type.identifier, &super_type.identifier)
        else {
            return false;
        };
        if data_type.namespace != 0 || super_type.namespace != 0 {
            return false;
        }
        let numeric = matches!(
            *dt,
            data_type_ids::SBYTE
                | data_type_ids::BYTE
                | data_type_ids::INT16
                | data_type_ids::UINT16
                | data_type_ids::INT32
                | data_type_ids::UINT32
                | data_type_ids::INT64
                | data_type_ids::UINT64
                | data_type_ids::FLOAT
                | data_type_ids::DOUBLE
                | data_type_ids::INTEGER
                | data_type_ids::UINTEGER
        );
        *st == data_type_ids::NUMBER && numeric
    }
}

pub fn double_node() -> NodeId {
    NodeId::numeric(1, 100)
}

pub fn string_node() -> NodeId {
    NodeId::numeric(1, 101)
}

pub fn object_node() -> NodeId {
    NodeId::numeric(1, 200)
}

/// Address space with one double variable, one string variable and one
/// plain object.
pub fn default_space() -> TestAddressSpace {
    let mut space = TestAddressSpace::default();
    space.add_variable(double_node(), data_type_ids::DOUBLE, None);
    space.add_variable(string_node(), data_type_ids::STRING, None);
    space.add_object(object_node());
    space
}

/// Options tuned for tick-by-tick tests: shortest interval, small counters.
pub fn fast_options() -> SubscriptionOptions {
    SubscriptionOptions {
        publishing_interval_ms: 100,
        max_keep_alive_count: 3,
        life_time_count: 9,
        max_notifications_per_publish: 0,
        publishing_enabled: true,
        priority: 0,
    }
}

pub fn new_subscription(options: SubscriptionOptions) -> (Subscription, Arc<TestItemFactory>) {
    init_tracing();
    let factory = Arc::new(TestItemFactory::default());
    let subscription = Subscription::new(
        1,
        7,
        options,
        Arc::clone(&factory) as Arc<dyn MonitoredItemFactory>,
        EventSink::disabled(),
    );
    (subscription, factory)
}

pub fn new_subscription_with_events(
    options: SubscriptionOptions,
) -> (
    Subscription,
    Arc<TestItemFactory>,
    UnboundedReceiver<SubscriptionEvent>,
) {
    init_tracing();
    let factory = Arc::new(TestItemFactory::default());
    let (events, event_rx) = EventSink::channel();
    let subscription = Subscription::new(
        1,
        7,
        options,
        Arc::clone(&factory) as Arc<dyn MonitoredItemFactory>,
        events,
    );
    (subscription, factory, event_rx)
}

pub fn value_request(node_id: NodeId, client_handle: u32) -> MonitoredItemCreateRequest {
    MonitoredItemCreateRequest {
        item_to_monitor: ReadValueId::new_value(node_id),
        monitoring_mode: MonitoringMode::Reporting,
        requested_parameters: MonitoringParameters {
            client_handle,
            sampling_interval: -1.0,
            filter: None,
            queue_size: 10,
            discard_oldest: true,
        },
    }
}

/// Drain whatever events are currently queued.
pub fn drain_events(rx: &mut UnboundedReceiver<SubscriptionEvent>) -> Vec<SubscriptionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
