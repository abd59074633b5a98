use crate::assemble::assemble_records;
use crate::create::validate_create_request;
use crate::diagnostics::SubscriptionDiagnostics;
use crate::options::{revise_timing, ModifyParams, RevisedTiming, SubscriptionOptions};
use crate::record::NotificationRecord;
use crate::retransmit::RetransmissionQueue;
use crate::sequence::SequenceNumbers;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use ua_subscription_sdk::{
    AddressSpace, EventSink, MonitoredItem, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemFactory, MonitoredItemSpec, MonitoringMode, NotificationData, NotificationMessage,
    OutgoingNotification, PublishEngine, StatusChangeNotification, StatusCode, SubscriptionEvent,
    TimestampsToReturn,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SubscriptionState {
    /// Constructed, ticker not armed yet.
    Creating,
    Normal,
    /// Had something to say, but no publish request was parked.
    Late,
    /// The last cycle produced only a keep-alive; behaves like Normal.
    KeepAlive,
    /// Terminal.
    Closed,
}

/// Outcome of one publish cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TickResult {
    pub closed: bool,
    /// More assembled messages are deliverable right now; the owner should
    /// run a prompt follow-up cycle instead of waiting a full period.
    pub more_notifications: bool,
}

/// Result of a GetMonitoredItems call: parallel handle arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredItemHandles {
    /// The monitored-item ids.
    pub server_handles: Vec<u32>,
    pub client_handles: Vec<u32>,
    pub status: StatusCode,
}

#[derive(Debug, Default)]
struct Counters {
    modify: u64,
    enable: u64,
    disable: u64,
    republish_request: u64,
    notifications: u64,
    publish_request: u64,
    data_change_notifications: u64,
    event_notifications: u64,
}

/// Per-client-subscription publishing state machine.
///
/// Fully synchronous: time arrives as [`Subscription::tick`] calls, publish
/// requests through the [`PublishEngine`] capability. All operations must be
/// serialized by the owner; [`crate::SubscriptionActor`] does exactly that.
pub struct Subscription {
    id: u32,
    session_id: u32,
    priority: u8,
    publishing_interval_ms: u64,
    max_keep_alive_count: u32,
    life_time_count: u32,
    max_notifications_per_publish: u32,
    publishing_enabled: bool,
    state: SubscriptionState,

    /// Ticks since creation; the logical clock notification aging runs on.
    publish_interval_count: u64,
    keep_alive_counter: u32,
    life_time_counter: u32,

    monitored_items: BTreeMap<u32, Box<dyn MonitoredItem>>,
    monitored_item_id_counter: u32,

    pending_notifications: VecDeque<NotificationRecord>,
    sent_notifications: RetransmissionQueue,
    sequence: SequenceNumbers,

    counters: Counters,
    events: EventSink,
    factory: Arc<dyn MonitoredItemFactory>,
}

impl Subscription {
    pub fn new(
        id: u32,
        session_id: u32,
        options: SubscriptionOptions,
        factory: Arc<dyn MonitoredItemFactory>,
        events: EventSink,
    ) -> Self {
        let options = options.revised();
        debug!(
            subscription_id = id,
            session_id,
            publishing_interval_ms = options.publishing_interval_ms,
            max_keep_alive_count = options.max_keep_alive_count,
            life_time_count = options.life_time_count,
            "subscription created"
        );
        Self {
            id,
            session_id,
            priority: options.priority,
            publishing_interval_ms: options.publishing_interval_ms,
            max_keep_alive_count: options.max_keep_alive_count,
            life_time_count: options.life_time_count,
            max_notifications_per_publish: options.max_notifications_per_publish,
            publishing_enabled: options.publishing_enabled,
            state: SubscriptionState::Creating,
            publish_interval_count: 0,
            keep_alive_counter: 0,
            life_time_counter: 0,
            monitored_items: BTreeMap::new(),
            monitored_item_id_counter: 0,
            pending_notifications: VecDeque::new(),
            sent_notifications: RetransmissionQueue::new(),
            sequence: SequenceNumbers::new(),
            counters: Counters::default(),
            events,
            factory,
        }
    }

    /// Mark the periodic ticker as armed. Priming the keep-alive counter to
    /// its maximum forces a keep-alive at the end of the first cycle if
    /// nothing else is produced, so the client hears from us right away.
    pub fn start(&mut self) {
        if self.state != SubscriptionState::Creating {
            return;
        }
        self.keep_alive_counter = self.max_keep_alive_count;
        self.set_state(SubscriptionState::Normal);
    }

    /// Run one publish cycle.
    pub fn tick(&mut self, engine: &dyn PublishEngine) -> TickResult {
        if self.state == SubscriptionState::Closed {
            return TickResult {
                closed: true,
                more_notifications: false,
            };
        }
        engine.on_tick();
        self.events.emit(SubscriptionEvent::PerformUpdate);
        self.publish_interval_count += 1;
        self.life_time_counter += 1;
        trace!(
            subscription_id = self.id,
            tick = self.publish_interval_count,
            life_time_counter = self.life_time_counter,
            keep_alive_counter = self.keep_alive_counter,
            "publish cycle"
        );

        if self.life_time_counter >= self.life_time_count {
            info!(
                subscription_id = self.id,
                life_time_count = self.life_time_count,
                "life-time expired, closing subscription"
            );
            self.events.emit(SubscriptionEvent::Expired);
            self.close();
            return TickResult {
                closed: true,
                more_notifications: false,
            };
        }

        // Drain monitored items only when a publish request is parked, so no
        // sequence number is burned on messages nobody can take.
        if engine.pending_publish_request_count() > 0 {
            self.collect_notifications();
        }

        if self.publishing_enabled && !self.pending_notifications.is_empty() {
            self.events.emit(SubscriptionEvent::Notification);
            if engine.pending_publish_request_count() > 0 {
                self.publish_one(engine);
                self.set_state(SubscriptionState::Normal);
            } else {
                self.set_state(SubscriptionState::Late);
            }
        } else {
            self.tick_keep_alive(engine);
        }

        TickResult {
            closed: false,
            more_notifications: self.has_deliverable_notifications(),
        }
    }

    /// A publish request was just parked for this session. A Late
    /// subscription owes the client a response and answers immediately;
    /// every other state waits for its next cycle.
    pub fn on_publish_request_arrived(&mut self, engine: &dyn PublishEngine) {
        if self.state != SubscriptionState::Late {
            return;
        }
        if engine.pending_publish_request_count() > 0 {
            self.collect_notifications();
        }
        if self.publishing_enabled && !self.pending_notifications.is_empty() {
            self.publish_one(engine);
            self.set_state(SubscriptionState::Normal);
        } else {
            self.try_send_keep_alive(engine);
        }
    }

    fn has_deliverable_notifications(&self) -> bool {
        matches!(
            self.state,
            SubscriptionState::Normal | SubscriptionState::KeepAlive
        ) && self.publishing_enabled
            && !self.pending_notifications.is_empty()
    }

    fn collect_notifications(&mut self) {
        let mut stream = Vec::new();
        for item in self.monitored_items.values_mut() {
            stream.extend(item.extract_notifications());
        }
        if stream.is_empty() {
            return;
        }
        let records = assemble_records(
            stream,
            self.max_notifications_per_publish,
            &mut self.sequence,
            self.publish_interval_count,
        );
        trace!(
            subscription_id = self.id,
            messages = records.len(),
            "assembled notification messages"
        );
        self.pending_notifications.extend(records);
    }

    /// Take the oldest assembled message for sending. The record moves into
    /// the retransmission queue and both activity counters reset.
    pub fn pop_notification_to_send(&mut self) -> Option<NotificationMessage> {
        let record = self.pending_notifications.pop_front()?;
        let message = record.message();
        self.sent_notifications.append(
            record,
            self.publish_interval_count,
            self.max_keep_alive_count,
        );
        self.reset_keep_alive_counter();
        self.reset_life_time_counter();
        Some(message)
    }

    fn publish_one(&mut self, engine: &dyn PublishEngine) {
        let Some(message) = self.pop_notification_to_send() else {
            return;
        };
        for data in &message.notification_data {
            self.counters.notifications += data.notification_count() as u64;
            match data {
                NotificationData::DataChange(_) => self.counters.data_change_notifications += 1,
                NotificationData::Events(_) => self.counters.event_notifications += 1,
                NotificationData::StatusChange(_) => {}
            }
        }
        let more_notifications = !self.pending_notifications.is_empty();
        debug!(
            subscription_id = self.id,
            sequence_number = message.sequence_number,
            more_notifications,
            "sending notification message"
        );
        engine.send_notification_message(OutgoingNotification {
            subscription_id: self.id,
            available_sequence_numbers: self.available_sequence_numbers(),
            more_notifications,
            message,
        });
        self.counters.publish_request += 1;
    }

    fn tick_keep_alive(&mut self, engine: &dyn PublishEngine) {
        self.keep_alive_counter += 1;
        if self.keep_alive_counter < self.max_keep_alive_count {
            return;
        }
        if !self.try_send_keep_alive(engine) {
            // Owed a response with nothing parked; retry every cycle and
            // answer as soon as a request arrives.
            self.keep_alive_counter = self.max_keep_alive_count;
            self.set_state(SubscriptionState::Late);
        }
    }

    /// Hand a keep-alive to the engine; announces the sequence number the
    /// next real message will carry without consuming it.
    fn try_send_keep_alive(&mut self, engine: &dyn PublishEngine) -> bool {
        let future_sequence_number = self.sequence.future();
        if !engine.send_keep_alive_response(self.id, future_sequence_number) {
            return false;
        }
        debug!(
            subscription_id = self.id,
            future_sequence_number, "sent keep-alive"
        );
        self.counters.publish_request += 1;
        self.reset_keep_alive_counter();
        self.reset_life_time_counter();
        self.set_state(SubscriptionState::KeepAlive);
        self.events.emit(SubscriptionEvent::KeepAlive {
            future_sequence_number,
        });
        true
    }

    /// Validate a create request and register the resulting monitored item.
    pub fn create_monitored_item(
        &mut self,
        space: &dyn AddressSpace,
        timestamps_to_return: TimestampsToReturn,
        request: &MonitoredItemCreateRequest,
    ) -> MonitoredItemCreateResult {
        if self.state == SubscriptionState::Closed {
            return failed_create(StatusCode::BadInvalidState, request);
        }
        let validated =
            match validate_create_request(space, self.publishing_interval_ms, request) {
                Ok(validated) => validated,
                Err(status_code) => {
                    debug!(
                        subscription_id = self.id,
                        node_id = %request.item_to_monitor.node_id,
                        status = %status_code,
                        "monitored item creation rejected"
                    );
                    return failed_create(status_code, request);
                }
            };

        self.monitored_item_id_counter += 1;
        let monitored_item_id = self.monitored_item_id_counter;
        let spec = MonitoredItemSpec {
            id: monitored_item_id,
            subscription_id: self.id,
            item_to_monitor: request.item_to_monitor.clone(),
            monitoring_mode: request.monitoring_mode,
            client_handle: request.requested_parameters.client_handle,
            sampling_interval: validated.sampling_interval,
            queue_size: validated.queue_size,
            discard_oldest: request.requested_parameters.discard_oldest,
            filter: request.requested_parameters.filter.clone(),
            timestamps_to_return,
        };
        let item = self.factory.create(&spec);
        self.monitored_items.insert(monitored_item_id, item);
        // Let owners wire samplers before the mode takes effect.
        self.events.emit(SubscriptionEvent::MonitoredItemCreated {
            monitored_item_id,
            item_to_monitor: request.item_to_monitor.clone(),
        });
        if let Some(item) = self.monitored_items.get_mut(&monitored_item_id) {
            item.set_monitoring_mode(request.monitoring_mode);
        }
        debug!(
            subscription_id = self.id,
            monitored_item_id,
            node_id = %request.item_to_monitor.node_id,
            sampling_interval = validated.sampling_interval,
            queue_size = validated.queue_size,
            "monitored item created"
        );
        MonitoredItemCreateResult {
            status_code: StatusCode::Good,
            monitored_item_id,
            revised_sampling_interval: validated.sampling_interval,
            revised_queue_size: validated.queue_size,
            filter_result: validated.filter_result,
        }
    }

    pub fn remove_monitored_item(&mut self, monitored_item_id: u32) -> StatusCode {
        match self.monitored_items.remove(&monitored_item_id) {
            Some(mut item) => {
                item.terminate();
                debug!(
                    subscription_id = self.id,
                    monitored_item_id, "monitored item removed"
                );
                StatusCode::Good
            }
            None => StatusCode::BadMonitoredItemIdInvalid,
        }
    }

    pub fn set_monitoring_mode(&mut self, ids: &[u32], mode: MonitoringMode) -> Vec<StatusCode> {
        ids.iter()
            .map(|id| match self.monitored_items.get_mut(id) {
                Some(item) => {
                    item.set_monitoring_mode(mode);
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect()
    }

    pub fn get_monitored_items(&self) -> MonitoredItemHandles {
        let mut server_handles = Vec::with_capacity(self.monitored_items.len());
        let mut client_handles = Vec::with_capacity(self.monitored_items.len());
        for (id, item) in &self.monitored_items {
            server_handles.push(*id);
            client_handles.push(item.client_handle());
        }
        MonitoredItemHandles {
            server_handles,
            client_handles,
            status: StatusCode::Good,
        }
    }

    /// Acknowledge one sent message. Unknown numbers have no side effect.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        match self.sent_notifications.acknowledge(sequence_number) {
            Some(_) => {
                trace!(
                    subscription_id = self.id,
                    sequence_number, "notification acknowledged"
                );
                self.reset_keep_alive_counter();
                self.reset_life_time_counter();
                StatusCode::Good
            }
            None => {
                debug!(
                    subscription_id = self.id,
                    sequence_number, "acknowledge for unknown sequence number"
                );
                StatusCode::BadSequenceNumberUnknown
            }
        }
    }

    pub fn acknowledge_all(&mut self, sequence_numbers: &[u32]) -> Vec<StatusCode> {
        sequence_numbers
            .iter()
            .map(|seq| self.acknowledge(*seq))
            .collect()
    }

    /// Look up a sent message for retransmission. A hit counts as client
    /// activity and resets both counters.
    pub fn republish(&mut self, sequence_number: u32) -> Option<NotificationMessage> {
        self.counters.republish_request += 1;
        let message = self
            .sent_notifications
            .find(sequence_number)
            .map(NotificationRecord::message);
        if message.is_some() {
            self.reset_keep_alive_counter();
            self.reset_life_time_counter();
        }
        message
    }

    /// Apply new parameters. The owner must restart the ticker with the
    /// revised publishing interval afterwards.
    pub fn modify(&mut self, params: &ModifyParams) -> RevisedTiming {
        let timing = revise_timing(
            params.publishing_interval_ms,
            params.max_keep_alive_count,
            params.life_time_count,
        );
        self.publishing_interval_ms = timing.publishing_interval_ms;
        self.max_keep_alive_count = timing.max_keep_alive_count;
        self.life_time_count = timing.life_time_count;
        self.max_notifications_per_publish = params.max_notifications_per_publish;
        self.priority = params.priority;
        self.reset_keep_alive_counter();
        self.reset_life_time_counter();
        self.counters.modify += 1;
        debug!(
            subscription_id = self.id,
            publishing_interval_ms = timing.publishing_interval_ms,
            max_keep_alive_count = timing.max_keep_alive_count,
            life_time_count = timing.life_time_count,
            "subscription modified"
        );
        timing
    }

    pub fn set_publishing_mode(&mut self, enabled: bool) -> StatusCode {
        self.publishing_enabled = enabled;
        if enabled {
            self.counters.enable += 1;
        } else {
            self.counters.disable += 1;
        }
        debug!(subscription_id = self.id, enabled, "publishing mode set");
        StatusCode::Good
    }

    /// Close the subscription. Idempotent; the owner stops the ticker.
    pub fn terminate(&mut self) {
        if self.state == SubscriptionState::Closed {
            return;
        }
        info!(subscription_id = self.id, "terminating subscription");
        self.close();
    }

    fn close(&mut self) {
        // Best-effort terminal note for the client; discarded with the
        // subscription if no publish request ever picks it up.
        let record = NotificationRecord {
            sequence_number: self.sequence.next(),
            publish_time: Utc::now(),
            notification_data: vec![NotificationData::StatusChange(StatusChangeNotification {
                status: StatusCode::BadTimeout,
            })],
            start_tick: self.publish_interval_count,
        };
        self.pending_notifications.push_back(record);
        for (_, mut item) in std::mem::take(&mut self.monitored_items) {
            item.terminate();
        }
        self.set_state(SubscriptionState::Closed);
        self.events.emit(SubscriptionEvent::Terminated);
    }

    /// Sequence numbers a client could still obtain: the retransmission
    /// queue first, then the not-yet-sent pending queue.
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.sent_notifications
            .sequence_numbers()
            .chain(self.pending_notifications.iter().map(|r| r.sequence_number))
            .collect()
    }

    pub fn diagnostics(&self) -> SubscriptionDiagnostics {
        SubscriptionDiagnostics {
            session_id: self.session_id,
            subscription_id: self.id,
            priority: self.priority,
            publishing_interval_ms: self.publishing_interval_ms,
            max_lifetime_count: self.life_time_count,
            max_keep_alive_count: self.max_keep_alive_count,
            max_notifications_per_publish: self.max_notifications_per_publish,
            publishing_enabled: self.publishing_enabled,
            state: self.state,
            monitored_item_count: self.monitored_items.len(),
            disabled_monitored_item_count: self
                .monitored_items
                .values()
                .filter(|item| item.monitoring_mode() == MonitoringMode::Disabled)
                .count(),
            next_sequence_number: self.sequence.future(),
            modify_count: self.counters.modify,
            enable_count: self.counters.enable,
            disable_count: self.counters.disable,
            republish_request_count: self.counters.republish_request,
            notifications_count: self.counters.notifications,
            publish_request_count: self.counters.publish_request,
            data_change_notifications_count: self.counters.data_change_notifications,
            event_notifications_count: self.counters.event_notifications,
        }
    }

    fn reset_keep_alive_counter(&mut self) {
        self.keep_alive_counter = 0;
    }

    fn reset_life_time_counter(&mut self) {
        self.life_time_counter = 0;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    fn set_state(&mut self, new_state: SubscriptionState) {
        self.state = new_state;
    }

    pub fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn publishing_interval(&self) -> Duration {
        Duration::from_millis(self.publishing_interval_ms)
    }

    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    pub fn life_time_count(&self) -> u32 {
        self.life_time_count
    }

    pub fn keep_alive_counter(&self) -> u32 {
        self.keep_alive_counter
    }

    pub fn life_time_counter(&self) -> u32 {
        self.life_time_counter
    }

    pub fn publish_interval_count(&self) -> u64 {
        self.publish_interval_count
    }

    pub fn monitored_item_count(&self) -> usize {
        self.monitored_items.len()
    }

    pub fn pending_notification_count(&self) -> usize {
        self.pending_notifications.len()
    }

    pub fn sent_notification_count(&self) -> usize {
        self.sent_notifications.len()
    }

    /// Time left before life-time expiry at the current cadence.
    pub fn time_to_expiration(&self) -> Duration {
        let cycles_left = u64::from(self.life_time_count.saturating_sub(self.life_time_counter));
        Duration::from_millis(cycles_left * self.publishing_interval_ms)
    }
}

fn failed_create(
    status_code: StatusCode,
    request: &MonitoredItemCreateRequest,
) -> MonitoredItemCreateResult {
    MonitoredItemCreateResult {
        status_code,
        monitored_item_id: 0,
        revised_sampling_interval: request.requested_parameters.sampling_interval,
        revised_queue_size: request.requested_parameters.queue_size,
        filter_result: None,
    }
}
