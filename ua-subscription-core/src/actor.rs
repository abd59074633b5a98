use crate::diagnostics::SubscriptionDiagnostics;
use crate::options::{ModifyParams, RevisedTiming, SubscriptionOptions};
use crate::subscription::{MonitoredItemHandles, Subscription, SubscriptionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ua_subscription_error::{UaSubError, UaSubResult};
use ua_subscription_sdk::{
    AddressSpace, EventSink, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemFactory, MonitoringMode, NotificationMessage, PublishEngine, StatusCode,
    SubscriptionEvent, SubscriptionRegistry, TimestampsToReturn,
};

/// Operations delivered to a subscription actor. Replies travel back on
/// oneshot channels; a dropped reply means the caller went away and is
/// ignored.
pub enum SubscriptionCommand {
    CreateMonitoredItems {
        timestamps_to_return: TimestampsToReturn,
        requests: Vec<MonitoredItemCreateRequest>,
        reply: oneshot::Sender<Vec<MonitoredItemCreateResult>>,
    },
    RemoveMonitoredItem {
        monitored_item_id: u32,
        reply: oneshot::Sender<StatusCode>,
    },
    SetMonitoringMode {
        monitored_item_ids: Vec<u32>,
        mode: MonitoringMode,
        reply: oneshot::Sender<Vec<StatusCode>>,
    },
    GetMonitoredItems {
        reply: oneshot::Sender<MonitoredItemHandles>,
    },
    Acknowledge {
        sequence_numbers: Vec<u32>,
        reply: oneshot::Sender<Vec<StatusCode>>,
    },
    Republish {
        sequence_number: u32,
        reply: oneshot::Sender<Option<NotificationMessage>>,
    },
    Modify {
        params: ModifyParams,
        reply: oneshot::Sender<RevisedTiming>,
    },
    SetPublishingMode {
        enabled: bool,
        reply: oneshot::Sender<StatusCode>,
    },
    Diagnostics {
        reply: oneshot::Sender<SubscriptionDiagnostics>,
    },
    /// A publish request was parked for this session; a Late subscription
    /// answers immediately.
    PublishRequestArrived,
    Terminate {
        reply: oneshot::Sender<()>,
    },
}

/// Collaborators a subscription actor is wired to at spawn time.
pub struct SubscriptionActorDeps {
    pub engine: Arc<dyn PublishEngine>,
    pub address_space: Arc<dyn AddressSpace>,
    pub registry: Arc<dyn SubscriptionRegistry>,
    pub factory: Arc<dyn MonitoredItemFactory>,
}

/// Owns one [`Subscription`] and its periodic ticker; the single place all
/// operations on that subscription are serialized.
pub struct SubscriptionActor {
    subscription: Subscription,
    deps: SubscriptionActorDeps,
    rx: mpsc::Receiver<SubscriptionCommand>,
    cancel: CancellationToken,
    state_tx: watch::Sender<SubscriptionState>,
}

/// Cheap handle for driving a spawned subscription actor.
#[derive(Clone)]
pub struct SubscriptionHandle {
    subscription_id: u32,
    tx: mpsc::Sender<SubscriptionCommand>,
    state_rx: watch::Receiver<SubscriptionState>,
}

impl SubscriptionActor {
    /// Build the actor and its handle. The caller spawns
    /// [`SubscriptionActor::run`] on its runtime and keeps the returned event
    /// receiver if it wants to observe the subscription's signals.
    pub fn new(
        subscription_id: u32,
        session_id: u32,
        options: SubscriptionOptions,
        deps: SubscriptionActorDeps,
        cancel: CancellationToken,
    ) -> (
        Self,
        SubscriptionHandle,
        mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) {
        let (events, event_rx) = EventSink::channel();
        let subscription = Subscription::new(
            subscription_id,
            session_id,
            options,
            Arc::clone(&deps.factory),
            events,
        );
        let (tx, rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(subscription.state());
        let actor = Self {
            subscription,
            deps,
            rx,
            cancel,
            state_tx,
        };
        let handle = SubscriptionHandle {
            subscription_id,
            tx,
            state_rx,
        };
        (actor, handle, event_rx)
    }

    /// Event loop: arm the ticker, then serve timer ticks and commands until
    /// the subscription closes or the token is cancelled.
    pub async fn run(mut self) {
        let mut ticker = new_ticker(self.subscription.publishing_interval());
        self.subscription.start();
        self.deps.registry.register(self.subscription.id());
        self.publish_state();
        debug!(
            subscription_id = self.subscription.id(),
            "subscription actor started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.subscription.terminate();
                    break;
                }
                _ = ticker.tick() => {
                    if self.handle_tick() {
                        break;
                    }
                }
                maybe_cmd = self.rx.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        // All handles dropped; nobody can reach us any more.
                        self.subscription.terminate();
                        break;
                    };
                    if self.handle_command(cmd, &mut ticker) {
                        break;
                    }
                }
            }
            self.publish_state();
        }

        self.deps.registry.unregister(self.subscription.id());
        self.publish_state();
        debug!(
            subscription_id = self.subscription.id(),
            "subscription actor stopped"
        );
    }

    /// One timer cycle plus prompt follow-ups while messages and publish
    /// requests are both available. Returns true once closed.
    fn handle_tick(&mut self) -> bool {
        let engine = Arc::clone(&self.deps.engine);
        let mut result = self.subscription.tick(engine.as_ref());
        let mut follow_ups = self.subscription.pending_notification_count();
        while !result.closed
            && result.more_notifications
            && follow_ups > 0
            && engine.pending_publish_request_count() > 0
        {
            result = self.subscription.tick(engine.as_ref());
            follow_ups -= 1;
        }
        result.closed
    }

    /// Apply one command. Returns true once the subscription is closed.
    fn handle_command(&mut self, cmd: SubscriptionCommand, ticker: &mut Interval) -> bool {
        match cmd {
            SubscriptionCommand::CreateMonitoredItems {
                timestamps_to_return,
                requests,
                reply,
            } => {
                let space = Arc::clone(&self.deps.address_space);
                let results = requests
                    .iter()
                    .map(|request| {
                        self.subscription.create_monitored_item(
                            space.as_ref(),
                            timestamps_to_return,
                            request,
                        )
                    })
                    .collect();
                let _ = reply.send(results);
            }
            SubscriptionCommand::RemoveMonitoredItem {
                monitored_item_id,
                reply,
            } => {
                let _ = reply.send(self.subscription.remove_monitored_item(monitored_item_id));
            }
            SubscriptionCommand::SetMonitoringMode {
                monitored_item_ids,
                mode,
                reply,
            } => {
                let _ = reply.send(
                    self.subscription
                        .set_monitoring_mode(&monitored_item_ids, mode),
                );
            }
            SubscriptionCommand::GetMonitoredItems { reply } => {
                let _ = reply.send(self.subscription.get_monitored_items());
            }
            SubscriptionCommand::Acknowledge {
                sequence_numbers,
                reply,
            } => {
                let _ = reply.send(self.subscription.acknowledge_all(&sequence_numbers));
            }
            SubscriptionCommand::Republish {
                sequence_number,
                reply,
            } => {
                let _ = reply.send(self.subscription.republish(sequence_number));
            }
            SubscriptionCommand::Modify { params, reply } => {
                let timing = self.subscription.modify(&params);
                *ticker = new_ticker(self.subscription.publishing_interval());
                let _ = reply.send(timing);
            }
            SubscriptionCommand::SetPublishingMode { enabled, reply } => {
                let _ = reply.send(self.subscription.set_publishing_mode(enabled));
            }
            SubscriptionCommand::Diagnostics { reply } => {
                let _ = reply.send(self.subscription.diagnostics());
            }
            SubscriptionCommand::PublishRequestArrived => {
                self.subscription
                    .on_publish_request_arrived(self.deps.engine.as_ref());
            }
            SubscriptionCommand::Terminate { reply } => {
                self.subscription.terminate();
                let _ = reply.send(());
            }
        }
        self.subscription.is_closed()
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(self.subscription.state());
    }
}

/// A ticker whose first tick fires one full period from now; skipped cycles
/// are not replayed in a burst.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl SubscriptionHandle {
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    /// Live state of the subscription; resolves to Closed once the actor is
    /// gone.
    pub fn state(&self) -> SubscriptionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions as they happen.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state_rx.clone()
    }

    pub async fn create_monitored_items(
        &self,
        timestamps_to_return: TimestampsToReturn,
        requests: Vec<MonitoredItemCreateRequest>,
    ) -> UaSubResult<Vec<MonitoredItemCreateResult>> {
        self.request(|reply| SubscriptionCommand::CreateMonitoredItems {
            timestamps_to_return,
            requests,
            reply,
        })
        .await
    }

    pub async fn remove_monitored_item(&self, monitored_item_id: u32) -> UaSubResult<StatusCode> {
        self.request(|reply| SubscriptionCommand::RemoveMonitoredItem {
            monitored_item_id,
            reply,
        })
        .await
    }

    pub async fn set_monitoring_mode(
        &self,
        monitored_item_ids: Vec<u32>,
        mode: MonitoringMode,
    ) -> UaSubResult<Vec<StatusCode>> {
        self.request(|reply| SubscriptionCommand::SetMonitoringMode {
            monitored_item_ids,
            mode,
            reply,
        })
        .await
    }

    pub async fn get_monitored_items(&self) -> UaSubResult<MonitoredItemHandles> {
        self.request(|reply| SubscriptionCommand::GetMonitoredItems { reply })
            .await
    }

    pub async fn acknowledge(&self, sequence_numbers: Vec<u32>) -> UaSubResult<Vec<StatusCode>> {
        self.request(|reply| SubscriptionCommand::Acknowledge {
            sequence_numbers,
            reply,
        })
        .await
    }

    pub async fn republish(&self, sequence_number: u32) -> UaSubResult<Option<NotificationMessage>> {
        self.request(|reply| SubscriptionCommand::Republish {
            sequence_number,
            reply,
        })
        .await
    }

    pub async fn modify(&self, params: ModifyParams) -> UaSubResult<RevisedTiming> {
        self.request(|reply| SubscriptionCommand::Modify { params, reply })
            .await
    }

    pub async fn set_publishing_mode(&self, enabled: bool) -> UaSubResult<StatusCode> {
        self.request(|reply| SubscriptionCommand::SetPublishingMode { enabled, reply })
            .await
    }

    pub async fn diagnostics(&self) -> UaSubResult<SubscriptionDiagnostics> {
        self.request(|reply| SubscriptionCommand::Diagnostics { reply })
            .await
    }

    /// Nudge a Late subscription; fire-and-forget.
    pub fn notify_publish_request_arrived(&self) {
        if let Err(e) = self.tx.try_send(SubscriptionCommand::PublishRequestArrived) {
            warn!(
                subscription_id = self.subscription_id,
                error = %e,
                "dropping publish-request nudge"
            );
        }
    }

    /// Close the subscription. Idempotent; succeeds even when the actor is
    /// already gone.
    pub async fn terminate(&self) {
        let _ = self
            .request(|reply| SubscriptionCommand::Terminate { reply })
            .await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SubscriptionCommand,
    ) -> UaSubResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| UaSubError::SubscriptionClosed(self.subscription_id))?;
        reply_rx.await.map_err(|_| UaSubError::ActorUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use ua_subscription_sdk::{
        ItemNotification, MonitoredItem, MonitoredItemSpec, NodeId, NodeInfo,
        OutgoingNotification,
    };

    #[derive(Default)]
    struct StubEngine {
        pending: AtomicUsize,
        keep_alives: Mutex<Vec<u32>>,
    }

    impl PublishEngine for StubEngine {
        fn pending_publish_request_count(&self) -> usize {
            self.pending.load(Ordering::SeqCst)
        }

        fn send_notification_message(&self, _notification: OutgoingNotification) {
            let _ = self
                .pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
        }

        fn send_keep_alive_response(&self, _subscription_id: u32, future: u32) -> bool {
            let consumed = self
                .pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                .is_ok();
            if consumed {
                self.keep_alives.lock().unwrap().push(future);
            }
            consumed
        }
    }

    struct StubSpace;

    impl AddressSpace for StubSpace {
        fn find_node(&self, _node_id: &NodeId) -> Option<NodeInfo> {
            None
        }

        fn is_subtype_of(&self, _data_type: &NodeId, _super_type: &NodeId) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingRegistry {
        registered: AtomicUsize,
        unregistered: AtomicUsize,
    }

    impl SubscriptionRegistry for RecordingRegistry {
        fn register(&self, _subscription_id: u32) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }

        fn unregister(&self, _subscription_id: u32) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StubItem {
        client_handle: u32,
        mode: MonitoringMode,
        node_id: NodeId,
    }

    impl MonitoredItem for StubItem {
        fn client_handle(&self) -> u32 {
            self.client_handle
        }

        fn sampling_interval(&self) -> f64 {
            0.0
        }

        fn queue_size(&self) -> u32 {
            1
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
            Vec::new()
        }

        fn terminate(&mut self) {}
    }

    struct StubFactory;

    impl ua_subscription_sdk::MonitoredItemFactory for StubFactory {
        fn create(&self, spec: &MonitoredItemSpec) -> Box<dyn MonitoredItem> {
            Box::new(StubItem {
                client_handle: spec.client_handle,
                mode: spec.monitoring_mode,
                node_id: spec.item_to_monitor.node_id.clone(),
            })
        }
    }

    fn deps(engine: Arc<StubEngine>, registry: Arc<RecordingRegistry>) -> SubscriptionActorDeps {
        SubscriptionActorDeps {
            engine,
            address_space: Arc::new(StubSpace),
            registry,
            factory: Arc::new(StubFactory),
        }
    }

    fn options() -> SubscriptionOptions {
        SubscriptionOptions {
            publishing_interval_ms: 100,
            max_keep_alive_count: 2,
            life_time_count: 6,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drives_keep_alives() {
        let engine = Arc::new(StubEngine::default());
        engine.pending.store(1, Ordering::SeqCst);
        let registry = Arc::new(RecordingRegistry::default());
        let (actor, handle, _events) = SubscriptionActor::new(
            5,
            1,
            options(),
            deps(Arc::clone(&engine), Arc::clone(&registry)),
            CancellationToken::new(),
        );
        let task = tokio::spawn(actor.run());

        // The keep-alive counter is primed at start, so the first cycle
        // already answers the parked request.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(engine.keep_alives.lock().unwrap().as_slice(), &[1]);
        assert_eq!(handle.state(), SubscriptionState::KeepAlive);
        assert_eq!(registry.registered.load(Ordering::SeqCst), 1);

        handle.terminate().await;
        task.await.expect("actor run");
        assert_eq!(handle.state(), SubscriptionState::Closed);
        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);

        // A second terminate against the gone actor is still fine.
        handle.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_closes_the_subscription() {
        let engine = Arc::new(StubEngine::default());
        let registry = Arc::new(RecordingRegistry::default());
        let cancel = CancellationToken::new();
        let (actor, handle, _events) = SubscriptionActor::new(
            6,
            1,
            options(),
            deps(Arc::clone(&engine), Arc::clone(&registry)),
            cancel.clone(),
        );
        let task = tokio::spawn(actor.run());

        cancel.cancel();
        task.await.expect("actor run");
        assert_eq!(handle.state(), SubscriptionState::Closed);
        assert_eq!(registry.unregistered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn modify_revises_timing_through_the_handle() {
        let engine = Arc::new(StubEngine::default());
        let registry = Arc::new(RecordingRegistry::default());
        let (actor, handle, _events) = SubscriptionActor::new(
            7,
            1,
            options(),
            deps(Arc::clone(&engine), Arc::clone(&registry)),
            CancellationToken::new(),
        );
        let task = tokio::spawn(actor.run());

        let timing = handle
            .modify(ModifyParams {
                publishing_interval_ms: 50,
                max_keep_alive_count: 1,
                life_time_count: 2,
                max_notifications_per_publish: 0,
                priority: 0,
            })
            .await
            .expect("modify");
        assert_eq!(timing.publishing_interval_ms, 100);
        assert_eq!(timing.max_keep_alive_count, 2);
        assert_eq!(timing.life_time_count, 6);

        let diag = handle.diagnostics().await.expect("diagnostics");
        assert_eq!(diag.modify_count, 1);

        handle.terminate().await;
        task.await.expect("actor run");
    }
}
