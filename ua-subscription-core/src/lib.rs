//! Server-side subscription core.
//!
//! One [`Subscription`] is the per-client-subscription state machine: it
//! drives the periodic publishing of notifications extracted from monitored
//! items, enforces keep-alive and life-time timing, issues gap-free sequence
//! numbers, and keeps a bounded retransmission queue of sent messages for
//! acknowledgement and republish.
//!
//! The state machine itself is synchronous and deterministic; the
//! [`SubscriptionActor`] wraps it in a tokio task that owns the periodic
//! ticker and serializes every operation through a command channel.

mod actor;
mod assemble;
mod create;
mod diagnostics;
mod options;
mod record;
mod retransmit;
mod sequence;
mod subscription;

pub use actor::{SubscriptionActor, SubscriptionActorDeps, SubscriptionCommand, SubscriptionHandle};
pub use diagnostics::SubscriptionDiagnostics;
pub use options::{
    ModifyParams, RevisedTiming, SubscriptionOptions, MAX_KEEP_ALIVE_COUNT,
    MAX_PUBLISHING_INTERVAL_MS, MIN_KEEP_ALIVE_COUNT, MIN_LIFE_TIME_MULTIPLE,
    MIN_PUBLISHING_INTERVAL_MS,
};
pub use record::NotificationRecord;
pub use retransmit::RETRANSMISSION_QUEUE_CAPACITY;
pub use subscription::{MonitoredItemHandles, Subscription, SubscriptionState, TickResult};
