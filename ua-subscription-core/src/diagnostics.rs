use crate::subscription::SubscriptionState;
use serde::Serialize;

/// Point-in-time snapshot of a subscription's counters and settings.
///
/// Produced on demand; fields are read together under the subscription's
/// serialization, but no atomicity is claimed across two snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDiagnostics {
    pub session_id: u32,
    pub subscription_id: u32,
    pub priority: u8,
    pub publishing_interval_ms: u64,
    pub max_lifetime_count: u32,
    pub max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub state: SubscriptionState,
    pub monitored_item_count: usize,
    pub disabled_monitored_item_count: usize,
    /// Sequence number the next notification message will carry.
    pub next_sequence_number: u32,
    pub modify_count: u64,
    pub enable_count: u64,
    pub disable_count: u64,
    pub republish_request_count: u64,
    pub notifications_count: u64,
    pub publish_request_count: u64,
    pub data_change_notifications_count: u64,
    pub event_notifications_count: u64,
}
