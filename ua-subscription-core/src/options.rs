use serde::{Deserialize, Serialize};

pub const MIN_PUBLISHING_INTERVAL_MS: u64 = 100;
/// 30 days.
pub const MAX_PUBLISHING_INTERVAL_MS: u64 = 2_592_000_000;
pub const MIN_KEEP_ALIVE_COUNT: u32 = 2;
pub const MAX_KEEP_ALIVE_COUNT: u32 = 12_000;
/// The life-time count must cover at least this many keep-alive periods.
pub const MIN_LIFE_TIME_MULTIPLE: u32 = 3;

/// Requested subscription parameters, revised on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOptions {
    #[serde(default = "SubscriptionOptions::default_publishing_interval_ms")]
    pub publishing_interval_ms: u64,

    #[serde(default = "SubscriptionOptions::default_max_keep_alive_count")]
    pub max_keep_alive_count: u32,

    #[serde(default = "SubscriptionOptions::default_life_time_count")]
    pub life_time_count: u32,

    /// 0 means no limit per publish response.
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    #[serde(default = "SubscriptionOptions::default_publishing_enabled")]
    pub publishing_enabled: bool,

    #[serde(default)]
    pub priority: u8,
}

impl SubscriptionOptions {
    fn default_publishing_interval_ms() -> u64 {
        500
    }
    fn default_max_keep_alive_count() -> u32 {
        10
    }
    fn default_life_time_count() -> u32 {
        30
    }
    fn default_publishing_enabled() -> bool {
        true
    }

    /// Clamp the timing parameters to the supported envelope.
    pub fn revised(&self) -> Self {
        let timing = revise_timing(
            self.publishing_interval_ms,
            self.max_keep_alive_count,
            self.life_time_count,
        );
        Self {
            publishing_interval_ms: timing.publishing_interval_ms,
            max_keep_alive_count: timing.max_keep_alive_count,
            life_time_count: timing.life_time_count,
            ..self.clone()
        }
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            publishing_interval_ms: Self::default_publishing_interval_ms(),
            max_keep_alive_count: Self::default_max_keep_alive_count(),
            life_time_count: Self::default_life_time_count(),
            max_notifications_per_publish: 0,
            publishing_enabled: Self::default_publishing_enabled(),
            priority: 0,
        }
    }
}

/// Parameters of a subscription modification. Publishing mode is changed
/// through its own operation, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyParams {
    pub publishing_interval_ms: u64,
    pub max_keep_alive_count: u32,
    pub life_time_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

/// Timing values after revision, echoed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisedTiming {
    pub publishing_interval_ms: u64,
    pub max_keep_alive_count: u32,
    pub life_time_count: u32,
}

pub(crate) fn revise_timing(
    publishing_interval_ms: u64,
    max_keep_alive_count: u32,
    life_time_count: u32,
) -> RevisedTiming {
    let publishing_interval_ms =
        publishing_interval_ms.clamp(MIN_PUBLISHING_INTERVAL_MS, MAX_PUBLISHING_INTERVAL_MS);
    let max_keep_alive_count = max_keep_alive_count.clamp(MIN_KEEP_ALIVE_COUNT, MAX_KEEP_ALIVE_COUNT);
    let life_time_count = life_time_count.max(MIN_LIFE_TIME_MULTIPLE * max_keep_alive_count);
    RevisedTiming {
        publishing_interval_ms,
        max_keep_alive_count,
        life_time_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_clamps_to_supported_envelope() {
        let revised = SubscriptionOptions {
            publishing_interval_ms: 50,
            max_keep_alive_count: 1,
            life_time_count: 2,
            ..Default::default()
        }
        .revised();
        assert_eq!(revised.publishing_interval_ms, 100);
        assert_eq!(revised.max_keep_alive_count, 2);
        assert_eq!(revised.life_time_count, 6);

        let revised = SubscriptionOptions {
            publishing_interval_ms: u64::MAX,
            max_keep_alive_count: 50_000,
            life_time_count: 0,
            ..Default::default()
        }
        .revised();
        assert_eq!(revised.publishing_interval_ms, MAX_PUBLISHING_INTERVAL_MS);
        assert_eq!(revised.max_keep_alive_count, MAX_KEEP_ALIVE_COUNT);
        assert_eq!(revised.life_time_count, 3 * MAX_KEEP_ALIVE_COUNT);
    }

    #[test]
    fn life_time_rule_is_reapplied_over_requested_value() {
        let t = revise_timing(1_000, 10, 31);
        assert_eq!(t.life_time_count, 31);
        let t = revise_timing(1_000, 10, 29);
        assert_eq!(t.life_time_count, 30);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let opts: SubscriptionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, SubscriptionOptions::default());
    }
}
