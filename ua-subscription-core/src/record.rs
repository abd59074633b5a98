use chrono::{DateTime, Utc};
use ua_subscription_sdk::{NotificationData, NotificationMessage};

/// A notification message together with the logical tick it was assembled
/// at. Records sit in the pending queue until paired with a publish request,
/// then move to the retransmission queue until acknowledged or evicted.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub sequence_number: u32,
    pub publish_time: DateTime<Utc>,
    /// One or two entries; a status change always travels alone.
    pub notification_data: Vec<NotificationData>,
    /// Value of the subscription's publish-interval counter at enqueue.
    pub start_tick: u64,
}

impl NotificationRecord {
    /// Whether the record has outlived the keep-alive horizon of its
    /// subscription's logical clock.
    pub fn is_aged(&self, current_tick: u64, max_keep_alive_count: u32) -> bool {
        self.start_tick + u64::from(max_keep_alive_count) < current_tick
    }

    pub fn message(&self) -> NotificationMessage {
        NotificationMessage {
            sequence_number: self.sequence_number,
            publish_time: self.publish_time,
            notification_data: self.notification_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationRecord;
    use chrono::Utc;
    use ua_subscription_sdk::{NotificationData, StatusChangeNotification, StatusCode};

    fn record(start_tick: u64) -> NotificationRecord {
        NotificationRecord {
            sequence_number: 1,
            publish_time: Utc::now(),
            notification_data: vec![NotificationData::StatusChange(StatusChangeNotification {
                status: StatusCode::BadTimeout,
            })],
            start_tick,
        }
    }

    #[test]
    fn ages_once_past_the_keep_alive_horizon() {
        let rec = record(5);
        assert!(!rec.is_aged(8, 3));
        assert!(!rec.is_aged(5, 3));
        assert!(rec.is_aged(9, 3));
    }
}
