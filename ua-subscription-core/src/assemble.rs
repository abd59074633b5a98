use crate::record::NotificationRecord;
use crate::sequence::SequenceNumbers;
use chrono::Utc;
use ua_subscription_sdk::{
    DataChangeNotification, EventNotificationList, ItemNotification, NotificationData,
};

/// Slice the concatenated per-item notification stream into messages.
///
/// Each chunk holds at most `max_notifications_per_publish` notifications
/// (the whole stream when 0) and is partitioned by variant into at most one
/// data-change list and one event list. Every produced record consumes one
/// sequence number, so callers only invoke this when a publish request is
/// actually parked.
pub(crate) fn assemble_records(
    stream: Vec<ItemNotification>,
    max_notifications_per_publish: u32,
    sequence: &mut SequenceNumbers,
    start_tick: u64,
) -> Vec<NotificationRecord> {
    if stream.is_empty() {
        return Vec::new();
    }
    let chunk_size = if max_notifications_per_publish == 0 {
        stream.len()
    } else {
        max_notifications_per_publish as usize
    };

    let mut records = Vec::with_capacity(stream.len().div_ceil(chunk_size));
    let mut stream = stream.into_iter().peekable();
    while stream.peek().is_some() {
        let mut data_changes = Vec::new();
        let mut events = Vec::new();
        for notification in stream.by_ref().take(chunk_size) {
            match notification {
                ItemNotification::DataChange(n) => data_changes.push(n),
                ItemNotification::Event(n) => events.push(n),
            }
        }

        let mut notification_data = Vec::with_capacity(2);
        if !data_changes.is_empty() {
            notification_data.push(NotificationData::DataChange(DataChangeNotification {
                monitored_items: data_changes,
            }));
        }
        if !events.is_empty() {
            notification_data.push(NotificationData::Events(EventNotificationList { events }));
        }

        records.push(NotificationRecord {
            sequence_number: sequence.next(),
            publish_time: Utc::now(),
            notification_data,
            start_tick,
        });
    }
    records
}
