use crate::record::NotificationRecord;
use std::collections::VecDeque;
use tracing::warn;

/// Hard bound on the number of sent-but-unacknowledged messages kept for
/// republish.
pub const RETRANSMISSION_QUEUE_CAPACITY: usize = 100;

/// Bounded FIFO of sent notification messages awaiting acknowledgement.
///
/// When the bound is exceeded, entries that have aged past the keep-alive
/// horizon are evicted first, then the oldest entries regardless of age.
#[derive(Debug, Default)]
pub(crate) struct RetransmissionQueue {
    entries: VecDeque<NotificationRecord>,
}

impl RetransmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: NotificationRecord, current_tick: u64, max_keep_alive_count: u32) {
        self.entries.push_back(record);
        while self.entries.len() > RETRANSMISSION_QUEUE_CAPACITY {
            let evict_at = self
                .entries
                .iter()
                .position(|r| r.is_aged(current_tick, max_keep_alive_count))
                .unwrap_or(0);
            if let Some(dropped) = self.entries.remove(evict_at) {
                warn!(
                    sequence_number = dropped.sequence_number,
                    "retransmission queue full, dropping unacknowledged message"
                );
            }
        }
    }

    /// Remove the entry with the given sequence number, if present.
    pub fn acknowledge(&mut self, sequence_number: u32) -> Option<NotificationRecord> {
        let index = self
            .entries
            .iter()
            .position(|r| r.sequence_number == sequence_number)?;
        self.entries.remove(index)
    }

    pub fn find(&self, sequence_number: u32) -> Option<&NotificationRecord> {
        self.entries
            .iter()
            .find(|r| r.sequence_number == sequence_number)
    }

    /// Sequence numbers currently held, oldest first.
    pub fn sequence_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|r| r.sequence_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{RetransmissionQueue, RETRANSMISSION_QUEUE_CAPACITY};
    use crate::record::NotificationRecord;
    use chrono::Utc;
    use ua_subscription_sdk::{DataChangeNotification, NotificationData};

    fn record(sequence_number: u32, start_tick: u64) -> NotificationRecord {
        NotificationRecord {
            sequence_number,
            publish_time: Utc::now(),
            notification_data: vec![NotificationData::DataChange(DataChangeNotification {
                monitored_items: Vec::new(),
            })],
            start_tick,
        }
    }

    #[test]
    fn acknowledge_removes_only_the_matching_entry() {
        let mut queue = RetransmissionQueue::new();
        for seq in 1..=3 {
            queue.append(record(seq, 0), 0, 3);
        }
        assert!(queue.acknowledge(2).is_some());
        assert!(queue.acknowledge(2).is_none());
        assert_eq!(queue.sequence_numbers().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn find_does_not_remove() {
        let mut queue = RetransmissionQueue::new();
        queue.append(record(7, 0), 0, 3);
        assert!(queue.find(7).is_some());
        assert!(queue.find(7).is_some());
        assert!(queue.find(8).is_none());
    }

    #[test]
    fn overflow_drops_oldest_first() {
        let mut queue = RetransmissionQueue::new();
        for seq in 1..=(RETRANSMISSION_QUEUE_CAPACITY as u32 + 5) {
            queue.append(record(seq, u64::from(seq)), u64::from(seq), 1_000);
        }
        assert_eq!(queue.len(), RETRANSMISSION_QUEUE_CAPACITY);
        // Nothing aged, so the five oldest were dropped.
        assert_eq!(queue.sequence_numbers().next(), Some(6));
    }

    #[test]
    fn overflow_prefers_aged_entries() {
        let mut queue = RetransmissionQueue::new();
        // Entry 1 is fresh, entry 2 is ancient.
        queue.append(record(1, 990), 1_000, 20);
        queue.append(record(2, 0), 1_000, 20);
        for seq in 3..=(RETRANSMISSION_QUEUE_CAPACITY as u32 + 1) {
            queue.append(record(seq, 995), 1_000, 20);
        }
        assert_eq!(queue.len(), RETRANSMISSION_QUEUE_CAPACITY);
        let seqs: Vec<u32> = queue.sequence_numbers().collect();
        assert!(seqs.contains(&1), "fresh head entry survived");
        assert!(!seqs.contains(&2), "aged entry was evicted first");
    }
}
