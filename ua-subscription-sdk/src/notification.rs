use crate::status::StatusCode;
use crate::types::{DataValue, Variant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification as extracted from one monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemNotification {
    DataChange(MonitoredItemNotification),
    Event(EventFieldList),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFieldList {
    pub client_handle: u32,
    pub event_fields: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChangeNotification {
    pub monitored_items: Vec<MonitoredItemNotification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotificationList {
    pub events: Vec<EventFieldList>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
}

/// One entry of a notification message's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    DataChange(DataChangeNotification),
    Events(EventNotificationList),
    StatusChange(StatusChangeNotification),
}

impl NotificationData {
    /// Number of individual notifications carried by this entry.
    pub fn notification_count(&self) -> usize {
        match self {
            NotificationData::DataChange(d) => d.monitored_items.len(),
            NotificationData::Events(e) => e.events.len(),
            NotificationData::StatusChange(_) => 1,
        }
    }
}

/// The message a subscription hands to the publish engine: a sequence number,
/// a publish timestamp, and one or two notification payloads (a status change
/// travels alone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime<Utc>,
    pub notification_data: Vec<NotificationData>,
}
