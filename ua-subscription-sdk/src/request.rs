use crate::filter::{MonitoringFilter, MonitoringFilterResult};
use crate::status::StatusCode;
use crate::types::{MonitoringMode, NodeId, QualifiedName, TimestampsToReturn};
use serde::{Deserialize, Serialize};

/// What to monitor: a node, one of its attributes, and optionally a slice of
/// an array value in a particular encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadValueId {
    pub node_id: NodeId,
    /// Wire attribute id; validated against [`crate::AttributeId`] on create.
    pub attribute_id: u32,
    #[serde(default)]
    pub index_range: Option<String>,
    #[serde(default = "QualifiedName::null")]
    pub data_encoding: QualifiedName,
}

impl ReadValueId {
    /// Monitor the Value attribute of `node_id` with no range or encoding.
    pub fn new_value(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute_id: crate::types::AttributeId::Value as u32,
            index_range: None,
            data_encoding: QualifiedName::null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringParameters {
    pub client_handle: u32,
    /// Requested sampling interval in milliseconds; negative means "use the
    /// publishing interval", zero means "as fast as the node supports".
    pub sampling_interval: f64,
    #[serde(default)]
    pub filter: Option<MonitoringFilter>,
    pub queue_size: u32,
    pub discard_oldest: bool,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            client_handle: 0,
            sampling_interval: -1.0,
            filter: None,
            queue_size: 1,
            discard_oldest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredItemCreateRequest {
    pub item_to_monitor: ReadValueId,
    pub monitoring_mode: MonitoringMode,
    pub requested_parameters: MonitoringParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredItemCreateResult {
    pub status_code: StatusCode,
    /// 0 when creation failed.
    pub monitored_item_id: u32,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    #[serde(default)]
    pub filter_result: Option<MonitoringFilterResult>,
}

/// Fully validated and revised parameters handed to the monitored-item
/// factory. This is the only shape the core ever constructs items from.
#[derive(Debug, Clone)]
pub struct MonitoredItemSpec {
    pub id: u32,
    pub subscription_id: u32,
    pub item_to_monitor: ReadValueId,
    pub monitoring_mode: MonitoringMode,
    pub client_handle: u32,
    pub sampling_interval: f64,
    pub queue_size: u32,
    pub discard_oldest: bool,
    pub filter: Option<MonitoringFilter>,
    pub timestamps_to_return: TimestampsToReturn,
}
