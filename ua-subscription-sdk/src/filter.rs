use crate::status::StatusCode;
use crate::types::{NodeId, QualifiedName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Monitoring filter requested for a monitored item.
///
/// The variant set is closed: an unknown filter cannot be represented, so the
/// validation path only has to decide whether the requested variant is
/// allowed for the attribute and node at hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitoringFilter {
    DataChange(DataChangeFilter),
    Event(EventFilter),
    Aggregate(AggregateFilter),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum DataChangeTrigger {
    Status = 0,
    StatusValue = 1,
    StatusValueTimestamp = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum DeadbandType {
    None = 0,
    Absolute = 1,
    /// Percent of the EU range; only meaningful in (0, 100).
    Percent = 2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeFilter {
    pub trigger: DataChangeTrigger,
    pub deadband_type: DeadbandType,
    pub deadband_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub select_clauses: Vec<SimpleAttributeOperand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleAttributeOperand {
    pub type_definition_id: NodeId,
    pub browse_path: Vec<QualifiedName>,
    pub attribute_id: u32,
    pub index_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilter {
    pub start_time: DateTime<Utc>,
    pub aggregate_type: NodeId,
    pub processing_interval: f64,
}

/// Filter outcome returned in the create result. Data-change filters return
/// no result structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitoringFilterResult {
    Event(EventFilterResult),
    Aggregate(AggregateFilterResult),
}

/// Per-select-clause diagnostics of an event filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilterResult {
    pub select_clause_results: Vec<StatusCode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilterResult {}
