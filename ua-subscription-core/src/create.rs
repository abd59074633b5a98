use ua_subscription_sdk::{
    AddressSpace, AttributeId, EventFilterResult, MonitoredItemCreateRequest, MonitoringFilter,
    MonitoringFilterResult, NodeClass, NodeId, NodeInfo, NumericRange, StatusCode,
};

/// Fastest sampling rate this server supports.
pub(crate) const MIN_SAMPLING_INTERVAL_MS: f64 = 50.0;
/// Slowest meaningful sampling rate, 24 hours.
pub(crate) const MAX_SAMPLING_INTERVAL_MS: f64 = 86_400_000.0;
/// Upper bound on a monitored item's notification queue.
pub(crate) const MAX_MONITORED_ITEM_QUEUE_SIZE: u32 = 10_000;

const ENCODING_DEFAULT_BINARY: &str = "Default Binary";
const ENCODING_DEFAULT_XML: &str = "Default XML";

/// Outcome of request validation: the revised parameters a monitored item
/// may be constructed from.
#[derive(Debug)]
pub(crate) struct ValidatedItem {
    pub sampling_interval: f64,
    pub queue_size: u32,
    pub filter_result: Option<MonitoringFilterResult>,
}

/// Validate a monitored-item create request against the address space.
/// The first failing check wins; failures are status codes, never errors.
pub(crate) fn validate_create_request(
    space: &dyn AddressSpace,
    publishing_interval_ms: u64,
    request: &MonitoredItemCreateRequest,
) -> Result<ValidatedItem, StatusCode> {
    let item = &request.item_to_monitor;
    let Some(node) = space.find_node(&item.node_id) else {
        return Err(StatusCode::BadNodeIdUnknown);
    };

    let attribute = match AttributeId::from_u32(item.attribute_id) {
        Some(AttributeId::Value) if node.node_class != NodeClass::Variable => {
            return Err(StatusCode::BadAttributeIdInvalid);
        }
        Some(attribute) => attribute,
        None => return Err(StatusCode::BadAttributeIdInvalid),
    };

    if let Some(range) = &item.index_range {
        if range.parse::<NumericRange>().is_err() {
            return Err(StatusCode::BadIndexRangeInvalid);
        }
    }

    if !item.data_encoding.is_null() {
        if attribute != AttributeId::Value {
            return Err(StatusCode::BadDataEncodingInvalid);
        }
        if item.data_encoding.name != ENCODING_DEFAULT_BINARY
            && item.data_encoding.name != ENCODING_DEFAULT_XML
        {
            return Err(StatusCode::BadDataEncodingUnsupported);
        }
    }

    let filter_result = match &request.requested_parameters.filter {
        None => None,
        Some(filter) => validate_filter(space, filter, attribute, &node)?,
    };

    let sampling_interval = negotiate_sampling_interval(
        request.requested_parameters.sampling_interval,
        &node,
        publishing_interval_ms,
    );
    let queue_size = request
        .requested_parameters
        .queue_size
        .clamp(1, MAX_MONITORED_ITEM_QUEUE_SIZE);

    Ok(ValidatedItem {
        sampling_interval,
        queue_size,
        filter_result,
    })
}

fn validate_filter(
    space: &dyn AddressSpace,
    filter: &MonitoringFilter,
    attribute: AttributeId,
    node: &NodeInfo,
) -> Result<Option<MonitoringFilterResult>, StatusCode> {
    if attribute != AttributeId::Value && attribute != AttributeId::EventNotifier {
        return Err(StatusCode::BadFilterNotAllowed);
    }
    match filter {
        MonitoringFilter::Event(event_filter) => {
            if attribute != AttributeId::EventNotifier {
                return Err(StatusCode::BadFilterNotAllowed);
            }
            let select_clause_results = event_filter
                .select_clauses
                .iter()
                .map(|clause| {
                    if AttributeId::from_u32(clause.attribute_id).is_none() {
                        StatusCode::BadAttributeIdInvalid
                    } else if clause.browse_path.is_empty() {
                        StatusCode::BadNodeIdUnknown
                    } else {
                        StatusCode::Good
                    }
                })
                .collect();
            Ok(Some(MonitoringFilterResult::Event(EventFilterResult {
                select_clause_results,
            })))
        }
        MonitoringFilter::DataChange(data_change) => {
            if attribute != AttributeId::Value {
                return Err(StatusCode::BadFilterNotAllowed);
            }
            if node.node_class != NodeClass::Variable {
                return Err(StatusCode::BadNodeIdInvalid);
            }
            let numeric = node
                .data_type
                .as_ref()
                .map(|dt| space.is_subtype_of(dt, &NodeId::number_data_type()))
                .unwrap_or(false);
            if !numeric {
                return Err(StatusCode::BadFilterNotAllowed);
            }
            if data_change.deadband_type == ua_subscription_sdk::DeadbandType::Percent
                && !(data_change.deadband_value > 0.0 && data_change.deadband_value < 100.0)
            {
                return Err(StatusCode::BadDeadbandFilterInvalid);
            }
            Ok(None)
        }
        MonitoringFilter::Aggregate(_) => Ok(Some(MonitoringFilterResult::Aggregate(
            Default::default(),
        ))),
    }
}

/// Negotiate the effective sampling interval for a monitored item.
pub(crate) fn negotiate_sampling_interval(
    requested: f64,
    node: &NodeInfo,
    publishing_interval_ms: u64,
) -> f64 {
    let mut interval = if requested < 0.0 {
        publishing_interval_ms as f64
    } else if requested == 0.0 {
        // Adopt the node's own minimum; 0 stays 0 (exception-based).
        node.minimum_sampling_interval.unwrap_or(0.0)
    } else if requested < MIN_SAMPLING_INTERVAL_MS {
        MIN_SAMPLING_INTERVAL_MS
    } else {
        requested
    };
    if interval > MAX_SAMPLING_INTERVAL_MS {
        interval = MAX_SAMPLING_INTERVAL_MS;
    }
    if interval != 0.0 {
        if let Some(node_minimum) = node.minimum_sampling_interval {
            interval = interval.max(node_minimum);
        }
    }
    interval
}
