use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt::{self, Display, Formatter};

/// OPC UA status codes used by the subscription layer.
///
/// Values are the standard numeric codes so they can be carried onto the wire
/// unchanged. The severity lives in the top two bits (`00` good, `10` bad).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum StatusCode {
    Good = 0x0000_0000,
    BadTimeout = 0x800A_0000,
    BadNothingToDo = 0x800F_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadIndexRangeInvalid = 0x8036_0000,
    BadDataEncodingInvalid = 0x8038_0000,
    BadDataEncodingUnsupported = 0x8039_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadFilterNotAllowed = 0x8045_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadDeadbandFilterInvalid = 0x808E_0000,
    BadInvalidState = 0x80AF_0000,
}

impl StatusCode {
    #[inline]
    pub fn is_good(self) -> bool {
        (self as u32) & 0xC000_0000 == 0
    }

    #[inline]
    pub fn is_bad(self) -> bool {
        (self as u32) & 0x8000_0000 != 0
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Good => "Good",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadNothingToDo => "BadNothingToDo",
            StatusCode::BadSubscriptionIdInvalid => "BadSubscriptionIdInvalid",
            StatusCode::BadNodeIdInvalid => "BadNodeIdInvalid",
            StatusCode::BadNodeIdUnknown => "BadNodeIdUnknown",
            StatusCode::BadAttributeIdInvalid => "BadAttributeIdInvalid",
            StatusCode::BadIndexRangeInvalid => "BadIndexRangeInvalid",
            StatusCode::BadDataEncodingInvalid => "BadDataEncodingInvalid",
            StatusCode::BadDataEncodingUnsupported => "BadDataEncodingUnsupported",
            StatusCode::BadMonitoredItemIdInvalid => "BadMonitoredItemIdInvalid",
            StatusCode::BadFilterNotAllowed => "BadFilterNotAllowed",
            StatusCode::BadSequenceNumberUnknown => "BadSequenceNumberUnknown",
            StatusCode::BadDeadbandFilterInvalid => "BadDeadbandFilterInvalid",
            StatusCode::BadInvalidState => "BadInvalidState",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
