use thiserror::Error;

pub type UaSubResult<T, E = UaSubError> = Result<T, E>;

/// Failures of the subscription API surface.
///
/// Wire-visible outcomes (validation results, acknowledgement results, ...)
/// are `StatusCode` values carried in operation results, never errors. This
/// type only covers the cases where an operation could not be performed at
/// all.
#[derive(Error, Debug)]
pub enum UaSubError {
    /// The subscription has already transitioned to its terminal state.
    #[error("subscription {0} is closed")]
    SubscriptionClosed(u32),
    /// The subscription actor is gone (cancelled or panicked); no further
    /// operations can be delivered to it.
    #[error("subscription actor unavailable")]
    ActorUnavailable,
    #[error("invalid subscription parameter: {0}")]
    InvalidParameter(String),
}

impl From<String> for UaSubError {
    #[inline]
    fn from(e: String) -> Self {
        UaSubError::InvalidParameter(e)
    }
}

impl From<&str> for UaSubError {
    #[inline]
    fn from(e: &str) -> Self {
        UaSubError::InvalidParameter(e.to_string())
    }
}
