use thiserror::Error;

/// Faults raised by the estimation core.
///
/// Running out of data is not a fault: outputs that cannot be computed on a
/// tick are simply absent from [`crate::TickOutputs`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
    #[error("tick at {received}s is not after the previous tick at {previous}s")]
    OutOfOrderTick { previous: f64, received: f64 },
    #[error("non-finite sample (timestamp {timestamp}, value {value})")]
    NonFiniteSample { timestamp: f64, value: f64 },
}

impl PipelineError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
