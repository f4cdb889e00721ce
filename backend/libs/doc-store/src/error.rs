use thiserror::Error;

/// Why a single item of a multi-item transaction was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    /// This item did not cause the cancellation.
    None,
    /// The item's condition evaluated to false.
    ConditionalCheckFailed,
    /// Another request touched the item concurrently.
    TransactionConflict,
    /// Any other backend-reported code.
    Other(String),
}

impl CancellationReason {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            None | Some("None") => Self::None,
            Some("ConditionalCheckFailed") => Self::ConditionalCheckFailed,
            Some("TransactionConflict") => Self::TransactionConflict,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conditional check failed")]
    ConditionalCheckFailed,

    #[error("Transaction canceled: {0:?}")]
    TransactionCanceled(Vec<CancellationReason>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, StoreError::ConditionalCheckFailed)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
