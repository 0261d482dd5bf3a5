use crate::domain::party::PartyId;
use crate::domain::request::{RequestId, Status};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("party {actor} is not allowed to act on {target}")]
    Forbidden { actor: PartyId, target: String },
    #[error("request {request} is {actual}, expected {expected}")]
    InvalidTransition {
        request: RequestId,
        expected: Status,
        actual: Status,
    },
    #[error("verification code does not match")]
    InvalidCode,
    #[error("holder {0} is busy")]
    HolderUnavailable(PartyId),
    #[error("requested units must be positive")]
    InvalidUnits,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    pub fn request_not_found(id: RequestId) -> Self {
        Self::NotFound(format!("request {id}"))
    }

    pub fn party_not_found(id: &PartyId) -> Self {
        Self::NotFound(format!("party {id}"))
    }

    /// Whether the error is a rejected guard rather than an infrastructure failure.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Forbidden { .. }
                | Self::InvalidTransition { .. }
                | Self::InvalidCode
                | Self::HolderUnavailable(_)
                | Self::InvalidUnits
        )
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
