use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeltaLogError {
    #[error("transient store error: {0}")]
    StoreTransient(#[source] storage::GatewayError),

    #[error("permanent store error: {0}")]
    StorePermanent(#[source] storage::GatewayError),

    #[error("commit conflict at version {version}")]
    CommitConflict { version: i64 },

    #[error("checkpoint failed at version {version}: {reason}")]
    CheckpointFailed { version: i64, reason: String },

    #[error("commit log corrupt: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type DeltaLogResult<T> = Result<T, DeltaLogError>;

impl From<storage::GatewayError> for DeltaLogError {
    fn from(e: storage::GatewayError) -> Self {
        match &e {
            storage::GatewayError::Conflict { .. } => DeltaLogError::CommitConflict { version: -1 },
            storage::GatewayError::Transient { .. } => DeltaLogError::StoreTransient(e),
            _ => DeltaLogError::StorePermanent(e),
        }
    }
}
