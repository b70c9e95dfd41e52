use thiserror::Error;

/// The four failure modes the Gateway exposes to its callers:
/// `NotFound`, `Transient`, `AccessDenied`, `Conflict`. Everything else
/// bubbling up from `object_store` is classified into one of these at
/// the Gateway boundary so upstream crates never need to match on
/// `object_store::Error` directly.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("transient store error on {path}: {source}")]
    Transient {
        path: String,
        #[source]
        source: object_store::Error,
    },

    #[error("access denied for {path}: {source}")]
    AccessDenied {
        path: String,
        #[source]
        source: object_store::Error,
    },

    #[error("conditional put conflict on {path}: already exists")]
    Conflict { path: String },

    #[error("invalid uri: {0}")]
    InvalidUri(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classify a raw `object_store::Error` at a given path into a
/// `GatewayError`. Conflict is not modeled here: it is only raised by
/// `Gateway::put_if_absent` inspecting `object_store::Error::AlreadyExists`.
pub fn classify(path: &str, err: object_store::Error) -> GatewayError {
    match &err {
        object_store::Error::NotFound { .. } => GatewayError::NotFound {
            path: path.to_string(),
        },
        object_store::Error::AlreadyExists { .. } => GatewayError::Conflict {
            path: path.to_string(),
        },
        object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
            GatewayError::AccessDenied {
                path: path.to_string(),
                source: err,
            }
        }
        _ => GatewayError::Transient {
            path: path.to_string(),
            source: err,
        },
    }
}

impl GatewayError {
    /// Whether retrying the operation that produced this error is worth
    /// attempting. `NotFound`/`AccessDenied`/`Conflict` are never
    /// retryable by the Gateway itself (conflict retries are a
    /// higher-level concern, owned by the Delta Log Writer).
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }
}
