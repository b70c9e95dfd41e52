use thiserror::Error;

/// A missing or malformed manifest aborts the whole run: there is no
/// per-entity recovery when the entity list itself is unknown.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not read manifest at {uri}: {source}")]
    Unreadable {
        uri: String,
        #[source]
        source: storage::GatewayError,
    },

    #[error("manifest at {uri} is not valid JSON: {source}")]
    InvalidJson {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ManifestResult<T> = Result<T, ManifestError>;
