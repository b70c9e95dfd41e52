use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("listing {path} failed: {source}")]
    Listing {
        path: String,
        #[source]
        source: storage::GatewayError,
    },

    #[error("schema discovery failed for schema folder {schema_id}: {reason}")]
    SchemaDiscoveryFailed { schema_id: String, reason: String },
}

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Non-fatal findings accumulated while planning. The planner never
/// drops one of these silently; it always returns the
/// full list alongside the batches it did manage to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerWarning {
    OrphanSchemaFolder { schema_id: String },
    MissingSchemaFolder { schema_id: String },
    EmptyFolder { schema_id: String, ts: Option<i64> },
    DuplicateTimestamp { schema_id: String, ts: i64 },
    NoSchemaFolders,
}

impl std::fmt::Display for PlannerWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrphanSchemaFolder { schema_id } => {
                write!(f, "schema folder {schema_id} has no schemaHistory entry")
            }
            Self::MissingSchemaFolder { schema_id } => {
                write!(f, "schemaHistory entry {schema_id} has no folder on disk")
            }
            Self::EmptyFolder { schema_id, ts: Some(ts) } => {
                write!(f, "timestamp folder {schema_id}/{ts} has zero parquet files")
            }
            Self::EmptyFolder { schema_id, ts: None } => {
                write!(f, "schema folder {schema_id} has no timestamp folders")
            }
            Self::DuplicateTimestamp { schema_id, ts } => {
                write!(f, "duplicate timestamp folder {schema_id}/{ts}, dropping the second")
            }
            Self::NoSchemaFolders => write!(f, "no schema folders"),
        }
    }
}
