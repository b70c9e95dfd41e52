use thiserror::Error;

/// Any error a single entity's pipeline can produce. Kept as one enum so
/// `EntityResult` has a uniform error type regardless of which component
/// it came from.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error(transparent)]
    Planner(#[from] batch_planner::PlannerError),

    #[error(transparent)]
    DeltaLog(#[from] delta_log::DeltaLogError),

    #[error("commit retry cap ({cap}) exceeded for entity {table_name}")]
    RetriesExhausted { table_name: String, cap: u32 },
}

/// Run-fatal vs entity-fatal vs advisory. A manifest read failure aborts
/// the whole run (there's nothing to fan out over); a single entity's
/// planner/writer failure is attached to that entity's `Result` and its
/// peers continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Abort,
    EntityFatal,
    Warning,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to open source gateway: {0}")]
    SourceGatewayOpen(#[from] storage::GatewayError),

    #[error("failed to read manifest: {0}")]
    Manifest(#[from] manifest::ManifestError),
}

pub fn classify_planner(err: &batch_planner::PlannerError) -> Severity {
    match err {
        batch_planner::PlannerError::Listing { .. } => Severity::EntityFatal,
        batch_planner::PlannerError::SchemaDiscoveryFailed { .. } => Severity::EntityFatal,
    }
}

pub fn classify_delta_log(err: &delta_log::DeltaLogError) -> Severity {
    match err {
        delta_log::DeltaLogError::CommitConflict { .. } => Severity::EntityFatal,
        delta_log::DeltaLogError::CheckpointFailed { .. } => Severity::Warning,
        delta_log::DeltaLogError::StoreTransient(_) => Severity::EntityFatal,
        delta_log::DeltaLogError::StorePermanent(_) => Severity::EntityFatal,
        delta_log::DeltaLogError::Corrupt(_) => Severity::EntityFatal,
        delta_log::DeltaLogError::Serialize(_) => Severity::EntityFatal,
    }
}
