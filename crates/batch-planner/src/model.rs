use std::sync::Arc;

use arrow_schema::SchemaRef;

/// One parquet file as seen by the planner: its absolute source-store
/// path and its size (from a Gateway `head`). No row data is ever read.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub path: String,
    pub size: i64,
}

/// One `<schema_id>/` directory. `arrow_schema` is populated lazily,
/// only for schema folders that introduce a new schema boundary (step
/// 6 of the planning algorithm).
#[derive(Debug, Clone)]
pub struct SchemaFolder {
    pub schema_id: String,
    pub first_seen_ts: i64,
    pub arrow_schema: Option<SchemaRef>,
}

/// One `<schema_id>/<ts>/` directory.
#[derive(Debug, Clone)]
pub struct TimestampFolder {
    pub schema_id: String,
    pub ts: i64,
    pub files: Vec<PlannedFile>,
}

/// One commit unit. `removes` is empty only for the very first batch
/// of a brand-new table.
#[derive(Debug, Clone)]
pub struct Batch {
    pub schema_id: String,
    pub ts: i64,
    pub adds: Vec<PlannedFile>,
    pub removes: Vec<PlannedFile>,
    pub is_schema_change: bool,
    /// Present exactly when `is_schema_change` is true (or this is the
    /// very first batch of a new table): the schema that must be
    /// installed via a `metaData` action in this commit.
    pub new_schema: Option<SchemaRef>,
}

/// What the planner needs to know about the table's current state
/// before it can decide where continuations and schema-change
/// boundaries fall. Supplied by the Delta Log Writer's open/recover
/// step.
///
/// The entity's live-file set at any point in time belongs entirely to
/// a single schema's most recent timestamp folder: a schema change
/// removes everything the previous schema ever added, so `live_files`
/// alone serves as the `removes` set for both a same-schema
/// continuation's next batch and a schema-change boundary's first
/// batch.
#[derive(Debug, Clone, Default)]
pub struct PriorState {
    /// `None` for a brand-new table.
    pub high_water_ts: Option<i64>,
    /// The schema_id that was live as of `high_water_ts`, if any.
    pub last_schema_id: Option<Arc<str>>,
    /// The current live-file set as of `high_water_ts`.
    pub live_files: Vec<PlannedFile>,
}
