use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// A currently-live parquet file, as tracked incrementally from replayed
/// `add`/`remove` actions; this set is maintained incrementally rather
/// than rebuilt from scratch per batch.
#[derive(Debug, Clone)]
pub struct LiveFile {
    pub size: i64,
    pub modification_time: i64,
    pub partition_values: BTreeMap<String, Option<String>>,
}

/// Everything the writer knows about one entity's Delta log after
/// open/recover, updated in place as batches are appended.
#[derive(Debug, Clone, Default)]
pub struct LogState {
    /// `None` means the table has no commits yet (next commit is version 0).
    pub version: Option<i64>,
    pub metadata_id: Option<String>,
    pub schema_string: Option<String>,
    /// Path-interned: the path `Arc<str>` is shared between the map key
    /// and any `Batch`/`Add` built from it.
    pub live_files: HashMap<Arc<str>, LiveFile>,
    pub high_water_ts: Option<i64>,
    pub last_schema_id: Option<Arc<str>>,
    pub checkpoint_version: Option<i64>,
}

impl LogState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_version(&self) -> i64 {
        self.version.map_or(0, |v| v + 1)
    }

    pub fn total_bytes(&self) -> i64 {
        self.live_files.values().map(|f| f.size).sum()
    }

    /// A view into `self` sized for the Batch Planner's `PriorState`
    /// input, looked up from the existing log tail via the Writer.
    pub fn as_prior_state(&self) -> batch_planner::PriorState {
        let mut live_files: Vec<batch_planner::PlannedFile> = self
            .live_files
            .iter()
            .map(|(path, f)| batch_planner::PlannedFile {
                path: path.to_string(),
                size: f.size,
            })
            .collect();
        live_files.sort_by(|a, b| a.path.cmp(&b.path));
        batch_planner::PriorState {
            high_water_ts: self.high_water_ts,
            last_schema_id: self.last_schema_id.clone(),
            live_files,
        }
    }
}
