use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, BooleanArray, Int32Array, Int64Array, StringArray, StructArray};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, instrument, warn};

use crate::action::Action;
use crate::checkpoint::LastCheckpoint;
use crate::error::{DeltaLogError, DeltaLogResult};
use crate::state::{LiveFile, LogState};

/// Recover a table's `LogState` from whatever is already in
/// `_delta_log/`: the latest checkpoint, if any, plus every commit
/// JSON newer than it, replayed in order.
#[instrument(skip(gateway), fields(table_root = %table_root.as_ref()))]
pub async fn open(gateway: &storage::Gateway, table_root: &storage::ObjectPath) -> DeltaLogResult<LogState> {
    let log_dir = table_root.child("_delta_log");

    let mut state = LogState::new();

    let last_checkpoint = read_last_checkpoint(gateway, &log_dir).await?;
    let mut start_version = 0i64;

    if let Some(lc) = last_checkpoint {
        let checkpoint_path = log_dir.child(format!("{:020}.checkpoint.parquet", lc.version).as_str());
        match gateway.get(&checkpoint_path).await {
            Ok(bytes) => {
                apply_checkpoint(&mut state, bytes)?;
                state.version = Some(lc.version);
                state.checkpoint_version = Some(lc.version);
                start_version = lc.version + 1;
            }
            Err(storage::GatewayError::NotFound { .. }) => {
                warn!(version = lc.version, "_last_checkpoint points at a missing checkpoint file, replaying from the start");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let listing = gateway.list_dir(&log_dir).await;
    let commit_versions = match listing {
        Ok(listing) => {
            let mut versions: Vec<i64> = listing
                .files
                .iter()
                .filter_map(|m| parse_commit_version(m.location.as_ref()))
                .filter(|v| *v >= start_version)
                .collect();
            versions.sort_unstable();
            versions
        }
        Err(storage::GatewayError::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    for version in commit_versions {
        let path = log_dir.child(commit_file_name(version).as_str());
        let bytes = gateway.get(&path).await?;
        apply_commit(&mut state, &bytes)?;
        state.version = Some(version);
    }

    debug!(version = ?state.version, live_files = state.live_files.len(), "recovered log state");
    Ok(state)
}

pub fn commit_file_name(version: i64) -> String {
    format!("{:020}.json", version)
}

fn parse_commit_version(path: &str) -> Option<i64> {
    let name = path.rsplit('/').next()?;
    let stem = name.strip_suffix(".json")?;
    if stem.len() != 20 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

async fn read_last_checkpoint(
    gateway: &storage::Gateway,
    log_dir: &storage::ObjectPath,
) -> DeltaLogResult<Option<LastCheckpoint>> {
    let path = log_dir.child("_last_checkpoint");
    match gateway.get(&path).await {
        Ok(bytes) => {
            let lc: LastCheckpoint = serde_json::from_slice(&bytes)?;
            Ok(Some(lc))
        }
        Err(storage::GatewayError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn apply_commit(state: &mut LogState, bytes: &[u8]) -> DeltaLogResult<()> {
    for line in bytes.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let action: Action = serde_json::from_slice(line)?;
        apply_action(state, action);
    }
    Ok(())
}

fn apply_action(state: &mut LogState, action: Action) {
    match action {
        Action::Protocol(_) => {}
        Action::MetaData(m) => {
            state.metadata_id = Some(m.id);
            state.schema_string = Some(m.schema_string);
        }
        Action::Add(a) => {
            state.high_water_ts = Some(state.high_water_ts.map_or(a.modification_time, |hw| hw.max(a.modification_time)));
            state.live_files.insert(
                Arc::from(a.path.as_str()),
                LiveFile {
                    size: a.size,
                    modification_time: a.modification_time,
                    partition_values: a.partition_values,
                },
            );
        }
        Action::Remove(r) => {
            state.live_files.remove(r.path.as_str());
        }
        Action::CommitInfo(_) => {}
    }
}

/// Checkpoints only ever carry the table's state *as of the checkpoint
/// version*, so applying one is a full reset of `live_files`/metadata
/// rather than an incremental replay.
fn apply_checkpoint(state: &mut LogState, bytes: Bytes) -> DeltaLogResult<()> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| DeltaLogError::Corrupt(format!("unreadable checkpoint: {e}")))?
        .build()
        .map_err(|e| DeltaLogError::Corrupt(format!("unreadable checkpoint: {e}")))?;

    for batch in reader {
        let batch: RecordBatch = batch.map_err(|e| DeltaLogError::Corrupt(format!("unreadable checkpoint batch: {e}")))?;
        apply_checkpoint_batch(state, &batch)?;
    }
    Ok(())
}

fn apply_checkpoint_batch(state: &mut LogState, batch: &RecordBatch) -> DeltaLogResult<()> {
    let add_col = struct_column(batch, "add")?;
    let metadata_col = struct_column(batch, "metaData")?;

    let path_col = child_string(add_col, "path")?;
    let pv_col = child_string(add_col, "partitionValues")?;
    let size_col = child_i64(add_col, "size")?;
    let mtime_col = child_i64(add_col, "modificationTime")?;

    for row in 0..batch.num_rows() {
        if add_col.is_valid(row) && !path_col.is_null(row) {
            let path = path_col.value(row).to_string();
            let partition_values: BTreeMap<String, Option<String>> = if pv_col.is_null(row) {
                BTreeMap::new()
            } else {
                serde_json::from_str(pv_col.value(row)).unwrap_or_default()
            };
            let size = if size_col.is_null(row) { 0 } else { size_col.value(row) };
            let modification_time = if mtime_col.is_null(row) { 0 } else { mtime_col.value(row) };
            state.high_water_ts = Some(state.high_water_ts.map_or(modification_time, |hw| hw.max(modification_time)));
            state.live_files.insert(
                Arc::from(path.as_str()),
                LiveFile {
                    size,
                    modification_time,
                    partition_values,
                },
            );
        }
    }

    let id_col = child_string(metadata_col, "id")?;
    let schema_col = child_string(metadata_col, "schemaString")?;
    for row in 0..batch.num_rows() {
        if metadata_col.is_valid(row) && !id_col.is_null(row) {
            state.metadata_id = Some(id_col.value(row).to_string());
            state.schema_string = Some(schema_col.value(row).to_string());
        }
    }

    Ok(())
}

fn struct_column<'a>(batch: &'a RecordBatch, name: &str) -> DeltaLogResult<&'a StructArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StructArray>())
        .ok_or_else(|| DeltaLogError::Corrupt(format!("checkpoint missing `{name}` column")))
}

fn child_string<'a>(s: &'a StructArray, name: &str) -> DeltaLogResult<&'a StringArray> {
    s.column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| DeltaLogError::Corrupt(format!("checkpoint struct missing `{name}` field")))
}

fn child_i64<'a>(s: &'a StructArray, name: &str) -> DeltaLogResult<&'a Int64Array> {
    s.column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| DeltaLogError::Corrupt(format!("checkpoint struct missing `{name}` field")))
}

#[allow(dead_code)]
fn child_i32<'a>(s: &'a StructArray, name: &str) -> DeltaLogResult<&'a Int32Array> {
    s.column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| DeltaLogError::Corrupt(format!("checkpoint struct missing `{name}` field")))
}

#[allow(dead_code)]
fn child_bool<'a>(s: &'a StructArray, name: &str) -> DeltaLogResult<&'a BooleanArray> {
    s.column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
        .ok_or_else(|| DeltaLogError::Corrupt(format!("checkpoint struct missing `{name}` field")))
}
