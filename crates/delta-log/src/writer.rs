use bytes::Bytes;
use tracing::{info, instrument};

use crate::action::{Action, AddAction, CommitInfoAction, FormatSpec, MetaDataAction, ProtocolAction};
use crate::checkpoint::{write_checkpoint_bytes, LastCheckpoint};
use crate::error::DeltaLogResult;
use crate::open::commit_file_name;
use crate::state::{LiveFile, LogState};

/// Append one planned batch as a single Delta commit. Single attempt,
/// no internal retry: a `CommitConflict` means another writer won the
/// race for this version, and replanning from the refreshed log tail
/// is the orchestrator's job, not this crate's.
#[instrument(skip(gateway, state, batch), fields(schema_id = %batch.schema_id, ts = batch.ts))]
pub async fn append_batch(
    gateway: &storage::Gateway,
    table_root: &storage::ObjectPath,
    state: &mut LogState,
    batch: &batch_planner::Batch,
    now_ms: i64,
) -> DeltaLogResult<i64> {
    let version = state.next_version();
    let mut actions = Vec::new();

    if version == 0 {
        actions.push(Action::Protocol(ProtocolAction::default()));
    }

    if let Some(new_schema) = &batch.new_schema {
        let schema_string = batch_planner::canonical_schema_string(new_schema);
        let metadata_id = blake3::hash(schema_string.as_bytes()).to_hex().to_string();
        actions.push(Action::MetaData(MetaDataAction {
            id: metadata_id.clone(),
            format: FormatSpec::default(),
            schema_string: schema_string.clone(),
            partition_columns: Vec::new(),
            configuration: Default::default(),
            created_time: now_ms,
        }));
        state.metadata_id = Some(metadata_id);
        state.schema_string = Some(schema_string);
    }

    for removed in &batch.removes {
        actions.push(Action::Remove(crate::action::RemoveAction {
            path: removed.path.clone(),
            deletion_timestamp: batch.ts,
            data_change: true,
            extended_file_metadata: true,
            partition_values: Default::default(),
            size: removed.size,
        }));
    }

    for added in &batch.adds {
        actions.push(Action::Add(AddAction {
            path: added.path.clone(),
            partition_values: Default::default(),
            size: added.size,
            modification_time: batch.ts,
            data_change: true,
            stats: None,
        }));
    }

    actions.push(Action::CommitInfo(CommitInfoAction {
        timestamp: now_ms,
        ..CommitInfoAction::default()
    }));

    let body = crate::action::to_ndjson(&actions)?;
    let commit_path = table_root.child("_delta_log").child(commit_file_name(version).as_str());
    gateway.put_if_absent(&commit_path, Bytes::from(body)).await?;

    for removed in &batch.removes {
        state.live_files.remove(removed.path.as_str());
    }
    for added in &batch.adds {
        state.live_files.insert(
            std::sync::Arc::from(added.path.as_str()),
            LiveFile {
                size: added.size,
                modification_time: batch.ts,
                partition_values: Default::default(),
            },
        );
    }
    state.high_water_ts = Some(state.high_water_ts.map_or(batch.ts, |hw| hw.max(batch.ts)));
    state.last_schema_id = Some(std::sync::Arc::from(batch.schema_id.as_str()));
    state.version = Some(version);

    info!(version, adds = batch.adds.len(), removes = batch.removes.len(), "committed batch");
    Ok(version)
}

/// Write a fresh checkpoint at the table's current version and update
/// `_last_checkpoint` to point at it.
#[instrument(skip(gateway, state))]
pub async fn write_checkpoint(gateway: &storage::Gateway, table_root: &storage::ObjectPath, state: &mut LogState) -> DeltaLogResult<()> {
    let version = state
        .version
        .ok_or_else(|| crate::error::DeltaLogError::Corrupt("checkpoint requested before any commit".into()))?;

    let bytes = write_checkpoint_bytes(state, &ProtocolAction::default())?;
    let size = bytes.len() as i64;
    let log_dir = table_root.child("_delta_log");
    let checkpoint_path = log_dir.child(format!("{:020}.checkpoint.parquet", version).as_str());
    gateway.put(&checkpoint_path, Bytes::from(bytes)).await?;

    let last_checkpoint = LastCheckpoint { version, size };
    let last_checkpoint_bytes = serde_json::to_vec(&last_checkpoint)?;
    gateway
        .put(&log_dir.child("_last_checkpoint"), Bytes::from(last_checkpoint_bytes))
        .await?;

    state.checkpoint_version = Some(version);
    info!(version, "wrote checkpoint");
    Ok(())
}
