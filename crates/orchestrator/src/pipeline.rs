use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::RunConfig;
use crate::error::{classify_delta_log, classify_planner, EntityError, Severity};
use crate::progress::ProgressSink;

#[derive(Debug, Clone)]
pub struct EntityResult {
    pub table_name: String,
    pub committed_versions: Vec<i64>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl EntityResult {
    fn ok(table_name: String, committed_versions: Vec<i64>, warnings: Vec<String>) -> Self {
        Self {
            table_name,
            committed_versions,
            warnings,
            error: None,
        }
    }

    fn failed(table_name: String, warnings: Vec<String>, error: impl std::fmt::Display) -> Self {
        Self {
            table_name,
            committed_versions: Vec::new(),
            warnings,
            error: Some(error.to_string()),
        }
    }
}

/// Run one entity's `OPEN -> (PLAN -> APPEND* -> CHECKPOINT?) -> DONE`
/// state machine to completion.
///
/// Conflicts during `append_batch` trigger a bounded reopen-and-replan
/// loop: the log tail is re-read, batches are replanned from the
/// refreshed `PriorState`, and only the batches not yet committed are
/// retried. This lives here rather than in `delta-log` because
/// replanning needs the Batch Planner, which `delta-log` never depends
/// on.
#[instrument(skip(source_gateway, target_gateway, entry, config, progress), fields(table = %entry.table_name))]
pub async fn run_entity(
    source_gateway: Arc<storage::Gateway>,
    target_gateway: Arc<storage::Gateway>,
    entry: manifest::ManifestEntry,
    table_root: storage::ObjectPath,
    config: &RunConfig,
    progress: &dyn ProgressSink,
) -> EntityResult {
    let table_name = entry.table_name.clone();
    let mut all_warnings = Vec::new();
    let now_ms = now_ms_placeholder();

    let mut state = match delta_log::open(&target_gateway, &table_root).await {
        Ok(s) => s,
        Err(e) => {
            progress.finish(&table_name, false);
            return EntityResult::failed(table_name, all_warnings, e);
        }
    };

    let mut committed = Vec::new();
    let mut attempt = 0u32;

    loop {
        let prior = state.as_prior_state();
        let (batches, warnings) = match batch_planner::plan_batches(&source_gateway, &entry, &prior).await {
            Ok(v) => v,
            Err(e) => {
                let severity = classify_planner(&e);
                warn!(?severity, error = %e, "planning failed");
                progress.finish(&table_name, false);
                return EntityResult::failed(table_name, all_warnings, e);
            }
        };
        all_warnings.extend(warnings.iter().map(|w| w.to_string()));

        if batches.is_empty() {
            break;
        }

        let mut conflict = false;
        for batch in &batches {
            match delta_log::append_batch(&target_gateway, &table_root, &mut state, batch, now_ms).await {
                Ok(version) => {
                    committed.push(version);
                    progress.advance(&table_name, 1);
                    if should_checkpoint(version, config.checkpoint_interval) {
                        if let Err(e) = delta_log::write_checkpoint(&target_gateway, &table_root, &mut state).await {
                            warn!(error = %e, "checkpoint failed, continuing without it");
                            all_warnings.push(format!("checkpoint at version {version} failed: {e}"));
                        }
                    }
                }
                Err(e) => {
                    let severity = classify_delta_log(&e);
                    if severity == Severity::EntityFatal && matches!(e, delta_log::DeltaLogError::CommitConflict { .. }) {
                        conflict = true;
                        break;
                    }
                    progress.finish(&table_name, false);
                    return EntityResult::failed(table_name, all_warnings, e);
                }
            }
        }

        if !conflict {
            break;
        }

        attempt += 1;
        if attempt > config.commit_retry_cap {
            let err = EntityError::RetriesExhausted {
                table_name: table_name.clone(),
                cap: config.commit_retry_cap,
            };
            progress.finish(&table_name, false);
            return EntityResult::failed(table_name, all_warnings, err);
        }
        warn!(attempt, "commit conflict, reseating state and replanning");
        state = match delta_log::open(&target_gateway, &table_root).await {
            Ok(s) => s,
            Err(e) => {
                progress.finish(&table_name, false);
                return EntityResult::failed(table_name, all_warnings, e);
            }
        };
    }

    info!(committed = committed.len(), "entity pipeline done");
    progress.finish(&table_name, true);
    EntityResult::ok(table_name, committed, all_warnings)
}

fn should_checkpoint(version: i64, interval: u32) -> bool {
    interval > 0 && version > 0 && (version as u64) % (interval as u64) == 0
}

/// `delta-log`/`batch-planner` take an explicit commit timestamp instead
/// of calling a clock internally, so replay and tests stay deterministic.
/// The orchestrator is the one caller that actually needs wall-clock
/// time; it is isolated here so it can be swapped for an injected clock
/// if a future caller needs one.
fn now_ms_placeholder() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
