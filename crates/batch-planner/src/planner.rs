use std::collections::{HashMap, HashSet};

use futures::{stream, StreamExt};
use tracing::warn;

use crate::error::{PlannerError, PlannerResult, PlannerWarning};
use crate::model::{Batch, PlannedFile, PriorState, SchemaFolder, TimestampFolder};
use crate::schema::read_schema_footer;

/// Bounded fan-out for listing/HEADing timestamp folders within one
/// entity.
const LIST_FANOUT: usize = 16;

/// Enumerate the ordered sequence of batches to commit for one entity.
/// `entry.data_files_path` is listed via the Gateway; `prior` describes
/// what the Delta Log Writer already knows about the table.
pub async fn plan_batches(
    gateway: &storage::Gateway,
    entry: &manifest::ManifestEntry,
    prior: &PriorState,
) -> PlannerResult<(Vec<Batch>, Vec<PlannerWarning>)> {
    let mut warnings = Vec::new();
    let root = gateway.child(&relative_path(&entry.data_files_path));

    // Step 1: list schema-id folders, cross-reference with schemaHistory.
    let listing = gateway.list_dir(&root).await.map_err(|source| PlannerError::Listing {
        path: root.as_ref().to_string(),
        source,
    })?;
    let folder_names: HashSet<String> = listing
        .directories
        .iter()
        .filter_map(|p| last_segment(p.as_ref()))
        .collect();

    let mut schema_folders = Vec::new();
    let history: HashMap<&str, i64> = entry
        .schema_history
        .iter()
        .map(|(id, ts)| (id.as_str(), *ts))
        .collect();

    for (schema_id, first_seen_ts) in &entry.schema_history {
        if !folder_names.contains(schema_id) {
            warnings.push(PlannerWarning::MissingSchemaFolder {
                schema_id: schema_id.clone(),
            });
            continue;
        }
        schema_folders.push(SchemaFolder {
            schema_id: schema_id.clone(),
            first_seen_ts: *first_seen_ts,
            arrow_schema: None,
        });
    }
    for name in &folder_names {
        if !history.contains_key(name.as_str()) {
            warnings.push(PlannerWarning::OrphanSchemaFolder {
                schema_id: name.clone(),
            });
        }
    }

    if schema_folders.is_empty() {
        warnings.push(PlannerWarning::NoSchemaFolders);
        return Ok((Vec::new(), warnings));
    }

    // Step 2: sort ascending by first_seen_ts.
    schema_folders.sort_by_key(|f| f.first_seen_ts);

    let mut batches = Vec::new();
    let mut last_schema_id = prior.last_schema_id.as_deref().map(|s| s.to_string());
    let mut last_ts_files: Vec<PlannedFile> = prior.live_files.clone();

    for schema_folder in schema_folders {
        let schema_dir = root.child(schema_folder.schema_id.as_str());

        // Step 3: list + sort timestamp folders.
        let ts_listing = gateway
            .list_dir(&schema_dir)
            .await
            .map_err(|source| PlannerError::Listing {
                path: schema_dir.as_ref().to_string(),
                source,
            })?;
        let mut ts_names: Vec<i64> = ts_listing
            .directories
            .iter()
            .filter_map(|p| last_segment(p.as_ref()))
            .filter_map(|s| s.parse::<i64>().ok())
            .collect();
        ts_names.sort_unstable();
        ts_names.dedup_by(|a, b| {
            if a == b {
                warn!(schema_id = %schema_folder.schema_id, ts = *a, "duplicate timestamp folder");
                true
            } else {
                false
            }
        });

        // Step 4: drop folders already committed.
        let surviving: Vec<i64> = ts_names
            .into_iter()
            .filter(|ts| match prior.high_water_ts {
                Some(hw) => *ts > hw,
                None => true,
            })
            .collect();

        if surviving.is_empty() {
            continue;
        }

        let folders = fetch_timestamp_folders(gateway, &schema_dir, &schema_folder.schema_id, &surviving).await?;

        let is_continuation =
            prior.high_water_ts.map_or(false, |hw| schema_folder.first_seen_ts <= hw)
                && last_schema_id.as_deref() == Some(schema_folder.schema_id.as_str());

        let mut prev_files: Option<Vec<PlannedFile>> = if is_continuation {
            Some(last_ts_files.clone())
        } else {
            None
        };

        let mut emitted_any = false;

        for folder in folders.into_iter() {
            if folder.files.is_empty() {
                warnings.push(PlannerWarning::EmptyFolder {
                    schema_id: schema_folder.schema_id.clone(),
                    ts: Some(folder.ts),
                });
                continue;
            }

            let is_schema_change = !emitted_any && !is_continuation;
            emitted_any = true;
            let new_schema = if is_schema_change {
                let first_file = &folder.files[0];
                let file_path = storage::ObjectPath::from(first_file.path.as_str());
                Some(read_schema_footer(gateway, &file_path).await?)
            } else {
                None
            };

            let removes: Vec<PlannedFile> = if is_schema_change {
                last_ts_files.clone()
            } else {
                prev_files.clone().unwrap_or_default()
            };

            batches.push(Batch {
                schema_id: schema_folder.schema_id.clone(),
                ts: folder.ts,
                adds: folder.files.clone(),
                removes,
                is_schema_change,
                new_schema,
            });

            prev_files = Some(folder.files);
        }

        if let Some(files) = &prev_files {
            last_ts_files = files.clone();
            last_schema_id = Some(schema_folder.schema_id.clone());
        }
    }

    Ok((batches, warnings))
}

async fn fetch_timestamp_folders(
    gateway: &storage::Gateway,
    schema_dir: &storage::ObjectPath,
    schema_id: &str,
    timestamps: &[i64],
) -> PlannerResult<Vec<TimestampFolder>> {
    let results: Vec<PlannerResult<TimestampFolder>> = stream::iter(timestamps.iter().copied())
        .map(|ts| {
            let gateway = gateway;
            let ts_dir = schema_dir.child(ts.to_string().as_str());
            async move {
                let listing = gateway.list_dir(&ts_dir).await.map_err(|source| PlannerError::Listing {
                    path: ts_dir.as_ref().to_string(),
                    source,
                })?;
                let mut files = Vec::new();
                for meta in listing.files {
                    if !meta.location.as_ref().ends_with(".parquet") {
                        continue;
                    }
                    files.push(PlannedFile {
                        path: meta.location.as_ref().to_string(),
                        size: meta.size as i64,
                    });
                }
                files.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(TimestampFolder {
                    schema_id: schema_id.to_string(),
                    ts,
                    files,
                })
            }
        })
        .buffered(LIST_FANOUT)
        .collect()
        .await;

    let mut out = Vec::with_capacity(results.len());
    for r in results {
        out.push(r?);
    }
    Ok(out)
}

fn last_segment(path: &str) -> Option<String> {
    path.trim_end_matches('/').rsplit('/').next().map(|s| s.to_string())
}

fn relative_path(data_files_path: &str) -> String {
    // data_files_path may itself be a full source-store URI; strip any
    // scheme/bucket prefix down to the path relative to the gateway's root.
    match storage::parse_uri(data_files_path) {
        Ok(parsed) => parsed.root.as_ref().to_string(),
        Err(_) => data_files_path.trim_start_matches('/').to_string(),
    }
}

