mod config;
mod error;
mod pipeline;
mod progress;

pub use config::{RunConfig, TargetCloud};
pub use error::{classify_delta_log, classify_planner, EntityError, OrchestratorError, Severity};
pub use pipeline::{run_entity, EntityResult};
pub use progress::{NoopProgressSink, ProgressSink};

use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{info, instrument};

/// Entry point for a full run: read the manifest, fan out one pipeline
/// per admitted entity bounded by `config.max_workers`, and return every
/// entity's `Result` (including failed ones) plus manifest-level
/// warnings. One entity's fatal error never prevents its peers from
/// completing; the run only aborts outright if the manifest itself
/// can't be read.
#[instrument(skip(config, progress))]
pub async fn run(config: &RunConfig, progress: Arc<dyn ProgressSink>) -> Result<Vec<EntityResult>, OrchestratorError> {
    // Opened at the true bucket/filesystem root (empty gateway-relative
    // root) rather than at the manifest's own directory: `data_files_path`
    // in each manifest entry is a full root-relative (or full-URI) path,
    // and the Batch Planner resolves it via `gateway.child`, which only
    // gives the right answer when the gateway's own root is empty.
    let source_gateway = Arc::new(
        storage::Gateway::open(
            storage::Role::Source,
            &store_root_uri(&config.manifest_uri),
            &storage::StorageOptions {
                retry: storage::RetryPolicy {
                    max_attempts: config.retry_cap,
                    ..Default::default()
                },
                credentials: Some(config.source_credentials.clone()),
                ..Default::default()
            },
        )
        .await?,
    );

    let manifest_path = storage::parse_uri(&config.manifest_uri)
        .map(|p| p.root)
        .unwrap_or_else(|_| storage::ObjectPath::from(config.manifest_uri.trim_start_matches('/')));
    let (entries, manifest_warnings) = manifest::read_manifest(&source_gateway, &manifest_path, config.table_names.as_ref())
        .await
        .map_err(OrchestratorError::Manifest)?;

    for w in &manifest_warnings {
        tracing::warn!(%w, "manifest entry skipped");
    }

    progress.start(entries.len());

    let results: Arc<Mutex<Vec<EntityResult>>> = Arc::new(Mutex::new(Vec::new()));
    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

    if config.parallel {
        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let source_gateway = source_gateway.clone();
            let semaphore = semaphore.clone();
            let results = results.clone();
            let progress = progress.clone();
            let target_root_uri = render_target_root(&config.target_table_root, &entry.table_name);
            let target_creds = config.target_credentials.clone();
            let retry_cap = config.retry_cap;
            let config = config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let target_gateway = match open_target_gateway(&target_root_uri, &target_creds, retry_cap).await {
                    Ok(gw) => gw,
                    Err(e) => {
                        let mut guard = results.lock().expect("results mutex poisoned");
                        guard.push(EntityResult {
                            table_name: entry.table_name.clone(),
                            committed_versions: Vec::new(),
                            warnings: Vec::new(),
                            error: Some(e.to_string()),
                        });
                        return;
                    }
                };
                let table_root = target_gateway.root().clone();
                let result = pipeline::run_entity(source_gateway, Arc::new(target_gateway), entry, table_root, &config, progress.as_ref()).await;
                results.lock().expect("results mutex poisoned").push(result);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    } else {
        for entry in entries {
            let target_root_uri = render_target_root(&config.target_table_root, &entry.table_name);
            let target_gateway = match open_target_gateway(&target_root_uri, &config.target_credentials, config.retry_cap).await {
                Ok(gw) => gw,
                Err(e) => {
                    results.lock().expect("results mutex poisoned").push(EntityResult {
                        table_name: entry.table_name.clone(),
                        committed_versions: Vec::new(),
                        warnings: Vec::new(),
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };
            let table_root = target_gateway.root().clone();
            let result = pipeline::run_entity(
                source_gateway.clone(),
                Arc::new(target_gateway),
                entry,
                table_root,
                config,
                progress.as_ref(),
            )
            .await;
            results.lock().expect("results mutex poisoned").push(result);
        }
    }

    let mut out = Arc::try_unwrap(results).expect("no outstanding references").into_inner().expect("results mutex poisoned");
    out.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    info!(entities = out.len(), "run complete");
    Ok(out)
}

async fn open_target_gateway(
    uri: &str,
    credentials: &storage::RoleCredentials,
    retry_cap: u32,
) -> Result<storage::Gateway, storage::GatewayError> {
    storage::Gateway::open(
        storage::Role::Target,
        uri,
        &storage::StorageOptions {
            retry: storage::RetryPolicy {
                max_attempts: retry_cap,
                ..Default::default()
            },
            credentials: Some(credentials.clone()),
            ..Default::default()
        },
    )
    .await
}

/// Substitute `{table}` in a per-table URI template, or fall back to
/// appending the table name as a path segment when the template has no
/// placeholder.
fn render_target_root(template: &str, table_name: &str) -> String {
    if template.contains("{table}") {
        template.replace("{table}", table_name)
    } else {
        format!("{}/{}", template.trim_end_matches('/'), table_name)
    }
}

/// The bucket/container/filesystem root for `uri`, stripped of any
/// path component: `s3://bucket/a/b` -> `s3://bucket`, any local path
/// -> `/` (the `object_store` `LocalFileSystem` is always rooted at the
/// real filesystem root regardless of which local path a `Gateway` is
/// opened with). Opening every source `Gateway` here keeps its
/// `root()` empty, which is what makes `entry.data_files_path` usable
/// as-is by the Batch Planner.
fn store_root_uri(uri: &str) -> String {
    match storage::parse_uri(uri) {
        Ok(parsed) if parsed.url.scheme() != "file" => {
            format!("{}://{}", parsed.url.scheme(), parsed.url.host_str().unwrap_or_default())
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_target_root_substitutes_placeholder() {
        assert_eq!(render_target_root("s3://bucket/delta/{table}", "orders"), "s3://bucket/delta/orders");
    }

    #[test]
    fn render_target_root_appends_when_no_placeholder() {
        assert_eq!(render_target_root("s3://bucket/delta", "orders"), "s3://bucket/delta/orders");
    }

    #[test]
    fn store_root_uri_strips_path_for_cloud_schemes() {
        assert_eq!(store_root_uri("s3://bucket/cda/manifest.json"), "s3://bucket");
    }

    #[test]
    fn store_root_uri_is_filesystem_root_for_local_paths() {
        assert_eq!(store_root_uri("/tmp/some/manifest.json"), "/");
    }

    use std::sync::atomic::{AtomicUsize, Ordering};

    use arrow::array::{Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use arrow_schema::{DataType, Field, Schema as ArrowSchema};
    use parquet::arrow::ArrowWriter;

    fn write_sample_parquet(path: &std::path::Path) {
        let schema = Arc::new(ArrowSchema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[derive(Default)]
    struct CountingProgressSink {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ProgressSink for CountingProgressSink {
        fn start(&self, _total: usize) {}
        // Each test fixture entity commits exactly one batch, so `advance`
        // fires once per entity while its pipeline task still holds its
        // semaphore permit; pairing the increment here with the decrement
        // in `finish` turns these into an accurate concurrently-alive count.
        fn advance(&self, _table: &str, _n: u64) {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        }
        fn finish(&self, _table: &str, _ok: bool) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn write_manifest_fixture(base: &std::path::Path, tables: &[&str]) {
        std::fs::create_dir_all(base.join("cda")).unwrap();
        let mut entries = serde_json::Map::new();
        for table in tables {
            let ts_dir = base.join("cda").join(table).join("s1").join("1000");
            std::fs::create_dir_all(&ts_dir).unwrap();
            write_sample_parquet(&ts_dir.join("part-0.parquet"));
            entries.insert(
                table.to_string(),
                serde_json::json!({
                    "dataFilesPath": base.join("cda").join(table).to_string_lossy(),
                    "lastSuccessfulWriteTimestamp": "1",
                    "schemaHistory": {"s1": "500"},
                }),
            );
        }
        let manifest = serde_json::Value::Object(entries);
        std::fs::write(base.join("manifest.json"), manifest.to_string()).unwrap();
    }

    fn test_config(base: &std::path::Path) -> RunConfig {
        RunConfig {
            manifest_uri: base.join("manifest.json").to_string_lossy().to_string(),
            target_table_root: base.join("target").to_string_lossy().to_string(),
            max_workers: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn run_commits_every_admitted_entity() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest_fixture(dir.path(), &["orders", "claims"]);
        let config = test_config(dir.path());

        let results = run(&config, Arc::new(NoopProgressSink)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error.is_none()));
        assert_eq!(results[0].table_name, "claims");
        assert_eq!(results[1].table_name, "orders");
        assert!(results.iter().all(|r| !r.committed_versions.is_empty()));
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_max_workers() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest_fixture(dir.path(), &["a", "b", "c", "d"]);
        let mut config = test_config(dir.path());
        config.max_workers = 2;

        let sink = Arc::new(CountingProgressSink::default());
        let results = run(&config, sink.clone()).await.unwrap();
        assert_eq!(results.len(), 4);
        assert!(sink.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn one_entitys_failure_does_not_affect_peers() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest_fixture(dir.path(), &["orders", "claims"]);
        // Corrupt "claims"'s only parquet file: footer decoding fails, which
        // is entity-fatal (`SchemaDiscoveryFailed`), and must not stop
        // "orders" from committing.
        std::fs::write(
            dir.path().join("cda").join("claims").join("s1").join("1000").join("part-0.parquet"),
            b"not a parquet file",
        )
        .unwrap();
        let config = test_config(dir.path());

        let results = run(&config, Arc::new(NoopProgressSink)).await.unwrap();
        assert_eq!(results.len(), 2);
        let orders = results.iter().find(|r| r.table_name == "orders").unwrap();
        let claims = results.iter().find(|r| r.table_name == "claims").unwrap();
        assert!(orders.error.is_none());
        assert!(!orders.committed_versions.is_empty());
        assert!(claims.error.is_some());
        assert!(claims.committed_versions.is_empty());
    }
}
