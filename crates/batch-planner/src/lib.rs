pub mod error;
mod model;
mod planner;
mod schema;

pub use error::{PlannerError, PlannerResult, PlannerWarning};
pub use model::{Batch, PlannedFile, PriorState, SchemaFolder, TimestampFolder};
pub use planner::plan_batches;
pub use schema::canonical_schema_string;

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::ManifestEntry;
    use std::fs;
    use std::path::Path;

    fn write_parquet_stub(path: &Path) {
        // A minimal-but-valid single-column parquet file is out of scope
        // to hand-roll here; tests that need schema discovery use a
        // fixture file. Tests that only exercise the planning algorithm
        // (not schema reads) write empty placeholder bytes.
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"PAR1").unwrap();
    }

    /// Opened at the filesystem root, matching how a real source bucket
    /// is opened (empty gateway-relative root): `entry.data_files_path` is
    /// then a full root-relative path and needs no further stripping.
    async fn gw(_dir: &Path) -> storage::Gateway {
        storage::Gateway::open(storage::Role::Source, "/", &storage::StorageOptions::default())
            .await
            .unwrap()
    }

    fn entry(data_files_path: &str, schema_history: &[(&str, i64)]) -> ManifestEntry {
        ManifestEntry {
            table_name: "t1".to_string(),
            data_files_path: data_files_path.to_string(),
            last_success_write_ts: 0,
            total_processed_records: 0,
            schema_history: schema_history.iter().map(|(s, t)| (s.to_string(), *t)).collect(),
        }
    }

    #[tokio::test]
    async fn empty_table_warns_no_schema_folders() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let e = entry(&dir.path().to_string_lossy(), &[("s1", 1000)]);
        let (batches, warnings) = plan_batches(&gateway, &e, &PriorState::default()).await.unwrap();
        assert!(batches.is_empty());
        assert!(warnings.contains(&PlannerWarning::NoSchemaFolders));
    }

    #[tokio::test]
    async fn orphan_and_missing_schema_folders_warn() {
        let dir = tempfile::tempdir().unwrap();
        write_parquet_stub(&dir.path().join("orphan/1000/a.parquet"));
        let gateway = gw(dir.path()).await;
        let e = entry(&dir.path().to_string_lossy(), &[("s1", 1000)]);
        let (_, warnings) = plan_batches(&gateway, &e, &PriorState::default()).await.unwrap();
        assert!(warnings.contains(&PlannerWarning::MissingSchemaFolder { schema_id: "s1".into() }));
        assert!(warnings.contains(&PlannerWarning::OrphanSchemaFolder { schema_id: "orphan".into() }));
    }

    #[tokio::test]
    async fn empty_timestamp_folder_warns_and_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("s1/1000")).unwrap();
        let gateway = gw(dir.path()).await;
        let e = entry(&dir.path().to_string_lossy(), &[("s1", 1000)]);
        let (batches, warnings) = plan_batches(&gateway, &e, &PriorState::default()).await.unwrap();
        assert!(batches.is_empty());
        assert!(warnings
            .iter()
            .any(|w| matches!(w, PlannerWarning::EmptyFolder { schema_id, ts: Some(1000) } if schema_id == "s1")));
    }
}
