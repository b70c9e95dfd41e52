mod action;
mod checkpoint;
mod checkpoint_schema;
mod error;
mod open;
mod state;
mod writer;

pub use action::{
    Action, AddAction, CommitInfoAction, FormatSpec, MetaDataAction, ProtocolAction, RemoveAction,
};
pub use checkpoint::LastCheckpoint;
pub use checkpoint_schema::checkpoint_arrow_schema;
pub use error::{DeltaLogError, DeltaLogResult};
pub use open::{commit_file_name, open};
pub use state::{LiveFile, LogState};
pub use writer::{append_batch, write_checkpoint};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use arrow_schema::{DataType, Field, Schema};
    use bytes::Bytes;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use batch_planner::{Batch, PlannedFile};
    use storage::{Gateway, Role, StorageOptions};

    fn sample_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]))
    }

    fn write_sample_parquet() -> Vec<u8> {
        let schema = sample_schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
            writer.write(&batch).unwrap();
            writer.close().unwrap();
        }
        buf
    }

    async fn new_table_gateway() -> (tempfile::TempDir, Gateway) {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().to_string_lossy().to_string();
        let gw = Gateway::open(Role::Target, &uri, &StorageOptions::default()).await.unwrap();
        (dir, gw)
    }

    #[tokio::test]
    async fn open_on_empty_table_yields_fresh_state() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let state = open(&gw, &root).await.unwrap();
        assert_eq!(state.version, None);
        assert!(state.live_files.is_empty());
    }

    #[tokio::test]
    async fn first_batch_creates_version_zero_with_protocol_and_metadata() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let mut state = open(&gw, &root).await.unwrap();

        let schema = sample_schema();
        let file_bytes = write_sample_parquet();
        gw.put(&gw.child("source/s1/1000/part-0.parquet"), Bytes::from(file_bytes))
            .await
            .unwrap();

        let batch = Batch {
            schema_id: "s1".to_string(),
            ts: 1000,
            adds: vec![PlannedFile {
                path: "source/s1/1000/part-0.parquet".to_string(),
                size: 512,
            }],
            removes: Vec::new(),
            is_schema_change: true,
            new_schema: Some(schema),
        };

        let version = append_batch(&gw, &root, &mut state, &batch, 5_000).await.unwrap();
        assert_eq!(version, 0);
        assert_eq!(state.live_files.len(), 1);
        assert!(state.metadata_id.is_some());

        let commit = gw.get(&root.child("_delta_log").child("00000000000000000000.json")).await.unwrap();
        let text = String::from_utf8(commit.to_vec()).unwrap();
        assert!(text.contains("\"protocol\""));
        assert!(text.contains("\"metaData\""));
        assert!(text.contains("\"add\""));
    }

    #[tokio::test]
    async fn reopening_after_a_commit_replays_live_files() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let mut state = open(&gw, &root).await.unwrap();

        let schema = sample_schema();
        let batch = Batch {
            schema_id: "s1".to_string(),
            ts: 1000,
            adds: vec![PlannedFile {
                path: "source/s1/1000/part-0.parquet".to_string(),
                size: 512,
            }],
            removes: Vec::new(),
            is_schema_change: true,
            new_schema: Some(schema),
        };
        append_batch(&gw, &root, &mut state, &batch, 5_000).await.unwrap();

        let reopened = open(&gw, &root).await.unwrap();
        assert_eq!(reopened.version, Some(0));
        assert_eq!(reopened.live_files.len(), 1);
        assert_eq!(reopened.metadata_id, state.metadata_id);
        assert_eq!(reopened.high_water_ts, Some(1000));
    }

    #[tokio::test]
    async fn second_batch_continuation_removes_prior_files() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let mut state = open(&gw, &root).await.unwrap();

        let schema = sample_schema();
        let first = Batch {
            schema_id: "s1".to_string(),
            ts: 1000,
            adds: vec![PlannedFile {
                path: "source/s1/1000/part-0.parquet".to_string(),
                size: 512,
            }],
            removes: Vec::new(),
            is_schema_change: true,
            new_schema: Some(schema),
        };
        append_batch(&gw, &root, &mut state, &first, 5_000).await.unwrap();

        let second = Batch {
            schema_id: "s1".to_string(),
            ts: 2000,
            adds: vec![PlannedFile {
                path: "source/s1/2000/part-0.parquet".to_string(),
                size: 768,
            }],
            removes: vec![PlannedFile {
                path: "source/s1/1000/part-0.parquet".to_string(),
                size: 512,
            }],
            is_schema_change: false,
            new_schema: None,
        };
        let version = append_batch(&gw, &root, &mut state, &second, 6_000).await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(state.live_files.len(), 1);
        assert!(state.live_files.contains_key("source/s1/2000/part-0.parquet"));
    }

    #[tokio::test]
    async fn checkpoint_round_trips_live_files_on_open() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let mut state = open(&gw, &root).await.unwrap();

        let schema = sample_schema();
        let batch = Batch {
            schema_id: "s1".to_string(),
            ts: 1000,
            adds: vec![
                PlannedFile {
                    path: "source/s1/1000/part-0.parquet".to_string(),
                    size: 512,
                },
                PlannedFile {
                    path: "source/s1/1000/part-1.parquet".to_string(),
                    size: 256,
                },
            ],
            removes: Vec::new(),
            is_schema_change: true,
            new_schema: Some(schema),
        };
        append_batch(&gw, &root, &mut state, &batch, 5_000).await.unwrap();
        write_checkpoint(&gw, &root, &mut state).await.unwrap();
        assert_eq!(state.checkpoint_version, Some(0));

        let reopened = open(&gw, &root).await.unwrap();
        assert_eq!(reopened.live_files.len(), 2);
        assert_eq!(reopened.metadata_id, state.metadata_id);
        assert_eq!(reopened.checkpoint_version, Some(0));
    }

    #[tokio::test]
    async fn second_writer_conflicts_on_same_version() {
        let (_dir, gw) = new_table_gateway().await;
        let root = gw.child("tables/t1");
        let state = open(&gw, &root).await.unwrap();
        let mut state_a = state.clone();
        let mut state_b = state.clone();

        let schema = sample_schema();
        let batch = Batch {
            schema_id: "s1".to_string(),
            ts: 1000,
            adds: vec![PlannedFile {
                path: "source/s1/1000/part-0.parquet".to_string(),
                size: 512,
            }],
            removes: Vec::new(),
            is_schema_change: true,
            new_schema: Some(schema),
        };

        append_batch(&gw, &root, &mut state_a, &batch, 5_000).await.unwrap();
        let err = append_batch(&gw, &root, &mut state_b, &batch, 5_000).await.unwrap_err();
        assert!(matches!(err, DeltaLogError::CommitConflict { .. }));
    }
}
