use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::error::{ManifestError, ManifestResult};
use crate::model::{validate, EntryRejection, ManifestEntry, RawManifestEntry};

/// A warning attached to the run (not a specific entity, since the
/// entity was never admitted) for one rejected manifest entry.
#[derive(Debug, Clone)]
pub struct ManifestWarning {
    pub table_name: String,
    pub reason: EntryRejection,
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity {:?} skipped: {}", self.table_name, self.reason)
    }
}

/// Read and parse the manifest JSON at `uri` via the Gateway, filter to
/// `names` (or all, if `None`), sort by table name, and return the
/// validated entries plus any per-entity warnings. A missing or
/// structurally malformed manifest document is fatal for the whole run
/// (`ManifestError`); a malformed individual entry is only a warning.
pub async fn read_manifest(
    gateway: &storage::Gateway,
    path: &storage::ObjectPath,
    names: Option<&HashSet<String>>,
) -> ManifestResult<(Vec<ManifestEntry>, Vec<ManifestWarning>)> {
    let bytes = gateway
        .get(path)
        .await
        .map_err(|source| ManifestError::Unreadable {
            uri: path.as_ref().to_string(),
            source,
        })?;

    let raw: BTreeMap<String, RawManifestEntry> =
        serde_json::from_slice(&bytes).map_err(|source| ManifestError::InvalidJson {
            uri: path.as_ref().to_string(),
            source,
        })?;

    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for (table_name, raw_entry) in raw {
        if let Some(names) = names {
            if !names.contains(&table_name) {
                continue;
            }
        }
        match validate(&table_name, raw_entry) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                warn!(table = %table_name, %reason, "skipping malformed manifest entry");
                warnings.push(ManifestWarning { table_name, reason });
            }
        }
    }

    entries.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    Ok((entries, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn gw(dir: &std::path::Path) -> storage::Gateway {
        storage::Gateway::open(
            storage::Role::Source,
            &dir.to_string_lossy(),
            &storage::StorageOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn parses_well_formed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let body = r#"{
            "orders": {
                "dataFilesPath": "s3://bucket/cda/orders",
                "lastSuccessfulWriteTimestamp": "1000",
                "totalProcessedRecordsCount": "42",
                "schemaHistory": {"s1": "500", "s2": "1000"}
            }
        }"#;
        let path = gateway.child("manifest.json");
        gateway.put(&path, body.as_bytes().to_vec().into()).await.unwrap();

        let (entries, warnings) = read_manifest(&gateway, &path, None).await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_name, "orders");
        assert_eq!(entries[0].schema_history, vec![("s1".into(), 500), ("s2".into(), 1000)]);
    }

    #[tokio::test]
    async fn demotes_missing_schema_history_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let body = r#"{
            "good": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1", "schemaHistory": {"s1": "1"}},
            "bad": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1"}
        }"#;
        let path = gateway.child("manifest.json");
        gateway.put(&path, body.as_bytes().to_vec().into()).await.unwrap();

        let (entries, warnings) = read_manifest(&gateway, &path, None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_name, "good");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].table_name, "bad");
        assert_eq!(warnings[0].reason, EntryRejection::MissingSchemaHistory);
    }

    #[tokio::test]
    async fn filters_to_requested_names() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let body = r#"{
            "orders": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1", "schemaHistory": {"s1": "1"}},
            "claims": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1", "schemaHistory": {"s1": "1"}}
        }"#;
        let path = gateway.child("manifest.json");
        gateway.put(&path, body.as_bytes().to_vec().into()).await.unwrap();

        let names: HashSet<String> = ["claims".to_string()].into_iter().collect();
        let (entries, _) = read_manifest(&gateway, &path, Some(&names)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_name, "claims");
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let path = gateway.child("missing.json");
        let err = read_manifest(&gateway, &path, None).await.unwrap_err();
        assert!(matches!(err, ManifestError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn deterministic_sort_order() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gw(dir.path()).await;
        let body = r#"{
            "zeta": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1", "schemaHistory": {"s1": "1"}},
            "alpha": {"dataFilesPath": "p", "lastSuccessfulWriteTimestamp": "1", "schemaHistory": {"s1": "1"}}
        }"#;
        let path = gateway.child("manifest.json");
        gateway.put(&path, body.as_bytes().to_vec().into()).await.unwrap();

        let (entries, _) = read_manifest(&gateway, &path, None).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.table_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
