use std::collections::BTreeMap;

use serde::Deserialize;

/// Raw wire shape of one manifest entry, exactly as it appears in the
/// source JSON: string-encoded ms-epoch timestamps, optional fields.
/// Unknown fields are ignored by `serde` by default; this type is never
/// exposed outside the reader — [`super::reader::read_manifest`] turns
/// it into the validated [`ManifestEntry`] or a warning.
#[derive(Debug, Deserialize)]
pub(crate) struct RawManifestEntry {
    #[serde(rename = "dataFilesPath")]
    pub data_files_path: Option<String>,
    #[serde(rename = "lastSuccessfulWriteTimestamp")]
    pub last_successful_write_timestamp: Option<String>,
    #[serde(rename = "totalProcessedRecordsCount")]
    pub total_processed_records_count: Option<String>,
    #[serde(rename = "schemaHistory")]
    pub schema_history: Option<BTreeMap<String, String>>,
}

/// A validated, caller-ready entity from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub table_name: String,
    pub data_files_path: String,
    pub last_success_write_ts: i64,
    pub total_processed_records: i64,
    /// Ordered ascending by timestamp; schema_id -> first-seen ms epoch.
    pub schema_history: Vec<(String, i64)>,
}

/// Why an individual manifest entry was rejected. Demoted to a warning
/// on the caller's run; the entity itself is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRejection {
    MissingDataFilesPath,
    MissingWatermark,
    UnparsableWatermark(String),
    MissingSchemaHistory,
    EmptySchemaHistory,
    UnparsableSchemaTimestamp { schema_id: String, raw: String },
    SchemaHistoryNotAscending,
}

impl std::fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDataFilesPath => write!(f, "missing dataFilesPath"),
            Self::MissingWatermark => write!(f, "missing lastSuccessfulWriteTimestamp"),
            Self::UnparsableWatermark(raw) => {
                write!(f, "lastSuccessfulWriteTimestamp {raw:?} is not a ms-epoch integer")
            }
            Self::MissingSchemaHistory => write!(f, "missing schemaHistory"),
            Self::EmptySchemaHistory => write!(f, "schemaHistory is empty"),
            Self::UnparsableSchemaTimestamp { schema_id, raw } => {
                write!(f, "schemaHistory[{schema_id}] = {raw:?} is not a ms-epoch integer")
            }
            Self::SchemaHistoryNotAscending => write!(f, "schemaHistory is not strictly ascending by timestamp"),
        }
    }
}

pub(crate) fn validate(table_name: &str, raw: RawManifestEntry) -> Result<ManifestEntry, EntryRejection> {
    let data_files_path = raw.data_files_path.ok_or(EntryRejection::MissingDataFilesPath)?;

    let watermark_raw = raw
        .last_successful_write_timestamp
        .ok_or(EntryRejection::MissingWatermark)?;
    let last_success_write_ts = watermark_raw
        .parse::<i64>()
        .map_err(|_| EntryRejection::UnparsableWatermark(watermark_raw))?;

    let total_processed_records = raw
        .total_processed_records_count
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    let schema_history_raw = raw.schema_history.ok_or(EntryRejection::MissingSchemaHistory)?;
    if schema_history_raw.is_empty() {
        return Err(EntryRejection::EmptySchemaHistory);
    }

    let mut schema_history = Vec::with_capacity(schema_history_raw.len());
    for (schema_id, raw_ts) in schema_history_raw {
        let ts = raw_ts
            .parse::<i64>()
            .map_err(|_| EntryRejection::UnparsableSchemaTimestamp {
                schema_id: schema_id.clone(),
                raw: raw_ts,
            })?;
        schema_history.push((schema_id, ts));
    }
    schema_history.sort_by_key(|(_, ts)| *ts);
    for pair in schema_history.windows(2) {
        if pair[0].1 >= pair[1].1 {
            return Err(EntryRejection::SchemaHistoryNotAscending);
        }
    }

    Ok(ManifestEntry {
        table_name: table_name.to_string(),
        data_files_path,
        last_success_write_ts,
        total_processed_records,
        schema_history,
    })
}
