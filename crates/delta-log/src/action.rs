use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One line of a Delta commit JSON file. `serde`'s default externally
/// tagged representation gives exactly the wire shape the Delta
/// transaction-log spec wants: `{"add": {...}}`, `{"remove": {...}}`,
/// one object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "protocol")]
    Protocol(ProtocolAction),
    #[serde(rename = "metaData")]
    MetaData(MetaDataAction),
    #[serde(rename = "add")]
    Add(AddAction),
    #[serde(rename = "remove")]
    Remove(RemoveAction),
    #[serde(rename = "commitInfo")]
    CommitInfo(CommitInfoAction),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolAction {
    pub min_reader_version: i32,
    pub min_writer_version: i32,
}

impl Default for ProtocolAction {
    fn default() -> Self {
        Self {
            min_reader_version: 1,
            min_writer_version: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSpec {
    pub provider: String,
    pub options: BTreeMap<String, String>,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            provider: "parquet".to_string(),
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataAction {
    pub id: String,
    pub format: FormatSpec,
    pub schema_string: String,
    pub partition_columns: Vec<String>,
    pub configuration: BTreeMap<String, String>,
    pub created_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAction {
    pub path: String,
    pub partition_values: BTreeMap<String, Option<String>>,
    pub size: i64,
    pub modification_time: i64,
    pub data_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAction {
    pub path: String,
    pub deletion_timestamp: i64,
    pub data_change: bool,
    pub extended_file_metadata: bool,
    pub partition_values: BTreeMap<String, Option<String>>,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfoAction {
    pub timestamp: i64,
    pub operation: String,
    pub isolation_level: String,
}

impl Default for CommitInfoAction {
    fn default() -> Self {
        Self {
            timestamp: 0,
            operation: "WRITE".to_string(),
            isolation_level: "Serializable".to_string(),
        }
    }
}

/// Serialise a commit's actions as newline-delimited JSON, one action
/// per line, in the fixed order the actions were pushed in.
pub fn to_ndjson(actions: &[Action]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    for action in actions {
        serde_json::to_writer(&mut out, action)?;
        out.push(b'\n');
    }
    Ok(out)
}
