use std::sync::Arc;

use arrow_schema::SchemaRef;
use parquet::file::footer;

use crate::error::{PlannerError, PlannerResult};

const FOOTER_LEN: usize = 8;

/// Discover the Arrow schema of a parquet file by reading only its
/// footer: the trailing 8 bytes give the footer's length, then one more
/// ranged `GET` fetches the thrift-encoded `FileMetaData`. Row groups
/// are never opened.
pub async fn read_schema_footer(
    gateway: &storage::Gateway,
    path: &storage::ObjectPath,
) -> PlannerResult<SchemaRef> {
    let meta = gateway.head(path).await.map_err(|source| PlannerError::Listing {
        path: path.as_ref().to_string(),
        source,
    })?;
    let size = meta.size;
    if size < FOOTER_LEN {
        return Err(PlannerError::SchemaDiscoveryFailed {
            schema_id: path.as_ref().to_string(),
            reason: "file too small to contain a parquet footer".to_string(),
        });
    }

    let tail = gateway
        .get_range(path, (size - FOOTER_LEN)..size)
        .await
        .map_err(|source| PlannerError::Listing {
            path: path.as_ref().to_string(),
            source,
        })?;
    let footer_len = footer::decode_footer(&tail_array(&tail)?).map_err(|e| PlannerError::SchemaDiscoveryFailed {
        schema_id: path.as_ref().to_string(),
        reason: format!("invalid parquet footer magic: {e}"),
    })? as usize;

    if footer_len + FOOTER_LEN > size {
        return Err(PlannerError::SchemaDiscoveryFailed {
            schema_id: path.as_ref().to_string(),
            reason: "footer length exceeds file size".to_string(),
        });
    }

    let metadata_start = size - FOOTER_LEN - footer_len;
    let metadata_bytes = gateway
        .get_range(path, metadata_start..(size - FOOTER_LEN))
        .await
        .map_err(|source| PlannerError::Listing {
            path: path.as_ref().to_string(),
            source,
        })?;
    let file_metadata = footer::decode_metadata(&metadata_bytes).map_err(|e| PlannerError::SchemaDiscoveryFailed {
        schema_id: path.as_ref().to_string(),
        reason: format!("could not decode parquet metadata: {e}"),
    })?;

    let arrow_schema = parquet::arrow::parquet_to_arrow_schema(
        file_metadata.file_metadata().schema_descr(),
        file_metadata.file_metadata().key_value_metadata(),
    )
    .map_err(|e| PlannerError::SchemaDiscoveryFailed {
        schema_id: path.as_ref().to_string(),
        reason: format!("could not translate parquet schema to arrow: {e}"),
    })?;

    Ok(Arc::new(arrow_schema))
}

fn tail_array(bytes: &bytes::Bytes) -> PlannerResult<[u8; FOOTER_LEN]> {
    bytes
        .as_ref()
        .try_into()
        .map_err(|_| PlannerError::SchemaDiscoveryFailed {
            schema_id: "<footer>".to_string(),
            reason: "footer tail was not exactly 8 bytes".to_string(),
        })
}

/// A deterministic canonical string for an Arrow schema, used to derive
/// the Delta `metaData.id`. This is intentionally the Delta
/// `schemaString` JSON itself: two identical schemas always produce
/// byte-identical strings, so a hash of it is a stable schema identity.
pub fn canonical_schema_string(schema: &SchemaRef) -> String {
    let fields: Vec<serde_json::Value> = schema
        .fields()
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name(),
                "type": arrow_type_to_delta(f.data_type()),
                "nullable": f.is_nullable(),
                "metadata": {},
            })
        })
        .collect();
    serde_json::json!({ "type": "struct", "fields": fields }).to_string()
}

fn arrow_type_to_delta(dt: &arrow_schema::DataType) -> &'static str {
    use arrow_schema::DataType::*;
    match dt {
        Boolean => "boolean",
        Int8 | Int16 | Int32 => "integer",
        Int64 => "long",
        Float32 => "float",
        Float64 => "double",
        Utf8 | LargeUtf8 => "string",
        Binary | LargeBinary => "binary",
        Date32 | Date64 => "date",
        Timestamp(_, _) => "timestamp",
        _ => "string",
    }
}
