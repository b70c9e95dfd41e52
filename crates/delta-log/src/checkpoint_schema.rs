use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema};

/// The canonical Delta checkpoint schema: `txn`, `add`, `remove`,
/// `metaData`, `protocol`, each a nullable struct, one action per row.
/// `partitionValues`/`configuration` maps are encoded as a JSON string
/// column rather than an Arrow `Map` to keep the builder code
/// straightforward; readers that expect a native map can still recover
/// it by parsing the string.
pub fn checkpoint_arrow_schema() -> Arc<Schema> {
    let txn_fields = Fields::from(vec![
        Field::new("appId", DataType::Utf8, true),
        Field::new("version", DataType::Int64, true),
        Field::new("lastUpdated", DataType::Int64, true),
    ]);
    let add_fields = Fields::from(vec![
        Field::new("path", DataType::Utf8, true),
        Field::new("partitionValues", DataType::Utf8, true),
        Field::new("size", DataType::Int64, true),
        Field::new("modificationTime", DataType::Int64, true),
        Field::new("dataChange", DataType::Boolean, true),
        Field::new("stats", DataType::Utf8, true),
    ]);
    let remove_fields = Fields::from(vec![
        Field::new("path", DataType::Utf8, true),
        Field::new("deletionTimestamp", DataType::Int64, true),
        Field::new("dataChange", DataType::Boolean, true),
        Field::new("extendedFileMetadata", DataType::Boolean, true),
        Field::new("partitionValues", DataType::Utf8, true),
        Field::new("size", DataType::Int64, true),
    ]);
    let metadata_fields = Fields::from(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("schemaString", DataType::Utf8, true),
        Field::new("partitionColumns", DataType::Utf8, true),
        Field::new("configuration", DataType::Utf8, true),
        Field::new("createdTime", DataType::Int64, true),
    ]);
    let protocol_fields = Fields::from(vec![
        Field::new("minReaderVersion", DataType::Int32, true),
        Field::new("minWriterVersion", DataType::Int32, true),
    ]);

    Arc::new(Schema::new(vec![
        Field::new("txn", DataType::Struct(txn_fields), true),
        Field::new("add", DataType::Struct(add_fields), true),
        Field::new("remove", DataType::Struct(remove_fields), true),
        Field::new("metaData", DataType::Struct(metadata_fields), true),
        Field::new("protocol", DataType::Struct(protocol_fields), true),
    ]))
}
