use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Int32Builder, Int64Builder, RecordBatch, StringBuilder, StructBuilder,
};
use arrow_schema::{DataType, Fields};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::action::{AddAction, MetaDataAction, ProtocolAction};
use crate::checkpoint_schema::checkpoint_arrow_schema;
use crate::error::{DeltaLogError, DeltaLogResult};
use crate::state::LogState;

/// One flattened checkpoint row: exactly one of `add`/`metadata`/`protocol`
/// is populated, mirroring the "nullable struct per action kind" shape
/// of the canonical Delta checkpoint schema.
enum CheckpointRow<'a> {
    Add(&'a AddAction),
    MetaData(&'a MetaDataAction),
    Protocol(&'a ProtocolAction),
}

fn partition_values_json(pv: &std::collections::BTreeMap<String, Option<String>>) -> String {
    serde_json::to_string(pv).unwrap_or_else(|_| "{}".to_string())
}

/// Build the checkpoint rows for the table's *current* state: every
/// live file as an `add` row, plus the current `metaData` and
/// `protocol`. `remove`/`txn` rows are never emitted by this core
/// (row-level retention/vacuum bookkeeping is out of scope), but the
/// columns stay present so the file matches the canonical schema.
///
/// Building the per-file `AddAction` structs is embarrassingly
/// parallel over `live_files` and CPU-bound (no IO), so it runs on
/// `rayon`'s pool rather than the async executor.
fn build_add_actions(state: &LogState) -> Vec<AddAction> {
    state
        .live_files
        .par_iter()
        .map(|(path, f)| AddAction {
            path: path.to_string(),
            partition_values: f.partition_values.clone(),
            size: f.size,
            modification_time: f.modification_time,
            data_change: false,
            stats: None,
        })
        .collect()
}

pub fn write_checkpoint_bytes(state: &LogState, protocol: &ProtocolAction) -> DeltaLogResult<Vec<u8>> {
    let adds = build_add_actions(state);
    let metadata = current_metadata(state)?;

    let rows: Vec<CheckpointRow> = std::iter::once(CheckpointRow::Protocol(protocol))
        .chain(std::iter::once(CheckpointRow::MetaData(&metadata)))
        .chain(adds.iter().map(CheckpointRow::Add))
        .collect();

    let schema = checkpoint_arrow_schema();
    let batch = rows_to_record_batch(&schema, &rows)?;

    let mut buf = Vec::new();
    {
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(props)).map_err(|e| DeltaLogError::CheckpointFailed {
            version: state.version.unwrap_or(-1),
            reason: e.to_string(),
        })?;
        writer.write(&batch).map_err(|e| DeltaLogError::CheckpointFailed {
            version: state.version.unwrap_or(-1),
            reason: e.to_string(),
        })?;
        writer.close().map_err(|e| DeltaLogError::CheckpointFailed {
            version: state.version.unwrap_or(-1),
            reason: e.to_string(),
        })?;
    }
    Ok(buf)
}

fn current_metadata(state: &LogState) -> DeltaLogResult<MetaDataAction> {
    let id = state
        .metadata_id
        .clone()
        .ok_or_else(|| DeltaLogError::Corrupt("checkpoint requested before any metaData action was committed".into()))?;
    let schema_string = state.schema_string.clone().unwrap_or_default();
    Ok(MetaDataAction {
        id,
        format: Default::default(),
        schema_string,
        partition_columns: Vec::new(),
        configuration: Default::default(),
        created_time: state.high_water_ts.unwrap_or(0),
    })
}

fn struct_fields(schema: &arrow_schema::Schema, name: &str) -> Fields {
    match schema.field_with_name(name).unwrap().data_type() {
        DataType::Struct(fields) => fields.clone(),
        _ => unreachable!("checkpoint schema column {name} is always a struct"),
    }
}

fn rows_to_record_batch(schema: &arrow_schema::Schema, rows: &[CheckpointRow]) -> DeltaLogResult<RecordBatch> {
    let mut txn = new_txn_builder();
    let mut add = new_add_builder(struct_fields(schema, "add"));
    let mut remove = new_remove_builder(struct_fields(schema, "remove"));
    let mut metadata = new_metadata_builder(struct_fields(schema, "metaData"));
    let mut protocol = new_protocol_builder(struct_fields(schema, "protocol"));

    for row in rows {
        txn.append(false);
        append_null_remove(&mut remove);

        match row {
            CheckpointRow::Add(a) => {
                append_add(&mut add, Some(a));
                append_null_metadata(&mut metadata);
                protocol.append(false);
            }
            CheckpointRow::MetaData(m) => {
                append_add(&mut add, None);
                append_metadata(&mut metadata, m);
                protocol.append(false);
            }
            CheckpointRow::Protocol(p) => {
                append_add(&mut add, None);
                append_null_metadata(&mut metadata);
                append_protocol(&mut protocol, p);
            }
        }
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(txn.finish()),
        Arc::new(add.finish()),
        Arc::new(remove.finish()),
        Arc::new(metadata.finish()),
        Arc::new(protocol.finish()),
    ];
    RecordBatch::try_new(Arc::new(schema.clone()), columns).map_err(|e| DeltaLogError::CheckpointFailed {
        version: -1,
        reason: e.to_string(),
    })
}

fn new_txn_builder() -> StructBuilder {
    StructBuilder::new(
        Fields::from(vec![
            arrow_schema::Field::new("appId", DataType::Utf8, true),
            arrow_schema::Field::new("version", DataType::Int64, true),
            arrow_schema::Field::new("lastUpdated", DataType::Int64, true),
        ]),
        vec![
            Box::new(StringBuilder::new()),
            Box::new(Int64Builder::new()),
            Box::new(Int64Builder::new()),
        ],
    )
}

fn new_add_builder(fields: Fields) -> StructBuilder {
    StructBuilder::new(
        fields,
        vec![
            Box::new(StringBuilder::new()),
            Box::new(StringBuilder::new()),
            Box::new(Int64Builder::new()),
            Box::new(Int64Builder::new()),
            Box::new(BooleanBuilder::new()),
            Box::new(StringBuilder::new()),
        ],
    )
}

fn new_remove_builder(fields: Fields) -> StructBuilder {
    StructBuilder::new(
        fields,
        vec![
            Box::new(StringBuilder::new()),
            Box::new(Int64Builder::new()),
            Box::new(BooleanBuilder::new()),
            Box::new(BooleanBuilder::new()),
            Box::new(StringBuilder::new()),
            Box::new(Int64Builder::new()),
        ],
    )
}

fn new_metadata_builder(fields: Fields) -> StructBuilder {
    StructBuilder::new(
        fields,
        vec![
            Box::new(StringBuilder::new()),
            Box::new(StringBuilder::new()),
            Box::new(StringBuilder::new()),
            Box::new(StringBuilder::new()),
            Box::new(Int64Builder::new()),
        ],
    )
}

fn new_protocol_builder(fields: Fields) -> StructBuilder {
    StructBuilder::new(
        fields,
        vec![Box::new(Int32Builder::new()), Box::new(Int32Builder::new())],
    )
}

fn append_add(builder: &mut StructBuilder, add: Option<&AddAction>) {
    builder
        .field_builder::<StringBuilder>(0)
        .unwrap()
        .append_option(add.map(|a| a.path.as_str()));
    builder
        .field_builder::<StringBuilder>(1)
        .unwrap()
        .append_option(add.map(|a| partition_values_json(&a.partition_values)));
    builder.field_builder::<Int64Builder>(2).unwrap().append_option(add.map(|a| a.size));
    builder
        .field_builder::<Int64Builder>(3)
        .unwrap()
        .append_option(add.map(|a| a.modification_time));
    builder
        .field_builder::<BooleanBuilder>(4)
        .unwrap()
        .append_option(add.map(|a| a.data_change));
    builder
        .field_builder::<StringBuilder>(5)
        .unwrap()
        .append_option(add.and_then(|a| a.stats.clone()));
    builder.append(add.is_some());
}

fn append_null_remove(builder: &mut StructBuilder) {
    builder.field_builder::<StringBuilder>(0).unwrap().append_null();
    builder.field_builder::<Int64Builder>(1).unwrap().append_null();
    builder.field_builder::<BooleanBuilder>(2).unwrap().append_null();
    builder.field_builder::<BooleanBuilder>(3).unwrap().append_null();
    builder.field_builder::<StringBuilder>(4).unwrap().append_null();
    builder.field_builder::<Int64Builder>(5).unwrap().append_null();
    builder.append(false);
}

fn append_metadata(builder: &mut StructBuilder, m: &MetaDataAction) {
    builder.field_builder::<StringBuilder>(0).unwrap().append_value(&m.id);
    builder
        .field_builder::<StringBuilder>(1)
        .unwrap()
        .append_value(&m.schema_string);
    builder
        .field_builder::<StringBuilder>(2)
        .unwrap()
        .append_value(serde_json::to_string(&m.partition_columns).unwrap_or_default());
    builder
        .field_builder::<StringBuilder>(3)
        .unwrap()
        .append_value(serde_json::to_string(&m.configuration).unwrap_or_default());
    builder
        .field_builder::<Int64Builder>(4)
        .unwrap()
        .append_value(m.created_time);
    builder.append(true);
}

fn append_null_metadata(builder: &mut StructBuilder) {
    builder.field_builder::<StringBuilder>(0).unwrap().append_null();
    builder.field_builder::<StringBuilder>(1).unwrap().append_null();
    builder.field_builder::<StringBuilder>(2).unwrap().append_null();
    builder.field_builder::<StringBuilder>(3).unwrap().append_null();
    builder.field_builder::<Int64Builder>(4).unwrap().append_null();
    builder.append(false);
}

fn append_protocol(builder: &mut StructBuilder, p: &ProtocolAction) {
    builder
        .field_builder::<Int32Builder>(0)
        .unwrap()
        .append_value(p.min_reader_version);
    builder
        .field_builder::<Int32Builder>(1)
        .unwrap()
        .append_value(p.min_writer_version);
    builder.append(true);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastCheckpoint {
    pub version: i64,
    pub size: i64,
}
