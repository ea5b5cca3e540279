// Arrow schemas for the lake stages
//
// The raw stage has no fixed schema: it is inferred from the records of each
// batch. The clean and agg stages are fixed and every exported file carries
// exactly these columns in this order.

use arrow::array::{new_null_array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Schema metadata key carrying the stage schema version.
pub const SCHEMA_VERSION_KEY: &str = "gharchive_lake.schema_version";
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Column names shared by the clean and agg stages
pub mod column {
    pub const EVENT_ID: &str = "event_id";
    pub const USER_ID: &str = "user_id";
    pub const USER_NAME: &str = "user_name";
    pub const USER_DISPLAY_NAME: &str = "user_display_name";
    pub const EVENT_TYPE: &str = "event_type";
    pub const REPO_ID: &str = "repo_id";
    pub const REPO_NAME: &str = "repo_name";
    pub const REPO_URL: &str = "repo_url";
    pub const EVENT_DATE: &str = "event_date";
    pub const EVENT_COUNT: &str = "event_count";
}

/// Pipeline stage, each materialized as one named table per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Clean,
    Agg,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Raw, Stage::Clean, Stage::Agg];

    /// Short name used in export file names (`clean_20230105_03.parquet`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Clean => "clean",
            Stage::Agg => "agg",
        }
    }

    /// Name of the stage table inside the analytical session.
    pub fn table_name(&self) -> &'static str {
        match self {
            Stage::Raw => "gharchive_raw",
            Stage::Clean => "gharchive_clean",
            Stage::Agg => "gharchive_agg",
        }
    }

    /// Fixed schema of the stage; `None` for the inferred raw stage.
    pub fn schema(&self) -> Option<SchemaRef> {
        match self {
            Stage::Raw => None,
            Stage::Clean => Some(clean_schema()),
            Stage::Agg => Some(agg_schema()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp type of `event_date` in both fixed stages.
pub fn event_date_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Cached schema of the clean stage: one row per event, 9 columns.
pub fn clean_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        Arc::new(with_version(vec![
            Field::new(column::EVENT_ID, DataType::Utf8, true),
            Field::new(column::USER_ID, DataType::Int64, true),
            Field::new(column::USER_NAME, DataType::Utf8, true),
            Field::new(column::USER_DISPLAY_NAME, DataType::Utf8, true),
            Field::new(column::EVENT_TYPE, DataType::Utf8, true),
            Field::new(column::REPO_ID, DataType::Int64, true),
            Field::new(column::REPO_NAME, DataType::Utf8, true),
            Field::new(column::REPO_URL, DataType::Utf8, true),
            Field::new(column::EVENT_DATE, event_date_type(), true),
        ]))
    }))
}

/// Cached schema of the agg stage: one row per grouping key per day.
pub fn agg_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        Arc::new(with_version(vec![
            Field::new(column::EVENT_TYPE, DataType::Utf8, true),
            Field::new(column::REPO_ID, DataType::Int64, true),
            Field::new(column::REPO_NAME, DataType::Utf8, true),
            Field::new(column::REPO_URL, DataType::Utf8, true),
            Field::new(column::EVENT_DATE, event_date_type(), true),
            Field::new(column::EVENT_COUNT, DataType::Int64, false),
        ]))
    }))
}

fn with_version(fields: Vec<Field>) -> Schema {
    let metadata = HashMap::from([(SCHEMA_VERSION_KEY.to_string(), SCHEMA_VERSION.to_string())]);
    Schema::new_with_metadata(fields, metadata)
}

/// Re-shape `batch` into `target`: columns are matched by name, cast when the
/// type differs, and filled with nulls when absent.
///
/// Fails when a present column cannot be cast, or when a non-nullable target
/// column is missing or contains nulls.
pub fn conform_batch(batch: &RecordBatch, target: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let source = batch.schema();
    let columns = target
        .fields()
        .iter()
        .map(|field| -> Result<ArrayRef, ArrowError> {
            match source.index_of(field.name()) {
                Ok(idx) => {
                    let array = batch.column(idx);
                    if array.data_type() == field.data_type() {
                        Ok(Arc::clone(array))
                    } else if can_cast_types(array.data_type(), field.data_type()) {
                        cast(array, field.data_type())
                    } else {
                        Err(ArrowError::CastError(format!(
                            "column '{}' has type {} which cannot be read as {}",
                            field.name(),
                            array.data_type(),
                            field.data_type()
                        )))
                    }
                }
                Err(_) if field.is_nullable() => {
                    Ok(new_null_array(field.data_type(), batch.num_rows()))
                }
                Err(_) => Err(ArrowError::SchemaError(format!(
                    "required column '{}' is missing",
                    field.name()
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(Arc::clone(target), columns, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array, StringArray};

    #[test]
    fn test_schema_creation() {
        let clean = clean_schema();
        assert_eq!(clean.fields().len(), 9);
        assert_eq!(clean.field(0).name(), column::EVENT_ID);
        assert_eq!(clean.field(8).name(), column::EVENT_DATE);
        assert_eq!(
            clean.metadata().get(SCHEMA_VERSION_KEY).map(String::as_str),
            Some(SCHEMA_VERSION)
        );

        let agg = agg_schema();
        assert_eq!(agg.fields().len(), 6);
        assert_eq!(agg.field(5).name(), column::EVENT_COUNT);
        assert!(!agg.field(5).is_nullable());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Clean.as_str(), "clean");
        assert_eq!(Stage::Agg.table_name(), "gharchive_agg");
        assert!(Stage::Raw.schema().is_none());
    }

    #[test]
    fn test_conform_batch_casts_and_fills() {
        let source = Arc::new(Schema::new(vec![
            Field::new(column::REPO_ID, DataType::Int32, true),
            Field::new(column::EVENT_TYPE, DataType::Utf8, true),
            Field::new("extra", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            source,
            vec![
                Arc::new(Int32Array::from(vec![Some(1), None])),
                Arc::new(StringArray::from(vec!["PushEvent", "IssuesEvent"])),
                Arc::new(StringArray::from(vec!["x", "y"])),
            ],
        )
        .unwrap();

        let conformed = conform_batch(&batch, &clean_schema()).unwrap();
        assert_eq!(conformed.num_rows(), 2);
        assert_eq!(conformed.num_columns(), 9);
        assert_eq!(conformed.schema(), clean_schema());
        assert_eq!(
            conformed.column(5).data_type(),
            &DataType::Int64
        );
        assert_eq!(conformed.column(0).null_count(), 2);
    }

    #[test]
    fn test_conform_batch_requires_non_nullable_columns() {
        let batch = RecordBatch::new_empty(clean_schema());
        let err = conform_batch(&batch, &agg_schema()).unwrap_err();
        assert!(err.to_string().contains(column::EVENT_COUNT));
    }
}
