// Raw stage decoding
//
// Turns newline-delimited JSON objects into Arrow batches with a schema
// inferred from the records themselves. Parsing is permissive: a malformed
// line or a record that does not fit the inferred schema is skipped and
// counted, never fatal.
//
// Records are read in two streaming passes over the decompressed content,
// one to infer the schema and one to decode, so at most one batch of parsed
// JSON values is alive at a time.

use super::error::{Result, TransformError};
use super::RawObject;
use crate::partition::compression_extension;
use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Field, FieldRef, Fields, Schema, SchemaRef};
use arrow::json::reader::{infer_json_schema_from_iterator, Decoder, ReaderBuilder};
use flate2::read::MultiGzDecoder;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decoded raw records, ready to be registered as the raw stage.
#[derive(Debug)]
pub(crate) struct RawRecords {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
    pub rows: usize,
    pub skipped: usize,
}

pub(crate) fn decode_objects(objects: &[RawObject], batch_size: usize) -> Result<RawRecords> {
    let contents = objects
        .iter()
        .map(decompress)
        .collect::<Result<Vec<_>>>()?;

    let schema = infer_schema(&contents);
    let (batches, skipped) = decode_records(&schema, &contents, batch_size.max(1))?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    if skipped > 0 {
        warn!(skipped, rows, "Skipped malformed raw records");
    }

    Ok(RawRecords {
        schema,
        batches,
        rows,
        skipped,
    })
}

/// Gzip content is recognised by its `.gz` suffix or magic bytes. Other
/// compression suffixes are rejected rather than parsed as text.
fn decompress(object: &RawObject) -> Result<Vec<u8>> {
    let gzipped = match compression_extension(&object.key) {
        Some(ext) if ext.eq_ignore_ascii_case(".gz") => true,
        Some(ext) => {
            return Err(TransformError::UnsupportedCompression {
                key: object.key.clone(),
                extension: ext.to_string(),
            })
        }
        None => object.bytes.starts_with(&GZIP_MAGIC),
    };

    if !gzipped {
        return Ok(object.bytes.to_vec());
    }

    // multi-member: hourly dumps may be concatenated gzip streams
    let mut content = Vec::with_capacity(object.bytes.len() * 8);
    MultiGzDecoder::new(object.bytes.as_ref())
        .read_to_end(&mut content)
        .map_err(|source| TransformError::Decompress {
            key: object.key.clone(),
            source,
        })?;
    debug!(key = %object.key, bytes = content.len(), "Decompressed raw object");
    Ok(content)
}

/// Every non-blank line of every object, parsed. `None` for lines that are
/// not JSON objects.
fn records(contents: &[Vec<u8>]) -> impl Iterator<Item = Option<Value>> + '_ {
    contents
        .iter()
        .flat_map(|content| content.split(|b| *b == b'\n'))
        .map(|line| line.trim_ascii())
        .filter(|line| !line.is_empty())
        .map(|line| match serde_json::from_slice::<Value>(line) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) | Err(_) => None,
        })
}

/// Infer one schema for all records. When the records cannot be unified,
/// fall back to widening the schema record by record; a record whose shape
/// conflicts with the schema so far does not contribute to it and is later
/// dropped by the decoder.
fn infer_schema(contents: &[Vec<u8>]) -> SchemaRef {
    match infer_json_schema_from_iterator(records(contents).flatten().map(Ok)) {
        Ok(schema) => return Arc::new(schema),
        Err(err) => debug!(error = %err, "Schema inference failed, merging per record"),
    }

    let mut fields = Fields::empty();
    let mut conflicting = 0;
    for record in records(contents).flatten() {
        let merged = infer_json_schema_from_iterator(std::iter::once(Ok(&record)))
            .ok()
            .and_then(|single| merge_fields(&fields, single.fields()));
        match merged {
            Some(merged) => fields = merged,
            None => conflicting += 1,
        }
    }
    debug!(conflicting, "Merged schema per record");
    Arc::new(Schema::new(fields))
}

/// Union of two field lists, widening shared fields with `merge_types`.
/// `None` when a shared field cannot be unified.
fn merge_fields(acc: &Fields, other: &Fields) -> Option<Fields> {
    let mut merged: Vec<FieldRef> = acc.iter().cloned().collect();
    for field in other {
        match merged.iter().position(|f| f.name() == field.name()) {
            Some(idx) => {
                let data_type = merge_types(merged[idx].data_type(), field.data_type())?;
                merged[idx] = Arc::new(Field::new(field.name(), data_type, true));
            }
            None => merged.push(Arc::clone(field)),
        }
    }
    Some(Fields::from(merged))
}

/// The coercions arrow-json applies while inferring: integers and floats
/// widen to `Float64`, a scalar next to a list becomes a list, mixed scalars
/// become `Utf8`. Objects only unify with objects.
fn merge_types(a: &DataType, b: &DataType) -> Option<DataType> {
    match (a, b) {
        _ if a == b => Some(a.clone()),
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (DataType::Struct(fa), DataType::Struct(fb)) => merge_fields(fa, fb).map(DataType::Struct),
        (DataType::Struct(_), _) | (_, DataType::Struct(_)) => None,
        (DataType::List(ia), DataType::List(ib)) => {
            merge_types(ia.data_type(), ib.data_type()).map(list_of)
        }
        (DataType::List(item), scalar) | (scalar, DataType::List(item)) => {
            merge_types(item.data_type(), scalar).map(list_of)
        }
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            Some(DataType::Float64)
        }
        _ => Some(DataType::Utf8),
    }
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new_list_field(item, true)))
}

/// Decode every record in batches of `batch_size`; returns the batches and
/// the number of lines that were skipped.
fn decode_records(
    schema: &SchemaRef,
    contents: &[Vec<u8>],
    batch_size: usize,
) -> Result<(Vec<RecordBatch>, usize)> {
    let mut batches = Vec::new();
    let mut skipped = 0;
    let mut decoder = new_decoder(schema, batch_size)?;
    let mut chunk = Vec::with_capacity(batch_size);

    for record in records(contents) {
        match record {
            Some(value) => chunk.push(value),
            None => {
                skipped += 1;
                continue;
            }
        }
        if chunk.len() == batch_size {
            skipped += decode_chunk(&mut decoder, schema, batch_size, &chunk, &mut batches)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        skipped += decode_chunk(&mut decoder, schema, batch_size, &chunk, &mut batches)?;
    }

    Ok((batches, skipped))
}

/// Decode one chunk; when the chunk fails as a whole, decode record by
/// record and count the records that fail on their own.
fn decode_chunk(
    decoder: &mut Decoder,
    schema: &SchemaRef,
    batch_size: usize,
    chunk: &[Value],
    batches: &mut Vec<RecordBatch>,
) -> Result<usize> {
    match decoder.serialize(chunk).and_then(|_| decoder.flush()) {
        Ok(batch) => {
            batches.extend(batch);
            return Ok(0);
        }
        Err(err) => debug!(error = %err, "Batch decode failed, decoding per record"),
    }

    let mut skipped = 0;
    for record in chunk {
        let mut single = new_decoder(schema, 1)?;
        match single
            .serialize(std::slice::from_ref(record))
            .and_then(|_| single.flush())
        {
            Ok(batch) => batches.extend(batch),
            Err(_) => skipped += 1,
        }
    }
    // decoder state is unspecified after an error
    *decoder = new_decoder(schema, batch_size)?;
    Ok(skipped)
}

fn new_decoder(schema: &SchemaRef, batch_size: usize) -> Result<Decoder> {
    Ok(ReaderBuilder::new(Arc::clone(schema))
        .with_batch_size(batch_size)
        .with_coerce_primitive(true)
        .build_decoder()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use bytes::Bytes;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn object(key: &str, content: &[u8]) -> RawObject {
        RawObject {
            key: key.to_string(),
            bytes: Bytes::copy_from_slice(content),
        }
    }

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_skips_malformed_and_blank_lines() {
        let content = b"{\"id\":\"1\"}\n\nnot json\n[1,2]\n{\"id\":\"2\"}\n";
        let decoded = decode_objects(&[object("a.json", content)], 1024).unwrap();
        assert_eq!(decoded.rows, 2);
        assert_eq!(decoded.skipped, 2);
    }

    #[test]
    fn test_gzip_by_suffix_and_magic() {
        let compressed = gzip(b"{\"id\":\"1\"}\n{\"id\":\"2\"}\n");
        let by_suffix = decode_objects(&[object("a.json.gz", &compressed)], 1024).unwrap();
        let by_magic = decode_objects(&[object("a.json", &compressed)], 1024).unwrap();
        assert_eq!(by_suffix.rows, 2);
        assert_eq!(by_magic.rows, 2);
    }

    #[test]
    fn test_multi_member_gzip() {
        let mut content = gzip(b"{\"id\":\"1\"}\n");
        content.extend(gzip(b"{\"id\":\"2\"}\n"));
        let decoded = decode_objects(&[object("a.json.gz", &content)], 1024).unwrap();
        assert_eq!(decoded.rows, 2);
    }

    #[test]
    fn test_rejects_other_compression() {
        let err = decode_objects(&[object("a.json.bz2", b"BZh")], 1024).unwrap_err();
        assert!(matches!(
            err,
            TransformError::UnsupportedCompression { ref extension, .. } if extension == ".bz2"
        ));
    }

    #[test]
    fn test_conflicting_records_are_dropped() {
        let content = b"{\"actor\":{\"id\":1}}\n{\"actor\":\"ghost\"}\n{\"actor\":{\"id\":2}}\n";
        let decoded = decode_objects(&[object("a.json", content)], 1024).unwrap();
        assert_eq!(decoded.rows, 2);
        assert_eq!(decoded.skipped, 1);
        assert!(matches!(
            decoded.schema.field_with_name("actor").unwrap().data_type(),
            DataType::Struct(_)
        ));
    }

    #[test]
    fn test_type_drift_survives_a_conflicting_record() {
        let content = b"{\"a\":{\"x\":1},\"n\":1}\n{\"a\":\"s\"}\n{\"n\":1.5}\n{\"n\":\"str\"}\n{\"n\":2}\n";
        let decoded = decode_objects(&[object("a.json", content)], 1024).unwrap();
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.rows, 4);
        assert!(matches!(
            decoded.schema.field_with_name("a").unwrap().data_type(),
            DataType::Struct(_)
        ));
        assert_eq!(
            decoded.schema.field_with_name("n").unwrap().data_type(),
            &DataType::Utf8
        );
    }

    #[test]
    fn test_numeric_drift_widens_to_float() {
        let content = b"{\"a\":{\"x\":1},\"n\":1}\n{\"a\":[1]}\n{\"n\":2.5,\"a\":{\"y\":true}}\n";
        let decoded = decode_objects(&[object("a.json", content)], 1024).unwrap();
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.rows, 2);
        assert_eq!(
            decoded.schema.field_with_name("n").unwrap().data_type(),
            &DataType::Float64
        );
        let DataType::Struct(fields) = decoded.schema.field_with_name("a").unwrap().data_type()
        else {
            panic!("expected a struct");
        };
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_merge_types() {
        let list_of_utf8 = list_of(DataType::Utf8);
        assert_eq!(merge_types(&DataType::Null, &DataType::Int64), Some(DataType::Int64));
        assert_eq!(merge_types(&DataType::Boolean, &DataType::Int64), Some(DataType::Utf8));
        assert_eq!(
            merge_types(&list_of(DataType::Int64), &DataType::Utf8),
            Some(list_of_utf8)
        );
        assert_eq!(merge_types(&DataType::Struct(Fields::empty()), &DataType::Utf8), None);
    }

    #[test]
    fn test_batches_respect_batch_size() {
        let content: String = (0..10).map(|i| format!("{{\"n\":{}}}\n", i)).collect();
        let decoded = decode_objects(&[object("a.json", content.as_bytes())], 4).unwrap();
        assert_eq!(decoded.rows, 10);
        assert_eq!(decoded.batches.len(), 3);
    }

    #[test]
    fn test_empty_object_yields_empty_schema() {
        let decoded = decode_objects(&[object("a.json", b"\n\n")], 1024).unwrap();
        assert_eq!(decoded.rows, 0);
        assert!(decoded.schema.fields().is_empty());
    }
}
