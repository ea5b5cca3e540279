// gharchive-lake-storage - Object storage for the lake tiers
//
// One OpenDAL operator per tier bucket. Raw objects are stored as is; stage
// exports are encoded to Parquet here. Keys come from
// gharchive_lake_core::partition and are always bucket-relative.

mod encoding;
mod error;
mod read;
mod storage;
mod write;

pub use encoding::{
    decode_batches, encode_batches, writer_properties, ContentHash, EncodedParquet,
    STAGE_METADATA_KEY, VERSION_METADATA_KEY,
};
pub use error::{ErrorCode, Result, StorageError};
pub use storage::{LakeStorage, WriteOptions, DEFAULT_S3_REGION};
pub use write::WriteReceipt;

// Re-export so callers can build operators without depending on opendal directly
pub use opendal::Operator;
