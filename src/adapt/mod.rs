// ABOUTME: Record adaptation - values, raw/adapted records, and the adapter
// ABOUTME: Conforms source records to a destination schema without failing

pub mod adapter;
pub mod record;
pub mod value;

pub use adapter::{adapt, AdaptedBatch, Adaptation, AdaptationWarning, RecordAdapter};
pub use record::{AdaptedRecord, RawRecord};
pub use value::FieldValue;
