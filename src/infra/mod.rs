pub mod normalize_output_adapter;

pub use normalize_output_adapter::{InMemoryRecordSetSink, NdjsonRecordSetSink};
