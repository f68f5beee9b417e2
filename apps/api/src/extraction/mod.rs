// Model output handling: accumulate streamed text, then pull the partition-tree
// JSON out of it. Extraction never fails hard; see `ParsedPayload::is_degraded`.

pub mod accumulator;
pub mod extractor;

pub use accumulator::{drain_stream, ChunkEvent};
pub use extractor::{extract_payload, ExtractionMethod, StrategyFailure};
