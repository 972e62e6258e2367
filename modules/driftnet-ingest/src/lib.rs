pub mod budget;
pub mod cache;
pub mod cycle;
pub mod keywords;
pub mod processor;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use cache::ReprocessCache;
pub use cycle::{CycleStats, Ingester, IngestSettings};
pub use keywords::KeywordClient;
pub use processor::KeywordProcessor;
pub use traits::{KeywordSource, PollPolicy, RawPostSink, SearchJobApi};
