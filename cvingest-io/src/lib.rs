//! # Streaming reader for ClinVar release XML.
//!
//! Turns a (possibly huge) release document into a sequence of [RecordNode]s, one
//! generic tree per second-level record, without materializing the document. Parsing
//! runs on a producer thread handing records to the consumer over a bounded channel;
//! a shared [Cancellation] stops both sides between records.
//!
pub mod cancellation;
pub mod stream;
pub mod xml;

// re-exports
pub use cancellation::Cancellation;
pub use stream::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, ReaderOptions, RecordStream, ReleaseReader};
pub use xml::{RCV_RELEASE_TAG, RecordNode, RecordParser, ReleaseHeader, VARIATION_RELEASE_TAG};
