//! External collaborators the pipeline is wired to.
//!
//! - `AnalysisService`: AI-backed entity analysis
//! - `ContentTypeDetector`: MIME detection
//! - `FormatExtractor`: plain representation of a document
//! - `Store`: persistence of merged entities and chunk records

mod analysis;
mod detector;
mod format;
mod store;

pub use analysis::{
    status_error, AnalysisPayload, AnalysisRequest, AnalysisService, HttpAnalysisService, NoAnalysis,
};
pub use detector::{ContentTypeDetector, ExtensionDetector, OCTET_STREAM};
pub use format::{FormatExtractor, PassthroughExtractor, PlainRepresentation};
pub use store::{InMemoryStore, PersistOutcome, Store};
