mod document;
mod engine;
mod error;
mod sections;

pub use document::{ExtractionDocument, Item, Section};
pub use engine::{ExtractionEngine, ExtractionOptions};
pub use error::{ExtractionError, ExtractionResult};
pub use sections::{produce_sections, ScanPlan};
