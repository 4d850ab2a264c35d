mod error;
mod index;
mod locator;
mod resolution;

pub use error::{LoadError, ValidationError};
pub use index::{GroupEntry, GroupIndex, GroupSnapshot};
pub use locator::LocatorPolicy;
pub use resolution::{resolve_in, ResolutionResult, MAX_CANDIDATES};
