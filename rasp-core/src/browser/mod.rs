mod automation;
mod driver;
mod error;
mod metrics;
mod selector;

pub use automation::{ChromiumDriver, ChromiumSession};
pub use driver::{NodeHandle, RenderDriver, RenderSession};
pub use error::{BrowserError, BrowserResult};
pub use metrics::BrowserMetrics;
pub use selector::SelectorLayout;
