mod format;
mod pacer;
mod retry;
mod sink;

pub use format::{item_message, section_header, summary_message};
pub use pacer::{DeliveryError, DeliveryPacer, DeliveryReceipt, PacingConfig};
pub use retry::{RetryOutcome, RetryPolicy};
pub use sink::{MessageSink, SinkError};
