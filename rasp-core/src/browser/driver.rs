use std::time::Duration;

use async_trait::async_trait;

use super::error::BrowserResult;

/// Opens rendered pages. Implementations own the underlying browser process.
#[async_trait]
pub trait RenderDriver: Send + Sync {
    /// Navigates to `locator`. A navigation fault or timeout is an error and no
    /// session is returned.
    async fn open(&self, locator: &str) -> BrowserResult<Box<dyn RenderSession>>;
}

/// A live page exclusively owned by one extraction.
///
/// Implementations must release their resources when dropped without
/// [`RenderSession::close`], so a cancelled extraction never leaks a browser.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Waits until `selector` matches. `Ok(false)` on timeout.
    async fn ready(&self, selector: &str, timeout: Duration) -> BrowserResult<bool>;

    /// `Ok(None)` when nothing matches; errors are reserved for driver faults.
    async fn probe(&self, selector: &str) -> BrowserResult<Option<Box<dyn NodeHandle>>>;

    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

#[async_trait]
pub trait NodeHandle: Send + Sync {
    async fn text(&self) -> BrowserResult<String>;
}
