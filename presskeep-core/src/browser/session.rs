use async_trait::async_trait;

use super::error::BrowserResult;

/// Opaque handle to an element returned by [`PageSession::query`].
///
/// Handles stay valid until the next `query` or `navigate` call on the same
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(pub(crate) usize);

/// The narrow browser capability the capture core depends on.
///
/// One implementation drives a real Chromium instance over CDP; tests use a
/// scripted double.
#[async_trait(?Send)]
pub trait PageSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// URL the browser ended up on, post-redirect.
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Full markup of the loaded page.
    async fn page_source(&mut self) -> BrowserResult<String>;

    /// CSS query in the top document.
    async fn query(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>>;

    async fn click(&mut self, element: ElementHandle) -> BrowserResult<()>;

    /// Fallback invocation path for elements that reject direct interaction.
    async fn run_script(&mut self, script: &str) -> BrowserResult<()>;

    /// Match count for a CSS query scoped to a same-origin frame.
    async fn query_in_frame(&mut self, frame_selector: &str, selector: &str)
        -> BrowserResult<usize>;

    /// Clicks the single frame-scoped match for `selector`.
    async fn click_in_frame(&mut self, frame_selector: &str, selector: &str) -> BrowserResult<()>;

    /// Raster capture of the current viewport.
    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;

    /// Single-file MHTML snapshot of the loaded page.
    async fn page_archive(&mut self) -> BrowserResult<String>;
}
