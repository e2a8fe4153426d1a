//! Browser infrastructure layer.
//!
//! ## Responsibilities
//!
//! - Hold the scarce resources (browser session, pages) and expose
//!   capabilities only; nothing in here knows about targets or queries.
//! - `chromium` - chromiumoxide-backed session: launch, page creation,
//!   teardown.
//! - `pool` - bounded free list of reusable pages with exclusive leases.
//!
//! The traits at this seam keep the rest of the engine independent of the
//! concrete browser, which is also what makes the orchestration testable
//! without a running Chrome.

pub mod chromium;
pub mod pool;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use chromium::ChromiumLauncher;
pub use pool::{PageLease, PagePool};

/// A reusable browser tab, exclusively held by one worker at a time.
#[async_trait]
pub trait ProbePage: Send + Sync {
    /// Navigates the page to the given URL.
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// Visible text of the document body, for availability heuristics.
    async fn body_text(&self) -> anyhow::Result<String>;

    /// Evaluates a JavaScript expression and returns its JSON value.
    async fn eval(&self, js: &str) -> anyhow::Result<JsonValue>;

    /// Returns the page to a neutral blank state, discarding cookies and
    /// session leftovers. A failing reset means the page must be destroyed.
    async fn reset(&self) -> anyhow::Result<()>;

    /// Destroys the underlying tab.
    async fn close(&self) -> anyhow::Result<()>;
}

/// One long-lived browser session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> anyhow::Result<Box<dyn ProbePage>>;

    /// Terminates the session. Best-effort; callable while pages are still
    /// checked out.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Launches one session per run.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserSession>>;
}
