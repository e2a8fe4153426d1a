//! Page pool - bounded free list of reusable browser pages.
//!
//! ## Responsibilities
//!
//! - Owns the browser session and every page created from it.
//! - `acquire()` hands out exclusive [`PageLease`]s, reusing idle pages and
//!   creating new ones up to the configured capacity; callers wait on a
//!   semaphore when everything is checked out.
//! - `release()` resets a page to a blank state before reuse; a failing
//!   reset destroys the page instead of silently reusing it.
//! - A page-creation failure poisons the pool: the session is considered
//!   crashed and is not recovered within the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::browser::{BrowserSession, ProbePage};
use crate::error::{AppResult, BrowserError};

/// Bounded pool of reusable pages over one browser session.
pub struct PagePool {
    session: Box<dyn BrowserSession>,
    idle: Mutex<Vec<Box<dyn ProbePage>>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    poisoned: AtomicBool,
}

/// Exclusive ownership of one page between `acquire` and `release`.
///
/// The page moves into the lease on acquire and out of it on release, so a
/// worker cannot hold a page the pool still considers idle, and a released
/// lease has nothing left to use.
pub struct PageLease {
    page: Option<Box<dyn ProbePage>>,
    _permit: OwnedSemaphorePermit,
}

impl PageLease {
    pub fn page(&self) -> &dyn ProbePage {
        self.page
            .as_deref()
            .expect("lease holds a page until released")
    }
}

impl std::fmt::Debug for PageLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageLease")
            .field("held", &self.page.is_some())
            .finish()
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        // A lease dropped without going through release() must not leak its
        // tab. The page cannot re-enter the idle set from here, so it is
        // destroyed in the background.
        if let Some(page) = self.page.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}

impl PagePool {
    pub fn new(session: Box<dyn BrowserSession>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            session,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Acquires an exclusive page lease, waiting while all pages are checked
    /// out. Fails only the requesting probe; a page-creation failure also
    /// poisons the pool for the rest of the run.
    pub async fn acquire(&self) -> AppResult<PageLease> {
        if self.is_poisoned() {
            return Err(BrowserError::SessionCrashed.into());
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::PoolClosed)?;
        // The session may have crashed while this caller was waiting.
        if self.is_poisoned() {
            return Err(BrowserError::SessionCrashed.into());
        }

        let idle_page = self.idle.lock().await.pop();
        let page = match idle_page {
            Some(page) => page,
            None => match self.session.new_page().await {
                Ok(page) => page,
                Err(source) => {
                    warn!("page creation failed, poisoning pool: {:#}", source);
                    self.poison();
                    return Err(BrowserError::PageCreationFailed {
                        source: source.into(),
                    }
                    .into());
                }
            },
        };
        Ok(PageLease {
            page: Some(page),
            _permit: permit,
        })
    }

    /// Returns a leased page to the pool. The page is navigated back to a
    /// blank state first; if that fails it is destroyed rather than reused.
    pub async fn release(&self, mut lease: PageLease) {
        let Some(page) = lease.page.take() else { return };
        match page.reset().await {
            Ok(()) => {
                let mut idle = self.idle.lock().await;
                if idle.len() < self.capacity && !self.is_poisoned() {
                    idle.push(page);
                    return;
                }
                drop(idle);
                if let Err(e) = page.close().await {
                    debug!("failed to close surplus page: {:#}", e);
                }
            }
            Err(e) => {
                warn!("page reset failed, destroying handle: {:#}", e);
                if let Err(e) = page.close().await {
                    debug!("failed to close broken page: {:#}", e);
                }
            }
        }
    }

    /// Marks the session as crashed. Targets probed afterwards resolve as
    /// errors instead of waiting on a dead browser.
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Number of pages currently checked out.
    pub fn outstanding(&self) -> usize {
        self.capacity
            .saturating_sub(self.permits.available_permits())
    }

    /// Closes idle pages and the browser session. Safe to call while leases
    /// are outstanding: their pages are destroyed on drop instead of being
    /// returned.
    pub async fn shutdown(&self) {
        self.permits.close();
        let mut idle = self.idle.lock().await;
        for page in idle.drain(..) {
            let _ = page.close().await;
        }
        drop(idle);
        if let Err(e) = self.session.close().await {
            warn!("browser session close failed: {:#}", e);
        }
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("capacity", &self.capacity)
            .field("outstanding", &self.outstanding())
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
