//! Checker contract and registry - capability layer
//!
//! A checker is the external, platform-specific collaborator that decides
//! "available" vs "unavailable" for one target. The engine only schedules,
//! times out, and aggregates checkers; their DOM/text heuristics are opaque
//! here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::ProbePage;
use crate::models::{ProbeResult, Query, Target};

/// Platform-specific availability checker.
///
/// Contract:
/// - receives an exclusively leased page, the target, and the query;
/// - must not retain the page past return;
/// - performs its own interaction/wait logic;
/// - may fail, in which case the worker records an `Error` outcome.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(
        &self,
        page: &dyn ProbePage,
        target: &Target,
        query: &Query,
    ) -> anyhow::Result<ProbeResult>;
}

/// Platform → checker lookup, injected into the worker pool at construction.
///
/// An explicit registry object rather than a module-level table, so runs can
/// carry their own set of checkers (and tests can substitute fakes).
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: impl Into<String>, checker: Arc<dyn Checker>) {
        self.checkers.insert(platform.into(), checker);
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn Checker>> {
        self.checkers.get(platform).cloned()
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.checkers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("platforms", &self.checkers.keys().collect::<Vec<_>>())
            .finish()
    }
}
