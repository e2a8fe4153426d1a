//! Dispatcher - hands out each target exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::Target;

/// Ordered target list with a shared cursor.
///
/// `next()` is safe under unbounded concurrent callers: the cursor advances
/// atomically, so no index is ever handed out twice. Assignment order is the
/// list order; completion order is up to the workers.
#[derive(Debug)]
pub struct Dispatcher {
    targets: Arc<Vec<Target>>,
    cursor: AtomicUsize,
}

impl Dispatcher {
    pub fn new(targets: Arc<Vec<Target>>) -> Self {
        Self {
            targets,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next target, or `None` once the list is exhausted.
    pub fn next(&self) -> Option<Target> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.targets.get(index).cloned()
    }

    pub fn total(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    fn targets(n: usize) -> Arc<Vec<Target>> {
        Arc::new(
            (0..n)
                .map(|i| Target {
                    id: format!("t{i}"),
                    name: format!("Restaurant {i}"),
                    platform: "sevenrooms".into(),
                    url: None,
                    slug: Some(format!("restaurant-{i}")),
                })
                .collect(),
        )
    }

    #[test]
    fn dispatch_order_is_list_order() {
        let dispatcher = Dispatcher::new(targets(3));
        assert_eq!(dispatcher.next().map(|t| t.id).as_deref(), Some("t0"));
        assert_eq!(dispatcher.next().map(|t| t.id).as_deref(), Some("t1"));
        assert_eq!(dispatcher.next().map(|t| t.id).as_deref(), Some("t2"));
        assert!(dispatcher.next().is_none());
        assert!(dispatcher.next().is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_never_see_the_same_target() {
        let total = 100;
        let dispatcher = Arc::new(Dispatcher::new(targets(total)));
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            let seen = seen.clone();
            handles.push(tokio::spawn(async move {
                while let Some(target) = dispatcher.next() {
                    let fresh = seen.lock().await.insert(target.id);
                    assert!(fresh, "a target was dispatched twice");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("worker task panicked");
        }

        assert_eq!(seen.lock().await.len(), total);
        assert!(dispatcher.next().is_none());
    }
}
