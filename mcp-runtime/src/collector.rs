use futures::StreamExt;
use perch_core::posts::Page;
use tracing::debug;

use crate::upstream::{LazySequence, UpstreamError};

/// Upstream result shapes the collector can draw from.
pub enum Source<'a, T> {
    /// Already materialized, ordered.
    Items(Vec<T>),
    /// Pulled one item at a time; may never end on its own.
    Lazy(LazySequence<'a, T>),
}

impl<T> From<Vec<T>> for Source<'_, T> {
    fn from(items: Vec<T>) -> Self {
        Source::Items(items)
    }
}

impl<T> From<Page<T>> for Source<'_, T> {
    fn from(page: Page<T>) -> Self {
        Source::Items(page.items)
    }
}

/// Ordered, capped result. Emptiness is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    pub items: Vec<T>,
    /// The source ran out before the cap was reached.
    pub exhausted: bool,
}

impl<T> Collected<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

pub async fn collect<T>(source: Source<'_, T>, cap: usize) -> Result<Collected<T>, UpstreamError> {
    collect_filtered(source, cap, |_: &T| true).await
}

/// Draw at most `cap` items passing `predicate`, preserving source order.
///
/// A lazy source is polled only until `cap` items have passed or it ends;
/// an upstream error while pulling aborts the collection.
pub async fn collect_filtered<T, P>(
    source: Source<'_, T>,
    cap: usize,
    predicate: P,
) -> Result<Collected<T>, UpstreamError>
where
    P: Fn(&T) -> bool,
{
    if cap == 0 {
        return Ok(Collected {
            items: Vec::new(),
            exhausted: false,
        });
    }

    match source {
        Source::Items(items) => {
            let mut matching = items.into_iter().filter(|item| predicate(item));
            let collected: Vec<T> = matching.by_ref().take(cap).collect();
            let exhausted = collected.len() < cap || matching.next().is_none();
            Ok(Collected {
                items: collected,
                exhausted,
            })
        }
        Source::Lazy(mut stream) => {
            let mut items = Vec::with_capacity(cap.min(64));
            let mut scanned = 0_usize;
            while items.len() < cap {
                match stream.next().await {
                    Some(Ok(item)) => {
                        scanned += 1;
                        if predicate(&item) {
                            items.push(item);
                        }
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        debug!(scanned, collected = items.len(), "lazy source exhausted");
                        return Ok(Collected {
                            items,
                            exhausted: true,
                        });
                    }
                }
            }
            debug!(scanned, collected = items.len(), "cap reached");
            Ok(Collected {
                items,
                exhausted: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_infinite(pulled: Arc<AtomicUsize>) -> LazySequence<'static, u64> {
        stream::iter(0_u64..)
            .map(move |n| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            })
            .boxed()
    }

    #[tokio::test]
    async fn array_source_is_truncated_in_order() {
        let collected = collect(Source::Items(vec![1, 2, 3, 4, 5]), 3).await.unwrap();
        assert_eq!(collected.items, vec![1, 2, 3]);
        assert!(!collected.exhausted);

        let short = collect(Source::Items(vec![1, 2]), 3).await.unwrap();
        assert_eq!(short.items, vec![1, 2]);
        assert!(short.exhausted);
    }

    #[tokio::test]
    async fn array_predicate_applies_before_cap() {
        let collected = collect_filtered(Source::Items((1..=10).collect()), 2, |n: &i32| {
            n % 3 == 0
        })
        .await
        .unwrap();
        assert_eq!(collected.items, vec![3, 6]);
    }

    #[tokio::test]
    async fn unbounded_source_stops_at_cap() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let collected = collect(Source::Lazy(counting_infinite(pulled.clone())), 5)
            .await
            .unwrap();
        assert_eq!(collected.items, vec![0, 1, 2, 3, 4]);
        assert_eq!(pulled.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn lazy_predicate_keeps_pulling_until_cap_of_matches() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let collected = collect_filtered(
            Source::Lazy(counting_infinite(pulled.clone())),
            3,
            |n: &u64| n % 10 == 0,
        )
        .await
        .unwrap();
        assert_eq!(collected.items, vec![0, 10, 20]);
        assert_eq!(pulled.load(Ordering::SeqCst), 21);
    }

    #[tokio::test]
    async fn never_matching_predicate_yields_empty_not_error() {
        let source: LazySequence<'static, u64> = stream::iter((0_u64..50).map(Ok)).boxed();
        let collected = collect_filtered(Source::Lazy(source), 10, |_: &u64| false)
            .await
            .unwrap();
        assert!(collected.is_empty());
        assert!(collected.exhausted);
    }

    #[tokio::test]
    async fn upstream_error_mid_stream_is_propagated() {
        let source: LazySequence<'static, u64> = stream::iter(vec![
            Ok(1),
            Err(UpstreamError::Transport("connection reset".to_string())),
            Ok(2),
        ])
        .boxed();
        let err = collect(Source::Lazy(source), 10).await.unwrap_err();
        assert_eq!(err, UpstreamError::Transport("connection reset".to_string()));
    }

    #[tokio::test]
    async fn zero_cap_never_polls() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let collected = collect(Source::Lazy(counting_infinite(pulled.clone())), 0)
            .await
            .unwrap();
        assert!(collected.is_empty());
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn page_source_uses_its_items() {
        let page = Page::new(vec!["a", "b", "c"], Some("next".to_string()));
        let collected = collect(Source::from(page), 2).await.unwrap();
        assert_eq!(collected.into_items(), vec!["a", "b"]);
    }
}
