//! Tests for resilience patterns
//!
//! These tests verify request deduplication under concurrency, including
//! deadlines and failures shared by every waiter.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;

    use crate::error::{ErrorKind, Result, ServiceError};
    use crate::resilience::RequestDeduplicator;

    async fn slow_value(calls: Arc<AtomicUsize>, value: u32) -> Result<u32> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_invocation() {
        let dedup = RequestDeduplicator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..5).map(|_| {
            let dedup = dedup.clone();
            let calls = Arc::clone(&calls);
            async move { dedup.deduplicate("k", move || slow_value(calls, 42)).await }
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| matches!(r, Ok(42))));
        assert_eq!(dedup.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_by_waiters() {
        let dedup = RequestDeduplicator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let results: Vec<Result<u32>> = join_all((0..3).map(|_| {
            let dedup = dedup.clone();
            let calls = Arc::clone(&calls);
            async move {
                dedup
                    .deduplicate("k", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(ServiceError::http_status(502, "HTTP 502 Bad Gateway"))
                    })
                    .await
            }
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap_err().status_code(), Some(502));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_run_again() {
        let dedup = RequestDeduplicator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = dedup
            .deduplicate("k", {
                let calls = Arc::clone(&calls);
                move || slow_value(calls, 1)
            })
            .await
            .unwrap();
        let second = dedup
            .deduplicate("k", {
                let calls = Arc::clone(&calls);
                move || slow_value(calls, 2)
            })
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let dedup = RequestDeduplicator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            dedup.deduplicate("a", {
                let calls = Arc::clone(&calls);
                move || slow_value(calls, 1)
            }),
            dedup.deduplicate("b", {
                let calls = Arc::clone(&calls);
                move || slow_value(calls, 2)
            }),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_rejects_and_clears_key() {
        let dedup = RequestDeduplicator::default();

        let result: Result<u32> = dedup
            .deduplicate_with_timeout(
                "stuck",
                || std::future::pending::<Result<u32>>(),
                Duration::from_millis(250),
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("250ms"), "{}", err);
        assert_eq!(dedup.pending_count(), 0);

        // The key is free again
        let value = dedup
            .deduplicate("stuck", || async { Ok(5u32) })
            .await
            .unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_deadline() {
        let dedup = RequestDeduplicator::new(Duration::from_secs(2));

        let result: Result<u32> = dedup
            .deduplicate("stuck", || std::future::pending::<Result<u32>>())
            .await;

        assert!(result.unwrap_err().to_string().contains("2000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_survives_dropped_waiters() {
        let dedup = RequestDeduplicator::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let dedup = dedup.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { dedup.deduplicate("k", move || slow_value(calls, 7)).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(dedup.pending_count(), 1);
        waiter.abort();

        // A new caller joins the call already in flight
        let value = dedup
            .deduplicate("k", {
                let calls = Arc::clone(&calls);
                move || slow_value(calls, 8)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_late_work() {
        let dedup = RequestDeduplicator::default();
        let finished = Arc::new(AtomicUsize::new(0));

        let result: Result<u32> = dedup
            .deduplicate_with_timeout(
                "slow",
                {
                    let finished = Arc::clone(&finished);
                    move || async move {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok(1)
                    }
                },
                Duration::from_millis(100),
            )
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);

        // The loser never completes, so it cannot fill any cache late
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
