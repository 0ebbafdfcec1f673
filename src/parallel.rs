//! Concurrent fan-out over independent statements.

use futures::future::join_all;
use std::future::Future;

use crate::error::BankResult;

/// Await every future concurrently and collect results in input order.
///
/// All futures run to completion; the first error in input order is returned.
pub async fn parallel<I, F, T>(futures: I) -> BankResult<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = BankResult<T>>,
{
    join_all(futures).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BankError;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_results_in_input_order() {
        let out = parallel((1..=3).map(|n| async move { Ok::<_, BankError>(n * 10) }))
            .await
            .unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_error_after_all_settle() {
        let done = Arc::new(AtomicUsize::new(0));
        let futs: Vec<BoxFuture<'static, BankResult<()>>> = vec![
            Box::pin(async { Err(BankError::execution("boom")) }),
            Box::pin({
                let done = done.clone();
                async move {
                    tokio::task::yield_now().await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        ];
        assert!(parallel(futs).await.is_err());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
