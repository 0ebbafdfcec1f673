//! Trigger bodies and their interpreter.

use futures::future::{join_all, BoxFuture};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{BankError, BankResult};
use crate::events::LifecycleEvent;
use crate::resolve::resolve_executor;

/// Callable body step. It may return a further body to run as a continuation.
pub type Handler =
    Arc<dyn Fn(LifecycleEvent) -> BoxFuture<'static, BankResult<Option<Body>>> + Send + Sync>;

/// What a trigger runs.
#[derive(Clone)]
pub enum Body {
    /// One SQL statement.
    Sql(String),
    /// In-process callable.
    Call(Handler),
    /// Steps run strictly one after another.
    Seq(Vec<Body>),
    /// Steps run concurrently; the group ends once all have settled.
    Parallel(Vec<Body>),
}

impl Body {
    pub fn sql(sql: impl Into<String>) -> Self {
        Body::Sql(sql.into())
    }

    /// Callable that may hand back another body.
    pub fn call<F, Fut>(f: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = BankResult<Option<Body>>> + Send + 'static,
    {
        Body::Call(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Callable with no continuation.
    pub fn task<F, Fut>(f: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = BankResult<()>> + Send + 'static,
    {
        let f = Arc::new(f);
        Body::call(move |ctx| {
            let f = f.clone();
            async move {
                f(ctx).await?;
                Ok(None)
            }
        })
    }

    pub fn seq(steps: impl IntoIterator<Item = Body>) -> Self {
        Body::Seq(steps.into_iter().collect())
    }

    pub fn parallel(steps: impl IntoIterator<Item = Body>) -> Self {
        Body::Parallel(steps.into_iter().collect())
    }

    /// Every SQL statement in the tree, depth first.
    pub fn sql_statements(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sql(&mut out);
        out
    }

    fn collect_sql<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Body::Sql(sql) => out.push(sql),
            Body::Call(_) => {}
            Body::Seq(steps) | Body::Parallel(steps) => {
                for step in steps {
                    step.collect_sql(out);
                }
            }
        }
    }

    /// The tree with SQL leaves removed, or `None` if nothing is left.
    pub fn without_sql(&self) -> Option<Body> {
        match self {
            Body::Sql(_) => None,
            Body::Call(_) => Some(self.clone()),
            Body::Seq(steps) => {
                let kept: Vec<Body> = steps.iter().filter_map(Body::without_sql).collect();
                (!kept.is_empty()).then_some(Body::Seq(kept))
            }
            Body::Parallel(steps) => {
                let kept: Vec<Body> = steps.iter().filter_map(Body::without_sql).collect();
                (!kept.is_empty()).then_some(Body::Parallel(kept))
            }
        }
    }

    /// Interpret the body for one lifecycle event.
    pub fn run<'a>(
        &'a self,
        ctx: &'a LifecycleEvent,
        runner: &'a SqlRunner,
    ) -> BoxFuture<'a, BankResult<()>> {
        Box::pin(async move {
            match self {
                Body::Sql(sql) => runner.run(ctx, sql).await,
                Body::Call(handler) => {
                    if let Some(next) = handler(ctx.clone()).await? {
                        next.run(ctx, runner).await?;
                    }
                    Ok(())
                }
                Body::Seq(steps) => {
                    for step in steps {
                        step.run(ctx, runner).await?;
                    }
                    Ok(())
                }
                Body::Parallel(steps) => {
                    let results = join_all(steps.iter().map(|step| step.run(ctx, runner))).await;
                    results.into_iter().collect()
                }
            }
        })
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Body::Call(_) => f.write_str("Call(<fn>)"),
            Body::Seq(steps) => f.debug_tuple("Seq").field(steps).finish(),
            Body::Parallel(steps) => f.debug_tuple("Parallel").field(steps).finish(),
        }
    }
}

impl From<&str> for Body {
    fn from(sql: &str) -> Self {
        Body::Sql(sql.to_string())
    }
}

impl From<String> for Body {
    fn from(sql: String) -> Self {
        Body::Sql(sql)
    }
}

impl From<Vec<Body>> for Body {
    fn from(steps: Vec<Body>) -> Self {
        Body::Seq(steps)
    }
}

/// Runs SQL steps of in-process bodies on the event's table executor.
#[derive(Clone)]
pub struct SqlRunner {
    config: Arc<Config>,
    banks: Vec<String>,
}

impl SqlRunner {
    pub fn new(config: Arc<Config>, banks: Vec<String>) -> Self {
        Self { config, banks }
    }

    async fn run(&self, ctx: &LifecycleEvent, sql: &str) -> BankResult<()> {
        let executor = resolve_executor(&self.config, &ctx.table, &self.banks)?;
        tracing::debug!("trigger sql on {}: {}", ctx.table, sql);
        if !ctx.blocking {
            executor.execute_query(sql, &[]).await?;
            return Ok(());
        }

        // No reactor is driving a blocking emit, so stay off the async path.
        if let Some(result) = executor.run_sync(sql, &[]) {
            return result.map(|_| ());
        }
        match executor.execute_query_sync(sql, &[]) {
            Some(result) => result.map(|_| ()),
            None => Err(BankError::Capability("run_sync")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_statements_flatten_parallel() {
        let body = Body::seq([
            Body::sql("A"),
            Body::task(|_| async { Ok(()) }),
            Body::parallel([Body::sql("B"), Body::sql("C")]),
        ]);
        assert_eq!(body.sql_statements(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_without_sql_strips_leaves() {
        let body = Body::seq([Body::sql("A"), Body::parallel([Body::sql("B")])]);
        assert!(body.without_sql().is_none());

        let body = Body::parallel([Body::sql("A"), Body::task(|_| async { Ok(()) })]);
        match body.without_sql() {
            Some(Body::Parallel(steps)) => assert_eq!(steps.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}
