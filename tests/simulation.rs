mod common;

use bankql::prelude::*;
use bankql::simulation::VirtualState;
use common::{hub_with, MockExecutor};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn users() -> Seed {
    Seed::Rows(vec![row(json!({"id": 1})), row(json!({"id": 2}))])
}

#[tokio::test]
async fn test_simulated_read_skips_executor() {
    let mock = MockExecutor::new().shared();
    let hub = hub_with(mock.clone());
    hub.simulation().start([("users", users())]).await.unwrap();

    let rows = hub
        .query("users")
        .where_("id", Operator::Eq, 1)
        .all()
        .await
        .unwrap();
    assert_eq!(rows, vec![row(json!({"id": 1}))]);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_simulated_read_works_without_any_executor() {
    let hub = Hub::new(Config::default());
    hub.simulation().start([("users", users())]).await.unwrap();
    assert_eq!(hub.query("users").get().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_simulated_aggregates() {
    let hub = Hub::new(Config::default());
    hub.simulation().start([("users", users())]).await.unwrap();
    assert_eq!(hub.query("users").count_value().await.unwrap(), 2);
    assert_eq!(hub.query("users").where_eq("id", 2).sum_value("id").await.unwrap(), 2.0);
}

#[tokio::test]
async fn test_non_equality_clauses_are_ignored_when_simulating() {
    let hub = Hub::new(Config::default());
    hub.simulation().start([("users", users())]).await.unwrap();
    let rows = hub.query("users").where_in("id", [1]).all().await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_simulated_writes_update_virtual_rows_and_fire_events() {
    let mock = MockExecutor::new().shared();
    let hub = hub_with(mock.clone());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    hub.triggers()
        .create(
            TriggerDef::new(
                "count",
                Body::task(move |_| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .on("*")
            .except(["READ"])
            .table("users")
            .state(StateMode::State),
        )
        .await
        .unwrap();

    hub.simulation().start([("users", users())]).await.unwrap();

    let result = hub
        .query("users")
        .insert(row(json!({"id": 3, "name": "c"})))
        .make()
        .await
        .unwrap();
    assert_eq!(result.changes, 1);
    assert_eq!(result.last_insert_rowid, Some(3));

    hub.query("users")
        .where_eq("id", 1)
        .update(row(json!({"name": "a"})))
        .make()
        .await
        .unwrap();
    hub.query("users").where_eq("id", 2).delete().make().await.unwrap();

    let state = hub.simulation().get_state_for("users").unwrap();
    assert_eq!(
        state,
        vec![row(json!({"id": 1, "name": "a"})), row(json!({"id": 3, "name": "c"}))]
    );
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_seed_from_live_query_once() {
    let mock = MockExecutor::new()
        .with_rows(vec![row(json!({"id": 10}))])
        .shared();
    let hub = hub_with(mock.clone());

    hub.simulation()
        .start([("users", Seed::from(hub.query("users")))])
        .await
        .unwrap();
    hub.simulation()
        .start([("users", Seed::from(hub.query("users")))])
        .await
        .unwrap();

    assert_eq!(mock.calls().len(), 1);
    assert_eq!(hub.query("users").all().await.unwrap(), vec![row(json!({"id": 10}))]);
}

#[tokio::test]
async fn test_stop_returns_to_live_reads() {
    let mock = MockExecutor::new().shared();
    let hub = hub_with(mock.clone());
    hub.simulation().start([("users", users())]).await.unwrap();
    hub.simulation().stop();

    hub.query("users").all().await.unwrap();
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn test_tracking_materializes_pending_write() {
    let hub = Hub::new(Config::default());
    hub.simulation().start([("users", users())]).await.unwrap();

    let mut q = hub.query("users").where_eq("id", 2).increment("visits", 5);
    let log = q.tracking().unwrap();
    assert_eq!(log.last().map(|e| e.step.as_str()), Some("resolve"));
    assert!(q.pending().is_none());

    let state = hub.simulation().get_state_for("users").unwrap();
    assert_eq!(state[1], row(json!({"id": 2, "visits": 5})));
}

#[tokio::test]
async fn test_external_controller_is_used() {
    let controller = Arc::new(VirtualState::new());
    let first = Hub::builder(Config::default())
        .simulation_controller(controller.clone())
        .build();
    let second = Hub::builder(Config::default())
        .simulation_controller(controller)
        .build();

    first.simulation().start([("users", users())]).await.unwrap();
    assert!(second.simulation().is_active());
    assert_eq!(second.query("users").all().await.unwrap().len(), 2);
}
