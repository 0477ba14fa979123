//! Tests for the executor module

use super::*;
use crate::batch::Batcher;
use crate::fetch::FetchFn;
use crate::paging::PagingState;
use futures::FutureExt;
use std::time::Duration;

type State = PagingState<u32, u32>;

fn ready_batch(batcher: &mut Batcher<u32, u32>, entity_type: &str) -> Batch<u32, u32> {
    batcher.add(PagingState::new(entity_type, None));
    batcher.pop_ready().expect("batch ready")
}

fn test_batcher() -> Batcher<u32, u32> {
    Batcher::new(false, 1, Arc::new(|s: &State| s.entity_type().to_string()))
}

fn sleeping_fetcher(delay: Duration) -> Arc<dyn Fetcher<(), u32, u32, u32>> {
    Arc::new(FetchFn::new(move |_: &(), _: &[State]| {
        async move {
            tokio::time::sleep(delay).await;
            Ok(7)
        }
        .boxed()
    }))
}

#[tokio::test]
async fn test_try_submit_runs_fetch_and_posts_completion() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut executor = FetchExecutor::new(
        sleeping_fetcher(Duration::from_millis(0)),
        Arc::new(TokioSpawner),
        Arc::new(()),
        tx,
        2,
    );
    let mut batcher = test_batcher();

    assert!(executor.try_submit(ready_batch(&mut batcher, "users")).is_ok());
    assert_eq!(executor.in_flight(), 1);

    let completion = rx.recv().await.expect("completion event");
    assert_eq!(completion.batch.key(), "users");
    assert_eq!(completion.batch.status(), BatchStatus::InFlight);
    assert_eq!(completion.outcome.unwrap(), 7);

    executor.on_complete();
    assert_eq!(executor.in_flight(), 0);
}

#[tokio::test]
async fn test_try_submit_rejects_at_capacity() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut executor = FetchExecutor::new(
        sleeping_fetcher(Duration::from_millis(50)),
        Arc::new(TokioSpawner),
        Arc::new(()),
        tx,
        2,
    );
    let mut batcher = test_batcher();

    assert!(executor.try_submit(ready_batch(&mut batcher, "a")).is_ok());
    assert!(executor.try_submit(ready_batch(&mut batcher, "b")).is_ok());
    assert!(!executor.has_capacity());

    // Third submit is rejected and the batch is handed back
    let rejected = executor
        .try_submit(ready_batch(&mut batcher, "c"))
        .expect_err("at capacity");
    assert_eq!(rejected.key(), "c");
    assert_eq!(executor.in_flight(), 2);

    // Capacity frees up once a completion is acknowledged
    let _ = rx.recv().await.expect("completion event");
    executor.on_complete();
    assert!(executor.has_capacity());
    assert!(executor.try_submit(rejected).is_ok());
}

#[tokio::test]
async fn test_fetch_error_is_delivered_as_completion() {
    let (tx, mut rx) = mpsc::channel(4);
    let failing: Arc<dyn Fetcher<(), u32, u32, u32>> = Arc::new(FetchFn::new(
        |_: &(), _: &[State]| async { Err(crate::Error::fetch("boom")) }.boxed(),
    ));
    let mut executor =
        FetchExecutor::new(failing, Arc::new(TokioSpawner), Arc::new(()), tx, 1);
    let mut batcher = test_batcher();

    executor.try_submit(ready_batch(&mut batcher, "users")).unwrap();

    let completion = rx.recv().await.expect("completion event");
    assert_eq!(completion.outcome.unwrap_err(), crate::Error::fetch("boom"));
    // Members come back untouched for the scheduler to fail and emit
    assert_eq!(completion.batch.len(), 1);
}
