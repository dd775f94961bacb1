use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steadycall_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
use steadycall_core::TargetKey;

fn key() -> TargetKey {
    TargetKey::instance("10.4.0.1", 8080)
}

#[tokio::test(start_paused = true)]
async fn submitted_tasks_never_exceed_capacity() {
    let bulkhead = Arc::new(Bulkhead::new(
        key(),
        BulkheadConfig::builder()
            .max_concurrent_calls(3)
            .max_queue_depth(100)
            .build(),
    ));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let bulkhead = Arc::clone(&bulkhead);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                bulkhead
                    .submit(async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(bulkhead.available_permits(), 3);
    assert_eq!(bulkhead.queued_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn overflow_beyond_the_queue_is_rejected() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let queued = Arc::new(AtomicUsize::new(0));
    let (r, q) = (Arc::clone(&rejected), Arc::clone(&queued));
    let bulkhead = Arc::new(Bulkhead::new(
        key(),
        BulkheadConfig::builder()
            .max_concurrent_calls(1)
            .max_queue_depth(1)
            .on_call_rejected(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .on_call_queued(move |_| {
                q.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    ));

    let held = bulkhead.try_acquire().unwrap();
    let waiter = {
        let bulkhead = Arc::clone(&bulkhead);
        tokio::spawn(async move { bulkhead.acquire().await.map(drop) })
    };
    while bulkhead.queued_calls() == 0 {
        tokio::task::yield_now().await;
    }

    let err = bulkhead.acquire().await.unwrap_err();
    assert!(matches!(err, BulkheadError::BulkheadFull { max_concurrent_calls: 1, .. }));

    drop(held);
    waiter.await.unwrap().unwrap();

    assert_eq!(rejected.load(Ordering::SeqCst), 1);
    assert_eq!(queued.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn queue_wait_is_bounded() {
    let bulkhead = Bulkhead::new(
        key(),
        BulkheadConfig::builder()
            .max_concurrent_calls(1)
            .max_queue_depth(4)
            .max_wait_duration(Some(Duration::from_millis(200)))
            .build(),
    );
    let _held = bulkhead.try_acquire().unwrap();

    let started = tokio::time::Instant::now();
    let err = bulkhead.acquire().await.unwrap_err();

    assert!(matches!(err, BulkheadError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(bulkhead.queued_calls(), 0);

    let invocation: steadycall_core::InvocationError = err.into();
    assert!(invocation.is_bulkhead_full());
}
