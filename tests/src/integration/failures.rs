//! Failure paths: backpressure, broker errors, cancellation, shutdown and
//! garbage on the reply queue.

use crate::fixtures::{data, Harness, Script};
use recruit_bridge::{BridgeConfig, BridgeError, CallOptions, TransportError};
use serde_json::json;
use shared_bus::InMemoryBroker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

async fn wait_pending(harness: &Harness, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while harness.service.registry().len() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("calls did not register in time");
}

#[tokio::test]
async fn test_full_outbound_queue_reports_backpressure() {
    // One slot in the broker queue (nobody consumes it), one in the
    // outbound queue and one publish stuck in the worker
    let config = BridgeConfig {
        outbound_capacity: 1,
        publish_timeout: Duration::from_millis(50),
        ..Harness::config_with_timeout(Duration::from_secs(5))
    };
    let harness = Harness::start_with_broker(config, Arc::new(InMemoryBroker::with_capacity(1)));
    let queue = harness.config.queues.employee.clone();

    let mut stuck = Vec::new();
    for n in 0..3 {
        let bridge = harness.bridge().clone();
        let queue = queue.clone();
        stuck.push(tokio::spawn(async move {
            bridge
                .call(&queue, "find_employee_by_id", data(json!({"n": n})))
                .await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let started = Instant::now();
    let err = harness
        .bridge()
        .call(&queue, "find_employee_by_id", data(json!({"n": 3})))
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(matches!(
        err,
        BridgeError::Transport(TransportError::Backpressure(bound))
            if bound == Duration::from_millis(50)
    ));
    assert!(err.is_retryable());
    assert_eq!(harness.snapshot().publisher.backpressured, 1);
    // The refused call left nothing behind
    assert_eq!(harness.service.registry().len(), 3);

    harness.stop().await;
    for call in stuck {
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::PublisherClosed)));
    }
}

#[tokio::test]
async fn test_broker_rejection_fails_call_without_waiting_for_timeout() {
    let harness = Harness::start(Harness::config_with_timeout(Duration::from_secs(30)));
    let queue = harness.config.queues.mail.clone();
    // Claim and drop the consumer so the broker refuses the queue
    drop(harness.broker.subscribe(&queue).unwrap());

    let started = Instant::now();
    let err = harness
        .bridge()
        .call(&queue, "send_mail", data(json!({"to": ["a@example.com"]})))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    match &err {
        BridgeError::Transport(TransportError::Broker { queue: failed, .. }) => {
            assert_eq!(failed, &queue);
        }
        other => panic!("expected broker failure, got {other:?}"),
    }
    let snapshot = harness.snapshot();
    assert_eq!(snapshot.registry.pending, 0);
    assert_eq!(snapshot.registry.failed, 1);
    assert_eq!(snapshot.publisher.failed, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_cancelled_call_returns_cancelled_and_cleans_up() {
    let harness = Harness::start(BridgeConfig::default());
    let queue = harness.config.queues.job.clone();
    let _seen = harness.sibling(&queue, |_| Script::Silent);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        }
    });

    let err = harness
        .bridge()
        .call_with(
            &queue,
            "find_job_by_id",
            data(json!({"job_id": "j-1"})),
            CallOptions::default().with_cancel(cancel),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Cancelled { .. }));
    assert_eq!(err.kind(), "cancelled");
    assert!(harness.service.registry().is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn test_dropped_call_future_removes_entry() {
    let harness = Harness::start(BridgeConfig::default());
    let queue = harness.config.queues.grade.clone();
    let _seen = harness.sibling(&queue, |_| Script::Silent);

    let outcome = tokio::time::timeout(
        Duration::from_millis(30),
        harness
            .bridge()
            .call(&queue, "find_grade_by_id", data(json!({"grade_id": "g-1"}))),
    )
    .await;

    assert!(outcome.is_err());
    assert!(harness.service.registry().is_empty());
    assert_eq!(harness.snapshot().registry.removed, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_fails_every_waiting_call() {
    let harness = Harness::start(BridgeConfig::default());
    let queue = harness.config.queues.organization.clone();
    let _seen = harness.sibling(&queue, |_| Script::Silent);

    let calls: Vec<_> = (0..3)
        .map(|n| {
            let bridge = harness.bridge().clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                bridge
                    .call(&queue, "find_organization_by_id", data(json!({"n": n})))
                    .await
            })
        })
        .collect();
    wait_pending(&harness, 3).await;

    let bridge = harness.bridge().clone();
    let registry = harness.service.registry();
    harness.stop().await;

    for call in calls {
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::PublisherClosed)));
    }
    assert!(registry.is_empty());

    // New calls are refused outright
    let err = bridge
        .call(&queue, "find_organization_by_id", data(json!({"n": 9})))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Transport(TransportError::PublisherClosed)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_lost_reply_queue_fails_waiting_call_and_refuses_new_ones() {
    let harness = Harness::start(Harness::config_with_timeout(Duration::from_secs(30)));
    let queue = harness.config.queues.user.clone();
    let _seen = harness.sibling(&queue, |_| Script::Silent);

    let call = tokio::spawn({
        let bridge = harness.bridge().clone();
        let queue = queue.clone();
        async move {
            bridge
                .call(&queue, "find_user_by_id", data(json!({"user_id": "u-1"})))
                .await
        }
    });
    wait_pending(&harness, 1).await;
    assert!(harness.service.is_running());

    // Tearing the broker down drops the reply queue under the dispatcher
    harness.broker.close();

    let err = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("call should fail well before its timeout")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, BridgeError::Transport(TransportError::ReplyQueueClosed)));
    assert!(!err.is_retryable());
    assert!(!harness.service.is_running());

    let err = harness
        .bridge()
        .call(&queue, "find_user_by_id", data(json!({"user_id": "u-2"})))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Transport(TransportError::ReplyQueueClosed)));
    assert!(harness.service.registry().is_empty());
    assert_eq!(harness.snapshot().registry.failed, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_cancel_while_waiting_for_outbound_capacity() {
    // Same wedge as the backpressure test, but with a long publish bound
    let config = BridgeConfig {
        outbound_capacity: 1,
        publish_timeout: Duration::from_secs(2),
        ..Harness::config_with_timeout(Duration::from_secs(5))
    };
    let harness = Harness::start_with_broker(config, Arc::new(InMemoryBroker::with_capacity(1)));
    let queue = harness.config.queues.employee.clone();

    let mut stuck = Vec::new();
    for n in 0..3 {
        let bridge = harness.bridge().clone();
        let queue = queue.clone();
        stuck.push(tokio::spawn(async move {
            bridge
                .call(&queue, "find_employee_by_id", data(json!({"n": n})))
                .await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        }
    });

    let started = Instant::now();
    let err = harness
        .bridge()
        .call_with(
            &queue,
            "find_employee_by_id",
            data(json!({"n": 3})),
            CallOptions::default().with_cancel(cancel),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.snapshot().publisher.backpressured, 0);
    assert_eq!(harness.service.registry().len(), 3);

    harness.stop().await;
    for call in stuck {
        call.await.unwrap().unwrap_err();
    }
}

#[tokio::test]
async fn test_garbage_on_reply_queue_does_not_stop_dispatch() {
    let harness = Harness::start(BridgeConfig::default());
    harness.inject_raw(b"not json at all").await;
    harness.inject_raw(b"{\"message_type\":\"find_job_by_id\"}").await;
    harness.wait_for_frames(2, Duration::from_secs(2)).await;

    let queue = harness.config.queues.job.clone();
    let _seen = harness.sibling(&queue, |_| Script::reply(json!({"job": {"id": "j-1"}})));
    let reply = harness
        .bridge()
        .call(&queue, "find_job_by_id", data(json!({"job_id": "j-1"})))
        .await
        .unwrap();
    assert_eq!(reply["job"]["id"], json!("j-1"));

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.dispatcher.malformed, 2);
    assert_eq!(snapshot.dispatcher.delivered, 1);

    harness.stop().await;
}
