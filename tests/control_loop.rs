//! Integration tests for the running control loop
//!
//! The loop runs as a background task against in-memory collaborators, with
//! tokio's clock paused so that minutes of polling take no wall time.

use std::sync::Arc;
use std::time::Duration;

use queue_autoscaler::adapters::{InMemoryWorkload, StaticQueueDepth};
use queue_autoscaler::scaling::{spawn_controller, Controller};
use queue_autoscaler::AutoscalerConfig;

use tokio::time::sleep;

/// Defaults match the command-line defaults: poll 5s, up at 100 (+1,
/// cool off 10s), down at 10 (-1, cool off 30s), replicas 1..=5
fn config() -> AutoscalerConfig {
    AutoscalerConfig::default()
}

fn controller(
    config: AutoscalerConfig,
    queue: &StaticQueueDepth,
    workload: &InMemoryWorkload,
) -> Controller {
    Controller::new(
        "default/worker",
        config,
        Arc::new(queue.clone()),
        Arc::new(workload.clone()),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_scales_down_to_min() {
    let queue = StaticQueueDepth::new(5);
    let workload = InMemoryWorkload::new(3);
    let config = AutoscalerConfig {
        poll_interval: Duration::from_secs(1),
        scale_down_cooldown: Duration::from_secs(1),
        ..config()
    };

    let (shutdown, handle) = spawn_controller(controller(config, &queue, &workload));
    sleep(Duration::from_secs(10)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(workload.replicas(), 1);
    assert_eq!(workload.writes(), vec![2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_scales_up_to_max() {
    let queue = StaticQueueDepth::new(1000);
    let workload = InMemoryWorkload::new(3);
    let config = AutoscalerConfig {
        poll_interval: Duration::from_secs(1),
        scale_up_cooldown: Duration::from_secs(1),
        ..config()
    };

    let (shutdown, handle) = spawn_controller(controller(config, &queue, &workload));
    sleep(Duration::from_secs(10)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(workload.replicas(), 5);
    assert_eq!(workload.writes(), vec![4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_scale_up_waits_for_cool_off() {
    let queue = StaticQueueDepth::new(100);
    let workload = InMemoryWorkload::new(3);

    let (shutdown, handle) = spawn_controller(controller(config(), &queue, &workload));
    sleep(Duration::from_secs(15)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    // t=5s is inside the startup cool off, t=10s scales, t=15s cools off again
    assert_eq!(workload.replicas(), 4);
    assert_eq!(workload.writes(), vec![4]);
}

#[tokio::test(start_paused = true)]
async fn test_scale_down_waits_for_cool_off() {
    let queue = StaticQueueDepth::new(10);
    let workload = InMemoryWorkload::new(3);
    let config = AutoscalerConfig {
        scale_down_cooldown: Duration::from_secs(10),
        ..config()
    };

    let (shutdown, handle) = spawn_controller(controller(config, &queue, &workload));
    sleep(Duration::from_secs(15)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(workload.replicas(), 2);
    assert_eq!(workload.writes(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_queue_leaves_workload_alone() {
    let queue = StaticQueueDepth::new(50);
    let workload = InMemoryWorkload::new(3);

    let (shutdown, handle) = spawn_controller(controller(config(), &queue, &workload));
    sleep(Duration::from_secs(62)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(queue.sample_count(), 12);
    assert_eq!(workload.call_count(), 0);
    assert_eq!(workload.replicas(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_sample_failures() {
    let queue = StaticQueueDepth::new(1000);
    queue.set_failing(true);
    let workload = InMemoryWorkload::new(3);
    let config = AutoscalerConfig {
        poll_interval: Duration::from_secs(1),
        scale_up_cooldown: Duration::from_secs(1),
        ..config()
    };

    let (shutdown, handle) = spawn_controller(controller(config, &queue, &workload));

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(queue.sample_count(), 3);
    assert_eq!(workload.call_count(), 0);

    queue.set_failing(false);
    sleep(Duration::from_secs(2)).await;
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(workload.replicas(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_status_follows_the_loop() {
    let queue = StaticQueueDepth::new(1000);
    let workload = InMemoryWorkload::new(3);
    let config = AutoscalerConfig {
        poll_interval: Duration::from_secs(1),
        scale_up_cooldown: Duration::from_secs(1),
        ..config()
    };

    let controller = controller(config, &queue, &workload);
    let status = controller.status();
    let (shutdown, handle) = spawn_controller(controller);

    sleep(Duration::from_millis(1500)).await;
    let snapshot = status.borrow().clone();
    assert_eq!(snapshot.workload, "default/worker");
    assert_eq!(snapshot.ticks, 1);
    assert_eq!(snapshot.last_depth, Some(1000));
    assert_eq!(snapshot.observed_replicas, Some(4));
    let event = snapshot.last_scale_up.unwrap();
    assert_eq!((event.from, event.to), (3, 4));
    assert!(snapshot.last_scale_down.is_none());

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_tick() {
    let queue = StaticQueueDepth::new(1000);
    let workload = InMemoryWorkload::new(3);

    let (shutdown, handle) = spawn_controller(controller(config(), &queue, &workload));
    sleep(Duration::from_secs(1)).await;
    shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop did not stop")
        .unwrap();

    assert_eq!(queue.sample_count(), 0);
    assert_eq!(workload.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_shutdown_sender_stops_loop() {
    let queue = StaticQueueDepth::new(50);
    let workload = InMemoryWorkload::new(3);

    let (shutdown, handle) = spawn_controller(controller(config(), &queue, &workload));
    sleep(Duration::from_secs(6)).await;
    drop(shutdown);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop did not stop")
        .unwrap();

    let samples = queue.sample_count();
    assert_eq!(samples, 1);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(queue.sample_count(), samples);
}
