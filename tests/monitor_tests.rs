// Shared polling, fan-out and monitor lifecycle against a scripted runtime

mod common;

use common::{MockRuntime, generated, monitor_config, sample};
use dockgate::error::GatewayError;
use dockgate::monitor::{MonitorConfig, MonitorTarget, MonitoringRegistry, RegistryStatus};
use futures_util::StreamExt;
use std::sync::Arc;

fn registry_with(runtime: &Arc<MockRuntime>) -> MonitoringRegistry {
    MonitoringRegistry::new(runtime.clone(), monitor_config())
}

#[tokio::test(start_paused = true)]
async fn two_subscribers_share_one_poll_loop() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let mut a = registry.subscribe_container("web");
    let mut b = registry.subscribe_container("web");
    assert_ne!(a.id(), b.id());

    let first_a = a.recv().await.unwrap().unwrap();
    let first_b = b.recv().await.unwrap().unwrap();
    assert_eq!(first_a, first_b);
    // One baseline plus one emitting tick; a second loop would double this.
    assert_eq!(runtime.stats_calls("web"), 2);
    assert_eq!(
        registry.status(),
        RegistryStatus {
            container_monitors: 1,
            system_monitor_running: false,
            subscribers: 2,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn first_emission_needs_two_ticks_and_resubscribe_starts_fresh_baseline() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let mut sub = registry.subscribe_container("web");
    let first = sub.recv().await.unwrap().unwrap();
    assert_eq!(runtime.stats_calls("web"), 2);
    assert_eq!(first.sampled_at, generated(2).read_at);

    drop(sub);
    assert_eq!(registry.status().container_monitors, 0);

    let mut again = registry.subscribe_container("web");
    let next = again.recv().await.unwrap().unwrap();
    // Call 3 is the new baseline, call 4 the first emission.
    assert_eq!(runtime.stats_calls("web"), 4);
    assert_eq!(next.sampled_at, generated(4).read_at);
}

#[tokio::test(start_paused = true)]
async fn cpu_percent_end_to_end() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.script(
        "db",
        vec![Ok(sample(100, 1000, 2)), Ok(sample(150, 1100, 2))],
    );
    let registry = registry_with(&runtime);

    let mut sub = registry.subscribe_container("db");
    let metrics = sub.recv().await.unwrap().unwrap();
    assert_eq!(metrics.cpu_percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn emissions_arrive_in_tick_order() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let sub = registry.subscribe_container("web");
    let stamps: Vec<u64> = sub
        .take(4)
        .map(|m| m.unwrap().sampled_at)
        .collect()
        .await;
    assert_eq!(stamps, vec![2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_notifies_every_subscriber_once_and_removes_monitor() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.script(
        "gone",
        vec![
            Ok(generated(1)),
            Ok(generated(2)),
            Err(GatewayError::NotFound("gone".into())),
        ],
    );
    let registry = registry_with(&runtime);

    let mut a = registry.subscribe_container("gone");
    let mut b = registry.subscribe_container("gone");

    for sub in [&mut a, &mut b] {
        assert!(sub.recv().await.unwrap().is_ok());
    }
    for sub in [&mut a, &mut b] {
        assert_eq!(
            sub.recv().await.unwrap(),
            Err(GatewayError::NotFound("gone".into()))
        );
        assert!(sub.recv().await.is_none());
    }
    assert_eq!(registry.status().container_monitors, 0);
    assert_eq!(runtime.stats_calls("gone"), 3);

    // No retry: the dead monitor does not keep polling.
    tokio::time::sleep(common::SAMPLE_INTERVAL * 5).await;
    assert_eq!(runtime.stats_calls("gone"), 3);
}

#[tokio::test(start_paused = true)]
async fn runtime_unavailable_is_terminal() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.script(
        "web",
        vec![Err(GatewayError::RuntimeUnavailable("socket closed".into()))],
    );
    let registry = registry_with(&runtime);

    let mut sub = registry.subscribe_container("web");
    assert!(matches!(
        sub.recv().await,
        Some(Err(GatewayError::RuntimeUnavailable(_)))
    ));
    assert!(sub.recv().await.is_none());
    assert_eq!(registry.status().container_monitors, 0);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_handle_receives_no_further_emissions() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let mut leaving = registry.subscribe_container("web");
    let mut staying = registry.subscribe_container("web");
    registry.unsubscribe_container("web", leaving.id());

    assert!(staying.recv().await.unwrap().is_ok());
    assert!(leaving.recv().await.is_none());
    assert_eq!(registry.status().subscribers, 1);

    // Second unsubscribe (via drop) of the same handle is a no-op.
    drop(leaving);
    assert_eq!(registry.status().container_monitors, 1);
}

#[tokio::test(start_paused = true)]
async fn containers_get_independent_monitors() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let mut web = registry.subscribe_container("web");
    let mut db = registry.subscribe_container("db");
    assert_eq!(registry.status().container_monitors, 2);

    assert!(web.recv().await.unwrap().is_ok());
    assert!(db.recv().await.unwrap().is_ok());

    drop(web);
    let status = registry.status();
    assert_eq!(status.container_monitors, 1);
    assert_eq!(status.subscribers, 1);
}

#[tokio::test(start_paused = true)]
async fn system_monitor_is_shared_and_torn_down_on_last_unsubscribe() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let mut a = registry.subscribe_system();
    let mut b = registry.subscribe_system();
    assert_eq!(a.target(), &MonitorTarget::System);

    let m = a.recv().await.unwrap().unwrap();
    assert_eq!(m.cpu_percent, 10.0);
    assert_eq!(m.memory_percent, 50.0);
    assert_eq!(m.network_rx_bytes_per_interval, 100);
    assert_eq!(m.network_tx_bytes_per_interval, 10);
    assert!(b.recv().await.unwrap().is_ok());
    assert_eq!(runtime.host_calls(), 2);
    assert!(registry.status().system_monitor_running);

    registry.unsubscribe_system(a.id());
    assert!(registry.status().system_monitor_running);
    drop(b);
    assert!(!registry.status().system_monitor_running);
}

#[tokio::test(start_paused = true)]
async fn lagging_subscriber_skips_emissions_but_still_sees_terminal_error() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.script(
        "web",
        vec![
            Ok(generated(1)),
            Ok(generated(2)),
            Ok(generated(3)),
            Ok(generated(4)),
            Err(GatewayError::NotFound("web".into())),
        ],
    );
    let registry = MonitoringRegistry::new(
        runtime.clone(),
        MonitorConfig {
            sample_interval: common::SAMPLE_INTERVAL,
            subscriber_buffer: 2,
        },
    );

    let mut fast = registry.subscribe_container("web");
    let mut slow = registry.subscribe_container("web");

    for expected in [2, 3, 4] {
        assert_eq!(fast.recv().await.unwrap().unwrap().sampled_at, expected);
    }
    assert!(fast.recv().await.unwrap().is_err());

    // The slow queue held one emission; the rest were skipped, the error still fit.
    assert_eq!(slow.recv().await.unwrap().unwrap().sampled_at, 2);
    assert_eq!(
        slow.recv().await.unwrap(),
        Err(GatewayError::NotFound("web".into()))
    );
    assert!(slow.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_subscribes_for_one_container_create_one_monitor() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = registry_with(&runtime);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.subscribe_container("web") })
        })
        .collect();
    let mut subs = Vec::new();
    for h in handles {
        subs.push(h.await.unwrap());
    }
    assert_eq!(registry.status().container_monitors, 1);
    assert_eq!(registry.status().subscribers, 8);

    for sub in &mut subs {
        assert!(sub.recv().await.unwrap().is_ok());
    }
    assert_eq!(runtime.stats_calls("web"), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_sample_interval_still_polls_and_tears_down() {
    let runtime = Arc::new(MockRuntime::new());
    let registry = MonitoringRegistry::new(
        runtime.clone(),
        MonitorConfig {
            sample_interval: std::time::Duration::ZERO,
            subscriber_buffer: 0,
        },
    );

    let mut sub = registry.subscribe_container("web");
    let first = tokio::time::timeout(common::SAMPLE_INTERVAL, sub.recv())
        .await
        .expect("poll loop must start with a zero interval")
        .unwrap();
    assert!(first.is_ok());

    drop(sub);
    assert_eq!(registry.status().container_monitors, 0);
}
