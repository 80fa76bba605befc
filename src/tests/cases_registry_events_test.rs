// Dynamic registration: new endpoints are probed immediately instead of
// waiting for the next scheduled cycle.

use std::time::Duration;

use crate::config::{test_service, ResolutionMode};
use crate::registry::HealthState;

use super::support::{probing_config, wait_until, DiscoveryStack, HealthMode, StubService};

/// An endpoint registered at runtime gets its first probe straight away
/// and joins address() rotation once healthy.
#[tokio::test]
async fn test_registered_endpoint_probed_immediately() {
    let first = StubService::start(HealthMode::Healthy).await;
    let second = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    // Stretch the interval: quick discovery of the new endpoint then
    // proves it was the registration event, not a scheduled tick.
    cfg.discovery.probe = Some(crate::config::Probe {
        interval: Some(Duration::from_secs(5)),
        timeout: Some(Duration::from_millis(100)),
        failure_threshold: Some(3),
    });
    cfg.discovery.services.insert(
        "identity".to_string(),
        test_service(ResolutionMode::Direct, &[first.base_url().as_str()], &[]),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    // The configured endpoint is probed within its jitter window; don't
    // wait for it, just register the newcomer.
    tokio::time::sleep(Duration::from_millis(50)).await;
    stack
        .registry
        .register("identity", &second.base_url())
        .unwrap();

    let registry = stack.registry.clone();
    let second_url = second.base_url();
    assert!(
        wait_until(Duration::from_secs(1), || {
            let registry = registry.clone();
            let second_url = second_url.clone();
            async move {
                registry
                    .resolve("identity")
                    .unwrap()
                    .iter()
                    .any(|r| r.address() == second_url && r.health() == HealthState::Healthy)
            }
        })
        .await,
        "registered endpoint was not probed ahead of the 5s cycle"
    );
    assert!(second.hits() >= 1);

    stack.stop();
    first.stop().await;
    second.stop().await;
}

/// Repeated identical registration neither duplicates endpoints nor
/// spawns a second probe loop.
#[tokio::test]
async fn test_duplicate_registration_single_loop() {
    let stub = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    cfg.discovery.probe = Some(crate::config::Probe {
        interval: Some(Duration::from_millis(200)),
        timeout: Some(Duration::from_millis(50)),
        failure_threshold: Some(3),
    });
    cfg.discovery.services.insert(
        "content".to_string(),
        test_service(ResolutionMode::Direct, &[], &[]),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    for _ in 0..5 {
        stack.registry.register("content", &stub.base_url()).unwrap();
    }
    assert_eq!(stack.registry.resolve("content").unwrap().len(), 1);

    // With a single loop at 200ms the stub sees roughly 1 immediate probe
    // plus ~5 scheduled ones over a second; five loops would show ~5x.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let hits = stub.hits();
    assert!(
        (1..=9).contains(&hits),
        "expected a single probe loop, saw {hits} probes"
    );

    stack.stop();
    stub.stop().await;
}
