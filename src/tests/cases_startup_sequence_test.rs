// Startup sequencing over live probes: wave ordering, readiness gating
// and failure cascades.

use std::time::Duration;

use crate::config::{test_service, ResolutionMode};
use crate::coordinator::StartupPhase;

use super::support::{probing_config, DiscoveryStack, HealthMode, StubService};

/// All services healthy: the pass walks the waves and everything lands in
/// Ready.
#[tokio::test]
async fn test_sequence_all_ready() {
    let identity = StubService::start(HealthMode::Healthy).await;
    let content = StubService::start(HealthMode::Degraded).await;
    let workflow = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    cfg.discovery.services.insert(
        "identity".to_string(),
        test_service(ResolutionMode::Direct, &[identity.base_url().as_str()], &[]),
    );
    cfg.discovery.services.insert(
        "content".to_string(),
        test_service(
            ResolutionMode::Direct,
            &[content.base_url().as_str()],
            &["identity"],
        ),
    );
    cfg.discovery.services.insert(
        "workflow".to_string(),
        test_service(
            ResolutionMode::Direct,
            &[workflow.base_url().as_str()],
            &["content"],
        ),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    let report = stack.sequencer.run().await;

    assert_eq!(
        report.waves,
        vec![
            vec!["identity".to_string()],
            vec!["content".to_string()],
            vec!["workflow".to_string()],
        ]
    );
    for name in ["identity", "content", "workflow"] {
        assert_eq!(
            report.phases.get(name),
            Some(&StartupPhase::Ready),
            "{name} should be Ready (Degraded counts as up)"
        );
    }

    stack.stop();
    identity.stop().await;
    content.stop().await;
    workflow.stop().await;
}

/// A dead wave-0 service times out, is marked Failed, and drags every
/// transitive dependent into Failed without crashing the pass.
#[tokio::test]
async fn test_sequence_failure_cascades() {
    let identity = StubService::start(HealthMode::Error).await;
    let content = StubService::start(HealthMode::Healthy).await;
    let aux = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    cfg.discovery.services.insert(
        "identity".to_string(),
        test_service(ResolutionMode::Direct, &[identity.base_url().as_str()], &[]),
    );
    cfg.discovery.services.insert(
        "content".to_string(),
        test_service(
            ResolutionMode::Direct,
            &[content.base_url().as_str()],
            &["identity"],
        ),
    );
    // Independent of the failing chain; must still come up.
    cfg.discovery.services.insert(
        "aux".to_string(),
        test_service(ResolutionMode::Direct, &[aux.base_url().as_str()], &[]),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    let started = std::time::Instant::now();
    let report = stack.sequencer.run().await;
    let elapsed = started.elapsed();

    assert_eq!(report.phases.get("identity"), Some(&StartupPhase::Failed));
    assert_eq!(report.phases.get("content"), Some(&StartupPhase::Failed));
    assert_eq!(report.phases.get("aux"), Some(&StartupPhase::Ready));

    // One wave timeout (1s), not one per blocked service.
    assert!(
        elapsed < Duration::from_secs(3),
        "cascade should not re-wait per dependent: {elapsed:?}"
    );

    stack.stop();
    identity.stop().await;
    content.stop().await;
    aux.stop().await;
}

/// Re-running the sequencer is the retry path: a service that recovered
/// after a failed pass comes up Ready while previous Ready services are
/// left alone.
#[tokio::test]
async fn test_sequence_retry_after_recovery() {
    let identity = StubService::start(HealthMode::Error).await;
    let content = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    cfg.discovery.services.insert(
        "identity".to_string(),
        test_service(ResolutionMode::Direct, &[identity.base_url().as_str()], &[]),
    );
    cfg.discovery.services.insert(
        "content".to_string(),
        test_service(
            ResolutionMode::Direct,
            &[content.base_url().as_str()],
            &["identity"],
        ),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    let first = stack.sequencer.run().await;
    assert_eq!(first.phases.get("identity"), Some(&StartupPhase::Failed));
    assert_eq!(first.phases.get("content"), Some(&StartupPhase::Failed));

    // Operator fixes identity; the retry pass picks both up.
    identity.set_mode(HealthMode::Healthy);
    let second = stack.sequencer.run().await;
    assert_eq!(second.phases.get("identity"), Some(&StartupPhase::Ready));
    assert_eq!(second.phases.get("content"), Some(&StartupPhase::Ready));

    stack.stop();
    identity.stop().await;
    content.stop().await;
}

/// await_ready gates on the dependency chain and resolves as soon as the
/// chain comes up, well before its timeout.
#[tokio::test]
async fn test_await_ready_with_live_probes() {
    let identity = StubService::start(HealthMode::Error).await;
    let content = StubService::start(HealthMode::Healthy).await;

    let mut cfg = probing_config();
    cfg.discovery.services.insert(
        "identity".to_string(),
        test_service(ResolutionMode::Direct, &[identity.base_url().as_str()], &[]),
    );
    cfg.discovery.services.insert(
        "content".to_string(),
        test_service(
            ResolutionMode::Direct,
            &[content.base_url().as_str()],
            &["identity"],
        ),
    );

    let stack = DiscoveryStack::build(&cfg);
    stack.start_probing();

    // Flip identity healthy shortly after the wait begins.
    let flip = {
        let identity_url = identity.base_url();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            identity_url
        })
    };
    let waiter = {
        let coordinator = stack.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .await_ready("content", Duration::from_secs(5))
                .await
        })
    };

    let _ = flip.await;
    identity.set_mode(HealthMode::Healthy);

    let started = std::time::Instant::now();
    waiter.await.unwrap().expect("chain should become ready");
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "await_ready should resolve promptly once the chain is up"
    );

    stack.stop();
    identity.stop().await;
    content.stop().await;
}
