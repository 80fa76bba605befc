#[cfg(test)]
mod tests {
    use crate::config::{new_test_config, test_service, ResolutionMode};
    use crate::registry::{
        HealthState, ProbeOutcome, RegistryError, RegistryEvent, ServiceRegistry,
    };

    fn two_service_registry() -> ServiceRegistry {
        let mut cfg = new_test_config();
        cfg.discovery.services.insert(
            "identity".to_string(),
            test_service(ResolutionMode::Direct, &["http://10.0.0.1:8001"], &[]),
        );
        cfg.discovery.services.insert(
            "content".to_string(),
            test_service(
                ResolutionMode::Gateway,
                &["http://10.0.0.2:8002"],
                &["identity"],
            ),
        );
        ServiceRegistry::from_config(&cfg)
    }

    /// resolve returns configured endpoints; unknown names fail.
    #[test]
    fn test_resolve_known_and_unknown() {
        let registry = two_service_registry();

        let endpoints = registry.resolve("identity").unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].address(), "http://10.0.0.1:8001");

        let err = registry.resolve("ghost").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownService(_)));
    }

    /// resolve_mode reflects the per-service configuration so one registry
    /// can serve direct and gateway-routed resolution at once.
    #[test]
    fn test_resolve_mode() {
        let registry = two_service_registry();
        assert_eq!(
            registry.resolve_mode("identity").unwrap(),
            ResolutionMode::Direct
        );
        assert_eq!(
            registry.resolve_mode("content").unwrap(),
            ResolutionMode::Gateway
        );
    }

    /// register grows the endpoint list, is idempotent per address, and
    /// rejects names that were never configured.
    #[test]
    fn test_register_idempotent() {
        let registry = two_service_registry();

        let first = registry
            .register("identity", "http://10.0.0.9:8001")
            .unwrap();
        let second = registry
            .register("identity", "http://10.0.0.9:8001")
            .unwrap();

        // Same record instance: repeated identical registration is a no-op.
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(registry.resolve("identity").unwrap().len(), 2);

        assert!(matches!(
            registry.register("ghost", "http://10.0.0.9:1"),
            Err(RegistryError::UnknownService(_))
        ));
        assert!(matches!(
            registry.register("identity", "not a url"),
            Err(RegistryError::InvalidAddress { .. })
        ));
    }

    /// Registration is observable so the scheduler can probe new endpoints
    /// immediately.
    #[tokio::test]
    async fn test_register_emits_event() {
        let registry = two_service_registry();
        let mut events = registry.subscribe_events();

        registry
            .register("content", "http://10.0.0.3:8002")
            .unwrap();

        let event = events.recv().await.unwrap();
        let RegistryEvent::EndpointAdded { service, record } = event;
        assert_eq!(service, "content");
        assert_eq!(record.address(), "http://10.0.0.3:8002");

        // Idempotent re-registration emits nothing.
        registry
            .register("content", "http://10.0.0.3:8002")
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    /// Existing endpoint state survives a snapshot swap: records are shared,
    /// not rebuilt.
    #[test]
    fn test_snapshot_swap_preserves_records() {
        let registry = two_service_registry();

        let record = registry.resolve("identity").unwrap()[0].clone();
        let seq = record.begin_probe();
        record.apply(seq, ProbeOutcome::Healthy, 3);

        registry
            .register("identity", "http://10.0.0.9:8001")
            .unwrap();

        let endpoints = registry.resolve("identity").unwrap();
        let old = endpoints
            .iter()
            .find(|r| r.address() == "http://10.0.0.1:8001")
            .unwrap();
        assert_eq!(old.health(), HealthState::Healthy);
    }

    /// Aggregate service health is the best endpoint state; Unknown when
    /// nothing has been probed, Unknown outranking Unhealthy.
    #[test]
    fn test_aggregate_health() {
        let registry = two_service_registry();
        registry
            .register("identity", "http://10.0.0.9:8001")
            .unwrap();

        assert_eq!(
            registry.service_health("identity").unwrap(),
            HealthState::Unknown
        );

        let endpoints = registry.resolve("identity").unwrap();
        let seq = endpoints[0].begin_probe();
        endpoints[0].apply(seq, ProbeOutcome::Degraded, 3);
        assert_eq!(
            registry.service_health("identity").unwrap(),
            HealthState::Degraded
        );

        let seq = endpoints[1].begin_probe();
        endpoints[1].apply(seq, ProbeOutcome::Healthy, 3);
        assert_eq!(
            registry.service_health("identity").unwrap(),
            HealthState::Healthy
        );
    }

    /// services() is name-ordered for stable API output.
    #[test]
    fn test_services_sorted() {
        let registry = two_service_registry();
        let names: Vec<_> = registry
            .services()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["content".to_string(), "identity".to_string()]);
    }
}
