use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub packages_created_total: IntCounter,
    pub packages_cancelled_total: IntCounter,
    pub route_advances_total: IntCounterVec,
    pub notifications_unread: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let packages_created_total =
            IntCounter::new("packages_created_total", "Total packages created")
                .expect("valid packages_created_total metric");

        let packages_cancelled_total =
            IntCounter::new("packages_cancelled_total", "Total packages cancelled")
                .expect("valid packages_cancelled_total metric");

        let route_advances_total = IntCounterVec::new(
            Opts::new("route_advances_total", "Route pointer advances by outcome"),
            &["outcome"],
        )
        .expect("valid route_advances_total metric");

        let notifications_unread = IntGauge::new(
            "notifications_unread",
            "Unread count from the most recent counter refresh",
        )
        .expect("valid notifications_unread metric");

        registry
            .register(Box::new(packages_created_total.clone()))
            .expect("register packages_created_total");
        registry
            .register(Box::new(packages_cancelled_total.clone()))
            .expect("register packages_cancelled_total");
        registry
            .register(Box::new(route_advances_total.clone()))
            .expect("register route_advances_total");
        registry
            .register(Box::new(notifications_unread.clone()))
            .expect("register notifications_unread");

        Self {
            registry,
            packages_created_total,
            packages_cancelled_total,
            route_advances_total,
            notifications_unread,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
