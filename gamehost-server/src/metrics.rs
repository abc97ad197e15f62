//! Prometheus metrics owned by the server

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Request outcome label values
pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

/// Counters and gauges for rooms and requests, in a registry of their own
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    rooms_created: IntCounterVec,
    rooms_active: IntGaugeVec,
    requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rooms_created = IntCounterVec::new(
            Opts::new("gamehost_rooms_created_total", "Rooms created, per game type"),
            &["game_type"],
        )?;
        let rooms_active = IntGaugeVec::new(
            Opts::new("gamehost_rooms_active", "Rooms currently open, per game type"),
            &["game_type"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("gamehost_requests_total", "Dispatched requests by operation and outcome"),
            &["op", "outcome"],
        )?;

        registry.register(Box::new(rooms_created.clone()))?;
        registry.register(Box::new(rooms_active.clone()))?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self {
            registry,
            rooms_created,
            rooms_active,
            requests,
        })
    }

    pub fn room_created(&self, game_type: &str) {
        self.rooms_created.with_label_values(&[game_type]).inc();
        self.rooms_active.with_label_values(&[game_type]).inc();
    }

    pub fn room_closed(&self, game_type: &str) {
        self.rooms_active.with_label_values(&[game_type]).dec();
    }

    pub fn request(&self, op: &str, outcome: &str) {
        self.requests.with_label_values(&[op, outcome]).inc();
    }

    /// Text exposition of every metric in the registry
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counts() {
        let metrics = Metrics::new().unwrap();
        metrics.room_created("tic-tac-toe");
        metrics.room_created("tic-tac-toe");
        metrics.room_closed("tic-tac-toe");
        metrics.request("update", OUTCOME_CLIENT_ERROR);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"gamehost_rooms_created_total{game_type="tic-tac-toe"} 2"#));
        assert!(text.contains(r#"gamehost_rooms_active{game_type="tic-tac-toe"} 1"#));
        assert!(text.contains(r#"gamehost_requests_total{op="update",outcome="client_error"} 1"#));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.request("init", OUTCOME_OK);

        assert!(!b.render().unwrap().contains("gamehost_requests_total{"));
    }
}
