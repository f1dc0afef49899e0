use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    empty_queries_total: AtomicU64,
    sub_queries_total: AtomicU64,
    ood_decisions_total: AtomicU64,
    no_intent_decisions_total: AtomicU64,
    model_failures_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub empty_queries_total: u64,
    pub sub_queries_total: u64,
    pub ood_decisions_total: u64,
    pub no_intent_decisions_total: u64,
    pub model_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        counter!("commute_requests_total").increment(1);
    }

    pub fn inc_empty_query(&self) {
        self.empty_queries_total.fetch_add(1, Ordering::Relaxed);
        counter!("commute_empty_queries_total").increment(1);
    }

    pub fn add_sub_queries(&self, count: usize) {
        self.sub_queries_total
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("commute_sub_queries_total").increment(count as u64);
    }

    pub fn inc_ood_decision(&self) {
        self.ood_decisions_total.fetch_add(1, Ordering::Relaxed);
        counter!("commute_ood_decisions_total").increment(1);
    }

    pub fn inc_no_intent_decision(&self) {
        self.no_intent_decisions_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("commute_no_intent_decisions_total").increment(1);
    }

    pub fn inc_model_failure(&self) {
        self.model_failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("commute_model_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        histogram!("commute_understand_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            empty_queries_total: self.empty_queries_total.load(Ordering::Relaxed),
            sub_queries_total: self.sub_queries_total.load(Ordering::Relaxed),
            ood_decisions_total: self.ood_decisions_total.load(Ordering::Relaxed),
            no_intent_decisions_total: self.no_intent_decisions_total.load(Ordering::Relaxed),
            model_failures_total: self.model_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64 / 1000.0
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,commute_pipeline=info,commute_ml=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
