use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::models::MetricasResponse;

/// How many recent query durations feed the rolling average.
pub const RECENT_WINDOW: usize = 10;

#[derive(Debug, Default)]
struct Counters {
    total_queries: u64,
    research_queries: u64,
    total_sources: u64,
    recent_durations: VecDeque<f64>,
}

/// Process-wide query counters plus a bounded rolling window of recent
/// latencies. The average is recomputed from the live window on every read.
pub struct Metrics {
    started: Instant,
    inner: Mutex<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Counters::default()),
        }
    }

    /// Records one successfully answered query. Counter increments and
    /// window eviction happen under a single lock so concurrent handlers
    /// cannot interleave partial updates.
    pub fn record(&self, duration_secs: f64, sources: u32) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total_queries += 1;
        inner.research_queries += 1;
        inner.total_sources += u64::from(sources);
        inner.recent_durations.push_back(duration_secs);
        while inner.recent_durations.len() > RECENT_WINDOW {
            inner.recent_durations.pop_front();
        }
    }

    pub fn snapshot(&self) -> MetricasResponse {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let tempo_medio = if inner.recent_durations.is_empty() {
            0.0
        } else {
            inner.recent_durations.iter().sum::<f64>() / inner.recent_durations.len() as f64
        };
        MetricasResponse {
            total_consultas: inner.total_queries,
            consultas_pesquisa: inner.research_queries,
            tempo_medio: (tempo_medio * 100.0).round() / 100.0,
            fontes_totais: inner.total_sources,
            uptime: format_uptime(self.started.elapsed()),
        }
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_uptime(uptime: &str) -> (u64, u64) {
        let (hours, minutes) = uptime.split_once("h ").unwrap();
        (
            hours.parse().unwrap(),
            minutes.trim_end_matches('m').parse().unwrap(),
        )
    }

    #[test]
    fn average_is_zero_with_no_queries() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_consultas, 0);
        assert_eq!(snapshot.tempo_medio, 0.0);
        assert_eq!(snapshot.fontes_totais, 0);
    }

    #[test]
    fn counters_and_sources_accumulate() {
        let metrics = Metrics::new();
        metrics.record(1.0, 3);
        metrics.record(2.0, 2);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_consultas, 2);
        assert_eq!(snapshot.consultas_pesquisa, 2);
        assert_eq!(snapshot.fontes_totais, 5);
    }

    #[test]
    fn window_keeps_only_the_latest_ten() {
        let metrics = Metrics::new();
        for duration in 1..=12 {
            metrics.record(duration as f64, 0);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_consultas, 12);
        // durations 3..=12 remain, mean 7.5
        assert_eq!(snapshot.tempo_medio, 7.5);
    }

    #[test]
    fn average_is_rounded_to_two_decimals() {
        let metrics = Metrics::new();
        metrics.record(1.0, 0);
        metrics.record(2.0, 0);
        metrics.record(2.0, 0);
        assert_eq!(metrics.snapshot().tempo_medio, 167.0 / 100.0);
    }

    #[test]
    fn uptime_formats_hours_and_minutes() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0h 0m");
        assert_eq!(format_uptime(Duration::from_secs(3599)), "0h 59m");
        assert_eq!(format_uptime(Duration::from_secs(8220)), "2h 17m");
        assert_eq!(format_uptime(Duration::from_secs(7322)), "2h 2m");
    }

    #[test]
    fn uptime_never_decreases_across_snapshots() {
        let metrics = Metrics::new();
        let first = parse_uptime(&metrics.snapshot().uptime);
        let second = parse_uptime(&metrics.snapshot().uptime);
        assert!(second >= first);
    }
}
