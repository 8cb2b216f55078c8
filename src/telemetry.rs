use std::collections::BTreeMap;

/// Counters, gauges and latency histograms published under one name prefix.
#[derive(Debug)]
pub struct MetricsRegistry {
    prefix: String,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    latencies: BTreeMap<String, LatencyHistogram>,
}

impl MetricsRegistry {
    /// `prefix` is joined to every metric name with a single `.`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('.') {
            prefix.push('.');
        }
        Self {
            prefix,
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            latencies: BTreeMap::new(),
        }
    }

    pub fn increment(&mut self, name: &str) -> u64 {
        let key = self.key(name);
        let counter = self.counters.entry(key).or_default();
        *counter = counter.saturating_add(1);
        *counter
    }

    pub fn set_gauge(&mut self, name: &str, value: u64) {
        let key = self.key(name);
        self.gauges.insert(key, value);
    }

    /// Histogram for `name`, created with doubling millisecond buckets up to
    /// `ceiling_ms` on first use.
    pub fn latency(&mut self, name: &str, ceiling_ms: u64) -> &mut LatencyHistogram {
        let key = self.key(name);
        self.latencies
            .entry(key)
            .or_insert_with(|| LatencyHistogram::new(ceiling_ms))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
            latencies: self
                .latencies
                .iter()
                .map(|(name, histogram)| (name.clone(), histogram.samples))
                .collect(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// Millisecond histogram; bounds double from 1 and the last bucket also
/// takes every sample above the ceiling.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
    samples: u64,
}

impl LatencyHistogram {
    fn new(ceiling_ms: u64) -> Self {
        let ceiling_ms = ceiling_ms.max(1);
        let bounds_ms: Vec<u64> = std::iter::successors(Some(1u64), |bound| bound.checked_mul(2))
            .take_while(|bound| *bound < ceiling_ms)
            .chain(std::iter::once(ceiling_ms))
            .collect();
        let counts = vec![0; bounds_ms.len()];
        Self {
            bounds_ms,
            counts,
            samples: 0,
        }
    }

    pub fn record(&mut self, millis: u64) {
        let last = self.counts.len() - 1;
        let bucket = self.bounds_ms.partition_point(|bound| *bound < millis).min(last);
        self.counts[bucket] = self.counts[bucket].saturating_add(1);
        self.samples = self.samples.saturating_add(1);
    }

    /// Samples in the bucket whose upper bound is `bound_ms`.
    pub fn count_at(&self, bound_ms: u64) -> Option<u64> {
        let index = self.bounds_ms.binary_search(&bound_ms).ok()?;
        Some(self.counts[index])
    }
}

/// Point-in-time copy of a registry, keyed by fully prefixed names.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    latencies: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }

    pub fn latency_samples(&self, name: &str) -> u64 {
        self.latencies.get(name).copied().unwrap_or(0)
    }
}
