use anyhow::Result;
use nf_core::{GraphSpec, MetricSample, bytes_key, packets_key};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Chain counters exposed as Prometheus counters.
///
/// Each instance owns a fresh registry, so `update` fills counters from zero.
pub struct ChainMetrics {
    registry: Registry,
    packets: IntCounterVec,
    bytes: IntCounterVec,
}

impl ChainMetrics {
    pub fn new(key_prefix: &str) -> Result<Self> {
        let registry = Registry::new();
        let namespace = sanitize_metric_name(key_prefix);

        let packets = IntCounterVec::new(
            Opts::new(
                format!("{}_chain_packets_total", namespace),
                "Packets matched by the rules of an iptables chain",
            ),
            &["table", "chain"],
        )?;
        registry.register(Box::new(packets.clone()))?;

        let bytes = IntCounterVec::new(
            Opts::new(
                format!("{}_chain_bytes_total", namespace),
                "Bytes matched by the rules of an iptables chain",
            ),
            &["table", "chain"],
        )?;
        registry.register(Box::new(bytes.clone()))?;

        Ok(Self {
            registry,
            packets,
            bytes,
        })
    }

    /// Record every graphed chain present in the sample. Negative values
    /// (wrapped sums) cannot be a counter and are left out.
    pub fn update(&self, table: &str, graphs: &GraphSpec, sample: &MetricSample) {
        for chain in graphs.keys() {
            let labels = [table, chain.as_str()];
            if let Some(value) = sample.get(&packets_key(chain)).and_then(|v| u64::try_from(*v).ok()) {
                self.packets.with_label_values(&labels).inc_by(value);
            }
            if let Some(value) = sample.get(&bytes_key(chain)).and_then(|v| u64::try_from(*v).ok()) {
                self.bytes.with_label_values(&labels).inc_by(value);
            }
        }
    }

    /// Render metrics in Prometheus text format
    pub fn render_metrics(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Replace anything outside `[a-zA-Z0-9_]` with `_`, and prefix a leading digit.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
