use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric key (`<chain>_pkts` / `<chain>_bytes`) to counter value.
pub type MetricSample = BTreeMap<String, i64>;

/// Graph descriptors keyed by chain name.
pub type GraphSpec = BTreeMap<String, Graph>;

pub const UNIT_INTEGER: &str = "integer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
    pub diff: bool,
    pub stacked: bool,
}

/// Values and graph metadata built from the same chain list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub table: String,
    pub metrics: MetricSample,
    pub graphs: GraphSpec,
}

pub fn packets_key(chain: &str) -> String {
    format!("{}_pkts", chain)
}

pub fn bytes_key(chain: &str) -> String {
    format!("{}_bytes", chain)
}

impl Graph {
    /// Packets and bytes graph for one chain.
    pub fn for_chain(label_prefix: &str, chain: &str) -> Self {
        Self {
            label: format!("{} {} Stats", label_prefix, chain),
            unit: UNIT_INTEGER.to_string(),
            metrics: vec![
                GraphMetric::counter(packets_key(chain), "Packets"),
                GraphMetric::counter(bytes_key(chain), "Bytes"),
            ],
        }
    }
}

impl GraphMetric {
    fn counter(name: String, label: &str) -> Self {
        Self {
            name,
            label: label.to_string(),
            diff: true,
            stacked: false,
        }
    }
}

/// Upper-case the first character, leave the rest alone.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
