// Monitoring agent plugin protocol: tab separated values and graph metadata
use anyhow::Result;
use nf_core::{GraphSpec, MetricSample};
use serde::Serialize;
use std::collections::BTreeMap;

pub const META_HEADER: &str = "# mackerel-agent-plugin";
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

#[derive(Serialize)]
struct Meta<'a> {
    graphs: BTreeMap<String, MetaGraph<'a>>,
}

#[derive(Serialize)]
struct MetaGraph<'a> {
    label: &'a str,
    unit: &'a str,
    metrics: Vec<MetaMetric<'a>>,
}

#[derive(Serialize)]
struct MetaMetric<'a> {
    name: &'a str,
    label: &'a str,
    stacked: bool,
    diff: bool,
}

/// Whether the agent asked for graph metadata instead of values.
pub fn meta_requested(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != "0")
}

fn graph_key(key_prefix: &str, chain: &str) -> String {
    format!("{}.{}", key_prefix, chain)
}

/// One `<prefix>.<chain>.<metric>\t<value>\t<epoch>` line per graphed metric.
/// Metrics missing from the sample are skipped.
pub fn render_values(
    key_prefix: &str,
    graphs: &GraphSpec,
    sample: &MetricSample,
    epoch: u64,
) -> String {
    let mut out = String::new();

    for (chain, graph) in graphs {
        for metric in &graph.metrics {
            if let Some(value) = sample.get(&metric.name) {
                out.push_str(&format!(
                    "{}.{}\t{}\t{}\n",
                    graph_key(key_prefix, chain),
                    metric.name,
                    value,
                    epoch
                ));
            }
        }
    }

    out
}

/// Metadata header followed by the graph definitions as JSON.
pub fn render_meta(key_prefix: &str, graphs: &GraphSpec) -> Result<String> {
    let meta = Meta {
        graphs: graphs
            .iter()
            .map(|(chain, graph)| {
                let metrics = graph
                    .metrics
                    .iter()
                    .map(|m| MetaMetric {
                        name: &m.name,
                        label: &m.label,
                        stacked: m.stacked,
                        diff: m.diff,
                    })
                    .collect();
                (
                    graph_key(key_prefix, chain),
                    MetaGraph {
                        label: &graph.label,
                        unit: &graph.unit,
                        metrics,
                    },
                )
            })
            .collect(),
    };

    Ok(format!("{}\n{}\n", META_HEADER, serde_json::to_string(&meta)?))
}
