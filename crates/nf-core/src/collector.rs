use crate::error::QueryFailure;
use crate::model::{Graph, GraphSpec, MetricSample, Snapshot, bytes_key, capitalize, packets_key};
use crate::query::ChainQuery;
use tracing::debug;

/// Sums per-chain packet and byte counters of one table.
pub struct Collector<Q> {
    query: Q,
}

impl<Q: ChainQuery> Collector<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Packets and bytes per chain of `table`, keyed `<chain>_pkts` and
    /// `<chain>_bytes`.
    pub fn fetch_metrics(&self, table: &str) -> Result<MetricSample, QueryFailure> {
        let chains = self.query.list_chains(table)?;
        self.sample_chains(table, &chains)
    }

    /// One graph per chain of `table`, labelled with the capitalized prefix.
    pub fn graph_definition(
        &self,
        table: &str,
        label_prefix: &str,
    ) -> Result<GraphSpec, QueryFailure> {
        let chains = self.query.list_chains(table)?;
        Ok(graphs_for(label_prefix, &chains))
    }

    /// Values and graphs from a single chain listing, so both cover the
    /// same chains even if the ruleset changes mid-run.
    pub fn snapshot(&self, table: &str, label_prefix: &str) -> Result<Snapshot, QueryFailure> {
        let chains = self.query.list_chains(table)?;
        let metrics = self.sample_chains(table, &chains)?;

        Ok(Snapshot {
            table: table.to_string(),
            metrics,
            graphs: graphs_for(label_prefix, &chains),
        })
    }

    /// Chain names of `table`.
    pub fn chains(&self, table: &str) -> Result<Vec<String>, QueryFailure> {
        self.query.list_chains(table)
    }

    fn sample_chains(&self, table: &str, chains: &[String]) -> Result<MetricSample, QueryFailure> {
        let mut sample = MetricSample::new();

        for chain in chains {
            let rows = self.query.stats(table, chain)?;
            let (pkts, bytes) = sum_rows(chain, &rows)?;
            debug!(table, chain = chain.as_str(), pkts, bytes, "summed chain counters");

            sample.insert(packets_key(chain), pkts);
            sample.insert(bytes_key(chain), bytes);
        }

        Ok(sample)
    }
}

fn graphs_for(label_prefix: &str, chains: &[String]) -> GraphSpec {
    let label_prefix = capitalize(label_prefix);
    chains
        .iter()
        .map(|chain| (chain.clone(), Graph::for_chain(&label_prefix, chain)))
        .collect()
}

/// Sum the packet and byte fields over all rows. Wraps on overflow like the
/// kernel's own 64-bit counters.
fn sum_rows(chain: &str, rows: &[Vec<String>]) -> Result<(i64, i64), QueryFailure> {
    let mut pkts: i64 = 0;
    let mut bytes: i64 = 0;

    for row in rows {
        let [p, b, ..] = row.as_slice() else {
            return Err(QueryFailure::MalformedRow {
                chain: chain.to_string(),
                fields: row.len(),
            });
        };

        let p: i64 = p
            .parse()
            .map_err(|e| QueryFailure::parse(chain, "packet", p, e))?;
        let b: i64 = b
            .parse()
            .map_err(|e| QueryFailure::parse(chain, "byte", b, e))?;

        pkts = pkts.wrapping_add(p);
        bytes = bytes.wrapping_add(b);
    }

    Ok((pkts, bytes))
}
