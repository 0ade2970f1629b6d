use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use nf_core::{ChainQuery, Collector, Config, Protocol};
use nf_ipt::IptablesClient;
use nf_metrics::{ChainMetrics, META_ENV, meta_requested, render_json, render_meta, render_values};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/nfstat/config.yaml";

#[derive(Parser)]
#[command(name = "nfstat")]
#[command(version, about = "iptables chain counters for monitoring agents", long_about = None)]
struct Cli {
    /// YAML config file (defaults to /etc/nfstat/config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Table to read chains from
    #[arg(short, long, global = true)]
    table: Option<String>,

    /// Metric key prefix, also used for graph labels
    #[arg(long, global = true)]
    metric_key_prefix: Option<String>,

    /// Read ip6tables instead of iptables
    #[arg(long, global = true)]
    ipv6: bool,

    /// Explicit path to the iptables binary
    #[arg(long, global = true)]
    iptables_path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Plugin)]
    format: Format,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Print graph definitions when the agent asks for metadata, values otherwise
    Run,
    /// Print chain counters
    Fetch,
    /// Print graph definitions
    Graphs,
    /// List chains of the table
    Chains,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Agent plugin lines: key, value, timestamp
    Plugin,
    /// JSON document
    Json,
    /// Prometheus text exposition
    Prometheus,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli, Path::new(DEFAULT_CONFIG_PATH))?;

    let client = IptablesClient::from_config(&config)
        .context("Failed to initialise iptables client")?;
    let collector = Collector::new(client);

    info!(table = config.table.as_str(), format = ?cli.format, "collecting");

    let meta = std::env::var(META_ENV).ok();
    let output = dispatch(
        cli.command.unwrap_or(Commands::Run),
        meta.as_deref(),
        &collector,
        &config,
        cli.format,
    )?;

    print!("{}", output);
    Ok(())
}

/// Render the whole output of `command`; nothing is printed on failure.
fn dispatch<Q: ChainQuery>(
    command: Commands,
    meta: Option<&str>,
    collector: &Collector<Q>,
    config: &Config,
    format: Format,
) -> anyhow::Result<String> {
    match command {
        Commands::Run if meta_requested(meta) => handle_graphs(collector, config, format),
        Commands::Run | Commands::Fetch => handle_fetch(collector, config, format),
        Commands::Graphs => handle_graphs(collector, config, format),
        Commands::Chains => handle_chains(collector, config, format),
    }
}

/// File config (explicit path, or `default_path` if it exists), then flags on top.
fn load_config(cli: &Cli, default_path: &Path) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None if default_path.exists() => Config::from_file(default_path)?,
        None => Config::default(),
    };

    if let Some(table) = &cli.table {
        config.table = table.clone();
    }
    if let Some(prefix) = &cli.metric_key_prefix {
        config.metric_key_prefix = prefix.clone();
    }
    if cli.ipv6 {
        config.protocol = Protocol::Ipv6;
    }
    if let Some(path) = &cli.iptables_path {
        config.iptables_path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

fn handle_fetch<Q: ChainQuery>(
    collector: &Collector<Q>,
    config: &Config,
    format: Format,
) -> anyhow::Result<String> {
    let snapshot = collector.snapshot(&config.table, &config.metric_key_prefix)?;

    match format {
        Format::Plugin => {
            let epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            Ok(render_values(
                &config.metric_key_prefix,
                &snapshot.graphs,
                &snapshot.metrics,
                epoch,
            ))
        }
        Format::Json => render_json(&snapshot),
        Format::Prometheus => {
            let metrics = ChainMetrics::new(&config.metric_key_prefix)?;
            metrics.update(&snapshot.table, &snapshot.graphs, &snapshot.metrics);
            metrics.render_metrics()
        }
    }
}

fn handle_graphs<Q: ChainQuery>(
    collector: &Collector<Q>,
    config: &Config,
    format: Format,
) -> anyhow::Result<String> {
    let graphs = collector.graph_definition(&config.table, &config.metric_key_prefix)?;

    match format {
        Format::Plugin => render_meta(&config.metric_key_prefix, &graphs),
        Format::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&graphs)?)),
        Format::Prometheus => {
            anyhow::bail!("graph definitions have no prometheus rendering, use --format plugin or json")
        }
    }
}

fn handle_chains<Q: ChainQuery>(
    collector: &Collector<Q>,
    config: &Config,
    format: Format,
) -> anyhow::Result<String> {
    let chains = collector.chains(&config.table)?;

    match format {
        Format::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&chains)?)),
        Format::Plugin | Format::Prometheus => Ok(chains
            .iter()
            .map(|chain| format!("{}\n", chain))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nf_core::QueryFailure;

    const NO_DEFAULT: &str = "/nonexistent/nfstat/config.yaml";

    /// Two chains in `filter`; `bad_chain` reports a non-numeric counter.
    struct StaticFilter {
        bad_chain: Option<&'static str>,
    }

    impl ChainQuery for StaticFilter {
        fn list_chains(&self, _table: &str) -> Result<Vec<String>, QueryFailure> {
            Ok(vec!["INPUT".to_string(), "OUTPUT".to_string()])
        }

        fn stats(&self, _table: &str, chain: &str) -> Result<Vec<Vec<String>>, QueryFailure> {
            let pkts = if self.bad_chain == Some(chain) { "abc" } else { "10" };
            Ok(vec![vec![pkts.to_string(), "1000".to_string()]])
        }
    }

    fn collector(bad_chain: Option<&'static str>) -> Collector<StaticFilter> {
        Collector::new(StaticFilter { bad_chain })
    }

    #[test]
    fn test_run_with_meta_prints_graphs() {
        let out = dispatch(
            Commands::Run,
            Some("1"),
            &collector(None),
            &Config::default(),
            Format::Plugin,
        )
        .unwrap();

        assert!(out.starts_with("# mackerel-agent-plugin\n"));
        assert!(out.contains("\"nfiptables.INPUT\""));
        assert!(out.contains("Nfiptables OUTPUT Stats"));
    }

    #[test]
    fn test_run_without_meta_prints_values() {
        for meta in [None, Some("0"), Some("")] {
            let out = dispatch(
                Commands::Run,
                meta,
                &collector(None),
                &Config::default(),
                Format::Plugin,
            )
            .unwrap();

            let keys: Vec<&str> = out
                .lines()
                .map(|line| line.split('\t').next().unwrap())
                .collect();
            assert_eq!(
                keys,
                vec![
                    "nfiptables.INPUT.INPUT_pkts",
                    "nfiptables.INPUT.INPUT_bytes",
                    "nfiptables.OUTPUT.OUTPUT_pkts",
                    "nfiptables.OUTPUT.OUTPUT_bytes",
                ]
            );
            assert!(out.lines().all(|line| line.split('\t').count() == 3));
        }
    }

    #[test]
    fn test_fetch_ignores_meta() {
        let out = dispatch(
            Commands::Fetch,
            Some("1"),
            &collector(None),
            &Config::default(),
            Format::Plugin,
        )
        .unwrap();
        assert!(out.starts_with("nfiptables.INPUT.INPUT_pkts\t10\t"));
    }

    #[test]
    fn test_query_failure_yields_no_output() {
        for command in [Commands::Run, Commands::Fetch] {
            for format in [Format::Plugin, Format::Json, Format::Prometheus] {
                let err = dispatch(
                    command.clone(),
                    None,
                    &collector(Some("OUTPUT")),
                    &Config::default(),
                    format,
                )
                .unwrap_err();
                let failure = err.downcast_ref::<QueryFailure>();
                assert!(matches!(failure, Some(QueryFailure::Parse { .. })));
            }
        }
    }

    #[test]
    fn test_chains_lists_names() {
        let out = dispatch(
            Commands::Chains,
            None,
            &collector(None),
            &Config::default(),
            Format::Plugin,
        )
        .unwrap();
        assert_eq!(out, "INPUT\nOUTPUT\n");
    }

    #[test]
    fn test_graphs_have_no_prometheus_form() {
        let result = dispatch(
            Commands::Graphs,
            None,
            &collector(None),
            &Config::default(),
            Format::Prometheus,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["nfstat"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, Format::Plugin);

        let config = load_config(&cli, Path::new(NO_DEFAULT)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "nfstat",
            "--table",
            "nat",
            "--metric-key-prefix",
            "natstat",
            "--ipv6",
            "fetch",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Fetch)));
        assert_eq!(cli.format, Format::Json);

        let config = load_config(&cli, Path::new(NO_DEFAULT)).unwrap();
        assert_eq!(config.table, "nat");
        assert_eq!(config.metric_key_prefix, "natstat");
        assert_eq!(config.protocol, Protocol::Ipv6);
        assert_eq!(config.binary(), PathBuf::from("ip6tables"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("nfstat-test-{}.yaml", std::process::id()));
        std::fs::write(&path, "table: mangle\nmetric_key_prefix: fw\n").unwrap();

        let cli = Cli::try_parse_from([
            "nfstat",
            "--config",
            path.to_str().unwrap(),
            "--metric-key-prefix",
            "edge",
        ])
        .unwrap();
        let config = load_config(&cli, Path::new(NO_DEFAULT));
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.table, "mangle");
        assert_eq!(config.metric_key_prefix, "edge");
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let cli = Cli::try_parse_from(["nfstat", "--config", NO_DEFAULT]).unwrap();
        assert!(load_config(&cli, Path::new(NO_DEFAULT)).is_err());
    }

    #[test]
    fn test_empty_table_flag_rejected() {
        let cli = Cli::try_parse_from(["nfstat", "--table", ""]).unwrap();
        assert!(load_config(&cli, Path::new(NO_DEFAULT)).is_err());
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["nfstat", "--format", "xml"]).is_err());
    }
}
