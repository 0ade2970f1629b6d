// Parsers for iptables text output
use regex::Regex;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v(\d+)\.(\d+)\.(\d+)").expect("valid version regex"));

/// `(major, minor, patch)` from an `iptables --version` banner such as
/// `iptables v1.8.7 (nf_tables)`.
pub fn parse_version(output: &str) -> Option<(u32, u32, u32)> {
    let caps = VERSION_RE.captures(output)?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// Chain names from `iptables -S` output.
///
/// The listing starts with one `-P <chain> <policy>` line per built-in chain
/// and one `-N <chain>` line per user chain, followed by the `-A` rules.
/// Scanning stops at the first line of any other kind.
pub fn parse_chain_list(output: &str) -> Vec<String> {
    let mut chains = vec![];

    for line in output.lines() {
        if !(line.starts_with("-P ") || line.starts_with("-N ")) {
            break;
        }
        if let Some(name) = line.split_whitespace().nth(1) {
            chains.push(name.to_string());
        }
    }

    chains
}

/// Counter rows from `iptables -L <chain> -n -v -x` output.
///
/// Skips the chain banner and the column header. Each remaining line is
/// split on whitespace; `pkts` and `bytes` are the first two columns.
pub fn parse_stats(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .skip(2)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}
