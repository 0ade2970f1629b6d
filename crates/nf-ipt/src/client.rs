use crate::parse::{parse_chain_list, parse_stats, parse_version};
use nf_core::{ChainQuery, Config, QueryFailure};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// First release accepting `--wait` for the xtables lock.
const WAIT_MIN_VERSION: (u32, u32, u32) = (1, 4, 20);

/// Runs the iptables (or ip6tables) binary to read chains and counters.
#[derive(Debug, Clone)]
pub struct IptablesClient {
    binary: PathBuf,
    wait: bool,
}

impl IptablesClient {
    /// Check that `binary` can be executed and build a client for it.
    ///
    /// `--wait` is only passed to releases that understand it; an
    /// unrecognised version banner is treated as a current release.
    pub fn new(binary: impl Into<PathBuf>) -> Result<Self, QueryFailure> {
        let mut client = Self {
            binary: binary.into(),
            wait: false,
        };
        let version = client.run(&["--version"])?;
        client.wait = parse_version(&version).is_none_or(|v| v >= WAIT_MIN_VERSION);
        debug!(
            binary = %client.binary.display(),
            version = version.trim(),
            wait = client.wait,
            "iptables available"
        );
        Ok(client)
    }

    pub fn from_config(config: &Config) -> Result<Self, QueryFailure> {
        Self::new(config.binary())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn uses_wait(&self) -> bool {
        self.wait
    }

    fn table_args<'a>(&self, table: &'a str) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(8);
        if self.wait {
            args.push("--wait");
        }
        args.extend(["-t", table]);
        args
    }

    fn run(&self, args: &[&str]) -> Result<String, QueryFailure> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!(command = command.as_str(), "running");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| QueryFailure::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QueryFailure::Command {
                command,
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ChainQuery for IptablesClient {
    fn list_chains(&self, table: &str) -> Result<Vec<String>, QueryFailure> {
        let mut args = self.table_args(table);
        args.push("-S");
        let output = self.run(&args)?;
        Ok(parse_chain_list(&output))
    }

    fn stats(&self, table: &str, chain: &str) -> Result<Vec<Vec<String>>, QueryFailure> {
        let mut args = self.table_args(table);
        args.extend(["-L", chain, "-n", "-v", "-x"]);
        let output = self.run(&args)?;
        Ok(parse_stats(&output))
    }
}
