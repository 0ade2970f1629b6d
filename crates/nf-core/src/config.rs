use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TABLE: &str = "filter";
pub const DEFAULT_METRIC_KEY_PREFIX: &str = "nfiptables";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ipv4,
    Ipv6,
}

impl Protocol {
    /// Binary looked up on `PATH` when no explicit path is configured.
    pub fn binary(&self) -> &'static str {
        match self {
            Protocol::Ipv4 => "iptables",
            Protocol::Ipv6 => "ip6tables",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub table: String,
    pub metric_key_prefix: String,
    pub protocol: Protocol,
    pub iptables_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            metric_key_prefix: DEFAULT_METRIC_KEY_PREFIX.to_string(),
            protocol: Protocol::default(),
            iptables_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config from {:?}", path))?;
        Self::from_yaml(&content).context(format!("Failed to parse config {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            anyhow::bail!("table must not be empty");
        }
        if self.metric_key_prefix.trim().is_empty() {
            anyhow::bail!("metric_key_prefix must not be empty");
        }
        Ok(())
    }

    /// The binary to invoke, explicit path first.
    pub fn binary(&self) -> PathBuf {
        self.iptables_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.protocol.binary()))
    }
}
