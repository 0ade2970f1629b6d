use std::num::ParseIntError;
use thiserror::Error;

/// Failure to read chains or counters from the packet filter.
///
/// Every variant aborts the whole collection; callers never get a partial
/// sample back.
#[derive(Debug, Error)]
pub enum QueryFailure {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("chain {chain}: invalid {field} counter '{value}': {source}")]
    Parse {
        chain: String,
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("chain {chain}: counter row has {fields} field(s), expected at least 2")]
    MalformedRow { chain: String, fields: usize },
}

impl QueryFailure {
    pub fn parse(chain: &str, field: &'static str, value: &str, source: ParseIntError) -> Self {
        Self::Parse {
            chain: chain.to_string(),
            field,
            value: value.to_string(),
            source,
        }
    }
}
