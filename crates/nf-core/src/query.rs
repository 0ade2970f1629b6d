use crate::error::QueryFailure;

/// Read-only access to the packet filter's chains and counters.
pub trait ChainQuery {
    /// Chain names of `table`, in the order the packet filter reports them.
    fn list_chains(&self, table: &str) -> Result<Vec<String>, QueryFailure>;

    /// Counter rows of `chain`. The first two fields of each row are the
    /// packet and byte counters as decimal strings; further fields are ignored.
    fn stats(&self, table: &str, chain: &str) -> Result<Vec<Vec<String>>, QueryFailure>;
}

impl<Q: ChainQuery + ?Sized> ChainQuery for &Q {
    fn list_chains(&self, table: &str) -> Result<Vec<String>, QueryFailure> {
        (**self).list_chains(table)
    }

    fn stats(&self, table: &str, chain: &str) -> Result<Vec<Vec<String>>, QueryFailure> {
        (**self).stats(table, chain)
    }
}
