use derive_more::Display;
pub const TARGET: &str = "dataworker_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the Dataworker changes, like starting or finishing a cycle.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Assembling bundle data from deposit and fill events.
    #[display(fmt = "bundle_data")]
    BundleData,
    /// Proposing a new root bundle.
    #[display(fmt = "proposal")]
    Proposal,
    /// Validating a pending root bundle.
    #[display(fmt = "validation")]
    Validation,
    /// Enqueuing a transaction.
    #[display(fmt = "tx_queue")]
    TxQueue,
}
