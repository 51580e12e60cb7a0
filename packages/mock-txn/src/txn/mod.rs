//! Transaction manager interfaces.
//!
//! The scope never reaches for a hidden global: it is handed a
//! [`TransactionManager`] and snapshots/compares its state explicitly.
//! [`global`] exists for callers that want one ambient manager per process.

pub mod local;
pub mod txn_policy;

use std::fmt;
use std::sync::OnceLock;

use crate::error::TxnError;

pub use local::{LocalTxn, LocalTxnManager};

/// Identity of a transaction within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(u64);

impl TxnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TxnStatus::Active => "active",
            TxnStatus::Committed => "committed",
            TxnStatus::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// A transaction handle.
pub trait Transaction {
    fn id(&self) -> TxnId;

    fn commit(&self) -> Result<(), TxnError>;

    fn abort(&self) -> Result<(), TxnError>;

    /// Mark the transaction so it can only be aborted.
    fn doom(&self);

    fn is_doomed(&self) -> bool;
}

/// The ambient transaction manager a scope temporarily owns.
pub trait TransactionManager {
    type Txn: Transaction;

    /// Whether callers must begin/end transactions themselves.
    fn explicit(&self) -> bool;

    fn set_explicit(&self, explicit: bool);

    fn begin(&self) -> Result<Self::Txn, TxnError>;

    /// The current transaction, without creating one.
    fn current(&self) -> Option<Self::Txn>;
}

static GLOBAL: OnceLock<LocalTxnManager> = OnceLock::new();

/// The process-wide manager, created on first use in implicit mode.
pub fn global() -> &'static LocalTxnManager {
    GLOBAL.get_or_init(LocalTxnManager::new)
}
