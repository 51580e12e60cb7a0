//! Mock transaction fixtures for unit tests.
//!
//! [`ScopedMockTxn`] borrows a connection from a [`Database`] inside a
//! transaction begun on an injected [`TransactionManager`], runs the test
//! body, and guarantees the transaction is resolved, the connection closed and
//! minimized, and the manager's mode restored. Misuse by the body (switching
//! the manager's mode, ending or replacing the transaction) is reported as a
//! distinct error rather than silently tolerated.

#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod diagnostics;
pub mod error;
pub mod mock_db;
pub mod scope;
pub mod txn;

pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, TracingSink, WriterSink};
pub use error::{DbError, EnterError, HookError, ScopeError, TxnError};
pub use mock_db::{Connection, Database, MockConn, MockDb};
pub use scope::{ScopeGuard, ScopedMockTxn};
pub use txn::txn_policy::{ConfigError, TxnPolicy};
pub use txn::{LocalTxn, LocalTxnManager, Transaction, TransactionManager, TxnId, TxnStatus};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    mock_txn_test_support::test_logging::init();
}
