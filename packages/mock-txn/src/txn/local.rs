//! In-process transaction manager.
//!
//! Mirrors the behaviour tests rely on from a thread-local transaction
//! manager: an explicit/implicit mode flag, a single current transaction, and
//! doom/commit/abort semantics. Handles are cheap clones of shared state.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{Transaction, TransactionManager, TxnId, TxnStatus};
use crate::error::TxnError;

#[derive(Debug, Default)]
struct ManagerState {
    explicit: bool,
    current: Option<LocalTxn>,
    next_id: u64,
}

#[derive(Debug)]
struct TxnState {
    status: TxnStatus,
    doomed: bool,
    commits: u32,
    aborts: u32,
    fail_commit: Option<String>,
    fail_abort: Option<String>,
}

impl TxnState {
    fn active() -> Self {
        Self {
            status: TxnStatus::Active,
            doomed: false,
            commits: 0,
            aborts: 0,
            fail_commit: None,
            fail_abort: None,
        }
    }
}

/// Cloneable handle onto one transaction manager.
#[derive(Debug, Clone, Default)]
pub struct LocalTxnManager {
    inner: Arc<Mutex<ManagerState>>,
}

impl LocalTxnManager {
    /// A manager in implicit mode with no current transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when both handles point at the same manager.
    pub fn same_manager(&self, other: &LocalTxnManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The current transaction. Implicit mode begins one on demand; explicit
    /// mode fails with [`TxnError::NoTransaction`].
    pub fn get(&self) -> Result<LocalTxn, TxnError> {
        let explicit = {
            let state = self.inner.lock();
            if let Some(txn) = &state.current {
                return Ok(txn.clone());
            }
            state.explicit
        };
        if explicit {
            return Err(TxnError::NoTransaction);
        }
        self.begin()
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<(), TxnError> {
        self.get()?.commit()
    }

    /// Abort the current transaction. Aborting with nothing current is a no-op.
    pub fn abort(&self) -> Result<(), TxnError> {
        match self.current() {
            Some(txn) => txn.abort(),
            None => Ok(()),
        }
    }

    /// Doom the current transaction.
    pub fn doom(&self) -> Result<(), TxnError> {
        self.get()?.doom();
        Ok(())
    }

    fn clear_current(&self, id: TxnId) {
        let mut state = self.inner.lock();
        if state.current.as_ref().map(LocalTxn::id) == Some(id) {
            state.current = None;
        }
    }
}

impl TransactionManager for LocalTxnManager {
    type Txn = LocalTxn;

    fn explicit(&self) -> bool {
        self.inner.lock().explicit
    }

    fn set_explicit(&self, explicit: bool) {
        trace!(explicit, "txn_manager=set_mode");
        self.inner.lock().explicit = explicit;
    }

    fn begin(&self) -> Result<LocalTxn, TxnError> {
        let mut state = self.inner.lock();
        if let Some(previous) = state.current.take() {
            if state.explicit {
                let id = previous.id;
                state.current = Some(previous);
                return Err(TxnError::AlreadyInTransaction { id });
            }
            // Implicit mode discards whatever was pending. The manager lock is
            // held, so the previous state is updated directly rather than
            // through `abort()`.
            let mut prev = previous.state.lock();
            if prev.status == TxnStatus::Active {
                prev.status = TxnStatus::Aborted;
                prev.aborts += 1;
            }
            debug!(txn = %previous.id, "txn_manager=begin discarded pending transaction");
        }

        state.next_id += 1;
        let txn = LocalTxn {
            id: TxnId::new(state.next_id),
            state: Arc::new(Mutex::new(TxnState::active())),
            manager: Arc::downgrade(&self.inner),
        };
        state.current = Some(txn.clone());
        trace!(txn = %txn.id, explicit = state.explicit, "txn_manager=begin");
        Ok(txn)
    }

    fn current(&self) -> Option<LocalTxn> {
        self.inner.lock().current.clone()
    }
}

/// Handle onto one transaction begun by a [`LocalTxnManager`].
#[derive(Debug, Clone)]
pub struct LocalTxn {
    id: TxnId,
    state: Arc<Mutex<TxnState>>,
    manager: Weak<Mutex<ManagerState>>,
}

impl LocalTxn {
    pub fn status(&self) -> TxnStatus {
        self.state.lock().status
    }

    pub fn commit_count(&self) -> u32 {
        self.state.lock().commits
    }

    pub fn abort_count(&self) -> u32 {
        self.state.lock().aborts
    }

    /// The next commit resolves the transaction and then fails with `message`.
    pub fn fail_next_commit(&self, message: impl Into<String>) {
        self.state.lock().fail_commit = Some(message.into());
    }

    /// The next abort resolves the transaction and then fails with `message`.
    pub fn fail_next_abort(&self, message: impl Into<String>) {
        self.state.lock().fail_abort = Some(message.into());
    }

    fn release(&self) {
        if let Some(inner) = self.manager.upgrade() {
            LocalTxnManager { inner }.clear_current(self.id);
        }
    }
}

impl Transaction for LocalTxn {
    fn id(&self) -> TxnId {
        self.id
    }

    fn commit(&self) -> Result<(), TxnError> {
        let injected = {
            let mut state = self.state.lock();
            if state.status != TxnStatus::Active {
                return Err(TxnError::NotActive {
                    id: self.id,
                    status: state.status,
                });
            }
            if state.doomed {
                return Err(TxnError::Doomed { id: self.id });
            }
            state.status = TxnStatus::Committed;
            state.commits += 1;
            state.fail_commit.take()
        };
        self.release();
        trace!(txn = %self.id, "txn=commit");

        match injected {
            Some(message) => Err(TxnError::Injected {
                op: "commit",
                message,
            }),
            None => Ok(()),
        }
    }

    fn abort(&self) -> Result<(), TxnError> {
        let injected = {
            let mut state = self.state.lock();
            match state.status {
                TxnStatus::Aborted => return Ok(()),
                TxnStatus::Committed => {
                    return Err(TxnError::NotActive {
                        id: self.id,
                        status: state.status,
                    })
                }
                TxnStatus::Active => {}
            }
            state.status = TxnStatus::Aborted;
            state.aborts += 1;
            state.fail_abort.take()
        };
        self.release();
        trace!(txn = %self.id, "txn=abort");

        match injected {
            Some(message) => Err(TxnError::Injected {
                op: "abort",
                message,
            }),
            None => Ok(()),
        }
    }

    fn doom(&self) {
        self.state.lock().doomed = true;
    }

    fn is_doomed(&self) -> bool {
        self.state.lock().doomed
    }
}
