//! Scoped mock transaction.
//!
//! Borrow a connection inside a transaction, run test code, and leave the
//! transaction manager exactly as it was found:
//!
//! ```
//! use mock_txn::{LocalTxnManager, MockDb, ScopedMockTxn, TransactionManager};
//!
//! let db = MockDb::new();
//! let txm = LocalTxnManager::new();
//!
//! let conn = ScopedMockTxn::new(&db, &txm)
//!     .run(|conn| Ok::<_, std::io::Error>(conn.clone()))
//!     .unwrap();
//!
//! assert!(conn.is_closed());
//! assert!(conn.is_minimized());
//! assert!(!txm.explicit());
//! ```
//!
//! # Exit contract
//!
//! On every exit path the guard, in order:
//!
//! 1. fails with [`ScopeError::ModeChanged`] if the body switched the manager
//!    out of explicit mode,
//! 2. fails with [`ScopeError::TransactionChanged`] if the current
//!    transaction is no longer the one the scope began (a stray replacement
//!    is aborted),
//! 3. otherwise aborts on a body error, aborts a doomed transaction, or
//!    resolves per [`TxnPolicy`],
//! 4. closes and cache-minimizes the connection,
//! 5. restores the manager's original mode.
//!
//! Exactly one error propagates. Precedence, highest first: mode changed,
//! transaction changed, body, abort/commit, close. Failures that lose are
//! folded into the winning error's text where it can carry them, and always
//! written to the [`DiagnosticSink`].

use std::error::Error as StdError;
use std::fmt;

use tracing::{debug, warn};

use crate::diagnostics::{context, Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{chain_text, DbError, EnterError, HookError, ScopeError};
use crate::mock_db::{Connection, Database};
use crate::txn::txn_policy::{self, TxnPolicy};
use crate::txn::{Transaction, TransactionManager, TxnId};

const MODULE: &str = module_path!();

type OpenedHook<'a, C> = Box<dyn FnMut(&C) -> Result<(), HookError> + 'a>;

/// Builder for one scope over a database and a transaction manager.
///
/// Both are borrowed for the lifetime of the scope; the scope assumes it is
/// the only user of the manager until it exits.
pub struct ScopedMockTxn<'a, D: Database, M: TransactionManager> {
    db: &'a D,
    txm: &'a M,
    sink: Box<dyn DiagnosticSink + 'a>,
    policy: Option<TxnPolicy>,
    on_opened: Option<OpenedHook<'a, D::Conn>>,
}

impl<'a, D: Database, M: TransactionManager> ScopedMockTxn<'a, D, M> {
    pub fn new(db: &'a D, txm: &'a M) -> Self {
        Self {
            db,
            txm,
            sink: Box::new(TracingSink),
            policy: None,
            on_opened: None,
        }
    }

    /// Where swallowed cleanup failures are written. Defaults to [`TracingSink`].
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'a) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Override the process-wide [`txn_policy::current`] for this scope.
    pub fn with_policy(mut self, policy: TxnPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Called once, right after the connection is opened and before the body
    /// runs. An error unwinds the entry and is returned as [`EnterError::Hook`].
    pub fn on_connection_opened<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&D::Conn) -> Result<(), HookError> + 'a,
    {
        self.on_opened = Some(Box::new(hook));
        self
    }

    /// Run the entry sequence and hand back the guard that owns the scope.
    ///
    /// On failure nothing leaks: the transaction is aborted, an opened
    /// connection is closed, and the manager's mode is restored before the
    /// error is returned. A panicking hook gets the same cleanup on unwind.
    pub fn enter(self) -> Result<ScopeGuard<'a, D::Conn, M>, EnterError> {
        let ScopedMockTxn {
            db,
            txm,
            sink,
            policy,
            mut on_opened,
        } = self;

        let was_explicit = txm.explicit();
        txm.set_explicit(true);

        let txn = match txm.begin() {
            Ok(txn) => txn,
            Err(err) => {
                txm.set_explicit(was_explicit);
                return Err(EnterError::Begin(err));
            }
        };

        let conn = match db.open() {
            Ok(conn) => conn,
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    report_to(&*sink, context::UNWIND_ENTRY, &abort_err);
                }
                txm.set_explicit(was_explicit);
                return Err(EnterError::Open(err));
            }
        };

        // The guard exists before the hook runs so a panicking hook unwinds
        // through its drop cleanup.
        let mut guard = ScopeGuard {
            txm,
            sink,
            policy: policy.unwrap_or_else(txn_policy::current),
            conn,
            txn,
            was_explicit,
            exited: false,
        };

        if let Some(hook) = on_opened.as_mut() {
            if let Err(err) = hook(&guard.conn) {
                warn!(txn = %guard.txn.id(), error = %err, "scope=on_connection_opened failed");
                guard.release(context::UNWIND_ENTRY);
                return Err(EnterError::Hook(err));
            }
        }

        debug!(txn = %guard.txn.id(), was_explicit, "scope=enter");
        Ok(guard)
    }

    /// Enter, run `body` with the connection, and exit with its outcome.
    ///
    /// A panicking body unwinds through the guard's drop cleanup.
    pub fn run<T, E, F>(self, body: F) -> Result<T, ScopeError<E>>
    where
        E: fmt::Display,
        F: FnOnce(&D::Conn) -> Result<T, E>,
    {
        let guard = self.enter()?;
        let outcome = body(guard.connection());
        guard.exit(outcome)
    }
}

/// An open scope. Call [`ScopeGuard::exit`] with the body's outcome; dropping
/// the guard without exiting performs best-effort cleanup only.
pub struct ScopeGuard<'a, C: Connection, M: TransactionManager> {
    txm: &'a M,
    sink: Box<dyn DiagnosticSink + 'a>,
    policy: TxnPolicy,
    conn: C,
    txn: M::Txn,
    was_explicit: bool,
    exited: bool,
}

impl<'a, C: Connection, M: TransactionManager> ScopeGuard<'a, C, M> {
    /// The connection the scope opened.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// The transaction the scope began.
    pub fn transaction_id(&self) -> TxnId {
        self.txn.id()
    }

    /// Resolve the scope with the body's outcome. See the module docs for the
    /// ordering and precedence rules.
    pub fn exit<T, E>(mut self, outcome: Result<T, E>) -> Result<T, ScopeError<E>>
    where
        E: fmt::Display,
    {
        let resolved = self.resolve(outcome);
        let result = self.close_connection(resolved);
        self.txm.set_explicit(self.was_explicit);
        self.exited = true;

        debug!(
            txn = %self.txn.id(),
            explicit = self.was_explicit,
            ok = result.is_ok(),
            "scope=exit"
        );
        result
    }

    fn resolve<T, E>(&self, outcome: Result<T, E>) -> Result<T, ScopeError<E>>
    where
        E: fmt::Display,
    {
        let began = self.txn.id();

        let explicit = self.txm.explicit();
        if !explicit {
            warn!(txn = %began, "scope=transaction manager mode changed by body");
            let mut superseded = body_text(&outcome);
            if let Some(current) = self.txm.current() {
                abort_stray(&current, &mut superseded);
            }
            return Err(ScopeError::ModeChanged {
                expected: true,
                found: explicit,
                superseded,
            });
        }

        let current = self.txm.current();
        let found = current.as_ref().map(Transaction::id);
        if found != Some(began) {
            warn!(txn = %began, found = ?found, "scope=transaction changed by body");
            let mut superseded = body_text(&outcome);
            if let Some(stray) = current {
                abort_stray(&stray, &mut superseded);
            }
            return Err(ScopeError::TransactionChanged {
                began,
                found,
                superseded,
            });
        }

        match outcome {
            Ok(value) => self.finish(value),
            Err(body) => {
                debug!(txn = %began, "scope=abort after body error");
                if let Err(err) = self.txn.abort() {
                    self.report(context::CLEANUP_TRANS, &err);
                }
                Err(ScopeError::Body(body))
            }
        }
    }

    fn finish<T, E>(&self, value: T) -> Result<T, ScopeError<E>> {
        let id = self.txn.id();

        if self.txn.is_doomed() || self.policy == TxnPolicy::AbortOnOk {
            debug!(txn = %id, doomed = self.txn.is_doomed(), "scope=abort");
            self.txn.abort().map_err(ScopeError::Abort)?;
            return Ok(value);
        }

        debug!(txn = %id, "scope=commit");
        if let Err(err) = self.txn.commit() {
            let still_current = self.txm.current().map(|txn| txn.id()) == Some(id);
            if still_current {
                if let Err(abort_err) = self.txn.abort() {
                    self.report(context::ABORT_AFTER_COMMIT, &abort_err);
                }
            }
            return Err(ScopeError::Commit(err));
        }
        Ok(value)
    }

    fn close_connection<T, E>(
        &self,
        result: Result<T, ScopeError<E>>,
    ) -> Result<T, ScopeError<E>> {
        let failures = release_connection(&self.conn);
        for failure in &failures {
            self.report(context::CLOSE_CONNECTION, failure);
        }

        let mut failures = failures.into_iter();
        match result {
            Ok(value) => match failures.next() {
                Some(first) => Err(ScopeError::Close(first)),
                None => Ok(value),
            },
            Err(mut err) => {
                for failure in failures {
                    err.supersede(failure.to_string());
                }
                Err(err)
            }
        }
    }

    /// Best-effort teardown without an outcome: abort whatever transaction
    /// is current (the scope's own or a stray the body left behind), release
    /// the connection, restore the mode. Failures go to the sink under
    /// `context`.
    fn release(&mut self, context: &'static str) {
        if let Some(current) = self.txm.current() {
            if current.id() != self.txn.id() {
                debug!(txn = %current.id(), "scope=abort stray transaction");
            }
            if let Err(err) = current.abort() {
                self.report(context, &err);
            }
        }
        for failure in release_connection(&self.conn) {
            self.report(context, &failure);
        }
        self.txm.set_explicit(self.was_explicit);
        self.exited = true;
    }

    fn report(&self, context: &'static str, err: &(dyn StdError + 'static)) {
        report_to(&*self.sink, context, err);
    }
}

impl<'a, C: Connection, M: TransactionManager> Drop for ScopeGuard<'a, C, M> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        warn!(
            txn = %self.txn.id(),
            panicking = std::thread::panicking(),
            "scope=dropped without exit"
        );

        self.release(context::DROPPED_WITHOUT_EXIT);
    }
}

/// Close, then cache-minimize; both are always attempted.
fn release_connection<C: Connection>(conn: &C) -> Vec<DbError> {
    [conn.close().err(), conn.cache_minimize().err()]
        .into_iter()
        .flatten()
        .collect()
}

fn abort_stray<T: Transaction>(txn: &T, superseded: &mut Vec<String>) {
    debug!(txn = %txn.id(), "scope=abort stray transaction");
    if let Err(err) = txn.abort() {
        superseded.push(format!("failed to abort {}: {err}", txn.id()));
    }
}

fn body_text<T, E: fmt::Display>(outcome: &Result<T, E>) -> Vec<String> {
    match outcome {
        Ok(_) => Vec::new(),
        Err(err) => vec![format!("body error: {err}")],
    }
}

fn report_to(sink: &dyn DiagnosticSink, context: &'static str, err: &(dyn StdError + 'static)) {
    sink.report(&Diagnostic {
        module: MODULE,
        context,
        error: chain_text(err),
    });
}
