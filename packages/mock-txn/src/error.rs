use thiserror::Error;

use crate::txn::{TxnId, TxnStatus};

/// Error returned by a `on_connection_opened` hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by a transaction manager or one of its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxnError {
    #[error("no transaction is current (manager is in explicit mode)")]
    NoTransaction,
    #[error("transaction {id} is already current; explicit mode forbids a nested begin")]
    AlreadyInTransaction { id: TxnId },
    #[error("transaction {id} is doomed and cannot commit")]
    Doomed { id: TxnId },
    #[error("transaction {id} is not active ({status})")]
    NotActive { id: TxnId, status: TxnStatus },
    #[error("injected {op} failure: {message}")]
    Injected { op: &'static str, message: String },
}

/// Failures raised by a database or one of its connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("failed to open connection: {message}")]
    Open { message: String },
    #[error("failed to close connection: {message}")]
    Close { message: String },
    #[error("failed to minimize connection cache: {message}")]
    Minimize { message: String },
}

/// Failures of the scope entry sequence. The entry path has already been
/// unwound (transaction aborted, connection closed, mode restored) by the time
/// one of these is returned.
#[derive(Debug, Error)]
pub enum EnterError {
    #[error("failed to begin scope transaction: {0}")]
    Begin(#[source] TxnError),
    #[error("failed to open scope connection: {0}")]
    Open(#[source] DbError),
    #[error("on_connection_opened hook failed: {0}")]
    Hook(#[source] HookError),
}

/// The single error a scope reports, selected by precedence:
/// mode changed > transaction changed > body > abort > close.
///
/// Fixture-misuse variants carry the text of every failure they superseded.
#[derive(Debug, Error)]
pub enum ScopeError<E> {
    #[error(
        "TransactionManagerModeChanged: expected explicit={expected}, found explicit={found}{}",
        render_superseded(.superseded)
    )]
    ModeChanged {
        expected: bool,
        found: bool,
        superseded: Vec<String>,
    },
    #[error(
        "TransactionChanged: scope began {began}, found {}{}",
        render_found(.found),
        render_superseded(.superseded)
    )]
    TransactionChanged {
        began: TxnId,
        found: Option<TxnId>,
        superseded: Vec<String>,
    },
    #[error("{0}")]
    Body(E),
    #[error("failed to commit scope transaction: {0}")]
    Commit(TxnError),
    #[error("failed to abort scope transaction: {0}")]
    Abort(TxnError),
    #[error("{0}")]
    Close(DbError),
    #[error(transparent)]
    Enter(#[from] EnterError),
}

impl<E> ScopeError<E> {
    /// True when the body altered the manager's explicit flag.
    pub fn is_mode_changed(&self) -> bool {
        matches!(self, ScopeError::ModeChanged { .. })
    }

    /// True when the body ended or replaced the scope's transaction.
    pub fn is_transaction_changed(&self) -> bool {
        matches!(self, ScopeError::TransactionChanged { .. })
    }

    /// Borrow the body's own error, if that is what propagated.
    pub fn body(&self) -> Option<&E> {
        match self {
            ScopeError::Body(err) => Some(err),
            _ => None,
        }
    }

    /// Recover the body's own error, if that is what propagated.
    pub fn into_body(self) -> Option<E> {
        match self {
            ScopeError::Body(err) => Some(err),
            _ => None,
        }
    }

    /// Lower-precedence failures folded into this error.
    pub fn superseded(&self) -> &[String] {
        match self {
            ScopeError::ModeChanged { superseded, .. }
            | ScopeError::TransactionChanged { superseded, .. } => superseded,
            _ => &[],
        }
    }

    /// Record a failure this error wins over. Only the fixture-misuse
    /// variants carry superseded text; for the others this is a no-op and the
    /// caller is expected to have reported the failure elsewhere.
    pub(crate) fn supersede(&mut self, text: String) {
        if let ScopeError::ModeChanged { superseded, .. }
        | ScopeError::TransactionChanged { superseded, .. } = self
        {
            superseded.push(text);
        }
    }
}

fn render_found(found: &Option<TxnId>) -> String {
    match found {
        Some(id) => id.to_string(),
        None => "no current transaction".to_string(),
    }
}

fn render_superseded(superseded: &[String]) -> String {
    if superseded.is_empty() {
        return String::new();
    }
    let mut out = String::from("; superseded: ");
    out.push_str(&superseded.join(" | "));
    out
}

/// Render an error together with its `source()` chain on one line.
pub(crate) fn chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !out.contains(&cause_text) {
            out.push_str(": ");
            out.push_str(&cause_text);
        }
        source = cause.source();
    }
    out
}
