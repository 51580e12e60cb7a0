use std::str::FromStr;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::warn;

/// Environment variable consulted when no policy has been set in-process.
pub const POLICY_ENV: &str = "MOCK_TXN_POLICY";

/// How a scope resolves its transaction when the body succeeds and the
/// transaction is not doomed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPolicy {
    /// Commit the transaction (default behavior)
    CommitOnOk,
    /// Abort the transaction, leaving nothing behind
    AbortOnOk,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid MOCK_TXN_POLICY value '{value}': expected 'commit' or 'abort'")]
    InvalidPolicy { value: String },
}

impl FromStr for TxnPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commit" | "commit_on_ok" => Ok(TxnPolicy::CommitOnOk),
            "abort" | "abort_on_ok" => Ok(TxnPolicy::AbortOnOk),
            _ => Err(ConfigError::InvalidPolicy {
                value: s.to_string(),
            }),
        }
    }
}

static POLICY: OnceLock<TxnPolicy> = OnceLock::new();

/// Get the current transaction policy.
///
/// Resolution order: a policy set with [`set_txn_policy`], then
/// `MOCK_TXN_POLICY`, then `CommitOnOk`.
pub fn current() -> TxnPolicy {
    if let Some(policy) = POLICY.get() {
        return *policy;
    }
    policy_from_env(std::env::var(POLICY_ENV).ok().as_deref())
}

/// Set the transaction policy for the process.
///
/// Only the first call has any effect.
pub fn set_txn_policy(policy: TxnPolicy) {
    let _ = POLICY.set(policy);
}

fn policy_from_env(raw: Option<&str>) -> TxnPolicy {
    match raw.map(str::parse::<TxnPolicy>) {
        Some(Ok(policy)) => policy,
        Some(Err(err)) => {
            warn!(error = %err, "txn_policy=fallback to CommitOnOk");
            TxnPolicy::CommitOnOk
        }
        None => TxnPolicy::CommitOnOk,
    }
}
