//! Unified test logging initialization
//!
//! Every test binary calls [`init`] from a `#[ctor::ctor]` so log output from
//! the scope (entry, resolution, cleanup failures) is visible on demand.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

/// Scope warnings (dropped without exit, misuse) and sink errors from
/// `mock_txn`; only errors from everything else.
pub const DEFAULT_DIRECTIVES: &str = "error,mock_txn=warn";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Pick the filter directives: `TEST_LOG` wins over `RUST_LOG`, blank values
/// are ignored, and [`DEFAULT_DIRECTIVES`] applies when neither is set.
pub fn directives(test_log: Option<String>, rust_log: Option<String>) -> String {
    test_log
        .into_iter()
        .chain(rust_log)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Initialize compact logging for tests. Idempotent.
///
/// ```bash
/// TEST_LOG=mock_txn=debug cargo test -p mock-txn
/// ```
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let chosen = directives(
            std::env::var("TEST_LOG").ok(),
            std::env::var("RUST_LOG").ok(),
        );
        let filter = EnvFilter::try_new(&chosen)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

        // Another subscriber may already be installed by the harness
        let _ = fmt()
            .compact()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init();
    });
}
