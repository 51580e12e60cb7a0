//! Assertions over diagnostic sink output
//!
//! Sink text is a sequence of records shaped like:
//!
//! ```text
//! Unexpected error closing connection
//! Module mock_txn::scope: failed to close connection: boom
//! ```

/// Module tag every record written by the scope carries.
pub const SCOPE_MODULE_TAG: &str = "Module mock_txn::scope";

/// Assert that `text` holds a record for `context` tagged with the scope module.
///
/// # Panics
/// If either the context line or the module tag is missing.
pub fn assert_reported(text: &str, context: &str) {
    assert!(
        text.lines().any(|line| line == context),
        "Expected diagnostics to contain '{}', but got '{}'",
        context,
        text
    );
    assert!(
        text.contains(SCOPE_MODULE_TAG),
        "Expected diagnostics to be tagged with '{}', but got '{}'",
        SCOPE_MODULE_TAG,
        text
    );
}

/// Assert that nothing was written to the sink.
///
/// # Panics
/// If `text` is not empty.
pub fn assert_nothing_reported(text: &str) {
    assert!(
        text.is_empty(),
        "Expected no diagnostics, but got '{}'",
        text
    );
}
