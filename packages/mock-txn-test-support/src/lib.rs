//! Test support for the mock transaction fixtures
//!
//! This crate provides the unified logging initialization shared by every
//! test binary, plus assertions over diagnostic sink output.

pub mod assertions;
pub mod test_logging;
