//! Workspace anchor crate.
//!
//! Exists to carry workspace-level dev tooling (git hooks via
//! `cargo-husky`); all functionality lives in the crates under
//! `crates/`.
