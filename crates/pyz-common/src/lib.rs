//! Common types and utilities for the pyz type checker.
//!
//! This crate provides foundational types used across all pyz crates:
//! - String interning (`Atom`, `Interner`)
//! - Diagnostic codes, message templates, and the diagnostic accumulator
//! - Compiler limits and thresholds
//! - Cooperative cancellation (`CancellationToken`)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Diagnostic codes, templates, and the accumulator
pub mod diagnostics;
pub use diagnostics::{Diag, DiagSink, DiagnosticCategory, format_message};

// Centralized limits and thresholds
pub mod limits;

// Cooperative cancellation
pub mod cancel;
pub use cancel::CancellationToken;
