//! Centralized limits and thresholds for the pyz type checker.
//!
//! This module provides shared constants for collection caps and growth
//! limits used throughout the codebase. Centralizing these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Makes it easy to tune limits for different environments
//! - Documents the rationale for each limit
//!
//! # Solver recursion limits
//!
//! Recursion limits for the constraint solver (assignability, constraint
//! solving, protocol matching, complexity scoring) are centralized in
//! [`pyz_solver::recursion::RecursionProfile`] rather than here. This avoids
//! duplication between `limits.rs` constants and `RecursionGuard`
//! construction sites. The profiles are the single source of truth for
//! solver recursion.

// =============================================================================
// Constraint accumulation caps
// =============================================================================

/// Maximum number of parallel constraint sets in one tracker.
///
/// A tracker forks one set per overload signature when a ParamSpec is
/// matched against an overloaded callable. Nested overload combinations
/// multiply; at 1024 sets the tracker refuses to fork further and keeps the
/// existing sets, preventing exponential blow-up.
///
/// # Example
///
/// ```python
/// # Each decorator application against an overloaded callable forks the
/// # tracker once per overload:
/// @overload
/// def f(x: int) -> int: ...
/// @overload
/// def f(x: str) -> str: ...
///
/// def apply(fn: Callable[P, T]) -> Callable[P, T]: ...
/// g = apply(f)  # two constraint sets, one per overload of f
/// ```
pub const MAX_CONSTRAINT_SETS: usize = 1024;

/// Maximum number of union subtypes in an inferred lower bound.
///
/// Widening a type variable's lower bound by union can grow without limit
/// when many distinct types are assigned in sequence. Past this cap, if the
/// variable declares an upper bound and `object` is available, the lower
/// bound collapses to `object` instead of accumulating further subtypes.
///
/// # Example
///
/// ```python
/// def pick(*values: T) -> T: ...
/// # pick() called with 70 distinct literal types: T collapses to object
/// # rather than a 70-element union.
/// ```
pub const MAX_SUBTYPES_FOR_INFERRED_TYPE: usize = 64;

/// Maximum entries in the per-class protocol-compatibility cache.
///
/// Each destination protocol name keeps a FIFO list of compatibility
/// results keyed by specialization and pre-constraints. Oldest entries are
/// evicted first.
pub const MAX_PROTOCOL_COMPAT_CACHE_ENTRIES: usize = 64;
