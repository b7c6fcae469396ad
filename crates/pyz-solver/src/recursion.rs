//! Recursion guards for the solver.
//!
//! Every recursive descent in the solver (assignability, constraint
//! solving, protocol matching, complexity scoring, type traversal) is
//! bounded by a profile from this module. Profiles are the single source of
//! truth for solver recursion limits; `pyz_common::limits` holds only
//! non-recursion caps.
//!
//! Reaching a limit is not an error: callers return a conservative answer
//! (`true` for subtype-like queries, 1.0 for complexity).

use rustc_hash::FxHashSet;
use std::hash::Hash;

// =============================================================================
// Profiles
// =============================================================================

/// Named limit profiles for the solver's recursive algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecursionProfile {
    /// General assignability (`assign_type`) and constraint recording.
    SubtypeCheck,
    /// `solve_constraints` / dependent-variable resolution.
    ConstraintSolving,
    /// Structural protocol matching.
    ProtocolMatch,
    /// Substitution, free-variable walks, literal stripping.
    TypeTraversal,
    /// The complexity scorer's depth cap.
    ComplexityScore,
    Custom {
        max_depth: u32,
        max_iterations: u32,
    },
}

impl RecursionProfile {
    pub fn max_depth(self) -> u32 {
        match self {
            RecursionProfile::SubtypeCheck => 64,
            RecursionProfile::ConstraintSolving => 64,
            RecursionProfile::ProtocolMatch => 64,
            RecursionProfile::TypeTraversal => 64,
            RecursionProfile::ComplexityScore => 16,
            RecursionProfile::Custom { max_depth, .. } => max_depth,
        }
    }

    pub fn max_iterations(self) -> u32 {
        match self {
            RecursionProfile::Custom { max_iterations, .. } => max_iterations,
            _ => 100_000,
        }
    }
}

// =============================================================================
// RecursionResult
// =============================================================================

/// Outcome of attempting to enter a guarded recursion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecursionResult {
    Entered,
    /// The key is already on the active path.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

impl RecursionResult {
    pub fn is_entered(self) -> bool {
        self == RecursionResult::Entered
    }

    pub fn is_cycle(self) -> bool {
        self == RecursionResult::Cycle
    }

    pub fn is_exceeded(self) -> bool {
        matches!(
            self,
            RecursionResult::DepthExceeded | RecursionResult::IterationExceeded
        )
    }

    pub fn is_denied(self) -> bool {
        self != RecursionResult::Entered
    }
}

// =============================================================================
// RecursionGuard
// =============================================================================

/// Keyed recursion guard: cycle detection plus depth and iteration budgets.
///
/// `enter` checks, in order: iteration budget, depth limit, cycle, visiting
/// set capacity. The exceeded flag is sticky until `reset`.
pub struct RecursionGuard<K: Hash + Eq + Clone> {
    max_depth: u32,
    max_iterations: u32,
    max_visiting: Option<usize>,
    depth: u32,
    pub(crate) iterations: u32,
    visiting: FxHashSet<K>,
    exceeded: bool,
}

impl<K: Hash + Eq + Clone> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        RecursionGuard {
            max_depth,
            max_iterations,
            max_visiting: None,
            depth: 0,
            iterations: 0,
            visiting: FxHashSet::default(),
            exceeded: false,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    /// Cap the visiting set independently of depth.
    #[must_use]
    pub fn with_max_visiting(mut self, max_visiting: usize) -> Self {
        self.max_visiting = Some(max_visiting);
        self
    }

    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);
        if self.iterations > self.max_iterations {
            self.exceeded = true;
            return RecursionResult::IterationExceeded;
        }
        if self.depth >= self.max_depth {
            self.exceeded = true;
            return RecursionResult::DepthExceeded;
        }
        if self.visiting.contains(&key) {
            return RecursionResult::Cycle;
        }
        if let Some(max) = self.max_visiting {
            if self.visiting.len() >= max {
                self.exceeded = true;
                return RecursionResult::DepthExceeded;
            }
        }
        self.visiting.insert(key);
        self.depth += 1;
        RecursionResult::Entered
    }

    pub fn leave(&mut self, key: K) {
        let removed = self.visiting.remove(&key);
        debug_assert!(removed, "leave() called with a key not in the visiting set");
        if removed {
            self.depth = self.depth.saturating_sub(1);
        }
    }

    /// Run `f` inside an `enter`/`leave` pair.
    pub fn scope<R>(&mut self, key: K, f: impl FnOnce() -> R) -> Result<R, RecursionResult> {
        match self.enter(key.clone()) {
            RecursionResult::Entered => {
                let result = f();
                self.leave(key);
                Ok(result)
            }
            denied => Err(denied),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn visiting_count(&self) -> usize {
        self.visiting.len()
    }

    pub fn is_visiting(&self, key: &K) -> bool {
        self.visiting.contains(key)
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    pub fn mark_exceeded(&mut self) {
        self.exceeded = true;
    }

    /// Clear all state; limits are preserved.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.iterations = 0;
        self.visiting.clear();
        self.exceeded = false;
    }
}

// =============================================================================
// DepthCounter
// =============================================================================

/// Plain depth counter for recursions with no meaningful cycle key.
pub struct DepthCounter {
    depth: u32,
    base_depth: u32,
    max_depth: u32,
    exceeded: bool,
}

impl DepthCounter {
    pub fn new(max_depth: u32) -> Self {
        DepthCounter {
            depth: 0,
            base_depth: 0,
            max_depth,
            exceeded: false,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth())
    }

    /// Start counting from `initial` (resuming a descent mid-way).
    pub fn with_initial_depth(max_depth: u32, initial: u32) -> Self {
        DepthCounter {
            depth: initial,
            base_depth: initial,
            max_depth,
            exceeded: false,
        }
    }

    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            self.exceeded = true;
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        debug_assert!(self.depth > self.base_depth, "leave() called at depth 0");
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    pub fn mark_exceeded(&mut self) {
        self.exceeded = true;
    }

    /// Clear state back to the base depth; the limit is preserved.
    pub fn reset(&mut self) {
        self.depth = self.base_depth;
        self.exceeded = false;
    }
}
