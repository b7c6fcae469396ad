//! Constraint entries, sets, and the tracker.
//!
//! One [`ConstraintEntry`] accumulates the bounds observed for one type
//! variable. A [`ConstraintSet`] maps variables to entries in insertion
//! order (iteration order matters: widening is not commutative with literal
//! stripping). A [`ConstraintTracker`] holds one or more parallel sets, one
//! per overload signature under consideration, plus the scopes being solved
//! and a lock bit.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use pyz_common::limits::MAX_CONSTRAINT_SETS;

use crate::types::{ScopeId, TypeId, TypeVarKey};

// =============================================================================
// ConstraintEntry
// =============================================================================

/// Accumulated bounds for one variable in one set.
///
/// Invariant: when both bounds are present, the lower bound is assignable
/// to the upper bound at every observable state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintEntry {
    /// The type-variable type this entry constrains.
    pub type_var: TypeId,
    pub lower_bound: Option<TypeId>,
    pub upper_bound: Option<TypeId>,
    /// Keep literal values when choosing the solved type.
    pub retain_literals: bool,
}

impl ConstraintEntry {
    pub fn new(type_var: TypeId) -> Self {
        ConstraintEntry {
            type_var,
            lower_bound: None,
            upper_bound: None,
            retain_literals: false,
        }
    }
}

// =============================================================================
// ConstraintSet
// =============================================================================

/// Ordered map variable → entry, optionally tagged with the scope ids of
/// the overload signature it represents.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    entries: IndexMap<TypeVarKey, ConstraintEntry>,
    scope_ids: Option<FxHashSet<ScopeId>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        ConstraintSet {
            entries: IndexMap::new(),
            scope_ids: None,
        }
    }

    pub fn entry(&self, key: TypeVarKey) -> Option<&ConstraintEntry> {
        self.entries.get(&key)
    }

    pub fn entry_mut(&mut self, key: TypeVarKey) -> Option<&mut ConstraintEntry> {
        self.entries.get_mut(&key)
    }

    /// Insert or replace the entry for `key`.
    pub fn record(&mut self, key: TypeVarKey, entry: ConstraintEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: TypeVarKey) -> Option<ConstraintEntry> {
        self.entries.shift_remove(&key)
    }

    /// Variables in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = TypeVarKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&TypeVarKey, &ConstraintEntry)> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&TypeVarKey, &mut ConstraintEntry)> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scope_ids(&self) -> Option<&FxHashSet<ScopeId>> {
        self.scope_ids.as_ref()
    }

    pub fn tag_scope(&mut self, scope: ScopeId) {
        self.scope_ids
            .get_or_insert_with(FxHashSet::default)
            .insert(scope);
    }

    /// Two sets are equal iff their entries are pairwise equal and their
    /// scope-id tags match.
    pub fn same_as(&self, other: &ConstraintSet) -> bool {
        self.scope_ids == other.scope_ids && self.entries == other.entries
    }
}

// =============================================================================
// ConstraintTracker
// =============================================================================

/// Non-empty sequence of constraint sets plus the solve-for scope list.
///
/// The lock bit forbids mutation; every mutator asserts it. Cloning is how
/// speculative branches get rollback.
#[derive(Clone, Debug)]
pub struct ConstraintTracker {
    sets: SmallVec<[ConstraintSet; 1]>,
    solve_scopes: SmallVec<[ScopeId; 2]>,
    locked: bool,
}

impl ConstraintTracker {
    pub fn new() -> Self {
        let mut sets = SmallVec::new();
        sets.push(ConstraintSet::new());
        ConstraintTracker {
            sets,
            solve_scopes: SmallVec::new(),
            locked: false,
        }
    }

    /// A tracker already solving for `scope`.
    pub fn with_scope(scope: ScopeId) -> Self {
        let mut tracker = Self::new();
        tracker.add_solve_scope(scope);
        tracker
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    pub fn add_solve_scope(&mut self, scope: ScopeId) {
        self.assert_unlocked();
        if !self.solve_scopes.contains(&scope) {
            self.solve_scopes.push(scope);
        }
    }

    pub fn solve_scopes(&self) -> &[ScopeId] {
        &self.solve_scopes
    }

    /// Is `scope` one of the scopes this tracker solves for?
    pub fn is_solving_scope(&self, scope: Option<ScopeId>) -> bool {
        match scope {
            Some(scope) => self.solve_scopes.contains(&scope),
            None => false,
        }
    }

    // =========================================================================
    // Lock
    // =========================================================================

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn assert_unlocked(&self) {
        assert!(!self.locked, "attempt to mutate a locked constraint tracker");
    }

    // =========================================================================
    // Sets
    // =========================================================================

    pub fn sets(&self) -> &[ConstraintSet] {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut [ConstraintSet] {
        self.assert_unlocked();
        &mut self.sets
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn main_set(&self) -> &ConstraintSet {
        &self.sets[0]
    }

    pub fn main_set_mut(&mut self) -> &mut ConstraintSet {
        self.assert_unlocked();
        &mut self.sets[0]
    }

    /// Append a set, refusing past the cap. Returns whether it was added.
    pub fn add_set(&mut self, set: ConstraintSet) -> bool {
        self.assert_unlocked();
        if self.sets.len() >= MAX_CONSTRAINT_SETS {
            return false;
        }
        self.sets.push(set);
        true
    }

    /// Replace this tracker's state with another's (committing a
    /// speculative clone back).
    pub fn copy_from(&mut self, other: &ConstraintTracker) {
        self.assert_unlocked();
        self.sets = other.sets.clone();
        self.solve_scopes = other.solve_scopes.clone();
    }

    /// Entry for `key` in the main set.
    pub fn entry(&self, key: TypeVarKey) -> Option<&ConstraintEntry> {
        self.main_set().entry(key)
    }
}

impl Default for ConstraintTracker {
    fn default() -> Self {
        Self::new()
    }
}
