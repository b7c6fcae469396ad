//! Solved constraint results.
//!
//! Solving one tracker yields one [`SolutionSet`] per constraint set. A
//! solution is read-only once returned; `None` values are the "left
//! unresolved" sentinel (also pre-seeded during recursive resolution to
//! break cycles).

use indexmap::IndexMap;

use crate::db::TypeDatabase;
use crate::instantiate::{TypeSubstitution, instantiate_type};
use crate::types::{TypeId, TypeVarKey};

// =============================================================================
// SolutionSet
// =============================================================================

/// Read-only mapping variable key → resolved type.
#[derive(Clone, Debug, Default)]
pub struct SolutionSet {
    map: IndexMap<TypeVarKey, Option<TypeId>>,
}

impl SolutionSet {
    pub fn new() -> Self {
        SolutionSet {
            map: IndexMap::new(),
        }
    }

    pub(crate) fn set(&mut self, key: TypeVarKey, ty: Option<TypeId>) {
        self.map.insert(key, ty);
    }

    /// `Some(None)` means "present but unresolved"; `None` means the
    /// variable was never considered.
    pub fn get(&self, key: TypeVarKey) -> Option<Option<TypeId>> {
        self.map.get(&key).copied()
    }

    pub fn contains(&self, key: TypeVarKey) -> bool {
        self.map.contains_key(&key)
    }

    /// The resolved type, if the variable resolved to one.
    pub fn resolve(&self, key: TypeVarKey) -> Option<TypeId> {
        self.map.get(&key).copied().flatten()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeVarKey> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of variables that resolved to a concrete type.
    pub fn solved_count(&self) -> usize {
        self.map.values().filter(|v| v.is_some()).count()
    }

    /// Substitution over the resolved variables only.
    pub fn to_substitution(&self) -> TypeSubstitution {
        let mut subst = TypeSubstitution::new();
        for (&key, &value) in &self.map {
            if let Some(ty) = value {
                subst.insert(key, ty);
            }
        }
        subst
    }

    /// Substitute every resolved variable inside `ty`; unresolved variables
    /// are left in place.
    pub fn apply(&self, db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
        instantiate_type(db, ty, &self.to_substitution())
    }

    /// Like [`apply`](Self::apply), but unresolved variables become
    /// `Unknown`.
    pub fn apply_defaulting_unknown(&self, db: &dyn TypeDatabase, ty: TypeId) -> TypeId {
        let mut subst = self.to_substitution();
        for (&key, &value) in &self.map {
            if value.is_none() {
                subst.insert(key, TypeId::UNKNOWN);
            }
        }
        instantiate_type(db, ty, &subst)
    }
}

// =============================================================================
// ConstraintSolution
// =============================================================================

/// The result of solving one tracker: one solution set per constraint set.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSolution {
    sets: Vec<SolutionSet>,
}

impl ConstraintSolution {
    pub fn from_sets(sets: Vec<SolutionSet>) -> Self {
        ConstraintSolution { sets }
    }

    pub fn sets(&self) -> &[SolutionSet] {
        &self.sets
    }

    /// The solution for the tracker's main constraint set.
    pub fn main_set(&self) -> &SolutionSet {
        &self.sets[0]
    }

    /// Resolve against the main set.
    pub fn resolve(&self, key: TypeVarKey) -> Option<TypeId> {
        self.main_set().resolve(key)
    }

    /// The solution set with the most resolved variables, ties broken by
    /// the lowest total complexity of the resolved types.
    pub fn best_set(&self, db: &dyn TypeDatabase) -> &SolutionSet {
        use crate::complexity::complexity_score;
        let mut best = &self.sets[0];
        let mut best_solved = best.solved_count();
        let mut best_score: f64 = best
            .keys()
            .filter_map(|k| best.resolve(k))
            .map(|t| complexity_score(db, t))
            .sum();
        for set in &self.sets[1..] {
            let solved = set.solved_count();
            let score: f64 = set
                .keys()
                .filter_map(|k| set.resolve(k))
                .map(|t| complexity_score(db, t))
                .sum();
            if solved > best_solved || (solved == best_solved && score < best_score) {
                best = set;
                best_solved = solved;
                best_score = score;
            }
        }
        best
    }
}
