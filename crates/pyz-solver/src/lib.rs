//! Constraint solver for the pyz type checker.
//!
//! This crate implements the constraint accumulation/solving core used for
//! generic type inference and structural subtyping:
//! - the interned type model (`TypeInterner`, `TypeId`, `TypeKey`, shapes)
//! - constraint entries, sets, and the tracker
//! - the solver: `assign_type_var`, `solve_constraints`, widening rules,
//!   variadic and ParamSpec handling, dependent substitution
//! - expected-type seeding for constructor calls
//! - the structural-subtyping (protocol) matcher with its memoized
//!   compatibility cache
//! - supporting utilities: substitution, complexity scoring, recursion
//!   guards, type printing
//!
//! The entry point is [`Judge`]: construct one over a [`TypeInterner`] and
//! a [`TypeEnvironment`] and call its `assign_type` / `assign_type_var` /
//! `solve_constraints` / `assign_class_to_protocol` surface.

// Core type definitions and shapes
pub mod types;
pub use types::{
    ClassFlags, ClassId, ClassMember, ClassShape, ConstraintCondition, DefId, FunctionFlags,
    FunctionId, FunctionShape, LiteralValue, MemberFlags, ModuleId, ModuleShape, OverloadId,
    OverloadShape, ParamInfo, ParamKind, ScopeId, TupleElement, TypeId, TypeKey, TypeVarFlags,
    TypeVarId, TypeVarKey, TypeVarKind, TypeVarShape, Variance,
};

// The type interner
pub mod intern;
pub use intern::TypeInterner;

// Database trait and ambient environment
pub mod db;
pub use db::{TypeDatabase, TypeEnvironment};

// Recursion guards and profiles
pub mod recursion;
pub use recursion::{DepthCounter, RecursionGuard, RecursionProfile, RecursionResult};

// Substitution and traversal
pub mod instantiate;
pub use instantiate::{
    TypeSubstitution, concretize, convert_to_instance, convert_to_instantiable, free_type_vars,
    instantiate_type, specialize_class, strip_conditions, strip_literals,
};

// Structural identity
pub mod equality;
pub use equality::{IdentityOptions, are_types_identical, are_types_identical_with};

// Complexity scoring
pub mod complexity;
pub use complexity::complexity_score;

// Type rendering
pub mod printer;
pub use printer::print_type;

// Constraint storage
pub mod constraints;
pub use constraints::{ConstraintEntry, ConstraintSet, ConstraintTracker};

// Solved results
pub mod solution;
pub use solution::{ConstraintSolution, SolutionSet};

// The judge and its flag vocabulary
pub mod judge;
pub use judge::{AssignFlags, Judge};

// The general assignability relation
mod relate;

// Constraint recording and solving
pub mod solver;
pub use solver::SolveOptions;

// Expected-type seeding
mod expected;

// Structural protocol matching
mod protocol;

// Property accessor comparison
mod properties;

#[cfg(test)]
mod tests;
