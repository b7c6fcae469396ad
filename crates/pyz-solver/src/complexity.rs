//! Type complexity scoring.
//!
//! When multiple candidates solve the same variable, the solver prefers the
//! one with the lower score; completeness (number of variables solved)
//! dominates the comparison. Scores are in `[0, 1]`.

use crate::db::TypeDatabase;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::types::{FunctionFlags, TypeId, TypeKey};

/// Unions at or past this width score a flat 0.5.
const WIDE_UNION_THRESHOLD: usize = 16;

/// Score a type's complexity in `[0, 1]`. Pure.
pub fn complexity_score(db: &dyn TypeDatabase, ty: TypeId) -> f64 {
    let mut depth = DepthCounter::with_profile(RecursionProfile::ComplexityScore);
    score_inner(db, ty, &mut depth)
}

fn score_inner(db: &dyn TypeDatabase, ty: TypeId, depth: &mut DepthCounter) -> f64 {
    if !depth.enter() {
        return 1.0;
    }
    let score = match db.lookup(ty) {
        Some(TypeKey::Any) | Some(TypeKey::Unknown) => 0.5,
        Some(TypeKey::TypeVar(var_id)) => {
            if db.type_var_shape(var_id).is_instantiable() {
                0.55
            } else {
                0.5
            }
        }
        Some(TypeKey::Function(function_id)) => {
            if db
                .function_shape(function_id)
                .flags
                .contains(FunctionFlags::INSTANTIABLE)
            {
                0.85
            } else {
                0.8
            }
        }
        Some(TypeKey::Overloaded(_)) => 0.8,
        Some(TypeKey::Never) | Some(TypeKey::Unbound) => 1.0,
        Some(TypeKey::Union(members)) => {
            if members.len() >= WIDE_UNION_THRESHOLD {
                0.5
            } else {
                members
                    .iter()
                    .map(|&m| score_inner(db, m, depth))
                    .fold(0.0, f64::max)
            }
        }
        Some(TypeKey::Class(class_id)) => {
            let shape = db.class_shape(class_id);
            let arg_avg = match &shape.type_args {
                Some(args) if !args.is_empty() => {
                    let sum: f64 = args.iter().map(|&a| score_inner(db, a, depth)).sum();
                    sum / args.len() as f64
                }
                _ => 0.0,
            };
            let base = 0.5 + 0.25 * arg_avg;
            if shape.is_instantiable() {
                base + 0.05
            } else {
                base
            }
        }
        // Modules and unresolved refs carry no useful signal.
        _ => 0.5,
    };
    depth.leave();
    score
}
