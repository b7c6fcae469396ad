//! Deep structural type identity.
//!
//! Interning makes identical structures share an id, so most identity
//! checks are integer compares. The residual cases are unions (member order
//! is not significant) and type variables compared while ignoring
//! flag bits (the solver's self-recursion short-circuit).

use crate::db::TypeDatabase;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::types::{TypeId, TypeKey};

/// Options for [`are_types_identical`].
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityOptions {
    /// Treat two handles to the same declared variable as identical even
    /// when their flag bits differ (unpacked vs packed, in-union, …).
    pub ignore_type_var_flags: bool,
}

/// Deep structural equality.
pub fn are_types_identical(db: &dyn TypeDatabase, a: TypeId, b: TypeId) -> bool {
    are_types_identical_with(db, a, b, IdentityOptions::default())
}

pub fn are_types_identical_with(
    db: &dyn TypeDatabase,
    a: TypeId,
    b: TypeId,
    options: IdentityOptions,
) -> bool {
    let mut depth = DepthCounter::with_profile(RecursionProfile::TypeTraversal);
    identical_inner(db, a, b, options, &mut depth)
}

fn identical_inner(
    db: &dyn TypeDatabase,
    a: TypeId,
    b: TypeId,
    options: IdentityOptions,
    depth: &mut DepthCounter,
) -> bool {
    if a == b {
        return true;
    }
    if !depth.enter() {
        // Conservative answer at the recursion bound.
        return true;
    }
    let result = match (db.lookup(a), db.lookup(b)) {
        (Some(TypeKey::Union(lhs)), Some(TypeKey::Union(rhs))) => {
            // Order-independent set comparison. Members are deduplicated by
            // construction, so matching lengths plus containment suffices.
            lhs.len() == rhs.len()
                && lhs.iter().all(|&l| {
                    rhs.iter()
                        .any(|&r| identical_inner(db, l, r, options, depth))
                })
        }
        (Some(TypeKey::TypeVar(lhs)), Some(TypeKey::TypeVar(rhs)))
            if options.ignore_type_var_flags =>
        {
            let lhs = db.type_var_shape(lhs);
            let rhs = db.type_var_shape(rhs);
            lhs.name == rhs.name
                && lhs.scope_id == rhs.scope_id
                && lhs.kind == rhs.kind
        }
        (Some(TypeKey::Class(lhs)), Some(TypeKey::Class(rhs))) => {
            let lhs = db.class_shape(lhs);
            let rhs = db.class_shape(rhs);
            lhs.full_name == rhs.full_name
                && lhs.flags == rhs.flags
                && lhs.literal == rhs.literal
                && lhs.conditions == rhs.conditions
                && match (&lhs.type_args, &rhs.type_args) {
                    (None, None) => true,
                    (Some(l), Some(r)) => {
                        l.len() == r.len()
                            && l.iter()
                                .zip(r.iter())
                                .all(|(&l, &r)| identical_inner(db, l, r, options, depth))
                    }
                    _ => false,
                }
                && match (&lhs.tuple_elements, &rhs.tuple_elements) {
                    (None, None) => true,
                    (Some(l), Some(r)) => {
                        l.len() == r.len()
                            && l.iter().zip(r.iter()).all(|(le, re)| {
                                le.is_unbounded == re.is_unbounded
                                    && le.is_optional == re.is_optional
                                    && identical_inner(db, le.ty, re.ty, options, depth)
                            })
                    }
                    _ => false,
                }
        }
        (Some(TypeKey::Function(lhs)), Some(TypeKey::Function(rhs))) => {
            let lhs = db.function_shape(lhs);
            let rhs = db.function_shape(rhs);
            lhs.flags == rhs.flags
                && lhs.param_spec == rhs.param_spec
                && lhs.params.len() == rhs.params.len()
                && lhs
                    .params
                    .iter()
                    .zip(rhs.params.iter())
                    .all(|(lp, rp)| {
                        lp.kind == rp.kind
                            && identical_inner(db, lp.ty, rp.ty, options, depth)
                    })
                && identical_inner(db, lhs.return_type, rhs.return_type, options, depth)
        }
        _ => false,
    };
    depth.leave();
    result
}
