//! Expected-type seeding.
//!
//! Given a constructor call with a contextual ("expected") type, seed the
//! target class's type parameters so the constructed value becomes
//! assignable to the expectation. When the expected type specializes a
//! *base* of the target, the mapping from base arguments back to target
//! parameters is recovered with synthesized placeholder variables.

use tracing::trace;

use crate::constraints::{ConstraintEntry, ConstraintTracker};
use crate::instantiate::specialize_class;
use crate::judge::{AssignFlags, Judge};
use crate::types::{
    ClassFlags, ScopeId, TypeId, TypeVarFlags, TypeVarKey, TypeVarKind, TypeVarShape, Variance,
};

impl<'a> Judge<'a> {
    /// Seed bounds for `target`'s type parameters such that `target`
    /// becomes assignable to `expected`.
    pub fn seed_from_expected_type(
        &self,
        target: TypeId,
        expected: TypeId,
        tracker: &mut ConstraintTracker,
        live_scopes: Option<&[ScopeId]>,
    ) -> bool {
        let db = self.db();
        let expected = self.resolve_ref(expected);
        let Some(target_shape) = db.class_of(target) else {
            return false;
        };
        if target_shape.type_params.is_empty() {
            return true;
        }

        // The caller's tracker must solve the target's parameter scopes.
        for &param in &target_shape.type_params {
            if let Some(scope) = db.type_var_of(param).and_then(|v| v.scope_id) {
                tracker.add_solve_scope(scope);
            }
        }

        let in_live_scope = |param: TypeId| -> bool {
            match live_scopes {
                None => true,
                Some(scopes) => db
                    .type_var_of(param)
                    .and_then(|v| v.scope_id)
                    .is_some_and(|s| scopes.contains(&s)),
            }
        };

        // Any: everything becomes Any.
        if expected == TypeId::ANY {
            for &param in &target_shape.type_params {
                let Some(var) = db.type_var_of(param) else {
                    continue;
                };
                if !in_live_scope(param) {
                    continue;
                }
                let key = TypeVarKey::of(&var);
                for set in tracker.sets_mut() {
                    let mut entry = ConstraintEntry::new(param);
                    entry.lower_bound = Some(TypeId::ANY);
                    entry.upper_bound = Some(TypeId::ANY);
                    entry.retain_literals = true;
                    set.record(key, entry);
                }
            }
            return true;
        }

        // `Self` stands for its declared bound here.
        let expected = match db.type_var_of(expected) {
            Some(var) if var.flags.contains(TypeVarFlags::IS_SELF) => match var.bound {
                Some(bound) => bound,
                None => return false,
            },
            _ => expected,
        };

        let Some(expected_shape) = db.class_of(expected) else {
            return false;
        };

        // Unspecialized expectation: run plain assignability in
        // population mode.
        if expected_shape.type_args.is_none() {
            let target_specialized = crate::instantiate::self_specialized(db, target);
            return self.assign_type(
                expected,
                target_specialized,
                None,
                Some(tracker),
                AssignFlags::POPULATE_EXPECTED_TYPE
                    | AssignFlags::SKIP_POPULATE_UNKNOWN_EXPECTED_TYPE,
                0,
            );
        }

        // Same generic class: read the arguments off directly, honoring
        // each parameter's declared variance.
        if expected_shape.full_name == target_shape.full_name {
            let args = expected_shape.type_args.clone().unwrap_or_default();
            for (index, &param) in target_shape.type_params.iter().enumerate() {
                let Some(&arg) = args.get(index) else {
                    break;
                };
                let Some(var) = db.type_var_of(param) else {
                    continue;
                };
                if !in_live_scope(param) {
                    continue;
                }
                let key = TypeVarKey::of(&var);
                for set in tracker.sets_mut() {
                    let mut entry = ConstraintEntry::new(param);
                    match var.variance {
                        Variance::Covariant => entry.lower_bound = Some(arg),
                        Variance::Contravariant => entry.upper_bound = Some(arg),
                        Variance::Invariant => {
                            entry.lower_bound = Some(arg);
                            entry.upper_bound = Some(arg);
                        }
                    }
                    entry.retain_literals = true;
                    set.record(key, entry);
                }
            }
            return true;
        }

        // The expectation specializes some base of the target. Synthesize
        // invariant placeholders on both sides, run plain assignability,
        // and read the association back out of the synthesized entries.
        let synth_scope = db.fresh_scope_id();
        let dest_vars: Vec<TypeId> = (0..expected_shape.type_params.len())
            .map(|index| self.synth_var(&format!("__dest{index}"), synth_scope))
            .collect();
        let source_vars: Vec<TypeId> = (0..target_shape.type_params.len())
            .map(|index| self.synth_var(&format!("__source{index}"), synth_scope))
            .collect();

        let mut expected_synth_shape = (*expected_shape).clone();
        expected_synth_shape.type_args = Some(dest_vars.clone());
        expected_synth_shape.flags |= ClassFlags::SYNTHESIZED;
        let expected_synth = db.class(expected_synth_shape);

        let mut target_generic_shape = (*target_shape).clone();
        target_generic_shape.type_args = None;
        let target_generic = db.class(target_generic_shape);
        let Some(target_synth) = specialize_class(db, target_generic, source_vars.clone()) else {
            return false;
        };

        let mut synth_tracker = ConstraintTracker::with_scope(synth_scope);
        if !self.assign_type(
            expected_synth,
            target_synth,
            None,
            Some(&mut synth_tracker),
            AssignFlags::empty(),
            0,
        ) {
            trace!("expected-type seeding: synthesized assignability failed");
            return false;
        }

        let expected_args = expected_shape.type_args.clone().unwrap_or_default();
        for (index, &dest_var) in dest_vars.iter().enumerate() {
            let Some(var) = db.type_var_of(dest_var) else {
                continue;
            };
            let entry = synth_tracker.main_set().entry(TypeVarKey::of(&var));
            let Some(binding) = entry.and_then(|e| e.lower_bound.or(e.upper_bound)) else {
                continue;
            };
            // The binding must contain exactly one synthesized source
            // variable; it names the target parameter this argument feeds.
            let members = db.union_members(binding);
            let mut source_index = None;
            let mut rest: Vec<TypeId> = Vec::new();
            for &member in &members {
                match source_vars.iter().position(|&s| s == member) {
                    Some(position) if source_index.is_none() => source_index = Some(position),
                    Some(_) => {
                        source_index = None;
                        break;
                    }
                    None => rest.push(member),
                }
            }
            let Some(position) = source_index else {
                continue;
            };
            let Some(&target_param) = target_shape.type_params.get(position) else {
                continue;
            };
            if !in_live_scope(target_param) {
                continue;
            }
            let Some(&expected_arg) = expected_args.get(index) else {
                continue;
            };
            let value = if rest.is_empty() {
                expected_arg
            } else {
                rest.push(expected_arg);
                db.union(rest)
            };
            if !self.assign_type_var(
                target_param,
                value,
                None,
                Some(tracker),
                AssignFlags::RETAIN_LITERALS_FOR_TYPE_VAR,
                0,
            ) {
                return false;
            }
        }
        true
    }

    fn synth_var(&self, name: &str, scope: ScopeId) -> TypeId {
        let db = self.db();
        let mut shape = TypeVarShape::new(db.intern_string(name), Some(scope));
        shape.kind = TypeVarKind::Ordinary;
        shape.variance = Variance::Invariant;
        shape.flags |= TypeVarFlags::SYNTHESIZED;
        db.type_var(shape)
    }
}
