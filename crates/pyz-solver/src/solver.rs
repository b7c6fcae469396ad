//! Constraint recording and solving.
//!
//! `assign_type_var` is the write path: one obligation "assign `src` into a
//! slot naming variable `dest`" updates the variable's entry under the
//! variance the flags request. `solve_constraints` is the read path: it
//! turns accumulated entries into concrete types, resolving dependent
//! variables with cycle preseeding.

use pyz_common::DiagSink;
use pyz_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use pyz_common::limits::MAX_SUBTYPES_FOR_INFERRED_TYPE;
use tracing::trace;

use crate::constraints::{ConstraintEntry, ConstraintSet, ConstraintTracker};
use crate::equality::{IdentityOptions, are_types_identical, are_types_identical_with};
use crate::instantiate::{
    concretize, convert_to_instance, free_type_vars, instantiate_type, strip_literals,
    TypeSubstitution,
};
use crate::judge::{AssignFlags, Judge};
use crate::printer::print_type;
use crate::recursion::RecursionProfile;
use crate::solution::{ConstraintSolution, SolutionSet};
use crate::types::{
    ClassFlags, ConstraintCondition, FunctionShape, TypeId, TypeKey, TypeVarFlags, TypeVarKey,
    TypeVarKind, TypeVarShape,
};

/// Options for [`Judge::solve_constraints`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveOptions {
    /// Never fall back to the upper bound when the lower bound is absent.
    pub use_lower_bound_only: bool,
}

impl<'a> Judge<'a> {
    // =========================================================================
    // assign_type_var
    // =========================================================================

    /// Record one assignment obligation against a type variable.
    ///
    /// `tracker` may be absent for validation-only queries. Returns `false`
    /// and records a diagnostic (when a sink is provided) on conflict.
    pub fn assign_type_var(
        &self,
        dest: TypeId,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        mut tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        if self.check_cancelled() {
            return false;
        }
        if depth > RecursionProfile::SubtypeCheck.max_depth() {
            return true;
        }
        let depth = depth + 1;
        let db = self.db();
        let Some(shape) = db.type_var_of(dest) else {
            return false;
        };

        // A variable with no scope was never registered anywhere the solver
        // can record it; succeed and let another layer diagnose.
        if shape.scope_id.is_none() {
            return true;
        }

        // A variable from a scope this tracker does not solve is validated
        // but never recorded.
        if tracker
            .as_deref()
            .is_some_and(|t| !t.is_solving_scope(shape.scope_id))
        {
            tracker = None;
        }

        let mut dest = dest;
        let mut shape = shape;
        let mut src = src;

        // Normalize unpacked variadic forms.
        if shape.flags.contains(TypeVarFlags::UNPACKED) {
            if let Some(src_var) = db.type_var_of(src) {
                if src_var.flags.contains(TypeVarFlags::UNPACKED) {
                    // Both sides unpacked: compare the inner sequences.
                    let mut packed_dest = (*shape).clone();
                    packed_dest.flags -= TypeVarFlags::UNPACKED;
                    dest = db.type_var(packed_dest.clone());
                    shape = db.type_var_of(dest).expect("type var key");
                    let mut packed_src = (*src_var).clone();
                    packed_src.flags -= TypeVarFlags::UNPACKED;
                    src = db.type_var(packed_src);
                }
            } else if shape.kind == TypeVarKind::TypeVarTuple && !self.is_unpacked_tuple(src) {
                // A concrete source becomes a one-element unpacked tuple.
                if let Some(wrapped) = self.wrap_in_unpacked_tuple(&[src]) {
                    src = wrapped;
                }
            }
        } else if let Some(src_var) = db.type_var_of(src) {
            if src_var.kind == TypeVarKind::TypeVarTuple
                && src_var.flags.contains(TypeVarFlags::UNPACKED)
            {
                // An unpacked variadic flowing into an ordinary slot is
                // treated as the union of its elements.
                let mut rewrapped = (*src_var).clone();
                rewrapped.flags -= TypeVarFlags::UNPACKED;
                rewrapped.flags |= TypeVarFlags::IN_UNION;
                src = db.type_var(rewrapped);
            }
        }

        // Identity assignments record nothing.
        if are_types_identical_with(
            db,
            dest,
            src,
            IdentityOptions {
                ignore_type_var_flags: true,
            },
        ) {
            return true;
        }

        if !shape.is_free() && !shape.is_unification() {
            return self.assign_bound_type_var(&shape, src, diag, flags, depth);
        }
        if shape.kind == TypeVarKind::ParamSpec {
            return self.assign_param_spec_var(dest, &shape, src, diag, tracker, flags, depth);
        }
        if !shape.constraints.is_empty() {
            return self.assign_constrained_var(dest, &shape, src, diag, tracker, flags, depth);
        }

        // Unconstrained (optionally upper-bounded) variable.
        if flags.contains(AssignFlags::POPULATE_EXPECTED_TYPE)
            && flags.contains(AssignFlags::SKIP_POPULATE_UNKNOWN_EXPECTED_TYPE)
            && src == TypeId::UNKNOWN
        {
            return true;
        }
        let key = TypeVarKey::of(&shape);
        let Some(adj_src) = self.adjust_source(&shape, dest, src, flags, depth) else {
            self.report_assignment_mismatch(&shape, src, diag.as_deref_mut());
            return false;
        };

        let current: Vec<Option<ConstraintEntry>> = match tracker.as_deref() {
            Some(t) => t.sets().iter().map(|s| s.entry(key).cloned()).collect(),
            None => vec![None],
        };
        let mut updated = Vec::with_capacity(current.len());
        for cur in &current {
            match self.compute_entry_update(
                dest,
                &shape,
                cur.as_ref(),
                adj_src,
                flags,
                diag.as_deref_mut(),
                depth,
            ) {
                Some(entry) => updated.push(entry),
                None => return false,
            }
        }
        if let Some(t) = tracker.as_deref_mut() {
            for (set, entry) in t.sets_mut().iter_mut().zip(updated) {
                set.record(key, entry);
            }
        }
        true
    }

    fn is_unpacked_tuple(&self, ty: TypeId) -> bool {
        self.db()
            .class_of(ty)
            .is_some_and(|c| c.flags.contains(ClassFlags::UNPACKED) && c.tuple_elements.is_some())
    }

    /// Wrap element types in an unpacked `tuple[...]`, when `tuple` is
    /// registered.
    pub(crate) fn wrap_in_unpacked_tuple(&self, elements: &[TypeId]) -> Option<TypeId> {
        let db = self.db();
        let tuple_ty = self.env().get_builtin("tuple")?;
        let shape = db.class_of(tuple_ty)?;
        let mut new_shape = (*shape).clone();
        new_shape.tuple_elements = Some(
            elements
                .iter()
                .map(|&e| crate::types::TupleElement::required(e))
                .collect(),
        );
        new_shape.flags |= ClassFlags::UNPACKED;
        Some(db.class(new_shape))
    }

    // =========================================================================
    // Bound variables (§ non-free)
    // =========================================================================

    fn assign_bound_type_var(
        &self,
        shape: &TypeVarShape,
        src: TypeId,
        diag: Option<&mut DiagSink>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        if db.is_any_or_unknown(src) {
            return true;
        }
        if let Some(src_class) = db.class_of(src) {
            if src_class.mro.iter().any(|&b| db.is_any_or_unknown(b)) {
                return true;
            }
        }
        if src == TypeId::NEVER && !flags.contains(AssignFlags::INVARIANT) {
            return true;
        }
        if shape.kind == TypeVarKind::ParamSpec {
            if let Some(src_fn) = db.function_of(src) {
                if src_fn.is_gradual() {
                    return true;
                }
            }
        }
        if shape.is_instantiable() {
            // `type[Any]` satisfies an instantiable variable.
            if let Some(src_class) = db.class_of(src) {
                if src_class.is_instantiable()
                    && src_class
                        .type_args
                        .as_ref()
                        .is_some_and(|args| args.iter().all(|&a| db.is_any_or_unknown(a)))
                {
                    return true;
                }
            }
        }
        let _ = depth;
        self.report_assignment_mismatch(shape, src, diag);
        false
    }

    // =========================================================================
    // Source adjustment
    // =========================================================================

    /// §4.3.2 source normalization. `None` means the assignment fails.
    fn adjust_source(
        &self,
        shape: &TypeVarShape,
        dest: TypeId,
        src: TypeId,
        flags: AssignFlags,
        depth: u32,
    ) -> Option<TypeId> {
        let db = self.db();
        let mut adjusted = src;

        // Implicit type arguments become explicit Unknown.
        if !flags.contains(AssignFlags::ALLOW_UNSPECIFIED_TYPE_ARGS) {
            if let Some(src_class) = db.class_of(adjusted) {
                if src_class.type_args.is_none() && !src_class.type_params.is_empty() {
                    let unknown_args = vec![TypeId::UNKNOWN; src_class.type_params.len()];
                    adjusted =
                        crate::instantiate::specialize_class(db, adjusted, unknown_args)
                            .unwrap_or(adjusted);
                }
            }
        }

        if shape.is_instantiable() {
            // The source must name a class object, possibly after
            // concretizing top-level variables; the entry stores the
            // instance form.
            let candidate = if db.type_var_of(adjusted).is_some() {
                concretize(db, adjusted)
            } else {
                adjusted
            };
            if !self.is_instantiable_type(candidate) {
                return None;
            }
            adjusted = convert_to_instance(db, candidate);
        }

        // An instantiable variable whose instance form is the destination
        // itself would produce a circular lower bound.
        if let Some(src_var) = db.type_var_of(adjusted) {
            if src_var.is_instantiable() {
                let as_instance = convert_to_instance(db, adjusted);
                if are_types_identical_with(
                    db,
                    as_instance,
                    dest,
                    IdentityOptions {
                        ignore_type_var_flags: true,
                    },
                ) {
                    return None;
                }
            }
        }
        let _ = depth;
        Some(adjusted)
    }

    fn is_instantiable_type(&self, ty: TypeId) -> bool {
        let db = self.db();
        match db.lookup(ty) {
            Some(TypeKey::Any) | Some(TypeKey::Unknown) => true,
            Some(TypeKey::Class(class_id)) => db.class_shape(class_id).is_instantiable(),
            Some(TypeKey::TypeVar(var_id)) => db.type_var_shape(var_id).is_instantiable(),
            Some(TypeKey::Union(members)) => {
                members.iter().all(|&m| self.is_instantiable_type(m))
            }
            _ => false,
        }
    }

    // =========================================================================
    // Entry update (§ unconstrained)
    // =========================================================================

    fn compute_entry_update(
        &self,
        dest: TypeId,
        shape: &TypeVarShape,
        cur: Option<&ConstraintEntry>,
        src: TypeId,
        flags: AssignFlags,
        mut diag: Option<&mut DiagSink>,
        depth: u32,
    ) -> Option<ConstraintEntry> {
        let db = self.db();
        let cur_lower = cur.and_then(|e| e.lower_bound);
        let cur_upper = cur.and_then(|e| e.upper_bound);
        let is_self = shape.flags.contains(TypeVarFlags::IS_SELF);
        let effective_upper = cur_upper.or(if is_self { None } else { shape.bound });
        let cur_retain = cur.is_some_and(|e| e.retain_literals);
        let retain = cur_retain
            || flags.intersects(
                AssignFlags::POPULATE_EXPECTED_TYPE | AssignFlags::RETAIN_LITERALS_FOR_TYPE_VAR,
            );

        // Expected-type population records only into empty slots.
        if flags.contains(AssignFlags::POPULATE_EXPECTED_TYPE) {
            if let Some(existing) = cur {
                return Some(existing.clone());
            }
            let mut entry = ConstraintEntry::new(dest);
            entry.retain_literals = true;
            if flags.contains(AssignFlags::INVARIANT) {
                entry.lower_bound = Some(src);
                entry.upper_bound = Some(src);
            } else if flags.contains(AssignFlags::CONTRAVARIANT) {
                entry.lower_bound = Some(src);
            } else {
                entry.upper_bound = Some(src);
            }
            return Some(entry);
        }

        if flags.contains(AssignFlags::CONTRAVARIANT) {
            // Narrow the upper bound.
            let new_upper = if effective_upper.is_none()
                || are_types_identical_with(
                    db,
                    effective_upper.unwrap_or(dest),
                    dest,
                    IdentityOptions {
                        ignore_type_var_flags: true,
                    },
                ) {
                src
            } else {
                let upper = effective_upper.expect("checked above");
                if self.assign_type(upper, concretize(db, src), None, None, AssignFlags::empty(), depth)
                {
                    src
                } else if self.assign_type(src, upper, None, None, AssignFlags::empty(), depth) {
                    upper
                } else {
                    self.report_assignment_mismatch(shape, src, diag);
                    return None;
                }
            };
            if let Some(lower) = cur_lower {
                if !self.assign_type(new_upper, lower, None, None, AssignFlags::empty(), depth) {
                    self.report_assignment_mismatch(shape, src, diag);
                    return None;
                }
            }
            let entry = ConstraintEntry {
                type_var: dest,
                lower_bound: cur_lower,
                upper_bound: Some(new_upper),
                retain_literals: retain,
            };
            return self.finalize_entry(shape, entry, flags, diag, depth);
        }

        // Covariant default: widen the lower bound.
        let mut new_lower;
        if cur_lower.is_none()
            || are_types_identical_with(
                db,
                cur_lower.unwrap_or(dest),
                dest,
                IdentityOptions {
                    ignore_type_var_flags: true,
                },
            )
        {
            new_lower = Some(src);
        } else {
            let lower = cur_lower.expect("checked above");
            if are_types_identical(db, lower, src) {
                new_lower = Some(lower);
                if flags.contains(AssignFlags::INVARIANT) && effective_upper.is_none() && !retain {
                    new_lower = Some(strip_literals(db, lower));
                }
            } else if self.assign_type(lower, src, None, None, AssignFlags::empty(), depth) {
                // The current bound already covers the source; keep it —
                // unless the current bound is partly unknown and the source
                // is a known equivalent.
                if contains_unknown(db, lower)
                    && !contains_unknown(db, src)
                    && self.assign_type(src, lower, None, None, AssignFlags::empty(), depth)
                {
                    new_lower = Some(src);
                } else {
                    new_lower = Some(lower);
                }
            } else if self.is_foreign_type_var(lower)
                && self.assign_type(
                    concretize(db, lower),
                    src,
                    None,
                    None,
                    AssignFlags::empty(),
                    depth,
                )
            {
                new_lower = Some(src);
            } else if db.type_var_of(src).is_none()
                && self.assign_type(src, lower, None, None, AssignFlags::empty(), depth)
            {
                new_lower = Some(src);
            } else if shape.kind == TypeVarKind::TypeVarTuple {
                match self.widen_variadic_bounds(lower, src) {
                    Some(widened) => new_lower = Some(widened),
                    None => {
                        self.report_assignment_mismatch(shape, src, diag);
                        return None;
                    }
                }
            } else {
                // Widen by union, capped.
                let lower_pruned = if retain { lower } else { strip_literals(db, lower) };
                let mut members = db.union_members(lower_pruned);
                for member in db.union_members(src) {
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }
                if members.len() > MAX_SUBTYPES_FOR_INFERRED_TYPE {
                    let object_ty = shape
                        .bound
                        .and_then(|_| self.env().get_builtin("object"));
                    match object_ty {
                        Some(object_ty) => new_lower = Some(object_ty),
                        None => {
                            members.truncate(MAX_SUBTYPES_FOR_INFERRED_TYPE);
                            new_lower = Some(db.union(members));
                        }
                    }
                } else {
                    new_lower = Some(db.union(members));
                }
            }
        }

        if flags.contains(AssignFlags::INVARIANT) {
            let lower = new_lower.expect("lower bound was just computed");
            if !self.assign_type(src, lower, None, None, AssignFlags::empty(), depth) {
                self.report_assignment_mismatch(shape, src, diag.as_deref_mut());
                return None;
            }
            if let Some(upper) = effective_upper {
                if !self.assign_type(upper, lower, None, None, AssignFlags::empty(), depth) {
                    self.report_assignment_mismatch(shape, src, diag);
                    return None;
                }
            }
        } else if let Some(upper) = cur_upper {
            // The bound sandwich must keep holding.
            let lower = new_lower.expect("lower bound was just computed");
            if !self.assign_type(upper, lower, None, None, AssignFlags::empty(), depth) {
                self.report_assignment_mismatch(shape, src, diag);
                return None;
            }
        }

        let mut new_upper = cur_upper;
        if flags.contains(AssignFlags::INVARIANT) && new_upper.is_none() {
            new_upper = new_lower;
        }
        let entry = ConstraintEntry {
            type_var: dest,
            lower_bound: new_lower,
            upper_bound: new_upper,
            retain_literals: retain,
        };
        self.finalize_entry(shape, entry, flags, diag, depth)
    }

    /// Declared-bound verification shared by both variance paths.
    fn finalize_entry(
        &self,
        shape: &TypeVarShape,
        entry: ConstraintEntry,
        flags: AssignFlags,
        diag: Option<&mut DiagSink>,
        depth: u32,
    ) -> Option<ConstraintEntry> {
        let db = self.db();
        let _ = flags;
        if shape.flags.contains(TypeVarFlags::EXEMPT_FROM_BOUND_CHECK) {
            return Some(entry);
        }
        if let Some(declared) = shape.bound {
            if let Some(candidate) = entry.lower_bound.or(entry.upper_bound) {
                if !self.assign_type(
                    declared,
                    concretize(db, candidate),
                    None,
                    None,
                    AssignFlags::empty(),
                    depth,
                ) {
                    if !shape.flags.contains(TypeVarFlags::SYNTHESIZED) {
                        if let Some(sink) = diag {
                            sink.error(
                                diagnostic_codes::BOUND_VIOLATION,
                                diagnostic_messages::BOUND_VIOLATION,
                                &[
                                    &print_type(db, candidate),
                                    &print_type(db, declared),
                                    &db.resolve_atom(shape.name),
                                ],
                            );
                        }
                    }
                    return None;
                }
            }
        }
        Some(entry)
    }

    fn is_foreign_type_var(&self, ty: TypeId) -> bool {
        // A variable belonging to some other generic scope; its concrete
        // form stands in for it during widening.
        self.db().type_var_of(ty).is_some()
    }

    // =========================================================================
    // Variadic widening (§ TypeVarTuple)
    // =========================================================================

    /// Two unpacked tuple bounds widen together only when their shapes
    /// agree element-for-element after literal stripping.
    fn widen_variadic_bounds(&self, current: TypeId, incoming: TypeId) -> Option<TypeId> {
        let db = self.db();
        let current_shape = db.class_of(current)?;
        let incoming_shape = db.class_of(incoming)?;
        if !current_shape.flags.contains(ClassFlags::UNPACKED)
            || !incoming_shape.flags.contains(ClassFlags::UNPACKED)
        {
            return None;
        }
        let current_elements = current_shape.tuple_elements.as_ref()?;
        let incoming_elements = incoming_shape.tuple_elements.as_ref()?;
        if current_elements.len() != incoming_elements.len() {
            return None;
        }
        let stripped_current = strip_literals(db, current);
        let stripped_incoming = strip_literals(db, incoming);
        if are_types_identical(db, stripped_current, stripped_incoming) {
            Some(stripped_current)
        } else {
            None
        }
    }

    // =========================================================================
    // Value-constrained variables
    // =========================================================================

    fn assign_constrained_var(
        &self,
        dest: TypeId,
        shape: &TypeVarShape,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let dest_key = TypeVarKey::of(shape);
        let concrete_src = concretize(db, src);
        let subtypes = db.union_members(concrete_src);

        let mut matched_index: Option<usize> = None;
        let mut result_members: Vec<TypeId> = Vec::new();
        let mut failed = false;

        for &subtype in &subtypes {
            let mut best: Option<(usize, TypeId)> = None;
            for (index, &constraint) in shape.constraints.iter().enumerate() {
                if self.assign_type(constraint, subtype, None, None, AssignFlags::empty(), depth) {
                    let narrower = match best {
                        None => true,
                        Some((_, best_ty)) => self.assign_type(
                            best_ty,
                            constraint,
                            None,
                            None,
                            AssignFlags::empty(),
                            depth,
                        ),
                    };
                    if narrower {
                        best = Some((index, constraint));
                    }
                }
            }
            match best {
                None => {
                    if flags.contains(AssignFlags::CONTRAVARIANT) {
                        continue;
                    }
                    failed = true;
                    break;
                }
                Some((index, constraint)) => {
                    let src_condition = self.condition_for(subtype, dest_key);
                    match src_condition {
                        Some(condition) => {
                            // Conditionally-derived subtypes may map to any
                            // constraint; carry the tag through.
                            result_members
                                .push(self.with_condition(constraint, condition));
                        }
                        None => {
                            if let Some(previous) = matched_index {
                                if previous != index {
                                    failed = true;
                                    break;
                                }
                            }
                            matched_index = Some(index);
                            result_members.push(self.with_condition(
                                constraint,
                                ConstraintCondition {
                                    type_var: dest,
                                    constraint_index: index as u32,
                                },
                            ));
                        }
                    }
                }
            }
        }

        if failed && subtypes.len() > 1 {
            // Retry the union as a whole against each constraint.
            for (index, &constraint) in shape.constraints.iter().enumerate() {
                if self.assign_type(
                    constraint,
                    concrete_src,
                    None,
                    None,
                    AssignFlags::empty(),
                    depth,
                ) {
                    matched_index = Some(index);
                    result_members = vec![self.with_condition(
                        constraint,
                        ConstraintCondition {
                            type_var: dest,
                            constraint_index: index as u32,
                        },
                    )];
                    failed = false;
                    break;
                }
            }
        }

        if failed || result_members.is_empty() {
            if !shape.flags.contains(TypeVarFlags::SYNTHESIZED) {
                if let Some(sink) = diag.as_deref_mut() {
                    sink.error(
                        diagnostic_codes::CONSTRAINED_MISMATCH,
                        diagnostic_messages::CONSTRAINED_MISMATCH,
                        &[&print_type(db, src), &db.resolve_atom(shape.name)],
                    );
                }
            }
            return false;
        }

        let result = db.union(result_members);
        let retain = self.is_literal_like(result);

        let Some(tracker) = tracker else {
            return true;
        };
        for set in tracker.sets_mut() {
            let merged = match set.entry(dest_key).and_then(|e| e.lower_bound) {
                None => result,
                Some(existing) => {
                    if self.assign_type(result, existing, None, None, AssignFlags::empty(), depth)
                    {
                        result
                    } else if self.assign_type(
                        existing,
                        result,
                        None,
                        None,
                        AssignFlags::empty(),
                        depth,
                    ) {
                        existing
                    } else {
                        if let Some(sink) = diag.as_deref_mut() {
                            sink.error(
                                diagnostic_codes::CONSTRAINED_MISMATCH,
                                diagnostic_messages::CONSTRAINED_MISMATCH,
                                &[&print_type(db, src), &db.resolve_atom(shape.name)],
                            );
                        }
                        return false;
                    }
                }
            };
            let mut entry = set
                .entry(dest_key)
                .cloned()
                .unwrap_or_else(|| ConstraintEntry::new(dest));
            entry.lower_bound = Some(merged);
            entry.retain_literals = entry.retain_literals || retain;
            set.record(dest_key, entry);
        }
        true
    }

    fn condition_for(&self, ty: TypeId, var_key: TypeVarKey) -> Option<ConstraintCondition> {
        let db = self.db();
        let shape = db.class_of(ty)?;
        shape
            .conditions
            .iter()
            .find(|c| {
                db.type_var_of(c.type_var)
                    .is_some_and(|v| TypeVarKey::of(&v) == var_key)
            })
            .copied()
    }

    fn with_condition(&self, ty: TypeId, condition: ConstraintCondition) -> TypeId {
        let db = self.db();
        let Some(shape) = db.class_of(ty) else {
            return ty;
        };
        if shape.conditions.contains(&condition) {
            return ty;
        }
        let mut new_shape = (*shape).clone();
        new_shape.conditions.push(condition);
        db.class(new_shape)
    }

    fn is_literal_like(&self, ty: TypeId) -> bool {
        let db = self.db();
        db.union_members(ty)
            .iter()
            .all(|&m| db.class_of(m).is_some_and(|c| c.literal.is_some()))
    }

    // =========================================================================
    // ParamSpec variables
    // =========================================================================

    fn assign_param_spec_var(
        &self,
        dest: TypeId,
        shape: &TypeVarShape,
        src: TypeId,
        mut diag: Option<&mut DiagSink>,
        tracker: Option<&mut ConstraintTracker>,
        flags: AssignFlags,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let key = TypeVarKey::of(shape);

        // Any/Unknown is accepted without modification.
        if db.is_any_or_unknown(src) {
            return true;
        }

        match db.lookup(src) {
            Some(TypeKey::Function(_)) | Some(TypeKey::TypeVar(_)) => {
                let Some(tracker) = tracker else {
                    return true;
                };
                for set in tracker.sets_mut() {
                    if !self.record_param_spec_in_set(set, dest, key, src, diag.as_deref_mut(), depth)
                    {
                        return false;
                    }
                }
                true
            }
            Some(TypeKey::Overloaded(overload_id)) => {
                // One constraint set per overload signature.
                let overloads = db.overload_shape(overload_id).overloads.clone();
                let Some(tracker) = tracker else {
                    return !overloads.is_empty();
                };
                let mut forked: Vec<ConstraintSet> = Vec::new();
                for base_set in tracker.sets() {
                    for &overload in &overloads {
                        let mut candidate = base_set.clone();
                        if let Some(scope) = db
                            .function_of(overload)
                            .and_then(|f| f.type_params.first().copied())
                            .and_then(|p| db.type_var_of(p))
                            .and_then(|v| v.scope_id)
                        {
                            candidate.tag_scope(scope);
                        }
                        if self.record_param_spec_in_set(
                            &mut candidate,
                            dest,
                            key,
                            overload,
                            None,
                            depth,
                        ) {
                            forked.push(candidate);
                        }
                    }
                }
                if forked.is_empty() {
                    self.report_param_spec_mismatch(shape, src, diag);
                    return false;
                }
                let mut replacement = ConstraintTracker::new();
                for scope in tracker.solve_scopes() {
                    replacement.add_solve_scope(*scope);
                }
                let mut iter = forked.into_iter();
                *replacement.main_set_mut() = iter.next().expect("non-empty fork");
                for set in iter {
                    if !replacement.add_set(set) {
                        trace!("constraint set cap reached while forking ParamSpec overloads");
                        break;
                    }
                }
                tracker.copy_from(&replacement);
                true
            }
            _ => {
                self.report_param_spec_mismatch(shape, src, diag.as_deref_mut());
                let _ = flags;
                false
            }
        }
    }

    fn record_param_spec_in_set(
        &self,
        set: &mut ConstraintSet,
        dest: TypeId,
        key: TypeVarKey,
        src: TypeId,
        diag: Option<&mut DiagSink>,
        depth: u32,
    ) -> bool {
        let db = self.db();
        let existing = set.entry(key).and_then(|e| e.lower_bound);
        let chosen = match existing {
            None => src,
            Some(existing) => {
                let skip = AssignFlags::SKIP_RETURN_TYPE_CHECK;
                let new_accepts_existing =
                    self.assign_type(src, existing, None, None, skip, depth);
                let existing_accepts_new =
                    self.assign_type(existing, src, None, None, skip, depth);
                if new_accepts_existing && existing_accepts_new {
                    // Mutually assignable: prefer the non-gradual form.
                    let existing_gradual =
                        db.function_of(existing).is_some_and(|f| f.is_gradual());
                    if existing_gradual { src } else { existing }
                } else if new_accepts_existing {
                    src
                } else if existing_accepts_new {
                    existing
                } else {
                    if let Some(shape) = db.type_var_of(dest) {
                        self.report_param_spec_mismatch(&shape, src, diag);
                    }
                    return false;
                }
            }
        };
        let mut entry = set
            .entry(key)
            .cloned()
            .unwrap_or_else(|| ConstraintEntry::new(dest));
        entry.lower_bound = Some(chosen);
        set.record(key, entry);
        true
    }

    // =========================================================================
    // Solving
    // =========================================================================

    /// Produce a solution for every constraint set in the tracker.
    pub fn solve_constraints(
        &self,
        tracker: &ConstraintTracker,
        options: SolveOptions,
    ) -> ConstraintSolution {
        let mut sets = Vec::with_capacity(tracker.set_count());
        for set in tracker.sets() {
            let mut solution = SolutionSet::new();
            if self.check_cancelled() {
                sets.push(solution);
                continue;
            }
            let keys: Vec<TypeVarKey> = set.keys().collect();
            for key in keys {
                self.solve_var(key, set, &mut solution, options, 0);
            }
            sets.push(solution);
        }
        ConstraintSolution::from_sets(sets)
    }

    fn solve_var(
        &self,
        key: TypeVarKey,
        set: &ConstraintSet,
        solution: &mut SolutionSet,
        options: SolveOptions,
        depth: u32,
    ) -> Option<TypeId> {
        if let Some(existing) = solution.get(key) {
            return existing;
        }
        if depth > RecursionProfile::ConstraintSolving.max_depth() {
            return None;
        }
        // Preseed the sentinel so dependency cycles terminate.
        solution.set(key, None);
        let entry = set.entry(key)?.clone();
        let mut candidate = self.candidate_for_entry(&entry, options);

        if let Some(value) = candidate {
            let db = self.db();
            let mut dependents = TypeSubstitution::new();
            for var in free_type_vars(db, value) {
                let Some(var_shape) = db.type_var_of(var) else {
                    continue;
                };
                // Bound variables belong to the enclosing context.
                if !var_shape.is_free() && !var_shape.is_unification() {
                    continue;
                }
                let var_key = TypeVarKey::of(&var_shape);
                if var_key == key {
                    continue;
                }
                if set.entry(var_key).is_none() {
                    continue;
                }
                if let Some(resolved) = self.solve_var(var_key, set, solution, options, depth + 1)
                {
                    dependents.insert(var_key, resolved);
                }
            }
            if !dependents.is_empty() {
                candidate = Some(instantiate_type(db, value, &dependents));
            }
        }

        solution.set(key, candidate);
        candidate
    }

    /// §4.4.1: choose the solved type for one entry.
    fn candidate_for_entry(&self, entry: &ConstraintEntry, options: SolveOptions) -> Option<TypeId> {
        let db = self.db();
        let shape = db.type_var_of(entry.type_var)?;

        if shape.kind == TypeVarKind::ParamSpec {
            return match entry.lower_bound {
                Some(lower) if db.function_of(lower).is_some() => Some(lower),
                Some(lower) if db.is_any_or_unknown(lower) => Some(
                    db.function(FunctionShape::gradual(shape.name, TypeId::UNKNOWN)),
                ),
                _ => None,
            };
        }

        if let Some(lower) = entry.lower_bound {
            if !entry.retain_literals {
                let no_literals = strip_literals(db, lower);
                if no_literals != lower {
                    let fits_upper = entry.upper_bound.is_none_or(|upper| {
                        self.assign_type(upper, no_literals, None, None, AssignFlags::empty(), 0)
                    });
                    let still_constrained = shape.constraints.is_empty()
                        || shape.constraints.iter().any(|&c| {
                            are_types_identical(
                                db,
                                c,
                                crate::instantiate::strip_conditions(db, no_literals),
                            )
                        });
                    if fits_upper && still_constrained {
                        return Some(no_literals);
                    }
                }
            }
            return Some(lower);
        }
        if !options.use_lower_bound_only {
            return entry.upper_bound;
        }
        None
    }

    // =========================================================================
    // Solution back-substitution
    // =========================================================================

    /// Substitute an already-known outer solution into every bound of every
    /// set.
    pub fn apply_source_solution_to_constraints(
        &self,
        tracker: &mut ConstraintTracker,
        source: &SolutionSet,
    ) {
        let db = self.db();
        let subst = source.to_substitution();
        if subst.is_empty() {
            return;
        }
        for set in tracker.sets_mut() {
            for (_, entry) in set.entries_mut() {
                if let Some(lower) = entry.lower_bound {
                    entry.lower_bound = Some(instantiate_type(db, lower, &subst));
                }
                if let Some(upper) = entry.upper_bound {
                    entry.upper_bound = Some(instantiate_type(db, upper, &subst));
                }
            }
        }
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    fn report_assignment_mismatch(
        &self,
        shape: &TypeVarShape,
        src: TypeId,
        diag: Option<&mut DiagSink>,
    ) {
        if shape.flags.contains(TypeVarFlags::SYNTHESIZED) {
            return;
        }
        let db = self.db();
        if let Some(sink) = diag {
            sink.error(
                diagnostic_codes::ASSIGNMENT_MISMATCH,
                diagnostic_messages::ASSIGNMENT_MISMATCH,
                &[&print_type(db, src), &db.resolve_atom(shape.name)],
            );
        }
    }

    fn report_param_spec_mismatch(
        &self,
        shape: &TypeVarShape,
        src: TypeId,
        diag: Option<&mut DiagSink>,
    ) {
        if shape.flags.contains(TypeVarFlags::SYNTHESIZED) {
            return;
        }
        let db = self.db();
        if let Some(sink) = diag {
            sink.error(
                diagnostic_codes::PARAM_SPEC_MISMATCH,
                diagnostic_messages::PARAM_SPEC_MISMATCH,
                &[&print_type(db, src), &db.resolve_atom(shape.name)],
            );
        }
    }
}

/// Does the type contain `Unknown` anywhere shallowly reachable?
fn contains_unknown(db: &dyn crate::db::TypeDatabase, ty: TypeId) -> bool {
    if ty == TypeId::UNKNOWN {
        return true;
    }
    match db.lookup(ty) {
        Some(TypeKey::Union(members)) => members.iter().any(|&m| contains_unknown(db, m)),
        Some(TypeKey::Class(class_id)) => db
            .class_shape(class_id)
            .type_args
            .as_ref()
            .is_some_and(|args| args.contains(&TypeId::UNKNOWN)),
        _ => false,
    }
}
